//! Process identity embedded in every report.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use sysinfo::{Networks, System};
use tracing::debug;

use crate::format::rfc1123;
use crate::{Error, Result};

/// Hostname, outbound address and start time of the running process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    hostname: String,
    ip: IpAddr,
    started_at: DateTime<Utc>,
}

impl HostIdentity {
    pub fn new(hostname: impl Into<String>, ip: IpAddr, started_at: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.into(),
            ip,
            started_at,
        }
    }

    /// Resolves the local hostname and the first externally visible address,
    /// and stamps the identity with the current time.
    pub fn resolve() -> Result<Self> {
        let hostname = System::host_name()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::environment("unable to determine hostname"))?;
        let ip = external_ip()?;

        debug!(%hostname, %ip, "Resolved host identity");
        Ok(Self::new(hostname, ip, Utc::now()))
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// `hostname(ip)`, as shown in the "Host & Start Time" field.
    pub fn host_label(&self) -> String {
        format!("{}({})", self.hostname, self.ip)
    }

    /// Host label and start time separated by a newline.
    pub fn host_and_start_time(&self) -> String {
        format!("{}\n{}", self.host_label(), rfc1123(self.started_at))
    }
}

/// Collects interface addresses, in interface-name order.
fn external_ip() -> Result<IpAddr> {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<_> = networks.list().iter().collect();
    interfaces.sort_by(|(a, _), (b, _)| a.cmp(b));

    pick_external(
        interfaces
            .iter()
            .flat_map(|(_, data)| data.ip_networks().iter().map(|net| net.addr)),
    )
}

/// Picks the first externally visible address, preferring IPv4.
fn pick_external(addrs: impl IntoIterator<Item = IpAddr>) -> Result<IpAddr> {
    let candidates: Vec<IpAddr> = addrs.into_iter().filter(is_external).collect();

    candidates
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| candidates.first())
        .copied()
        .ok_or_else(|| {
            Error::environment("no external network address found, are you connected to the network?")
        })
}

fn is_external(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_unspecified() && !v4.is_link_local(),
        IpAddr::V6(v6) => {
            !v6.is_loopback() && !v6.is_unspecified() && !v6.is_unicast_link_local()
        }
    }
}
