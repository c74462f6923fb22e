//! Optional process-wide reporter.
//!
//! Hosts that cannot thread an `Arc<Reporter>` through to every guard can
//! install one here at startup. Installing again replaces the previous
//! reporter; treat this as a one-time startup step.

use std::{any::Any, future::Future, sync::Arc};

use parking_lot::{RwLock, const_rwlock};
use tracing::debug;

use crate::capture::Capture;
use crate::config::SlackConfig;
use crate::notifier::ContextMap;
use crate::reporter::Reporter;
use crate::Result;

static CURRENT: RwLock<Option<Arc<Reporter>>> = const_rwlock(None);

/// Initializes a reporter and installs it as the process-wide one.
pub fn init_slack(
    environment: impl Into<String>,
    config: Option<SlackConfig>,
) -> Result<Arc<Reporter>> {
    let reporter = Arc::new(Reporter::init(environment, config)?);
    install(reporter.clone());
    Ok(reporter)
}

/// Replaces the process-wide reporter.
pub fn install(reporter: Arc<Reporter>) {
    *CURRENT.write() = Some(reporter);
}

/// The process-wide reporter, if one was installed.
pub fn current() -> Option<Arc<Reporter>> {
    CURRENT.read().clone()
}

/// Whether the process-wide reporter would send reports.
pub fn is_enabled() -> bool {
    current().is_some_and(|reporter| reporter.is_enabled())
}

/// [`Reporter::guard_deployment`] through the process-wide reporter.
///
/// Without an installed reporter the panic is still absorbed, just not
/// reported.
pub fn bad_deployment<F, T>(f: F) -> Option<T>
where
    F: FnOnce() -> T,
{
    match current() {
        Some(reporter) => reporter.guard_deployment(f),
        None => std::panic::catch_unwind(std::panic::AssertUnwindSafe(f))
            .map_err(absorb)
            .ok(),
    }
}

/// [`Reporter::guard_operation`] through the process-wide reporter.
pub async fn bad_operation<Fut, T>(
    title: impl Into<String>,
    context: ContextMap,
    fut: Fut,
) -> Option<T>
where
    Fut: Future<Output = T>,
{
    use futures::FutureExt;

    match current() {
        Some(reporter) => reporter.guard_operation(title, context, fut).await,
        None => std::panic::AssertUnwindSafe(fut)
            .catch_unwind()
            .await
            .map_err(absorb)
            .ok(),
    }
}

fn absorb(payload: Box<dyn Any + Send>) {
    let capture = Capture::from_payload(payload);
    debug!(cause = %capture.cause, "Recovered panic, no reporter installed");
}
