//! The reporter: configuration and process identity resolved once at startup.

use tracing::info;

use crate::config::SlackConfig;
use crate::format::build_title;
use crate::hook;
use crate::identity::HostIdentity;
use crate::notifier::SlackNotifier;
use crate::Result;

/// Everything a guard needs to turn a caught panic into a Slack report.
///
/// Built once at process startup and shared (usually behind an `Arc`) with
/// every guard. Whether reports are sent is decided here, at construction,
/// and cannot change afterwards.
#[derive(Debug, Clone)]
pub struct Reporter {
    environment: String,
    identity: HostIdentity,
    notifier: Option<SlackNotifier>,
    enabled: bool,
}

impl Reporter {
    /// Resolves the host identity, installs the panic hook and computes
    /// whether reports are enabled for `environment`.
    ///
    /// Fails with [`crate::Error::EnvironmentResolution`] when the hostname
    /// or an external address cannot be determined.
    pub fn init(environment: impl Into<String>, config: Option<SlackConfig>) -> Result<Self> {
        let identity = HostIdentity::resolve()?;
        hook::install();

        let reporter = Self::with_identity(environment, config, identity);
        info!(
            environment = %reporter.environment,
            host = %reporter.identity.host_label(),
            enabled = reporter.enabled,
            "Panic reporter initialized"
        );
        Ok(reporter)
    }

    /// Builds a reporter around an identity the caller already has.
    pub fn with_identity(
        environment: impl Into<String>,
        config: Option<SlackConfig>,
        identity: HostIdentity,
    ) -> Self {
        let environment = environment.into();
        let enabled = config
            .as_ref()
            .is_some_and(|config| config.is_enabled_for(&environment));
        let notifier = config.map(|config| SlackNotifier::new(config, identity.clone()));

        Self {
            environment,
            identity,
            notifier,
            enabled,
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    pub fn config(&self) -> Option<&SlackConfig> {
        self.notifier.as_ref().map(SlackNotifier::config)
    }

    pub fn notifier(&self) -> Option<&SlackNotifier> {
        self.notifier.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The notifier, but only when reports are enabled.
    pub(crate) fn active_notifier(&self) -> Option<&SlackNotifier> {
        self.notifier.as_ref().filter(|_| self.enabled)
    }

    /// Title for a report in this reporter's environment.
    pub fn title(&self, request_host: Option<&str>) -> String {
        build_title(&self.environment, request_host)
    }
}
