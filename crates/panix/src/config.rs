//! Slack webhook configuration.

use serde::{Deserialize, Serialize};

/// Slack notification configuration.
///
/// Every field is optional when deserializing so the struct can be embedded
/// in a host application's own config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// Master switch for panic notifications.
    pub enabled: bool,
    /// Channel override. Empty means the webhook's default channel.
    pub channel: String,
    /// Incoming webhook URL.
    pub webhook_url: String,
    /// Environments in which notifications are sent (e.g. `staging`, `prod`).
    pub enabled_envs: Vec<String>,
}

impl SlackConfig {
    /// Whether panics raised in `environment` should be reported.
    pub fn is_enabled_for(&self, environment: &str) -> bool {
        self.enabled && self.enabled_envs.iter().any(|env| env == environment)
    }

    /// The channel override, if one is configured.
    pub fn channel_override(&self) -> Option<&str> {
        (!self.channel.is_empty()).then_some(self.channel.as_str())
    }
}
