//! Slack webhook notifier.
//!
//! Builds the attachment-style Slack message for a captured panic and posts
//! it to the configured incoming webhook. Each report is a single POST: no
//! retries, no queueing.

use std::{collections::BTreeMap, sync::OnceLock, time::Duration};

use reqwest::{Client, header::CONTENT_TYPE};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::capture::Capture;
use crate::config::SlackConfig;
use crate::format::code_snippet;
use crate::identity::HostIdentity;
use crate::{Error, Result};

/// Named context strings attached to a report, rendered in label order.
pub type ContextMap = BTreeMap<String, String>;

/// Timeout applied to the whole webhook request.
pub const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Accent color of every attachment.
pub const ATTACHMENT_COLOR: &str = "#e50606";

pub(crate) fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Client keeping only the delivery timeout.
pub(crate) fn fallback_client() -> Client {
    Client::builder()
        .timeout(DELIVERY_TIMEOUT)
        .build()
        .unwrap_or_else(|error| {
            error!(
                error = %error,
                "Failed to create fallback Slack HTTP client; deliveries are unbounded"
            );
            Client::new()
        })
}

/// Slack incoming-webhook message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlackMessage {
    pub text: String,
    /// `1` lets Slack resolve `@mentions` in the title.
    pub link_names: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub text: String,
    pub color: String,
    pub title: String,
    pub short: bool,
    pub mrkdwn_in: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

impl Attachment {
    fn code_block(title: impl Into<String>, body: &str) -> Self {
        Self {
            text: code_snippet(body),
            color: ATTACHMENT_COLOR.to_string(),
            title: title.into(),
            short: true,
            mrkdwn_in: vec!["text".to_string()],
            fields: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Field {
    fn short(title: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short: true,
        }
    }
}

/// Posts panic reports to a Slack webhook.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    config: SlackConfig,
    identity: HostIdentity,
    client: Client,
}

impl SlackNotifier {
    pub fn new(config: SlackConfig, identity: HostIdentity) -> Self {
        install_rustls_provider();

        // Reports may be posted from short-lived runtimes, so pooled
        // connections are never kept around.
        let client = Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .pool_max_idle_per_host(0)
            .build()
            .unwrap_or_else(|error| {
                warn!(
                    error = %error,
                    "Failed to create Slack HTTP client; falling back to a timeout-only client"
                );
                fallback_client()
            });

        Self {
            config,
            identity,
            client,
        }
    }

    pub fn config(&self) -> &SlackConfig {
        &self.config
    }

    pub fn identity(&self) -> &HostIdentity {
        &self.identity
    }

    /// Builds the message: one attachment per context entry followed by the
    /// stack trace attachment carrying the cause and host fields.
    pub fn build_message(
        &self,
        title: &str,
        cause: &str,
        stack_trace: &str,
        context: &ContextMap,
    ) -> SlackMessage {
        let mut attachments: Vec<Attachment> = context
            .iter()
            .map(|(label, value)| Attachment::code_block(label.as_str(), value))
            .collect();

        let mut stack = Attachment::code_block("Stack Trace", stack_trace);
        stack.fields = vec![
            Field::short("Panic Cause", cause),
            Field::short("Host & Start Time", self.identity.host_and_start_time()),
        ];
        attachments.push(stack);

        SlackMessage {
            text: title.to_string(),
            link_names: 1,
            channel: self.config.channel_override().map(str::to_string),
            attachments,
        }
    }

    /// Posts one report to the webhook.
    ///
    /// Any status of 300 or above is a failure; the response body is only
    /// read to make the error message useful.
    pub async fn deliver(
        &self,
        title: &str,
        cause: &str,
        stack_trace: &str,
        context: &ContextMap,
    ) -> Result<()> {
        let message = self.build_message(title, cause, stack_trace, context);
        let body = serde_json::to_vec(&message)?;

        let response = self
            .client
            .post(&self.config.webhook_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::delivery(format!("Slack webhook request failed: {}", e)))?;

        let status = response.status();
        if status.as_u16() >= 300 {
            return match response.text().await {
                Ok(body) => {
                    warn!(%status, %body, "Slack webhook rejected panic report");
                    Err(Error::delivery(format!(
                        "Slack webhook failed: {} - {}",
                        status, body
                    )))
                }
                Err(e) => {
                    warn!(%status, error = %e, "Slack webhook rejected panic report, body unreadable");
                    Err(Error::delivery(format!(
                        "Slack webhook failed: {} (unable to read body: {})",
                        status, e
                    )))
                }
            };
        }

        debug!(%status, "Panic report delivered to Slack");
        Ok(())
    }

    /// Delivers a capture, logging instead of returning any failure.
    pub async fn report(&self, title: &str, capture: &Capture, context: &ContextMap) {
        if let Err(e) = self
            .deliver(title, &capture.cause, &capture.stack_trace, context)
            .await
        {
            error!(
                error = %e,
                title = %title,
                cause = %capture.cause,
                stack_trace = %capture.stack_trace,
                "Failed to deliver panic report"
            );
        }
    }
}
