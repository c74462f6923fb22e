//! Panic capture and Slack notification for server processes.
//!
//! A [`Reporter`] is built once at startup from the environment name and a
//! [`SlackConfig`]. Guards wrap units of work; when one of them panics the
//! panic is absorbed, its cause and backtrace are captured and, if reports are
//! enabled for the current environment, posted to the Slack webhook.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use panix::{Reporter, SlackConfig};
//!
//! let reporter = Arc::new(Reporter::init(
//!     "staging",
//!     Some(SlackConfig {
//!         enabled: true,
//!         channel: "core-panic".to_string(),
//!         webhook_url: "https://hooks.slack.com/services/...".to_string(),
//!         enabled_envs: vec!["staging".to_string(), "production".to_string()],
//!     }),
//! )?);
//!
//! // Process entry point: report before moving on.
//! reporter.guard_deployment(|| run_migrations());
//!
//! // Request handler: report in the background.
//! let (ctx, request) = reporter.extract_title_and_context(request).await;
//! let ctx = ctx?;
//! reporter.guard_operation(ctx.title, ctx.context, handle(request)).await;
//! ```

pub mod capture;
pub mod config;
pub mod error;
pub mod format;
pub mod global;
mod guard;
pub mod hook;
pub mod identity;
pub mod middleware;
pub mod notifier;
pub mod reporter;
pub mod request;

pub use capture::{Capture, Fault};
pub use config::SlackConfig;
pub use error::{Error, Result};
pub use identity::HostIdentity;
pub use middleware::{PanicReportLayer, catch_panic};
pub use notifier::{ContextMap, SlackMessage, SlackNotifier};
pub use reporter::Reporter;
pub use request::{RequestContext, extract_title_and_context};
