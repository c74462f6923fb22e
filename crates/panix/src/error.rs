//! Crate-wide error types.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while initializing the reporter or delivering a report.
///
/// Only [`Error::EnvironmentResolution`] and [`Error::RequestDump`] ever reach
/// callers. Serialization and delivery failures stay inside the notification
/// path and are only logged by the guards.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Environment resolution error: {0}")]
    EnvironmentResolution(String),

    #[error("Request dump error: {0}")]
    RequestDump(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl Error {
    pub fn environment(msg: impl Into<String>) -> Self {
        Self::EnvironmentResolution(msg.into())
    }

    pub fn request_dump(msg: impl Into<String>) -> Self {
        Self::RequestDump(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        Self::Delivery(msg.into())
    }
}
