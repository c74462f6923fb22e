//! Turning a caught panic payload into a reportable capture.

use std::{any::Any, backtrace::Backtrace, error::Error as StdError, fmt};

use crate::hook;

/// A panic payload, classified by what it carries.
pub enum Fault {
    /// `panic!("...")` with a string message.
    Message(String),
    /// `std::panic::panic_any` with a boxed error.
    Error(Box<dyn StdError + Send + Sync>),
    /// Any other payload type.
    Opaque,
}

impl Fault {
    /// Renders a payload without taking ownership of it, exactly as the
    /// [`fmt::Display`] impl renders the owned [`Fault`].
    pub fn describe(payload: &(dyn Any + Send)) -> String {
        if let Some(message) = payload.downcast_ref::<&'static str>() {
            return (*message).to_string();
        }
        if let Some(message) = payload.downcast_ref::<String>() {
            return message.clone();
        }
        match payload.downcast_ref::<Box<dyn StdError + Send + Sync>>() {
            Some(error) => error.to_string(),
            None => Self::Opaque.to_string(),
        }
    }

    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<&'static str>() {
            Ok(message) => return Self::Message((*message).to_string()),
            Err(payload) => payload,
        };
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Self::Message(*message),
            Err(payload) => payload,
        };
        match payload.downcast::<Box<dyn StdError + Send + Sync>>() {
            Ok(error) => Self::Error(*error),
            Err(_) => Self::Opaque,
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.write_str(message),
            Self::Error(error) => write!(f, "{error}"),
            Self::Opaque => f.write_str("Box<dyn Any>"),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(message) => f.debug_tuple("Message").field(message).finish(),
            Self::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Self::Opaque => f.write_str("Opaque"),
        }
    }
}

/// Stringified cause and stack trace of one caught panic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub cause: String,
    pub stack_trace: String,
}

impl Capture {
    /// Builds a capture from a payload returned by `catch_unwind`.
    ///
    /// Uses the backtrace recorded by [`hook::install`] when the hook saw a
    /// panic with the same cause on this thread, otherwise captures one at
    /// the recovery point.
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let cause = Fault::from_payload(payload).to_string();
        let stack_trace = match hook::take_panic_matching(&cause) {
            Some(record) => record.stack_trace(),
            None => Backtrace::force_capture().to_string(),
        };

        Self { cause, stack_trace }
    }
}
