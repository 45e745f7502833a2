//! Crate-wide error type.
//!
//! Tasks, context access, and the subcall gateway all return
//! [`Result<T>`]. The [`TaskRunner`](crate::runner::TaskRunner) is the only
//! place that turns an [`Error`] into a terminal task status.

use crate::guard::{ConfigError, GuardError};
use thiserror::Error;

/// Errors raised inside a guarded task run.
#[derive(Debug, Error)]
pub enum Error {
    /// A budget guard rejected the operation.
    #[error(transparent)]
    Guard(#[from] GuardError),

    /// A search pattern failed to compile.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// An argument was outside its allowed range.
    #[error("{0}")]
    InvalidArgument(String),

    /// The guard policy was invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The injected subcall backend failed.
    #[error("subcall backend failed: {0}")]
    Backend(String),

    /// A subcall answer could not be interpreted.
    #[error("{0}")]
    ResponseParse(String),

    /// Failure raised by task logic.
    #[error("{0}")]
    Task(String),

    /// The task function panicked; carries the panic message.
    #[error("{0}")]
    Panic(String),
}

impl Error {
    /// Error raised by task code.
    pub fn task(message: impl Into<String>) -> Self {
        Error::Task(message.into())
    }

    /// Error for a caught panic, from its payload.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| payload.downcast_ref::<&str>().copied())
            .unwrap_or("unknown panic");
        Error::Panic(message.to_string())
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Short kind name, used as the prefix of runner error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Guard(g) => g.kind(),
            Error::InvalidPattern(_) => "InvalidPattern",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::Config(_) => "ConfigError",
            Error::Backend(_) => "BackendError",
            Error::ResponseParse(_) => "ResponseParseError",
            Error::Task(_) => "TaskError",
            Error::Panic(_) => "Panic",
        }
    }

    /// The guard violation, if this error is one.
    pub fn as_guard(&self) -> Option<&GuardError> {
        match self {
            Error::Guard(g) => Some(g),
            _ => None,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_errors_keep_their_kind() {
        let err: Error = GuardError::Tokens {
            limit: 10,
            current: 20,
        }
        .into();
        assert_eq!(err.kind(), "TokenLimit");
        assert_eq!(err.as_guard().map(|g| g.budget_type()), Some("tokens"));
        assert_eq!(err.to_string(), "Token limit exceeded: 20 > 10 per subcall");
    }

    #[test]
    fn panic_payloads_keep_their_message() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(format!("index {} out of range", 3));
        let err = Error::from_panic(&*owned);
        assert_eq!(err.kind(), "Panic");
        assert_eq!(err.to_string(), "index 3 out of range");

        let fixed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(Error::from_panic(&*fixed).to_string(), "boom");

        let opaque: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(Error::from_panic(&*opaque).to_string(), "unknown panic");
    }

    #[test]
    fn regex_errors_become_invalid_pattern() {
        let err: Error = regex::Regex::new("(unclosed").unwrap_err().into();
        assert_eq!(err.kind(), "InvalidPattern");
        assert!(err.to_string().starts_with("invalid search pattern"));
        assert!(err.as_guard().is_none());
    }

    #[test]
    fn task_errors_carry_message() {
        let err = Error::task("no sections found");
        assert_eq!(err.kind(), "TaskError");
        assert_eq!(err.to_string(), "no sections found");
    }
}
