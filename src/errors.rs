use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used throughout the harness
pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// Errors produced by the harness, each mapped to a CLI exit code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    /// The browser session could not be created (exit code 4)
    #[error("Failed to start browser session: {0}")]
    SessionStart(String),

    /// A bounded wait expired before its condition held (exit code 5)
    #[error(
        "Timed out after {elapsed_ms}ms waiting for {description} \
         (timeout {timeout_ms}ms, {attempts} attempts, last observed: {last_observation})"
    )]
    TimedOut {
        description: String,
        elapsed_ms: u64,
        timeout_ms: u64,
        attempts: u32,
        last_observation: String,
    },

    /// A selector that had to match matched nothing (exit code 2)
    #[error("No elements found matching selector: {selector}")]
    NotFound { selector: String },

    /// A closed session was used (exit code 1)
    #[error("Session {session_id} is closed; cannot {operation}")]
    Lifecycle {
        session_id: String,
        operation: &'static str,
    },

    /// An element reference outlived the document it came from
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    /// Selector text could not be parsed
    #[error("Invalid selector '{input}': {reason}")]
    InvalidSelector { input: String, reason: String },

    /// Any other failure reported by the driver
    #[error("WebDriver command failed: {0}")]
    Driver(String),
}

/// Serializable classification of a [`HarnessError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SessionStart,
    TimedOut,
    NotFound,
    Lifecycle,
    StaleElement,
    InvalidSelector,
    Driver,
    /// The scenario task itself died (panic or cancellation)
    Aborted,
}

impl HarnessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            HarnessError::SessionStart(_) => ErrorKind::SessionStart,
            HarnessError::TimedOut { .. } => ErrorKind::TimedOut,
            HarnessError::NotFound { .. } => ErrorKind::NotFound,
            HarnessError::Lifecycle { .. } => ErrorKind::Lifecycle,
            HarnessError::StaleElement(_) => ErrorKind::StaleElement,
            HarnessError::InvalidSelector { .. } => ErrorKind::InvalidSelector,
            HarnessError::Driver(_) => ErrorKind::Driver,
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HarnessError::NotFound { .. } => 2,
            HarnessError::SessionStart(_) | HarnessError::Driver(_) => 4,
            HarnessError::TimedOut { .. } => 5,
            _ => 1,
        }
    }

    /// Whether a later attempt may succeed. Waits keep polling through
    /// transient errors and stop at the first permanent one.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            HarnessError::Lifecycle { .. }
                | HarnessError::SessionStart(_)
                | HarnessError::InvalidSelector { .. }
        )
    }

    pub(crate) fn not_found(selector: impl ToString) -> Self {
        HarnessError::NotFound {
            selector: selector.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(HarnessError::not_found(".card").exit_code(), 2);
        assert_eq!(HarnessError::SessionStart("boom".into()).exit_code(), 4);
        assert_eq!(HarnessError::Driver("boom".into()).exit_code(), 4);
        let timeout = HarnessError::TimedOut {
            description: ".card".into(),
            elapsed_ms: 2000,
            timeout_ms: 2000,
            attempts: 5,
            last_observation: "0 element(s) matched".into(),
        };
        assert_eq!(timeout.exit_code(), 5);
        assert_eq!(timeout.kind(), ErrorKind::TimedOut);
    }

    #[test]
    fn test_messages_name_the_selector() {
        let err = HarnessError::not_found("h3.font-semibold");
        assert_eq!(
            err.to_string(),
            "No elements found matching selector: h3.font-semibold"
        );

        let err = HarnessError::Lifecycle {
            session_id: "abc".into(),
            operation: "navigate",
        };
        assert!(err.to_string().contains("cannot navigate"));
    }

    #[test]
    fn test_closed_session_errors_are_not_retried() {
        let closed = HarnessError::Lifecycle {
            session_id: "abc".into(),
            operation: "query elements",
        };
        assert!(!closed.is_transient());
        assert!(!HarnessError::SessionStart("boom".into()).is_transient());
        assert!(HarnessError::not_found(".card").is_transient());
        assert!(HarnessError::StaleElement("gone".into()).is_transient());
        assert!(HarnessError::Driver("no such window".into()).is_transient());
    }
}
