//! Client Errors
//!
//! Every call into the remote filter service ends in either a value or a
//! [`BloomgError`]. Variants are grouped into a small set of categories so
//! callers can tell a flaky network apart from a server refusal or a local
//! mistake.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, BloomgError>;

/// Remote call being performed when an error happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    List,
    Add,
    Bulk,
    Has,
    Multi,
    Drop,
    Clear,
    Close,
    Info,
}

impl Operation {
    /// Lower-case name used in log lines and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Add => "add",
            Self::Bulk => "bulk",
            Self::Has => "has",
            Self::Multi => "multi",
            Self::Drop => "drop",
            Self::Clear => "clear",
            Self::Close => "close",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, I/O or deadline failure
    Transport,
    /// The server answered with a non-success status
    Status,
    /// The server answered with something we could not interpret
    Malformed,
    /// The caller asked for something this client cannot do
    Usage,
    /// The filter is unknown to the server
    NotFound,
    /// The client configuration is invalid
    Config,
}

/// Errors returned by the bloomg client
#[derive(Debug, Clone, Error)]
pub enum BloomgError {
    #[error("{op} failed{}: {reason}", on_filter(.filter))]
    Transport {
        op: Operation,
        filter: Option<String>,
        reason: String,
    },

    #[error("{op} failed{}: timed out after {after:?}", on_filter(.filter))]
    Timeout {
        op: Operation,
        filter: Option<String>,
        after: Duration,
    },

    #[error("{op} failed{}: server returned status {status} {message}", on_filter(.filter))]
    Status {
        op: Operation,
        filter: Option<String>,
        status: i64,
        message: String,
    },

    #[error("{op} failed{}: malformed response: {reason}", on_filter(.filter))]
    Malformed {
        op: Operation,
        filter: Option<String>,
        reason: String,
    },

    #[error("{op} is not supported by the {transport} transport")]
    Unsupported {
        op: Operation,
        transport: &'static str,
    },

    #[error("Pipeline has no operation kind, queue a bulk or multi first")]
    KindUnset,

    #[error("Filter name must not be empty")]
    InvalidFilterName,

    #[error("Filter does not exist: {0}")]
    FilterNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn on_filter(filter: &Option<String>) -> String {
    match filter {
        Some(name) => format!(" on {}", name),
        None => String::new(),
    }
}

impl BloomgError {
    /// Filter the failed call was addressed to, if any
    pub fn filter(&self) -> Option<&str> {
        match self {
            Self::Transport { filter, .. }
            | Self::Timeout { filter, .. }
            | Self::Status { filter, .. }
            | Self::Malformed { filter, .. } => filter.as_deref(),
            Self::FilterNotFound(name) => Some(name),
            _ => None,
        }
    }

    /// Operation that failed, if the error came from a call
    pub fn operation(&self) -> Option<Operation> {
        match self {
            Self::Transport { op, .. }
            | Self::Timeout { op, .. }
            | Self::Status { op, .. }
            | Self::Malformed { op, .. }
            | Self::Unsupported { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport { .. } | Self::Timeout { .. } => ErrorCategory::Transport,
            Self::Status { .. } => ErrorCategory::Status,
            Self::Malformed { .. } => ErrorCategory::Malformed,
            Self::Unsupported { .. } | Self::KindUnset | Self::InvalidFilterName => {
                ErrorCategory::Usage
            }
            Self::FilterNotFound(_) => ErrorCategory::NotFound,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Re-tag a call error with a different operation.
    ///
    /// Transports only know the wire call (`add`, `has`); the filter handle
    /// and pipeline report the user-facing operation (`bulk`, `multi`).
    pub(crate) fn relabel(self, new_op: Operation) -> Self {
        match self {
            Self::Transport { filter, reason, .. } => Self::Transport { op: new_op, filter, reason },
            Self::Timeout { filter, after, .. } => Self::Timeout { op: new_op, filter, after },
            Self::Status { filter, status, message, .. } => Self::Status {
                op: new_op,
                filter,
                status,
                message,
            },
            Self::Malformed { filter, reason, .. } => Self::Malformed { op: new_op, filter, reason },
            Self::Unsupported { transport, .. } => Self::Unsupported { op: new_op, transport },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_filter() {
        let err = BloomgError::Status {
            op: Operation::Bulk,
            filter: Some("bad".to_string()),
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("bulk failed on bad"));
        assert!(text.contains("500"));
    }

    #[test]
    fn test_display_without_filter() {
        let err = BloomgError::Transport {
            op: Operation::List,
            filter: None,
            reason: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "list failed: connection refused");
    }

    #[test]
    fn test_accessors() {
        let err = BloomgError::Malformed {
            op: Operation::Has,
            filter: Some("f".to_string()),
            reason: "missing data".to_string(),
        };
        assert_eq!(err.filter(), Some("f"));
        assert_eq!(err.operation(), Some(Operation::Has));
        assert_eq!(err.category(), ErrorCategory::Malformed);

        assert_eq!(BloomgError::KindUnset.category(), ErrorCategory::Usage);
        assert_eq!(BloomgError::KindUnset.operation(), None);
    }

    #[test]
    fn test_relabel_keeps_filter() {
        let err = BloomgError::Timeout {
            op: Operation::Has,
            filter: Some("f".to_string()),
            after: Duration::from_secs(1),
        }
        .relabel(Operation::Multi);

        assert_eq!(err.operation(), Some(Operation::Multi));
        assert_eq!(err.filter(), Some("f"));
        assert_eq!(err.category(), ErrorCategory::Transport);
    }
}
