//! Error types for Deskbar core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core error type for Deskbar operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid height: {0}")]
    InvalidHeight(String),

    #[error("Invalid height range: {min} must be below {max}")]
    InvalidRange { min: u32, max: u32 },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),
}

/// Result type alias for Deskbar core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure classification for a controller invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The controller exceeded its time bound and was killed
    Timeout,
    /// The controller exited with a non-zero status
    ExecutionFailed,
    /// The controller output contained no recognizable height
    ParseFailed,
    /// The configured controller executable does not exist
    NotFound,
}

impl ErrorKind {
    /// Whether this failure blocks further commands until reconfiguration.
    #[must_use]
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Short machine-friendly name, used as the `outcome` log field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::ExecutionFailed => "execution_failed",
            Self::ParseFailed => "parse_failed",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Timeout => "controller timed out",
            Self::ExecutionFailed => "controller failed",
            Self::ParseFailed => "unreadable controller output",
            Self::NotFound => "controller missing",
        };
        f.write_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_not_found_is_fatal() {
        assert!(ErrorKind::NotFound.is_fatal());
        assert!(!ErrorKind::Timeout.is_fatal());
        assert!(!ErrorKind::ExecutionFailed.is_fatal());
        assert!(!ErrorKind::ParseFailed.is_fatal());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ExecutionFailed).unwrap();
        assert_eq!(json, "\"execution_failed\"");
        assert_eq!(ErrorKind::ExecutionFailed.as_str(), "execution_failed");
    }
}
