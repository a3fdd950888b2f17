//! Controller commands and their outcomes.
//!
//! A [`CommandKind`] is what the scheduler asks the controller to do; a
//! [`CommandResult`] is what came back from one invocation.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::height::Height;

/// A single controller operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "height")]
pub enum CommandKind {
    /// Drive the desk to the given height
    Move(Height),
    /// Read the current height
    QueryHeight,
}

impl CommandKind {
    #[must_use]
    pub fn is_move(&self) -> bool {
        matches!(self, Self::Move(_))
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move(target) => write!(f, "move to {target}"),
            Self::QueryHeight => f.write_str("query height"),
        }
    }
}

/// Outcome of one controller invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the invocation succeeded and reported a height
    pub success: bool,
    /// Height reported by the controller, if one could be read
    pub parsed_height: Option<Height>,
    /// Captured output, kept for diagnostics even on failure
    pub raw_output: String,
    /// Failure classification, `None` on success
    pub error_kind: Option<ErrorKind>,
    /// Wall-clock time the invocation took
    pub duration: Duration,
}

impl CommandResult {
    /// A successful invocation that reported `height`.
    #[must_use]
    pub fn succeeded(height: Height, raw_output: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: true,
            parsed_height: Some(height),
            raw_output: raw_output.into(),
            error_kind: None,
            duration,
        }
    }

    /// A failed invocation.
    #[must_use]
    pub fn failed(kind: ErrorKind, raw_output: impl Into<String>, duration: Duration) -> Self {
        Self {
            success: false,
            parsed_height: None,
            raw_output: raw_output.into(),
            error_kind: Some(kind),
            duration,
        }
    }

    /// Outcome label for logs: `ok` or the error kind.
    #[must_use]
    pub fn outcome(&self) -> &'static str {
        self.error_kind.map_or("ok", ErrorKind::as_str)
    }
}
