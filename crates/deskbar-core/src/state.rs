//! Shared desk state record.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;
use crate::height::Height;

/// Last known state of the desk.
///
/// Only [`HeightTracker`](crate::HeightTracker) produces new values of this
/// record; everything else reads snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeskState {
    /// Last height reported by the controller
    pub current_height: Option<Height>,
    /// Target of the move in flight
    pub target: Option<Height>,
    /// Whether a move command is currently executing
    pub is_moving: bool,
    /// Failure of the most recent command, cleared by the next success
    pub last_error: Option<ErrorKind>,
    /// Time of the last mutation
    pub last_updated: SystemTime,
}

impl DeskState {
    /// Whether the displayed height may not reflect the desk right now.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.is_moving || self.last_error.is_some() || self.current_height.is_none()
    }
}

impl Default for DeskState {
    fn default() -> Self {
        Self {
            current_height: None,
            target: None,
            is_moving: false,
            last_error: None,
            last_updated: SystemTime::now(),
        }
    }
}
