//! Status-bar rendering of the desk state.

use serde::Serialize;

use crate::error::ErrorKind;
use crate::state::DeskState;

/// Shown in place of a height before the first successful reading.
pub const UNKNOWN_HEIGHT_GLYPH: &str = "📏";

/// Visual state of the status-bar item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "error")]
pub enum Indicator {
    /// Height is fresh
    Idle,
    /// A move is in flight
    Moving,
    /// The last command failed transiently
    Degraded(ErrorKind),
    /// The controller cannot be found; nothing will run until reconfigured
    Misconfigured,
}

/// Everything a presenter needs to draw the status item and its popover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Short status-bar title
    pub label: String,
    /// Popover headline
    pub detail: String,
    pub indicator: Indicator,
}

impl StatusView {
    #[must_use]
    pub fn from_state(state: &DeskState) -> Self {
        let indicator = match state.last_error {
            Some(ErrorKind::NotFound) => Indicator::Misconfigured,
            _ if state.is_moving => Indicator::Moving,
            Some(error) => Indicator::Degraded(error),
            None => Indicator::Idle,
        };

        let height = state
            .current_height
            .map_or_else(|| UNKNOWN_HEIGHT_GLYPH.to_string(), |h| h.to_string());
        let label = match indicator {
            Indicator::Idle => height,
            Indicator::Moving => format!("↕ {height}"),
            Indicator::Degraded(_) => format!("⚠ {height}"),
            Indicator::Misconfigured => format!("⛔ {}", ErrorKind::NotFound),
        };

        let reading = state
            .current_height
            .map_or_else(|| "Height: unknown".to_string(), |h| format!("Height: {:.2}m", h.as_m()));
        let detail = match (indicator, state.target) {
            (Indicator::Moving, Some(target)) => format!("{reading}, moving to {:.2}m", target.as_m()),
            (Indicator::Degraded(error), _) => format!("{reading} ({error})"),
            (Indicator::Misconfigured, _) => {
                "Desk controller not found, check the configured executable".to_string()
            }
            _ => reading,
        };

        Self { label, detail, indicator }
    }
}
