//! User gestures forwarded from a presentation layer.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::height::Height;

/// Preset height buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Sit,
    Stand,
}

/// A user action on the status item or its popover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiGesture {
    /// Slider released at a height
    SliderReleased(Height),
    /// Preset button clicked
    Preset(Preset),
    /// Explicit refresh of the displayed height
    Refresh,
    /// Quit the application
    Quit,
}

impl FromStr for UiGesture {
    type Err = Error;

    /// Parse a typed command: `sit`, `stand`, `move <cm>`, `refresh`, `quit`.
    fn from_str(s: &str) -> Result<Self> {
        let mut words = s.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let gesture = match verb.as_str() {
            "sit" => Self::Preset(Preset::Sit),
            "stand" => Self::Preset(Preset::Stand),
            "move" | "set" => {
                let value = words.next().ok_or_else(|| Error::InvalidHeight(String::new()))?;
                Self::SliderReleased(value.parse()?)
            }
            "refresh" => Self::Refresh,
            "quit" | "exit" => Self::Quit,
            _ => return Err(Error::UnknownCommand(s.trim().to_string())),
        };
        Ok(gesture)
    }
}
