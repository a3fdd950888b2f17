//! Desk height values and parsing of controller readings.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Readings outside this span (in millimetres) are not desk heights.
const PLAUSIBLE_MM: std::ops::RangeInclusive<u32> = 200..=3000;

/// Desk surface height, stored as whole millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Height(u32);

impl Height {
    /// Create a height from millimetres.
    #[must_use]
    pub const fn from_mm(mm: u32) -> Self {
        Self(mm)
    }

    /// Create a height from whole centimetres, saturating at the largest
    /// representable value.
    #[must_use]
    pub const fn from_cm(cm: u32) -> Self {
        Self(cm.saturating_mul(10))
    }

    /// Create a height from whole centimetres taken from untrusted input.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHeight`] if the value does not fit.
    pub fn try_from_cm(cm: u32) -> Result<Self> {
        cm.checked_mul(10).map(Self).ok_or_else(|| Error::InvalidHeight(format!("{cm}cm")))
    }

    /// Whether a controller could plausibly report this height.
    #[must_use]
    pub fn is_plausible(self) -> bool {
        PLAUSIBLE_MM.contains(&self.0)
    }

    /// Height in millimetres.
    #[must_use]
    pub const fn as_mm(self) -> u32 {
        self.0
    }

    /// Height in centimetres.
    #[must_use]
    pub fn as_cm(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    /// Height in metres.
    #[must_use]
    pub fn as_m(self) -> f64 {
        f64::from(self.0) / 1000.0
    }

    /// Render as a bare centimetre value for controller arguments.
    ///
    /// Whole centimetres print without a fraction (`100`), anything else
    /// with a single decimal (`100.5`).
    #[must_use]
    pub fn to_cm_arg(self) -> String {
        let (whole, tenth) = (self.0 / 10, self.0 % 10);
        if tenth == 0 { whole.to_string() } else { format!("{whole}.{tenth}") }
    }

    /// Extract the reported height from controller output.
    ///
    /// The last reading in the text wins, so progress lines printed while the
    /// desk moves are ignored in favour of the final one. A number followed by
    /// `mm`, `cm` or `m` (or the spelled-out forms) is read in that unit; a
    /// bare number is taken as centimetres. Numbers glued to any other suffix
    /// (`2.5s`) and values outside a plausible desk span are skipped.
    #[must_use]
    pub fn parse_reading(output: &str) -> Option<Self> {
        static READING: OnceLock<Option<Regex>> = OnceLock::new();
        let regex = READING
            .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)(\s*)([A-Za-z]*)").ok())
            .as_ref()?;

        regex
            .captures_iter(output)
            .filter_map(|caps| {
                let value: f64 = caps.get(1)?.as_str().parse().ok()?;
                let spaced = caps.get(2).is_some_and(|m| !m.as_str().is_empty());
                let suffix = caps.get(3).map_or("", |m| m.as_str());
                let mm_per_unit = match unit_scale(suffix) {
                    Some(scale) => scale,
                    None if suffix.is_empty() || spaced => 10.0,
                    None => return None,
                };
                Self::from_mm_f64(value * mm_per_unit).filter(|h| h.is_plausible())
            })
            .last()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn from_mm_f64(mm: f64) -> Option<Self> {
        let mm = mm.round();
        if !mm.is_finite() || mm <= 0.0 || mm > f64::from(u32::MAX) {
            return None;
        }
        Some(Self(mm as u32))
    }
}

/// Millimetres per unit for a recognised length suffix.
fn unit_scale(suffix: &str) -> Option<f64> {
    match suffix.to_ascii_lowercase().as_str() {
        "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Some(1.0),
        "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Some(10.0),
        "m" | "meter" | "meters" | "metre" | "metres" => Some(1000.0),
        _ => None,
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}cm", self.to_cm_arg())
    }
}

impl FromStr for Height {
    type Err = Error;

    /// Parse user input in centimetres, with an optional `cm` suffix.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let number = trimmed.strip_suffix("cm").unwrap_or(trimmed).trim();
        let cm: f64 = number.parse().map_err(|_| Error::InvalidHeight(s.to_string()))?;
        Self::from_mm_f64(cm * 10.0).ok_or_else(|| Error::InvalidHeight(s.to_string()))
    }
}

/// Inclusive bounds for requested desk heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightRange {
    min: Height,
    max: Height,
}

impl HeightRange {
    /// Create a range, rejecting empty or inverted bounds.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRange`] if `min` is not below `max`.
    pub fn new(min: Height, max: Height) -> Result<Self> {
        if min >= max {
            return Err(Error::InvalidRange { min: min.as_mm() / 10, max: max.as_mm() / 10 });
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> Height {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Height {
        self.max
    }

    /// Pin a requested height into the range.
    #[must_use]
    pub fn clamp(&self, height: Height) -> Height {
        height.clamp(self.min, self.max)
    }

    #[must_use]
    pub fn contains(&self, height: Height) -> bool {
        (self.min..=self.max).contains(&height)
    }
}

impl Default for HeightRange {
    /// The 0.5m to 2.5m span of the popover slider.
    fn default() -> Self {
        Self { min: Height::from_cm(50), max: Height::from_cm(250) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_display_whole_and_fractional_cm() {
        assert_eq!(Height::from_cm(100).to_string(), "100cm");
        assert_eq!(Height::from_mm(1005).to_string(), "100.5cm");
        assert_eq!(Height::from_mm(1005).to_cm_arg(), "100.5");
    }

    #[test]
    fn test_parse_reading_units() {
        assert_eq!(Height::parse_reading("100"), Some(Height::from_cm(100)));
        assert_eq!(Height::parse_reading("Height: 755mm"), Some(Height::from_mm(755)));
        assert_eq!(Height::parse_reading("1.54m"), Some(Height::from_cm(154)));
        assert_eq!(Height::parse_reading("Height: 1.015 meters"), Some(Height::from_mm(1015)));
        assert_eq!(Height::parse_reading("desk at 72.5 CM"), Some(Height::from_mm(725)));
    }

    #[test]
    fn test_parse_reading_takes_last_value() {
        let output = "Moving from 75cm\n  90cm\n  105cm\nFinal height: 120cm\n";
        assert_eq!(Height::parse_reading(output), Some(Height::from_cm(120)));
    }

    #[test]
    fn test_parse_reading_rejects_missing_or_zero() {
        assert_eq!(Height::parse_reading(""), None);
        assert_eq!(Height::parse_reading("Connection failed"), None);
        assert_eq!(Height::parse_reading("height: 0cm"), None);
    }

    #[test]
    fn test_parse_reading_skips_non_length_numbers() {
        assert_eq!(
            Height::parse_reading("Height: 100cm (took 2.5s)"),
            Some(Height::from_cm(100))
        );
        assert_eq!(Height::parse_reading("at 1.2m after 3.75sec"), Some(Height::from_cm(120)));
        assert_eq!(Height::parse_reading("Height: 98cm, done in 2500 ms"), Some(Height::from_cm(98)));
        assert_eq!(Height::parse_reading("elapsed 2.5s"), None);
    }

    #[test]
    fn test_parse_reading_rejects_implausible_values() {
        assert_eq!(Height::parse_reading("Height: 5mm"), None);
        assert_eq!(Height::parse_reading("Height: 12m"), None);
        assert_eq!(Height::parse_reading("Height: 4294967296cm"), None);
        assert_eq!(Height::parse_reading("Height: 110 cm"), Some(Height::from_cm(110)));
    }

    #[test]
    fn test_from_cm_never_overflows() {
        assert_eq!(Height::try_from_cm(120).unwrap(), Height::from_cm(120));
        assert_matches!(Height::try_from_cm(500_000_000), Err(Error::InvalidHeight(_)));
        assert_eq!(Height::from_cm(u32::MAX), Height::from_mm(u32::MAX));
    }

    #[test]
    fn test_from_str_user_input() {
        assert_eq!("100".parse::<Height>().unwrap(), Height::from_cm(100));
        assert_eq!(" 72.5cm ".parse::<Height>().unwrap(), Height::from_mm(725));
        assert_matches!("tall".parse::<Height>(), Err(Error::InvalidHeight(_)));
        assert_matches!("-5".parse::<Height>(), Err(Error::InvalidHeight(_)));
    }

    #[test]
    fn test_range_rejects_inverted_bounds() {
        assert_matches!(
            HeightRange::new(Height::from_cm(120), Height::from_cm(75)),
            Err(Error::InvalidRange { min: 120, max: 75 })
        );
    }

    #[test]
    fn test_default_range_matches_slider() {
        let range = HeightRange::default();
        assert_eq!(range.min(), Height::from_cm(50));
        assert_eq!(range.max(), Height::from_cm(250));
        assert_eq!(range.clamp(Height::from_cm(300)), Height::from_cm(250));
        assert_eq!(range.clamp(Height::from_cm(10)), Height::from_cm(50));
    }

    proptest! {
        #[test]
        fn prop_clamp_always_in_range(mm in 1u32..10_000) {
            let range = HeightRange::default();
            prop_assert!(range.contains(range.clamp(Height::from_mm(mm))));
        }

        #[test]
        fn prop_display_is_readable_back(mm in 200u32..=3_000) {
            let height = Height::from_mm(mm);
            prop_assert_eq!(Height::parse_reading(&height.to_string()), Some(height));
        }
    }
}
