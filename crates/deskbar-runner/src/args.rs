//! Argument templates for the controller executable.

use deskbar_core::{CommandKind, Height};
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};

/// Placeholder substituted with the target height in centimetres.
pub const HEIGHT_PLACEHOLDER: &str = "{height}";

/// How to phrase each command for the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerArgs {
    /// Arguments for a move, containing `{height}`
    pub move_args: Vec<String>,
    /// Arguments for a height query
    pub query_args: Vec<String>,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            move_args: vec!["--move-to".to_string(), HEIGHT_PLACEHOLDER.to_string()],
            query_args: vec!["--height".to_string()],
        }
    }
}

impl ControllerArgs {
    /// Check the move template can carry a target.
    ///
    /// # Errors
    /// Returns [`RunnerError::MissingPlaceholder`] if no move argument
    /// mentions `{height}`.
    pub fn validate(&self) -> RunnerResult<()> {
        if self.move_args.iter().any(|arg| arg.contains(HEIGHT_PLACEHOLDER)) {
            Ok(())
        } else {
            Err(RunnerError::MissingPlaceholder)
        }
    }

    /// Build the argument list for one command.
    #[must_use]
    pub fn for_kind(&self, kind: &CommandKind) -> Vec<String> {
        match kind {
            CommandKind::Move(target) => self.move_to(*target),
            CommandKind::QueryHeight => self.query_args.clone(),
        }
    }

    fn move_to(&self, target: Height) -> Vec<String> {
        let value = target.to_cm_arg();
        self.move_args.iter().map(|arg| arg.replace(HEIGHT_PLACEHOLDER, &value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_templates() {
        let args = ControllerArgs::default();
        assert_eq!(args.for_kind(&CommandKind::Move(Height::from_cm(100))), ["--move-to", "100"]);
        assert_eq!(args.for_kind(&CommandKind::QueryHeight), ["--height"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_placeholder_inside_argument() {
        let args = ControllerArgs {
            move_args: vec!["move".into(), "--target={height}cm".into()],
            query_args: vec!["status".into()],
        };
        assert_eq!(
            args.for_kind(&CommandKind::Move(Height::from_mm(725))),
            ["move", "--target=72.5cm"]
        );
    }

    #[test]
    fn test_missing_placeholder_rejected() {
        let args = ControllerArgs { move_args: vec!["--up".into()], query_args: vec![] };
        assert_matches!(args.validate(), Err(RunnerError::MissingPlaceholder));
    }
}
