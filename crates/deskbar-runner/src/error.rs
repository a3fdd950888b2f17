//! Runner error types.

use thiserror::Error;

/// Runner configuration error type.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Move arguments must contain the {{height}} placeholder")]
    MissingPlaceholder,

    #[error("Controller executable not found: {0}")]
    ExecutableNotFound(String),
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
