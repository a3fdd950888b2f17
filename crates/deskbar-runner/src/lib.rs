//! Deskbar Runner - External desk controller invocation.
//!
//! The desk itself is driven by a separate command-line controller. This crate
//! wraps that executable behind the [`CommandRunner`] capability so the
//! scheduler can be exercised against a fake in tests.

pub mod args;
pub mod error;
pub mod runner;

pub use args::ControllerArgs;
pub use error::{RunnerError, RunnerResult};
pub use runner::{CommandRunner, ProcessRunner};

#[cfg(any(test, feature = "mock"))]
pub use runner::MockCommandRunner;
