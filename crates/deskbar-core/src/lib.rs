//! Deskbar Core - Desk height model, state tracking and status presentation.
//!
//! This crate contains the domain types shared by the command runner, the
//! scheduler and the presentation layer. It has no async runtime dependency.

pub mod command;
pub mod error;
pub mod gesture;
pub mod height;
pub mod state;
pub mod tracker;
pub mod view;

pub use command::{CommandKind, CommandResult};
pub use error::{Error, ErrorKind, Result};
pub use gesture::{Preset, UiGesture};
pub use height::{Height, HeightRange};
pub use state::DeskState;
pub use tracker::{HeightTracker, Subscription};
pub use view::{Indicator, StatusView};
