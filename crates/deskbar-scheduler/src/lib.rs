//! Deskbar Scheduler - Command serialization, debouncing and status polling.
//!
//! The [`serializer`] owns the one-command-in-flight rule for the desk
//! controller; the [`poller`] keeps the displayed height fresh by feeding
//! periodic queries into it.

pub mod poller;
pub mod serializer;

#[cfg(test)]
mod testing;

pub use poller::{PollerHandle, spawn_poller};
pub use serializer::{CommandRequest, Phase, SerializerHandle, SerializerSettings, spawn_serializer};
