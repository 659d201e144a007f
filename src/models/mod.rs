//! Data models for the challenge hub.
//!
//! Field names serialize in camelCase to match the dashboard's interfaces.

mod entry;
mod hub;
mod metadata;
mod snapshot;

pub use entry::*;
pub use hub::*;
pub use metadata::*;
pub use snapshot::*;
