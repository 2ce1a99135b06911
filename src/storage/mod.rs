//! Storage module - Chain state and snapshot persistence

pub mod db;
mod snapshot;
mod state;

pub use db::{JsonFileStore, SledStore, SnapshotStore, StoreError};
pub use snapshot::*;
pub use state::*;
