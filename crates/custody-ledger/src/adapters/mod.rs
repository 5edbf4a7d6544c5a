//! # Adapters Layer
//!
//! Implementations of the outbound ports plus snapshot import/export.

pub mod event_feed;
pub mod snapshot;

pub use event_feed::InMemoryEventFeed;
pub use snapshot::{LedgerSnapshot, ProductSnapshot, SnapshotError, SNAPSHOT_VERSION};
