//! Content graph store - event persistence on SQLite
//!
//! Provides:
//! - The `EventStore` trait with optimistic concurrency per stream
//! - An in-memory store and a SQLite store
//! - SQLite schema with a checksummed migrations framework

pub mod db;
pub mod errors;
pub mod event_store;
pub mod migrations;

// Re-export key types
pub use errors::Result;
pub use event_store::{CommitResult, EventEnvelope, EventStore, InMemoryEventStore, NewEvent, SqliteEventStore};
