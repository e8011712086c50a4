//! Event store client
//!
//! Streams are append-only sequences of events addressed by name. Every
//! event gets a per-stream version (from 0) and a global sequence number
//! (from 1). A commit appends a batch atomically, guarded by an
//! `ExpectedVersion`.

mod memory;
mod sqlite;

pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;

use crate::errors::{concurrency_conflict, from_serde, Result};
use chrono::{DateTime, Utc};
use contentgraph_core::errors::{CgError, CgErrorKind};
use contentgraph_core::events::Event;
use contentgraph_core::projection::RecordedEvent;
use contentgraph_core::stream::ExpectedVersion;

/// An event about to be committed
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub metadata: serde_json::Value,
}

impl NewEvent {
    /// Serialize a domain event with a fresh id
    ///
    /// # Errors
    ///
    /// `Serialization` when the event cannot be encoded.
    pub fn from_event(event: &Event, metadata: serde_json::Value) -> Result<Self> {
        let (event_type, payload) = event.to_stored()?;
        Ok(Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            event_type,
            payload,
            metadata,
        })
    }
}

/// A committed event as read back
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub sequence_number: u64,
    pub stream_name: String,
    pub version: u64,
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub metadata: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Decode into the domain event, upcasting legacy payloads
    ///
    /// # Errors
    ///
    /// `Serialization` for unknown event types or malformed payloads.
    pub fn to_recorded(&self) -> Result<RecordedEvent> {
        let event = Event::from_stored(&self.event_type, self.payload.clone())?;
        Ok(RecordedEvent {
            sequence_number: self.sequence_number,
            stream_name: self.stream_name.clone(),
            version: self.version,
            event,
            metadata: self.metadata.clone(),
        })
    }
}

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitResult {
    /// Version of the last committed event in its stream
    pub version: u64,
    /// Global sequence number of the last committed event
    pub sequence_number: u64,
}

/// Append-only event log
///
/// Implementations serialize commits: the version check and the append of a
/// batch happen under one lock or transaction.
pub trait EventStore: Send + Sync {
    /// Append `events` to `stream_name`
    ///
    /// # Errors
    ///
    /// `Concurrency` when the stream does not satisfy `expected`; nothing is
    /// appended then. `InvalidInput` for an empty batch. `Persistence` or
    /// `Timeout` for storage failures.
    fn commit(&self, stream_name: &str, events: Vec<NewEvent>, expected: ExpectedVersion) -> Result<CommitResult>;

    /// All events of a stream in version order
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn read_stream(&self, stream_name: &str) -> Result<Vec<EventEnvelope>>;

    /// Events of a stream up to and including `version`
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn read_stream_until(&self, stream_name: &str, version: u64) -> Result<Vec<EventEnvelope>>;

    /// Events of every stream after `sequence_number`, in global order
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn read_all_after(&self, sequence_number: u64) -> Result<Vec<EventEnvelope>>;

    /// Version of the stream's last event, `None` for an empty stream
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn stream_version(&self, stream_name: &str) -> Result<Option<u64>>;

    /// Physically delete a stream; returns the number of deleted events
    ///
    /// # Errors
    ///
    /// Storage failures.
    fn delete_stream(&self, stream_name: &str) -> Result<usize>;
}

/// Version check shared by the implementations
pub(crate) fn check_expected(stream_name: &str, expected: ExpectedVersion, current: Option<u64>) -> Result<()> {
    if expected.is_satisfied_by(current) {
        Ok(())
    } else {
        Err(concurrency_conflict(stream_name, expected, current))
    }
}

pub(crate) fn empty_batch(stream_name: &str) -> CgError {
    CgError::new(CgErrorKind::InvalidInput)
        .with_op("commit")
        .with_entity_id(stream_name)
        .with_message("cannot commit an empty batch")
}

pub(crate) fn encode(op: &str, value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value).map_err(|e| from_serde(op, e))
}

pub(crate) fn decode(op: &str, text: &str) -> Result<serde_json::Value> {
    serde_json::from_str(text).map_err(|e| from_serde(op, e))
}
