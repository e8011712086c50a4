use super::{check_expected, empty_batch, CommitResult, EventEnvelope, EventStore, NewEvent};
use crate::errors::{poisoned, Result};
use contentgraph_core::stream::ExpectedVersion;
use std::sync::{Mutex, MutexGuard};

/// Event store kept in process memory
///
/// Deleted streams leave gaps in the global sequence, like the SQLite store.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Log>,
}

#[derive(Debug, Default)]
struct Log {
    events: Vec<EventEnvelope>,
    last_sequence_number: u64,
}

impl Log {
    fn stream_version(&self, stream_name: &str) -> Option<u64> {
        self.events
            .iter()
            .filter(|e| e.stream_name == stream_name)
            .map(|e| e.version)
            .max()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, Log>> {
        self.inner.lock().map_err(|_| poisoned(op))
    }
}

impl EventStore for InMemoryEventStore {
    fn commit(&self, stream_name: &str, events: Vec<NewEvent>, expected: ExpectedVersion) -> Result<CommitResult> {
        if events.is_empty() {
            return Err(empty_batch(stream_name));
        }
        let mut log = self.lock("commit")?;
        let current = log.stream_version(stream_name);
        check_expected(stream_name, expected, current)?;

        let recorded_at = chrono::Utc::now();
        let mut version = current.map(|v| v + 1).unwrap_or(0);
        for event in events {
            log.last_sequence_number += 1;
            let sequence_number = log.last_sequence_number;
            log.events.push(EventEnvelope {
                sequence_number,
                stream_name: stream_name.to_string(),
                version,
                event_id: event.event_id,
                event_type: event.event_type,
                payload: event.payload,
                metadata: event.metadata,
                recorded_at,
            });
            version += 1;
        }
        Ok(CommitResult {
            version: version - 1,
            sequence_number: log.last_sequence_number,
        })
    }

    fn read_stream(&self, stream_name: &str) -> Result<Vec<EventEnvelope>> {
        let log = self.lock("read_stream")?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.stream_name == stream_name)
            .cloned()
            .collect())
    }

    fn read_stream_until(&self, stream_name: &str, version: u64) -> Result<Vec<EventEnvelope>> {
        let log = self.lock("read_stream_until")?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.stream_name == stream_name && e.version <= version)
            .cloned()
            .collect())
    }

    fn read_all_after(&self, sequence_number: u64) -> Result<Vec<EventEnvelope>> {
        let log = self.lock("read_all_after")?;
        Ok(log
            .events
            .iter()
            .filter(|e| e.sequence_number > sequence_number)
            .cloned()
            .collect())
    }

    fn stream_version(&self, stream_name: &str) -> Result<Option<u64>> {
        Ok(self.lock("stream_version")?.stream_version(stream_name))
    }

    fn delete_stream(&self, stream_name: &str) -> Result<usize> {
        let mut log = self.lock("delete_stream")?;
        let before = log.events.len();
        log.events.retain(|e| e.stream_name != stream_name);
        Ok(before - log.events.len())
    }
}
