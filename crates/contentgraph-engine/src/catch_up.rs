//! Catch-up plumbing: the position watermark callers block on, replay access
//! to the event store, and the background worker for deferred catch-up

use crate::repository::ContentRepository;
use contentgraph_core::errors::{CgError, CgErrorKind, ContentGraphError};
use contentgraph_core::events::Event;
use contentgraph_core::model::ContentStreamId;
use contentgraph_core::projection::EventHistory;
use contentgraph_core::stream::content_stream_name;
use contentgraph_store::{EventStore, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Highest sequence number folded into the projections
///
/// Only moves forward. Waiters wake on every advance.
#[derive(Debug, Default)]
pub struct Watermark {
    position: Mutex<u64>,
    advanced: Condvar,
}

impl Watermark {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.position.lock().map(|p| *p).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    pub(crate) fn advance(&self, to: u64) {
        let mut position = match self.position.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if to > *position {
            *position = to;
            self.advanced.notify_all();
        }
    }

    /// Block until `sequence_number` has been folded
    ///
    /// # Errors
    ///
    /// `Timeout` when the watermark is still below after `timeout`.
    pub fn wait_for(&self, sequence_number: u64, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        let mut position = self.position.lock().map_err(|_| poisoned_watermark())?;
        while *position < sequence_number {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(CgError::new(CgErrorKind::Timeout)
                    .with_op("wait_for")
                    .with_message(format!(
                        "projections at {} after {:?}, waiting for {}",
                        *position, timeout, sequence_number
                    )));
            }
            let (guard, _) = self
                .advanced
                .wait_timeout(position, remaining)
                .map_err(|_| poisoned_watermark())?;
            position = guard;
        }
        Ok(())
    }
}

fn poisoned_watermark() -> CgError {
    CgError::new(CgErrorKind::Internal)
        .with_op("wait_for")
        .with_message("watermark lock poisoned")
}

/// Replays fork sources straight from the event store
pub(crate) struct StoreHistory<'a> {
    pub(crate) store: &'a dyn EventStore,
}

impl EventHistory for StoreHistory<'_> {
    fn content_stream_events_until(
        &self,
        id: &ContentStreamId,
        version: u64,
    ) -> contentgraph_core::errors::Result<Vec<Event>> {
        let envelopes = self
            .store
            .read_stream_until(&content_stream_name(id), version)
            .map_err(into_domain)?;
        envelopes
            .iter()
            .map(|envelope| envelope.to_recorded().map(|r| r.event).map_err(into_domain))
            .collect()
    }
}

fn into_domain(err: CgError) -> ContentGraphError {
    err.domain_error().cloned().unwrap_or_else(|| ContentGraphError::Internal {
        message: err.to_string(),
    })
}

/// Background thread running `catch_up` for a repository in deferred mode
pub struct CatchUpWorker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CatchUpWorker {
    /// Start polling the event store every `poll_interval`
    pub fn spawn(repository: Arc<ContentRepository>, poll_interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                if let Err(err) = repository.catch_up() {
                    tracing::warn!(error = %err, "background catch-up failed");
                }
                std::thread::sleep(poll_interval);
            }
        });
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Stop polling and wait for the thread to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("catch-up worker panicked");
            }
        }
    }
}

impl Drop for CatchUpWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
