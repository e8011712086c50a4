//! Content repository: command → events → commit → catch-up
//!
//! ## Logging Ownership
//!
//! The repository owns lifecycle logging for every operation it exposes:
//! - `log_op_start!` at entry
//! - `log_op_end!` on success
//! - `log_op_error!` on failure
//!
//! Handlers, projections and the event stores only use `tracing::debug!()`.

use crate::catch_up::{StoreHistory, Watermark};
use crate::config::{CatchUpMode, RepositoryConfig};
use crate::workspace::{apply_workspace_command, WorkspaceCommand, WorkspaceCommandResult};
use contentgraph_core::commands::{Command, ForkContentStream};
use contentgraph_core::dimension::{DimensionSpacePoint, InterDimensionalVariationGraph};
use contentgraph_core::errors::{CgError, CgErrorKind, ContentGraphError};
use contentgraph_core::events::Event;
use contentgraph_core::handlers::{handle, CommandContext, EventsToPublish};
use contentgraph_core::model::{ContentStreamId, UserId};
use contentgraph_core::node_types::NodeTypeSchema;
use contentgraph_core::projection::{ContentGraph, ContentSubgraph, ProjectionState, VisibilityConstraints};
use contentgraph_core::rules::{check_all, IntegrityViolation};
use contentgraph_core::stream::{content_stream_name, ExpectedVersion};
use contentgraph_core::{log_op_end, log_op_error, log_op_start};
use contentgraph_store::{CommitResult, EventStore, NewEvent, Result};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Metadata key holding the command that caused a commit
pub const META_COMMAND: &str = "command";
/// Metadata key holding the acting user
pub const META_INITIATING_USER_ID: &str = "initiatingUserId";

pub struct ContentRepository {
    variation_graph: Arc<InterDimensionalVariationGraph>,
    node_types: Arc<dyn NodeTypeSchema>,
    event_store: Arc<dyn EventStore>,
    projections: RwLock<ProjectionState>,
    watermark: Watermark,
    catch_up_mode: CatchUpMode,
}

impl ContentRepository {
    /// Wire a repository and fold whatever the event store already holds
    ///
    /// # Errors
    ///
    /// Storage failures or undecodable events during the initial catch-up.
    pub fn new(
        variation_graph: InterDimensionalVariationGraph,
        node_types: Arc<dyn NodeTypeSchema>,
        event_store: Arc<dyn EventStore>,
        catch_up_mode: CatchUpMode,
    ) -> Result<Self> {
        let repository = Self {
            variation_graph: Arc::new(variation_graph),
            node_types,
            event_store,
            projections: RwLock::new(ProjectionState::new()),
            watermark: Watermark::new(),
            catch_up_mode,
        };
        repository.catch_up()?;
        Ok(repository)
    }

    /// Build the variation graph and open the event store from configuration
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for bad dimensions, `Persistence` when the
    /// event store cannot be opened.
    pub fn from_config(config: &RepositoryConfig, node_types: Arc<dyn NodeTypeSchema>) -> Result<Self> {
        let op = "open_repository";
        log_op_start!(op, catch_up_mode = ?config.catch_up);
        let start = Instant::now();

        let result = config
            .variation_graph()
            .and_then(|graph| Ok((graph, config.event_store.open()?)))
            .and_then(|(graph, store)| Self::new(graph, node_types, store, config.catch_up));

        match result {
            Ok(repository) => {
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    checkpoint = repository.checkpoint()
                );
                Ok(repository)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    pub fn variation_graph(&self) -> &Arc<InterDimensionalVariationGraph> {
        &self.variation_graph
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    pub fn catch_up_mode(&self) -> CatchUpMode {
        self.catch_up_mode
    }

    /// Sequence number of the last event folded into the projections
    pub fn checkpoint(&self) -> u64 {
        self.watermark.current()
    }

    /// Validate a command, commit its events and (in synchronous mode)
    /// fold them
    ///
    /// # Errors
    ///
    /// Command rejections from the handlers, `Concurrency` when the stream
    /// moved since the snapshot the command was checked against, storage
    /// failures.
    pub fn handle(&self, command: &Command) -> Result<CommitResult> {
        let op = "handle_command";
        log_op_start!(
            op,
            command = command.command_type(),
            content_stream_id = %command.content_stream_id()
        );
        let start = Instant::now();

        let result = self.handle_impl(command).map_err(|e| e.with_op(op));

        match result {
            Ok(committed) => {
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    sequence_number = committed.sequence_number,
                    version = committed.version
                );
                Ok(committed)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    fn handle_impl(&self, command: &Command) -> Result<CommitResult> {
        // other writers may share the store
        if self.catch_up_mode == CatchUpMode::Synchronous {
            self.catch_up()?;
        }
        let to_publish = self.decide(command)?;
        let committed = self.publish(to_publish, Some(command), command.initiating_user_id())?;
        if self.catch_up_mode == CatchUpMode::Synchronous {
            self.catch_up()?;
        }
        Ok(committed)
    }

    /// Run the handler against the current projections
    pub(crate) fn decide(&self, command: &Command) -> Result<EventsToPublish> {
        let to_publish = {
            let projections = self.read("decide")?;
            let ctx = CommandContext::new(&self.variation_graph, self.node_types.as_ref(), &projections);
            handle(command, &ctx)?
        };
        if let Command::ForkContentStream(fork) = command {
            self.require_current_fork_source(fork, &to_publish)?;
        }
        Ok(to_publish)
    }

    /// The fork commits on a fresh stream, so its expected version cannot
    /// catch a source that moved on since the last fold
    fn require_current_fork_source(&self, fork: &ForkContentStream, to_publish: &EventsToPublish) -> Result<()> {
        let captured = to_publish.events.iter().find_map(|event| match event {
            Event::ContentStreamWasForked(forked) => Some(forked.version_of_source_content_stream),
            _ => None,
        });
        let Some(captured) = captured else {
            return Ok(());
        };
        let stream_name = content_stream_name(&fork.source_content_stream_id);
        let actual = self.event_store.stream_version(&stream_name)?;
        if actual == Some(captured) {
            return Ok(());
        }
        tracing::debug!(stream_name = %stream_name, captured, ?actual, "fork source moved on");
        Err(CgError::from(ContentGraphError::ConcurrencyConflict {
            stream_name,
            expected: captured.to_string(),
            actual,
        })
        .with_op("decide"))
    }

    /// Commit handler output; the command is recorded on the first event
    pub(crate) fn publish(
        &self,
        to_publish: EventsToPublish,
        command: Option<&Command>,
        initiating_user_id: &UserId,
    ) -> Result<CommitResult> {
        let mut events = Vec::with_capacity(to_publish.events.len());
        for (index, event) in to_publish.events.iter().enumerate() {
            let mut metadata = serde_json::Map::new();
            metadata.insert(
                META_INITIATING_USER_ID.to_string(),
                serde_json::Value::String(initiating_user_id.as_str().to_string()),
            );
            if let (0, Some(command)) = (index, command) {
                let encoded = serde_json::to_value(command).map_err(|e| {
                    CgError::new(CgErrorKind::Serialization)
                        .with_op("publish")
                        .with_message(e.to_string())
                })?;
                metadata.insert(META_COMMAND.to_string(), encoded);
            }
            events.push(NewEvent::from_event(event, serde_json::Value::Object(metadata))?);
        }
        self.event_store
            .commit(&to_publish.stream_name, events, to_publish.expected_version)
    }

    /// Commit prepared events as they are
    pub(crate) fn commit(
        &self,
        stream_name: &str,
        events: Vec<NewEvent>,
        expected: ExpectedVersion,
    ) -> Result<CommitResult> {
        self.event_store.commit(stream_name, events, expected)
    }

    /// Fold every event committed since the checkpoint
    ///
    /// A fold failure halts its content stream and catch-up moves on; only
    /// storage failures and undecodable events stop it. Returns the new
    /// checkpoint.
    ///
    /// # Errors
    ///
    /// `Persistence`/`Timeout` from the store, `Serialization` for events
    /// that cannot be decoded.
    pub fn catch_up(&self) -> Result<u64> {
        let mut projections = self.write("catch_up")?;
        let folded = self.fold_pending(&mut projections)?;
        let checkpoint = projections.checkpoint();
        drop(projections);

        if folded > 0 {
            tracing::debug!(folded, checkpoint, "caught up");
        }
        self.watermark.advance(checkpoint);
        Ok(checkpoint)
    }

    /// Fold the events after the state's own checkpoint into it
    fn fold_pending(&self, projections: &mut ProjectionState) -> Result<usize> {
        let pending = self.event_store.read_all_after(projections.checkpoint())?;
        let history = StoreHistory {
            store: self.event_store.as_ref(),
        };
        for envelope in &pending {
            let recorded = envelope.to_recorded()?;
            if let Err(err) = projections.apply_recorded(&recorded, &history) {
                tracing::error!(
                    stream_name = %recorded.stream_name,
                    sequence_number = recorded.sequence_number,
                    error = %err,
                    "content stream halted"
                );
            }
        }
        Ok(pending.len())
    }

    /// Block until the projections include `sequence_number`
    ///
    /// # Errors
    ///
    /// `Timeout` when they do not within `timeout`.
    pub fn wait_for(&self, sequence_number: u64, timeout: Duration) -> Result<()> {
        self.watermark.wait_for(sequence_number, timeout)
    }

    /// Fold the whole log into fresh projections and swap them in
    ///
    /// Readers keep seeing the old state until the swap.
    ///
    /// # Errors
    ///
    /// As `catch_up`.
    pub fn rebuild_projections(&self) -> Result<u64> {
        let op = "rebuild_projections";
        log_op_start!(op);
        let start = Instant::now();

        let mut rebuilt = ProjectionState::new();
        let result = self
            .fold_pending(&mut rebuilt)
            .and_then(|_| self.write(op))
            .and_then(|mut projections| {
                // commits that landed while folding
                self.fold_pending(&mut rebuilt)?;
                *projections = rebuilt;
                let checkpoint = projections.checkpoint();
                drop(projections);
                self.watermark.advance(checkpoint);
                Ok(checkpoint)
            });

        match result {
            Ok(checkpoint) => {
                log_op_end!(op, duration_ms = start.elapsed().as_millis() as u64, checkpoint = checkpoint);
                Ok(checkpoint)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    /// Read access to every projection
    ///
    /// # Errors
    ///
    /// `Internal` when the projection lock is poisoned.
    pub fn with_projections<R>(&self, f: impl FnOnce(&ProjectionState) -> R) -> Result<R> {
        let projections = self.read("with_projections")?;
        Ok(f(&projections))
    }

    /// Read access to one content stream's graph
    ///
    /// # Errors
    ///
    /// `NotFound` when the stream has no graph (unknown or removed).
    pub fn with_content_graph<R>(&self, id: &ContentStreamId, f: impl FnOnce(&ContentGraph) -> R) -> Result<R> {
        let projections = self.read("with_content_graph")?;
        let graph = projections.graph(id).ok_or_else(|| {
            CgError::from(ContentGraphError::ContentStreamDoesNotExistYet {
                content_stream_id: id.to_string(),
            })
            .with_op("with_content_graph")
        })?;
        Ok(f(graph))
    }

    /// Query one dimension space point of a content stream
    ///
    /// # Errors
    ///
    /// As `with_content_graph`.
    pub fn with_subgraph<R>(
        &self,
        id: &ContentStreamId,
        point: DimensionSpacePoint,
        visibility: VisibilityConstraints,
        f: impl FnOnce(&ContentSubgraph<'_>) -> R,
    ) -> Result<R> {
        self.with_content_graph(id, |graph| f(&ContentSubgraph::new(graph, point, visibility)))
    }

    /// Run every integrity check over every content graph
    ///
    /// # Errors
    ///
    /// `Internal` when the projection lock is poisoned. Violations are
    /// returned, not raised.
    pub fn check_integrity(&self) -> Result<Vec<IntegrityViolation>> {
        let op = "check_integrity";
        log_op_start!(op);
        let start = Instant::now();

        let result = self.with_projections(|projections| {
            projections
                .graphs()
                .flat_map(check_all)
                .flat_map(|result| result.violations)
                .collect::<Vec<_>>()
        });

        match result {
            Ok(violations) => {
                for violation in &violations {
                    tracing::warn!(violation = %violation, "integrity violation");
                }
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    violation_count = violations.len()
                );
                Ok(violations)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    /// Create, publish, discard or rebase a workspace
    ///
    /// # Errors
    ///
    /// See `apply_workspace_command`.
    pub fn handle_workspace(&self, command: &WorkspaceCommand) -> Result<WorkspaceCommandResult> {
        apply_workspace_command(self, command)
    }

    /// Drop a stream whose events were deleted from the store
    pub(crate) fn forget_content_stream(&self, id: &ContentStreamId) -> Result<()> {
        self.write("forget_content_stream")?.forget(id);
        Ok(())
    }

    pub(crate) fn read(&self, op: &str) -> Result<RwLockReadGuard<'_, ProjectionState>> {
        self.projections.read().map_err(|_| poisoned(op))
    }

    fn write(&self, op: &str) -> Result<RwLockWriteGuard<'_, ProjectionState>> {
        self.projections.write().map_err(|_| poisoned(op))
    }
}

fn poisoned(op: &str) -> CgError {
    CgError::new(CgErrorKind::Internal)
        .with_op(op.to_string())
        .with_message("projection lock poisoned")
}
