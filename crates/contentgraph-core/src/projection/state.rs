//! Read side of the repository: every projection plus the catch-up checkpoint
//!
//! `ProjectionState` is folded from recorded events in global sequence order.
//! It is a plain value; the engine keeps one behind a lock and hands clones
//! out as command snapshots.
//!
//! ## Halting
//!
//! When an event cannot be folded into its content stream's graph, the graph
//! keeps the state from before that event, the stream is marked halted with
//! the failure, and later node events for it are not folded. The checkpoint
//! still advances so other streams keep catching up. Commands to a halted
//! stream are rejected by the handlers.

use super::apply::apply;
use super::content_stream::{ContentStreamProjection, ContentStreamState};
use super::graph::ContentGraph;
use super::workspace::{Workspace, WorkspaceProjection};
use crate::errors::{ContentGraphError, Result};
use crate::events::Event;
use crate::model::{ContentStreamId, WorkspaceName};
use crate::stream::content_stream_name;
use std::collections::{BTreeMap, BTreeSet};

/// An event as read back from the event store
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Global position, starting at 1
    pub sequence_number: u64,
    pub stream_name: String,
    /// Position in its stream, starting at 0
    pub version: u64,
    pub event: Event,
    pub metadata: serde_json::Value,
}

/// Access to past events, used to replay a fork source
pub trait EventHistory {
    /// Events of a content stream up to and including `version`, in order
    ///
    /// # Errors
    ///
    /// Whatever reading the underlying log fails with.
    fn content_stream_events_until(&self, id: &ContentStreamId, version: u64) -> Result<Vec<Event>>;
}

impl EventHistory for Vec<RecordedEvent> {
    fn content_stream_events_until(&self, id: &ContentStreamId, version: u64) -> Result<Vec<Event>> {
        let stream_name = content_stream_name(id);
        let mut events: Vec<&RecordedEvent> = self
            .iter()
            .filter(|r| r.stream_name == stream_name && r.version <= version)
            .collect();
        events.sort_by_key(|r| r.version);
        Ok(events.into_iter().map(|r| r.event.clone()).collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectionState {
    content_streams: ContentStreamProjection,
    workspaces: WorkspaceProjection,
    graphs: BTreeMap<ContentStreamId, ContentGraph>,
    halted: BTreeMap<ContentStreamId, String>,
    checkpoint: u64,
}

impl ProjectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_streams(&self) -> &ContentStreamProjection {
        &self.content_streams
    }

    pub fn workspaces(&self) -> &WorkspaceProjection {
        &self.workspaces
    }

    pub fn workspace(&self, name: &WorkspaceName) -> Option<&Workspace> {
        self.workspaces.get(name)
    }

    pub fn graph(&self, id: &ContentStreamId) -> Option<&ContentGraph> {
        self.graphs.get(id)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &ContentGraph> {
        self.graphs.values()
    }

    /// Version of the last event folded for the stream
    pub fn content_stream_version(&self, id: &ContentStreamId) -> Option<u64> {
        self.content_streams.get(id).map(|r| r.version)
    }

    pub fn halted_reason(&self, id: &ContentStreamId) -> Option<&str> {
        self.halted.get(id).map(String::as_str)
    }

    pub fn halted(&self) -> &BTreeMap<ContentStreamId, String> {
        &self.halted
    }

    /// Sequence number of the last event folded
    pub fn checkpoint(&self) -> u64 {
        self.checkpoint
    }

    /// Fold one recorded event
    ///
    /// Events at or below the checkpoint are ignored, so re-delivering a
    /// batch is harmless.
    ///
    /// # Errors
    ///
    /// The fold failure of the event's content stream. The state stays
    /// consistent: the stream is halted and the checkpoint has advanced.
    pub fn apply_recorded(&mut self, recorded: &RecordedEvent, history: &dyn EventHistory) -> Result<()> {
        if recorded.sequence_number <= self.checkpoint {
            return Ok(());
        }
        let outcome = self.fold(recorded, history);
        self.checkpoint = recorded.sequence_number;
        outcome
    }

    /// Drop everything known about a stream whose events are gone
    pub fn forget(&mut self, id: &ContentStreamId) {
        self.content_streams.forget(id);
        self.graphs.remove(id);
        self.halted.remove(id);
    }

    fn fold(&mut self, recorded: &RecordedEvent, history: &dyn EventHistory) -> Result<()> {
        let version = recorded.version;
        match &recorded.event {
            Event::ContentStreamWasCreated(e) => {
                self.content_streams.created(&e.content_stream_id, version);
                self.graphs
                    .insert(e.content_stream_id.clone(), ContentGraph::new(e.content_stream_id.clone()));
                Ok(())
            }
            Event::ContentStreamWasForked(e) => {
                self.content_streams.forked(
                    &e.new_content_stream_id,
                    &e.source_content_stream_id,
                    e.version_of_source_content_stream,
                    version,
                );
                let replayed = replay(
                    &e.source_content_stream_id,
                    e.version_of_source_content_stream,
                    history,
                    &mut BTreeSet::new(),
                )
                .map_err(|err| ContentGraphError::ForkSourceUnavailable {
                    content_stream_id: e.new_content_stream_id.to_string(),
                    source_content_stream_id: e.source_content_stream_id.to_string(),
                    reason: err.to_string(),
                });
                match replayed {
                    Ok(graph) => {
                        self.graphs.insert(
                            e.new_content_stream_id.clone(),
                            graph.rekeyed(e.new_content_stream_id.clone()),
                        );
                        Ok(())
                    }
                    Err(err) => {
                        self.halt(&e.new_content_stream_id, &err);
                        Err(err)
                    }
                }
            }
            Event::ContentStreamWasRemoved(e) => {
                self.content_streams.advance(&e.content_stream_id, version);
                self.content_streams.removed(&e.content_stream_id);
                self.graphs.remove(&e.content_stream_id);
                Ok(())
            }
            Event::RootWorkspaceWasCreated(e) => {
                self.workspaces.insert(Workspace {
                    workspace_name: e.workspace_name.clone(),
                    base_workspace_name: None,
                    current_content_stream_id: e.new_content_stream_id.clone(),
                });
                self.content_streams
                    .set_state(&e.new_content_stream_id, ContentStreamState::InUseByWorkspace);
                Ok(())
            }
            Event::WorkspaceWasCreated(e) => {
                self.workspaces.insert(Workspace {
                    workspace_name: e.workspace_name.clone(),
                    base_workspace_name: Some(e.base_workspace_name.clone()),
                    current_content_stream_id: e.new_content_stream_id.clone(),
                });
                self.content_streams
                    .set_state(&e.new_content_stream_id, ContentStreamState::InUseByWorkspace);
                Ok(())
            }
            Event::WorkspaceWasDiscarded(e) => {
                self.switch(&e.workspace_name, &e.new_content_stream_id, &e.previous_content_stream_id);
                Ok(())
            }
            Event::WorkspaceWasPublished(e) => {
                self.switch(
                    &e.source_workspace_name,
                    &e.new_source_content_stream_id,
                    &e.previous_source_content_stream_id,
                );
                Ok(())
            }
            Event::WorkspaceWasRebased(e) => {
                self.switch(&e.workspace_name, &e.new_content_stream_id, &e.previous_content_stream_id);
                Ok(())
            }
            Event::WorkspaceRebaseFailed(e) => {
                self.content_streams
                    .set_state(&e.candidate_content_stream_id, ContentStreamState::RebaseError);
                Ok(())
            }
            event => {
                let Some(id) = event.content_stream_id() else {
                    return Ok(());
                };
                let id = id.clone();
                self.content_streams.advance(&id, version);
                self.fold_node_event(&id, event)
            }
        }
    }

    fn fold_node_event(&mut self, id: &ContentStreamId, event: &Event) -> Result<()> {
        if self.halted.contains_key(id) {
            tracing::debug!(
                content_stream_id = %id,
                event_type = event.event_type(),
                "content stream halted, event not folded"
            );
            return Ok(());
        }
        let Some(graph) = self.graphs.get(id) else {
            let err = ContentGraphError::ProjectionIntegrityViolation {
                content_stream_id: id.to_string(),
                reason: format!("{} for a content stream without graph", event.event_type()),
            };
            self.halt(id, &err);
            return Err(err);
        };
        match apply(graph.clone(), event) {
            Ok(next) => {
                self.graphs.insert(id.clone(), next);
                Ok(())
            }
            Err(err) => {
                self.halt(id, &err);
                Err(err)
            }
        }
    }

    fn switch(&mut self, workspace: &WorkspaceName, new: &ContentStreamId, previous: &ContentStreamId) {
        self.workspaces.switch_content_stream(workspace, new);
        self.content_streams
            .set_state(new, ContentStreamState::InUseByWorkspace);
        self.content_streams
            .set_state(previous, ContentStreamState::NoLongerInUse);
    }

    fn halt(&mut self, id: &ContentStreamId, err: &ContentGraphError) {
        tracing::debug!(content_stream_id = %id, error = %err, "content stream halted");
        self.halted.insert(id.clone(), err.to_string());
    }
}

/// Rebuild a stream's graph as of `version` from its own events, recursing
/// through forks
fn replay(
    id: &ContentStreamId,
    version: u64,
    history: &dyn EventHistory,
    visiting: &mut BTreeSet<ContentStreamId>,
) -> Result<ContentGraph> {
    let unavailable = |reason: String| ContentGraphError::ProjectionIntegrityViolation {
        content_stream_id: id.to_string(),
        reason,
    };
    if !visiting.insert(id.clone()) {
        return Err(unavailable(format!("fork cycle through {}", id)));
    }
    let events = history.content_stream_events_until(id, version)?;
    let mut events = events.iter();
    let mut graph = match events.next() {
        Some(Event::ContentStreamWasCreated(_)) => ContentGraph::new(id.clone()),
        Some(Event::ContentStreamWasForked(e)) => replay(
            &e.source_content_stream_id,
            e.version_of_source_content_stream,
            history,
            visiting,
        )?
        .rekeyed(id.clone()),
        Some(other) => {
            return Err(unavailable(format!(
                "stream starts with {} instead of its creation",
                other.event_type()
            )))
        }
        None => return Err(unavailable("no events recorded".to_string())),
    };
    for event in events {
        if let Event::ContentStreamWasRemoved(_) = event {
            return Err(unavailable("stream was removed before the fork point".to_string()));
        }
        graph = apply(graph, event)?;
    }
    Ok(graph)
}
