//! Content stream pruning
//!
//! Two phases. `prune` marks streams nobody uses any more as removed; their
//! events stay, so the step can be inspected and other forks can still be
//! replayed. `prune_removed_from_event_store` then deletes the events of
//! removed streams that no remaining stream depends on. That second step
//! cannot be undone.

use crate::repository::ContentRepository;
use contentgraph_core::commands::{Command, RemoveContentStream};
use contentgraph_core::model::{ContentStreamId, UserId};
use contentgraph_core::projection::ProjectionState;
use contentgraph_core::stream::content_stream_name;
use contentgraph_core::{log_op_end, log_op_error, log_op_start};
use contentgraph_store::Result;
use std::collections::BTreeSet;
use std::time::Instant;

pub struct ContentStreamPruner<'a> {
    repository: &'a ContentRepository,
}

impl<'a> ContentStreamPruner<'a> {
    pub fn new(repository: &'a ContentRepository) -> Self {
        Self { repository }
    }

    /// Streams that are not removed, not a workspace's current stream and
    /// not a fork ancestor of one
    ///
    /// # Errors
    ///
    /// `Internal` when the projection lock is poisoned.
    pub fn find_unused_content_streams(&self) -> Result<Vec<ContentStreamId>> {
        self.repository.with_projections(unused_content_streams)
    }

    /// Remove every unused stream; returns the removed ids
    ///
    /// # Errors
    ///
    /// The first failing `RemoveContentStream`. Streams removed before it
    /// stay removed.
    pub fn prune(&self) -> Result<Vec<ContentStreamId>> {
        let op = "prune_content_streams";
        log_op_start!(op);
        let start = Instant::now();

        let result = self.prune_impl();

        match result {
            Ok(removed) => {
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    removed_count = removed.len()
                );
                Ok(removed)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    fn prune_impl(&self) -> Result<Vec<ContentStreamId>> {
        let unused = self.find_unused_content_streams()?;
        for id in &unused {
            self.repository.handle(&Command::RemoveContentStream(RemoveContentStream {
                content_stream_id: id.clone(),
                initiating_user_id: UserId::system(),
            }))?;
            tracing::debug!(content_stream_id = %id, "content stream pruned");
        }
        self.repository.catch_up()?;
        Ok(unused)
    }

    /// Delete the events of removed streams whose fork dependents are all
    /// removed as well, then forget them in the projections
    ///
    /// # Errors
    ///
    /// Storage failures. Streams deleted before the failure stay deleted.
    pub fn prune_removed_from_event_store(&self) -> Result<Vec<ContentStreamId>> {
        let op = "prune_removed_content_streams";
        log_op_start!(op);
        let start = Instant::now();

        let result = self.prune_removed_impl();

        match result {
            Ok(deleted) => {
                log_op_end!(
                    op,
                    duration_ms = start.elapsed().as_millis() as u64,
                    deleted_count = deleted.len()
                );
                Ok(deleted)
            }
            Err(err) => {
                log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
                Err(err)
            }
        }
    }

    fn prune_removed_impl(&self) -> Result<Vec<ContentStreamId>> {
        self.repository.catch_up()?;
        let deletable = self.repository.with_projections(deletable_content_streams)?;
        for id in &deletable {
            let deleted = self
                .repository
                .event_store()
                .delete_stream(&content_stream_name(id))?;
            self.repository.forget_content_stream(id)?;
            tracing::debug!(content_stream_id = %id, deleted, "content stream events deleted");
        }
        Ok(deletable)
    }
}

fn unused_content_streams(projections: &ProjectionState) -> Vec<ContentStreamId> {
    let streams = projections.content_streams();
    let mut in_use = BTreeSet::new();
    for workspace in projections.workspaces().iter() {
        let mut current = Some(workspace.current_content_stream_id.clone());
        while let Some(id) = current {
            if !in_use.insert(id.clone()) {
                break;
            }
            current = streams.get(&id).and_then(|r| r.source_content_stream_id.clone());
        }
    }
    streams
        .iter()
        .filter(|r| !r.removed && !in_use.contains(&r.content_stream_id))
        .map(|r| r.content_stream_id.clone())
        .collect()
}

fn deletable_content_streams(projections: &ProjectionState) -> Vec<ContentStreamId> {
    let streams = projections.content_streams();
    let mut deletable = Vec::new();
    for record in streams.iter().filter(|r| r.removed) {
        let mut pending = vec![record.content_stream_id.clone()];
        let mut seen = BTreeSet::new();
        let mut all_removed = true;
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            for dependent in streams.forks_of(&id) {
                if !dependent.removed {
                    all_removed = false;
                }
                pending.push(dependent.content_stream_id.clone());
            }
        }
        if all_removed {
            deletable.push(record.content_stream_id.clone());
        }
    }
    deletable
}
