//! Workspace commands
//!
//! A workspace names a content stream. Non-root workspaces work on a fork of
//! their base workspace's stream; publishing copies their node events back
//! onto the base, rebasing re-runs their recorded commands on a fresh fork.
//!
//! Each step is committed and folded before the next one is decided, so
//! these commands always catch up, whatever the repository's catch-up mode.

use crate::repository::{ContentRepository, META_COMMAND};
use contentgraph_core::commands::{Command, CreateContentStream, ForkContentStream};
use contentgraph_core::errors::{CgErrorKind, ContentGraphError};
use contentgraph_core::events::{
    Event, RootWorkspaceWasCreated, WorkspaceRebaseFailed, WorkspaceWasCreated, WorkspaceWasDiscarded,
    WorkspaceWasPublished, WorkspaceWasRebased,
};
use contentgraph_core::handlers::EventsToPublish;
use contentgraph_core::model::{ContentStreamId, UserId, WorkspaceName};
use contentgraph_core::projection::Workspace;
use contentgraph_core::stream::{content_stream_name, workspace_stream_name, ExpectedVersion};
use contentgraph_core::{log_op_end, log_op_error, log_op_start};
use contentgraph_store::{CommitResult, NewEvent, Result};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceCommand {
    CreateRootWorkspace {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    },
    CreateWorkspace {
        workspace_name: WorkspaceName,
        base_workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    },
    /// Copy the workspace's changes onto its base and start over on a fresh fork
    PublishWorkspace {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    },
    /// Drop the workspace's changes
    DiscardWorkspace {
        workspace_name: WorkspaceName,
        new_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    },
    /// Re-apply the workspace's changes on top of the base's current state
    RebaseWorkspace {
        workspace_name: WorkspaceName,
        rebased_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    },
}

impl WorkspaceCommand {
    pub fn command_type(&self) -> &'static str {
        match self {
            WorkspaceCommand::CreateRootWorkspace { .. } => "CreateRootWorkspace",
            WorkspaceCommand::CreateWorkspace { .. } => "CreateWorkspace",
            WorkspaceCommand::PublishWorkspace { .. } => "PublishWorkspace",
            WorkspaceCommand::DiscardWorkspace { .. } => "DiscardWorkspace",
            WorkspaceCommand::RebaseWorkspace { .. } => "RebaseWorkspace",
        }
    }

    pub fn workspace_name(&self) -> &WorkspaceName {
        match self {
            WorkspaceCommand::CreateRootWorkspace { workspace_name, .. }
            | WorkspaceCommand::CreateWorkspace { workspace_name, .. }
            | WorkspaceCommand::PublishWorkspace { workspace_name, .. }
            | WorkspaceCommand::DiscardWorkspace { workspace_name, .. }
            | WorkspaceCommand::RebaseWorkspace { workspace_name, .. } => workspace_name,
        }
    }
}

/// Outcome of a workspace command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceCommandResult {
    pub workspace_name: WorkspaceName,
    /// The workspace's content stream after the command
    pub content_stream_id: ContentStreamId,
    /// Sequence number of the recorded workspace event
    pub sequence_number: u64,
}

/// Apply a workspace command
///
/// # Errors
///
/// - `WorkspaceAlreadyExists`, `WorkspaceDoesNotExist`,
///   `BaseWorkspaceDoesNotExist`, `WorkspaceHasNoBaseWorkspace`
/// - `BaseWorkspaceHasBeenModifiedInTheMeantime` when publishing onto a base
///   that moved since the workspace forked
/// - `WorkspaceRebaseFailed` listing the commands that could not be
///   re-applied; the failed candidate stream is kept for inspection
/// - Rejections of the underlying content stream commands, storage failures
pub fn apply_workspace_command(
    repository: &ContentRepository,
    command: &WorkspaceCommand,
) -> Result<WorkspaceCommandResult> {
    let op = "workspace_command";
    log_op_start!(
        op,
        command = command.command_type(),
        workspace_name = %command.workspace_name()
    );
    let start = Instant::now();

    // decisions start from everything committed so far
    let result = repository.catch_up().and_then(|_| match command {
        WorkspaceCommand::CreateRootWorkspace {
            workspace_name,
            new_content_stream_id,
            initiating_user_id,
        } => create_root(repository, workspace_name, new_content_stream_id, initiating_user_id),
        WorkspaceCommand::CreateWorkspace {
            workspace_name,
            base_workspace_name,
            new_content_stream_id,
            initiating_user_id,
        } => create(
            repository,
            workspace_name,
            base_workspace_name,
            new_content_stream_id,
            initiating_user_id,
        ),
        WorkspaceCommand::PublishWorkspace {
            workspace_name,
            new_content_stream_id,
            initiating_user_id,
        } => publish(repository, workspace_name, new_content_stream_id, initiating_user_id),
        WorkspaceCommand::DiscardWorkspace {
            workspace_name,
            new_content_stream_id,
            initiating_user_id,
        } => discard(repository, workspace_name, new_content_stream_id, initiating_user_id),
        WorkspaceCommand::RebaseWorkspace {
            workspace_name,
            rebased_content_stream_id,
            initiating_user_id,
        } => rebase(repository, workspace_name, rebased_content_stream_id, initiating_user_id),
    })
    .map_err(|e| e.with_op(command.command_type()));

    match result {
        Ok(outcome) => {
            log_op_end!(
                op,
                duration_ms = start.elapsed().as_millis() as u64,
                content_stream_id = %outcome.content_stream_id,
                sequence_number = outcome.sequence_number
            );
            Ok(outcome)
        }
        Err(err) => {
            log_op_error!(op, err.clone(), duration_ms = start.elapsed().as_millis() as u64);
            Err(err)
        }
    }
}

fn create_root(
    repository: &ContentRepository,
    name: &WorkspaceName,
    new_content_stream_id: &ContentStreamId,
    user: &UserId,
) -> Result<WorkspaceCommandResult> {
    require_absent(repository, name)?;
    run(
        repository,
        Command::CreateContentStream(CreateContentStream {
            content_stream_id: new_content_stream_id.clone(),
            initiating_user_id: user.clone(),
        }),
    )?;
    let committed = record(
        repository,
        name,
        Event::RootWorkspaceWasCreated(RootWorkspaceWasCreated {
            workspace_name: name.clone(),
            new_content_stream_id: new_content_stream_id.clone(),
        }),
        ExpectedVersion::NoStream,
        user,
    )?;
    Ok(outcome(name, new_content_stream_id, committed))
}

fn create(
    repository: &ContentRepository,
    name: &WorkspaceName,
    base_name: &WorkspaceName,
    new_content_stream_id: &ContentStreamId,
    user: &UserId,
) -> Result<WorkspaceCommandResult> {
    require_absent(repository, name)?;
    let base = lookup(repository, base_name)?.ok_or_else(|| ContentGraphError::BaseWorkspaceDoesNotExist {
        workspace_name: name.to_string(),
        base_workspace_name: base_name.to_string(),
    })?;
    fork(repository, new_content_stream_id, &base.current_content_stream_id, user)?;
    let committed = record(
        repository,
        name,
        Event::WorkspaceWasCreated(WorkspaceWasCreated {
            workspace_name: name.clone(),
            base_workspace_name: base_name.clone(),
            new_content_stream_id: new_content_stream_id.clone(),
        }),
        ExpectedVersion::NoStream,
        user,
    )?;
    Ok(outcome(name, new_content_stream_id, committed))
}

fn publish(
    repository: &ContentRepository,
    name: &WorkspaceName,
    new_content_stream_id: &ContentStreamId,
    user: &UserId,
) -> Result<WorkspaceCommandResult> {
    let workspace = require(repository, name)?;
    let base = require_base(repository, &workspace)?;
    let source = workspace.current_content_stream_id.clone();
    let target = base.current_content_stream_id.clone();

    let (forked_from, fork_version, halted) = repository.with_projections(|p| {
        let record = p.content_streams().get(&source);
        (
            record.and_then(|r| r.source_content_stream_id.clone()),
            record.and_then(|r| r.source_content_stream_version).unwrap_or(0),
            p.halted_reason(&source).map(str::to_string),
        )
    })?;
    if let Some(reason) = halted {
        return Err(ContentGraphError::ContentStreamIsHalted {
            content_stream_id: source.to_string(),
            reason,
        }
        .into());
    }
    let base_modified = || ContentGraphError::BaseWorkspaceHasBeenModifiedInTheMeantime {
        workspace_name: name.to_string(),
        fork_version,
    };
    if forked_from.as_ref() != Some(&target) {
        return Err(base_modified().into());
    }

    let mut changes = Vec::new();
    for envelope in repository.event_store().read_stream(&content_stream_name(&source))? {
        let recorded = envelope.to_recorded()?;
        if !recorded.event.is_node_event() {
            continue;
        }
        if let Some(retargeted) = recorded.event.with_content_stream_id(&target) {
            changes.push(NewEvent::from_event(&retargeted, envelope.metadata.clone())?);
        }
    }
    let change_count = changes.len();
    if !changes.is_empty() {
        match repository.commit(&content_stream_name(&target), changes, ExpectedVersion::Exact(fork_version)) {
            Ok(_) => {}
            Err(err) if err.kind() == CgErrorKind::Concurrency => return Err(base_modified().into()),
            Err(err) => return Err(err),
        }
        repository.catch_up()?;
    }
    tracing::debug!(workspace_name = %name, change_count, "workspace changes copied to base");

    fork(repository, new_content_stream_id, &target, user)?;
    let committed = record(
        repository,
        name,
        Event::WorkspaceWasPublished(WorkspaceWasPublished {
            source_workspace_name: name.clone(),
            target_workspace_name: base.workspace_name.clone(),
            new_source_content_stream_id: new_content_stream_id.clone(),
            previous_source_content_stream_id: source,
        }),
        ExpectedVersion::StreamExists,
        user,
    )?;
    Ok(outcome(name, new_content_stream_id, committed))
}

fn discard(
    repository: &ContentRepository,
    name: &WorkspaceName,
    new_content_stream_id: &ContentStreamId,
    user: &UserId,
) -> Result<WorkspaceCommandResult> {
    let workspace = require(repository, name)?;
    let base = require_base(repository, &workspace)?;
    fork(repository, new_content_stream_id, &base.current_content_stream_id, user)?;
    let committed = record(
        repository,
        name,
        Event::WorkspaceWasDiscarded(WorkspaceWasDiscarded {
            workspace_name: name.clone(),
            new_content_stream_id: new_content_stream_id.clone(),
            previous_content_stream_id: workspace.current_content_stream_id,
        }),
        ExpectedVersion::StreamExists,
        user,
    )?;
    Ok(outcome(name, new_content_stream_id, committed))
}

fn rebase(
    repository: &ContentRepository,
    name: &WorkspaceName,
    rebased_content_stream_id: &ContentStreamId,
    user: &UserId,
) -> Result<WorkspaceCommandResult> {
    let workspace = require(repository, name)?;
    let base = require_base(repository, &workspace)?;
    let previous = workspace.current_content_stream_id.clone();
    fork(repository, rebased_content_stream_id, &base.current_content_stream_id, user)?;

    let mut failures = Vec::new();
    for envelope in repository.event_store().read_stream(&content_stream_name(&previous))? {
        let Some(encoded) = envelope.metadata.get(META_COMMAND) else {
            continue;
        };
        let command: Command = match serde_json::from_value(encoded.clone()) {
            Ok(command) => command,
            Err(e) => {
                failures.push(format!("command recorded at version {}: {}", envelope.version, e));
                continue;
            }
        };
        let Some(rebased) = command.with_content_stream_id(rebased_content_stream_id) else {
            continue;
        };
        if let Err(err) = run(repository, rebased) {
            failures.push(format!("{}: {}", command.command_type(), err.message()));
        }
    }

    if !failures.is_empty() {
        record(
            repository,
            name,
            Event::WorkspaceRebaseFailed(WorkspaceRebaseFailed {
                workspace_name: name.clone(),
                candidate_content_stream_id: rebased_content_stream_id.clone(),
                previous_content_stream_id: previous,
                failed_commands: failures.clone(),
            }),
            ExpectedVersion::StreamExists,
            user,
        )?;
        return Err(ContentGraphError::WorkspaceRebaseFailed {
            workspace_name: name.to_string(),
            failures,
        }
        .into());
    }

    let committed = record(
        repository,
        name,
        Event::WorkspaceWasRebased(WorkspaceWasRebased {
            workspace_name: name.clone(),
            new_content_stream_id: rebased_content_stream_id.clone(),
            previous_content_stream_id: previous,
        }),
        ExpectedVersion::StreamExists,
        user,
    )?;
    Ok(outcome(name, rebased_content_stream_id, committed))
}

fn lookup(repository: &ContentRepository, name: &WorkspaceName) -> Result<Option<Workspace>> {
    repository.with_projections(|p| p.workspace(name).cloned())
}

fn require(repository: &ContentRepository, name: &WorkspaceName) -> Result<Workspace> {
    Ok(lookup(repository, name)?.ok_or_else(|| ContentGraphError::WorkspaceDoesNotExist {
        workspace_name: name.to_string(),
    })?)
}

fn require_absent(repository: &ContentRepository, name: &WorkspaceName) -> Result<()> {
    if lookup(repository, name)?.is_some() {
        return Err(ContentGraphError::WorkspaceAlreadyExists {
            workspace_name: name.to_string(),
        }
        .into());
    }
    Ok(())
}

fn require_base(repository: &ContentRepository, workspace: &Workspace) -> Result<Workspace> {
    let base_name = workspace
        .base_workspace_name
        .as_ref()
        .ok_or_else(|| ContentGraphError::WorkspaceHasNoBaseWorkspace {
            workspace_name: workspace.workspace_name.to_string(),
        })?;
    Ok(lookup(repository, base_name)?.ok_or_else(|| ContentGraphError::BaseWorkspaceDoesNotExist {
        workspace_name: workspace.workspace_name.to_string(),
        base_workspace_name: base_name.to_string(),
    })?)
}

fn fork(
    repository: &ContentRepository,
    new_content_stream_id: &ContentStreamId,
    source: &ContentStreamId,
    user: &UserId,
) -> Result<CommitResult> {
    let command = ForkContentStream::new(new_content_stream_id.clone(), source.clone(), user.clone())?;
    run(repository, Command::ForkContentStream(command))
}

/// Decide, commit and fold a content stream command
fn run(repository: &ContentRepository, command: Command) -> Result<CommitResult> {
    let to_publish = repository.decide(&command)?;
    let committed = repository.publish(to_publish, Some(&command), command.initiating_user_id())?;
    repository.catch_up()?;
    Ok(committed)
}

/// Commit and fold a workspace event
fn record(
    repository: &ContentRepository,
    name: &WorkspaceName,
    event: Event,
    expected_version: ExpectedVersion,
    user: &UserId,
) -> Result<CommitResult> {
    let to_publish = EventsToPublish {
        stream_name: workspace_stream_name(name),
        events: vec![event],
        expected_version,
    };
    let committed = repository.publish(to_publish, None, user)?;
    repository.catch_up()?;
    Ok(committed)
}

fn outcome(name: &WorkspaceName, content_stream_id: &ContentStreamId, committed: CommitResult) -> WorkspaceCommandResult {
    WorkspaceCommandResult {
        workspace_name: name.clone(),
        content_stream_id: content_stream_id.clone(),
        sequence_number: committed.sequence_number,
    }
}
