//! ContentGraph Engine - orchestration layer
//!
//! Wires handlers, the event store and the projections together:
//! - `ContentRepository`: command → events → commit → catch-up
//! - Catch-up watermark and background worker for deferred catch-up
//! - Workspace commands (create, publish, discard, rebase)
//! - Content stream pruning
//! - TOML configuration

pub mod catch_up;
pub mod config;
pub mod pruner;
pub mod repository;
pub mod workspace;

pub use catch_up::{CatchUpWorker, Watermark};
pub use config::{CatchUpMode, EventStoreConfig, RepositoryConfig};
pub use pruner::ContentStreamPruner;
pub use repository::ContentRepository;
pub use workspace::{apply_workspace_command, WorkspaceCommand, WorkspaceCommandResult};
