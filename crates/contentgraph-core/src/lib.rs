//! ContentGraph Core - multi-dimensional content graph kernel
//!
//! This crate holds everything that can be decided without I/O:
//! - Dimension model, dimension space points and the inter-dimensional variation graph
//! - Validated ids, value objects, events (with the legacy upcaster) and commands
//! - Command handlers turning a command plus a read snapshot into events
//! - Projections folding events into per-content-stream graphs, plus the
//!   content stream and workspace projections
//! - Invariant checks over a folded graph
//! - The canonical error facility and the logging facility
//!
//! Persistence lives in `contentgraph-store`, orchestration in
//! `contentgraph-engine`.

pub mod commands;
pub mod dimension;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod logging_facility;
pub mod model;
pub mod node_types;
pub mod projection;
pub mod rules;
pub mod stream;

// Re-export commonly used types
pub use commands::Command;
pub use dimension::{DimensionSpacePoint, DimensionSpacePointSet, InterDimensionalVariationGraph, OriginDimensionSpacePoint};
pub use errors::{CgError, CgErrorKind, ContentGraphError, Result};
pub use events::Event;
pub use handlers::{handle, CommandContext, EventsToPublish};
pub use node_types::{InMemoryNodeTypeSchema, NodeTypeSchema};
pub use projection::{ContentGraph, ProjectionState, RecordedEvent};
pub use stream::ExpectedVersion;
