//! Command handlers
//!
//! `handle()` is the single entry point that turns a command into the events
//! it causes. It reads a `CommandContext` snapshot and never mutates
//! anything: the caller appends the returned events to the event store and
//! folds them back into its projections.
//!
//! Preconditions are checked in a fixed order (existence, then state, then
//! relational), so the same command against the same snapshot always fails
//! with the same error.
//!
//! ## Example
//!
//! ```
//! use contentgraph_core::commands::{Command, CreateContentStream};
//! use contentgraph_core::dimension::{ContentDimensionSource, InterDimensionalVariationGraph};
//! use contentgraph_core::handlers::{handle, CommandContext};
//! use contentgraph_core::model::{ContentStreamId, UserId};
//! use contentgraph_core::node_types::InMemoryNodeTypeSchema;
//! use contentgraph_core::projection::ProjectionState;
//!
//! let variation_graph = InterDimensionalVariationGraph::new(ContentDimensionSource::default()).unwrap();
//! let node_types = InMemoryNodeTypeSchema::default();
//! let projections = ProjectionState::new();
//! let ctx = CommandContext::new(&variation_graph, &node_types, &projections);
//!
//! let command = Command::CreateContentStream(CreateContentStream {
//!     content_stream_id: ContentStreamId::new("cs-1").unwrap(),
//!     initiating_user_id: UserId::system(),
//! });
//! let to_publish = handle(&command, &ctx).unwrap();
//! assert_eq!(to_publish.stream_name, "contentStream-cs-1");
//! assert_eq!(to_publish.events.len(), 1);
//! ```

mod content_stream;
mod dimension_space;
mod node_creation;
mod node_modification;
mod node_variation;

use crate::commands::Command;
use crate::dimension::{DimensionSpacePoint, InterDimensionalVariationGraph};
use crate::errors::{ContentGraphError, Result};
use crate::events::Event;
use crate::model::{ContentStreamId, NodeAggregateId, NodeTypeName};
use crate::node_types::{NodeType, NodeTypeSchema};
use crate::projection::{ContentGraph, NodeAggregate, ProjectionState};
use crate::stream::{content_stream_name, ExpectedVersion};

/// Read-only snapshot a command is validated against
#[derive(Clone, Copy)]
pub struct CommandContext<'a> {
    pub variation_graph: &'a InterDimensionalVariationGraph,
    pub node_types: &'a dyn NodeTypeSchema,
    pub projections: &'a ProjectionState,
}

/// Events a command produced, ready to be committed as one batch
#[derive(Debug, Clone, PartialEq)]
pub struct EventsToPublish {
    pub stream_name: String,
    pub events: Vec<Event>,
    pub expected_version: ExpectedVersion,
}

impl EventsToPublish {
    fn on_content_stream(id: &ContentStreamId, events: Vec<Event>, expected_version: ExpectedVersion) -> Self {
        Self {
            stream_name: content_stream_name(id),
            events,
            expected_version,
        }
    }
}

/// Validate a command against the snapshot and return the events it causes
///
/// # Errors
///
/// The first violated precondition as a `ContentGraphError`; nothing is
/// emitted in that case.
pub fn handle(command: &Command, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    command.validate()?;
    let to_publish = match command {
        Command::CreateContentStream(c) => content_stream::create(c, ctx)?,
        Command::ForkContentStream(c) => content_stream::fork(c, ctx)?,
        Command::RemoveContentStream(c) => content_stream::remove(c, ctx)?,
        Command::CreateRootNodeAggregateWithNode(c) => node_creation::create_root(c, ctx)?,
        Command::CreateNodeAggregateWithNode(c) => node_creation::create(c, ctx)?,
        Command::CreateNodeVariant(c) => node_variation::create_variant(c, ctx)?,
        Command::MoveDimensionSpacePoint(c) => dimension_space::move_point(c, ctx)?,
        Command::AddDimensionShineThrough(c) => dimension_space::add_shine_through(c, ctx)?,
        Command::DisableNodeAggregate(c) => node_modification::disable(c, ctx)?,
        Command::EnableNodeAggregate(c) => node_modification::enable(c, ctx)?,
        Command::SetSerializedNodeProperties(c) => node_modification::set_properties(c, ctx)?,
        Command::SetNodeReferences(c) => node_modification::set_references(c, ctx)?,
        Command::RemoveNodeAggregate(c) => node_modification::remove(c, ctx)?,
    };
    tracing::debug!(
        command = command.command_type(),
        stream_name = %to_publish.stream_name,
        event_count = to_publish.events.len(),
        "command handled"
    );
    Ok(to_publish)
}

impl<'a> CommandContext<'a> {
    pub fn new(
        variation_graph: &'a InterDimensionalVariationGraph,
        node_types: &'a dyn NodeTypeSchema,
        projections: &'a ProjectionState,
    ) -> Self {
        Self {
            variation_graph,
            node_types,
            projections,
        }
    }

    /// A content stream that accepts node commands, with its graph and version
    fn require_content_stream(&self, id: &ContentStreamId) -> Result<(&'a ContentGraph, u64)> {
        let record = self
            .projections
            .content_streams()
            .get(id)
            .filter(|r| !r.removed)
            .ok_or_else(|| ContentGraphError::ContentStreamDoesNotExistYet {
                content_stream_id: id.to_string(),
            })?;
        if let Some(reason) = self.projections.halted_reason(id) {
            return Err(ContentGraphError::ContentStreamIsHalted {
                content_stream_id: id.to_string(),
                reason: reason.to_string(),
            });
        }
        let graph = self
            .projections
            .graph(id)
            .ok_or_else(|| ContentGraphError::ContentStreamDoesNotExistYet {
                content_stream_id: id.to_string(),
            })?;
        Ok((graph, record.version))
    }

    fn require_allowed(&self, point: &DimensionSpacePoint) -> Result<()> {
        if self.variation_graph.is_allowed(point) {
            Ok(())
        } else {
            Err(ContentGraphError::DimensionSpacePointNotFound {
                dimension_space_point: point.to_json_string(),
            })
        }
    }

    fn require_node_type(&self, name: &NodeTypeName) -> Result<&'a NodeType> {
        self.node_types
            .node_type(name)
            .ok_or_else(|| ContentGraphError::NodeTypeNotFound {
                node_type_name: name.to_string(),
            })
    }
}

fn require_node_aggregate(graph: &ContentGraph, id: &NodeAggregateId) -> Result<NodeAggregate> {
    graph
        .node_aggregate(id)
        .ok_or_else(|| ContentGraphError::NodeAggregateCurrentlyDoesNotExist {
            content_stream_id: graph.content_stream_id().to_string(),
            node_aggregate_id: id.to_string(),
        })
}

fn require_absent(graph: &ContentGraph, id: &NodeAggregateId) -> Result<()> {
    if graph.aggregate_exists(id) {
        return Err(ContentGraphError::NodeAggregateCurrentlyExists {
            content_stream_id: graph.content_stream_id().to_string(),
            node_aggregate_id: id.to_string(),
        });
    }
    Ok(())
}

fn require_coverage(aggregate: &NodeAggregate, point: &DimensionSpacePoint) -> Result<()> {
    if !aggregate.covers(point) {
        return Err(ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
            dimension_space_point: point.to_json_string(),
        });
    }
    Ok(())
}

fn require_occupation(aggregate: &NodeAggregate, origin: &DimensionSpacePoint) -> Result<()> {
    if !aggregate.occupies(origin) {
        return Err(ContentGraphError::DimensionSpacePointIsNotYetOccupied {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
            dimension_space_point: origin.to_json_string(),
        });
    }
    Ok(())
}
