use super::{CommandContext, EventsToPublish};
use crate::commands::DimensionSpacePointAdjustment;
use crate::dimension::VariantType;
use crate::errors::{ContentGraphError, Result};
use crate::events::{DimensionShineThroughWasAdded, DimensionSpacePointWasMoved, Event};
use crate::projection::ContentGraph;
use crate::stream::ExpectedVersion;

/// The target must be allowed and still empty in the stream
fn require_empty_target<'a>(
    command: &DimensionSpacePointAdjustment,
    ctx: &CommandContext<'a>,
) -> Result<(&'a ContentGraph, u64)> {
    let (graph, version) = ctx.require_content_stream(&command.content_stream_id)?;
    ctx.require_allowed(&command.target)?;
    if graph.has_edges_at(command.target.hash()) {
        return Err(ContentGraphError::DimensionSpacePointAlreadyExists {
            content_stream_id: command.content_stream_id.to_string(),
            dimension_space_point: command.target.to_json_string(),
        });
    }
    Ok((graph, version))
}

pub(super) fn move_point(command: &DimensionSpacePointAdjustment, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let (_, version) = require_empty_target(command, ctx)?;
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::DimensionSpacePointWasMoved(DimensionSpacePointWasMoved {
            content_stream_id: command.content_stream_id.clone(),
            source: command.source.clone(),
            target: command.target.clone(),
        })],
        ExpectedVersion::Exact(version),
    ))
}

pub(super) fn add_shine_through(
    command: &DimensionSpacePointAdjustment,
    ctx: &CommandContext<'_>,
) -> Result<EventsToPublish> {
    let (_, version) = require_empty_target(command, ctx)?;
    if ctx.variation_graph.variant_type(&command.target, &command.source) != VariantType::Specialization {
        return Err(ContentGraphError::DimensionSpacePointIsNoSpecialization {
            dimension_space_point: command.target.to_json_string(),
            generalization: command.source.to_json_string(),
        });
    }
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::DimensionShineThroughWasAdded(DimensionShineThroughWasAdded {
            content_stream_id: command.content_stream_id.clone(),
            source: command.source.clone(),
            target: command.target.clone(),
        })],
        ExpectedVersion::Exact(version),
    ))
}
