use super::{require_coverage, require_node_aggregate, require_occupation, CommandContext, EventsToPublish};
use crate::commands::CreateNodeVariant;
use crate::dimension::{DimensionSpacePointSet, OriginDimensionSpacePoint, VariantType};
use crate::errors::{ContentGraphError, Result};
use crate::events::{
    Event, NodeGeneralizationVariantWasCreated, NodePeerVariantWasCreated, NodeSpecializationVariantWasCreated,
};
use crate::model::{ContentStreamId, NodeAggregateId};
use crate::projection::{ContentGraph, NodeAggregate};
use crate::stream::ExpectedVersion;

pub(super) fn create_variant(command: &CreateNodeVariant, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let cs = &command.content_stream_id;
    let source = command.source_origin.as_point();
    let target = command.target_origin.as_point();

    // existence
    let (graph, version) = ctx.require_content_stream(cs)?;
    let aggregate = require_node_aggregate(graph, &command.node_aggregate_id)?;
    ctx.require_allowed(source)?;
    ctx.require_allowed(target)?;

    // state
    if aggregate.classification.is_root() {
        return Err(ContentGraphError::NodeAggregateIsRoot {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
        });
    }
    if aggregate.classification.is_tethered() {
        return Err(ContentGraphError::NodeAggregateIsTethered {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
        });
    }
    require_occupation(&aggregate, source)?;
    if aggregate.occupies(target) {
        return Err(ContentGraphError::DimensionSpacePointIsAlreadyOccupied {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
            dimension_space_point: target.to_json_string(),
        });
    }

    // relational
    let variant_type = ctx.variation_graph.variant_type(target, source);
    let coverage = match variant_type {
        VariantType::Specialization => {
            require_coverage(&aggregate, target)?;
            specialization_coverage(ctx, &aggregate, &command.target_origin)?
        }
        VariantType::Generalization | VariantType::Peer | VariantType::Same => {
            let parent = parent_aggregate(graph, &aggregate, &command.source_origin)?;
            require_coverage(&parent, target)?;
            uncovered_visibility(ctx, &aggregate, &command.target_origin)?.intersection(&parent.covered)
        }
    };

    let variant = Variant {
        content_stream_id: cs,
        variant_type,
        source_origin: &command.source_origin,
        target_origin: &command.target_origin,
    };
    let mut events = vec![variant.event(&aggregate.node_aggregate_id, coverage.clone())];
    tethered_variants(graph, &variant, &aggregate, &coverage, &mut events);

    Ok(EventsToPublish::on_content_stream(cs, events, ExpectedVersion::Exact(version)))
}

struct Variant<'c> {
    content_stream_id: &'c ContentStreamId,
    variant_type: VariantType,
    source_origin: &'c OriginDimensionSpacePoint,
    target_origin: &'c OriginDimensionSpacePoint,
}

impl Variant<'_> {
    fn event(&self, node_aggregate_id: &NodeAggregateId, coverage: DimensionSpacePointSet) -> Event {
        let content_stream_id = self.content_stream_id.clone();
        let node_aggregate_id = node_aggregate_id.clone();
        let source_origin = self.source_origin.clone();
        match self.variant_type {
            VariantType::Specialization => {
                Event::NodeSpecializationVariantWasCreated(NodeSpecializationVariantWasCreated {
                    content_stream_id,
                    node_aggregate_id,
                    source_origin,
                    specialization_origin: self.target_origin.clone(),
                    specialization_coverage: coverage,
                })
            }
            VariantType::Generalization => {
                Event::NodeGeneralizationVariantWasCreated(NodeGeneralizationVariantWasCreated {
                    content_stream_id,
                    node_aggregate_id,
                    source_origin,
                    generalization_origin: self.target_origin.clone(),
                    generalization_coverage: coverage,
                })
            }
            VariantType::Peer | VariantType::Same => Event::NodePeerVariantWasCreated(NodePeerVariantWasCreated {
                content_stream_id,
                node_aggregate_id,
                source_origin,
                peer_origin: self.target_origin.clone(),
                peer_coverage: coverage,
            }),
        }
    }
}

/// Points of the target's specialization set the aggregate covers and no
/// more specialized variant claims
fn specialization_coverage(
    ctx: &CommandContext<'_>,
    aggregate: &NodeAggregate,
    target: &OriginDimensionSpacePoint,
) -> Result<DimensionSpacePointSet> {
    let claimed: DimensionSpacePointSet = aggregate
        .occupied
        .iter()
        .map(|o| o.to_point())
        .filter(|o| {
            ctx.variation_graph.variant_type(o, target.as_point()) == VariantType::Specialization
        })
        .collect();
    Ok(ctx
        .variation_graph
        .specialization_set(target.as_point(), true, &claimed)?
        .intersection(&aggregate.covered))
}

/// Points of the target's specialization set the aggregate does not cover yet
fn uncovered_visibility(
    ctx: &CommandContext<'_>,
    aggregate: &NodeAggregate,
    target: &OriginDimensionSpacePoint,
) -> Result<DimensionSpacePointSet> {
    Ok(ctx
        .variation_graph
        .specialization_set(target.as_point(), true, &aggregate.occupied_points())?
        .difference(&aggregate.covered))
}

fn parent_aggregate(
    graph: &ContentGraph,
    aggregate: &NodeAggregate,
    origin: &OriginDimensionSpacePoint,
) -> Result<NodeAggregate> {
    let parent_id = graph
        .node_handle(&aggregate.node_aggregate_id, origin.as_point())
        .and_then(|h| graph.parent_aggregate(h))
        .ok_or_else(|| ContentGraphError::ProjectionIntegrityViolation {
            content_stream_id: graph.content_stream_id().to_string(),
            reason: format!("node aggregate {} has no parent", aggregate.node_aggregate_id),
        })?;
    require_node_aggregate(graph, &parent_id)
}

/// Same variant for every tethered descendant occupying the source origin
fn tethered_variants(
    graph: &ContentGraph,
    variant: &Variant<'_>,
    parent: &NodeAggregate,
    parent_coverage: &DimensionSpacePointSet,
    events: &mut Vec<Event>,
) {
    let source = variant.source_origin.as_point();
    let Some(parent_node) = graph.node_handle(&parent.node_aggregate_id, source) else {
        return;
    };
    for child in graph.all_children(parent_node) {
        let Some(record) = graph.node(child) else {
            continue;
        };
        if !record.classification.is_tethered() || record.origin_hash != source.hash() {
            continue;
        }
        let Some(child_aggregate) = graph.node_aggregate(&record.node_aggregate_id) else {
            continue;
        };
        if child_aggregate.occupies(variant.target_origin.as_point()) {
            continue;
        }
        let coverage = match variant.variant_type {
            VariantType::Specialization => parent_coverage.intersection(&child_aggregate.covered),
            _ => parent_coverage.difference(&child_aggregate.covered),
        };
        events.push(variant.event(&child_aggregate.node_aggregate_id, coverage.clone()));
        tethered_variants(graph, variant, &child_aggregate, &coverage, events);
    }
}
