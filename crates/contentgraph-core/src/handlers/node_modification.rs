use super::{require_coverage, require_node_aggregate, require_occupation, CommandContext, EventsToPublish};
use crate::commands::{NodeAggregateVariantSelection, SetNodeReferences, SetSerializedNodeProperties};
use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
use crate::errors::{ContentGraphError, Result};
use crate::events::{
    Event, NodeAggregateWasDisabled, NodeAggregateWasEnabled, NodeAggregateWasRemoved, NodePropertiesWereSet,
    NodeReferencesWereSet, SerializedReference,
};
use crate::model::{NodeVariantSelectionStrategy, SerializedPropertyValues};
use crate::node_types::PropertyScope;
use crate::projection::{ContentGraph, NodeAggregate};
use crate::stream::ExpectedVersion;
use std::collections::BTreeMap;

/// Points a disable/enable/remove affects, always within the coverage
fn affected_points(
    ctx: &CommandContext<'_>,
    aggregate: &NodeAggregate,
    point: &DimensionSpacePoint,
    strategy: NodeVariantSelectionStrategy,
) -> Result<DimensionSpacePointSet> {
    let selected = match strategy {
        NodeVariantSelectionStrategy::OnlyGivenVariant => DimensionSpacePointSet::single(point.clone()),
        NodeVariantSelectionStrategy::AllSpecializations => ctx
            .variation_graph
            .specialization_set(point, true, &DimensionSpacePointSet::new())?,
        NodeVariantSelectionStrategy::AllVariants => aggregate.covered.clone(),
    };
    Ok(selected.intersection(&aggregate.covered))
}

/// Shared existence checks of disable, enable and remove
fn require_selection<'a>(
    command: &NodeAggregateVariantSelection,
    ctx: &CommandContext<'a>,
) -> Result<(&'a ContentGraph, u64, NodeAggregate)> {
    let (graph, version) = ctx.require_content_stream(&command.content_stream_id)?;
    let aggregate = require_node_aggregate(graph, &command.node_aggregate_id)?;
    ctx.require_allowed(&command.covered_dimension_space_point)?;
    Ok((graph, version, aggregate))
}

pub(super) fn disable(command: &NodeAggregateVariantSelection, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let point = &command.covered_dimension_space_point;
    let (_, version, aggregate) = require_selection(command, ctx)?;
    require_coverage(&aggregate, point)?;
    if aggregate.is_disabled_in(point) {
        return Err(ContentGraphError::NodeAggregateCurrentlyDisabled {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
            dimension_space_point: point.to_json_string(),
        });
    }

    let affected = affected_points(ctx, &aggregate, point, command.node_variant_selection_strategy)?;
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::NodeAggregateWasDisabled(NodeAggregateWasDisabled {
            content_stream_id: command.content_stream_id.clone(),
            node_aggregate_id: command.node_aggregate_id.clone(),
            affected_dimension_space_points: affected,
        })],
        ExpectedVersion::Exact(version),
    ))
}

pub(super) fn enable(command: &NodeAggregateVariantSelection, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let point = &command.covered_dimension_space_point;
    let (_, version, aggregate) = require_selection(command, ctx)?;
    require_coverage(&aggregate, point)?;
    if !aggregate.is_disabled_in(point) {
        return Err(ContentGraphError::NodeAggregateCurrentlyEnabled {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
            dimension_space_point: point.to_json_string(),
        });
    }

    let affected = affected_points(ctx, &aggregate, point, command.node_variant_selection_strategy)?
        .intersection(&aggregate.disabled);
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::NodeAggregateWasEnabled(NodeAggregateWasEnabled {
            content_stream_id: command.content_stream_id.clone(),
            node_aggregate_id: command.node_aggregate_id.clone(),
            affected_dimension_space_points: affected,
        })],
        ExpectedVersion::Exact(version),
    ))
}

pub(super) fn remove(command: &NodeAggregateVariantSelection, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let point = &command.covered_dimension_space_point;
    let (_, version, aggregate) = require_selection(command, ctx)?;
    if aggregate.classification.is_root() {
        return Err(ContentGraphError::NodeAggregateIsRoot {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
        });
    }
    if aggregate.classification.is_tethered() {
        return Err(ContentGraphError::TetheredNodeAggregateCannotBeRemoved {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
        });
    }
    require_coverage(&aggregate, point)?;

    let affected_covered = affected_points(ctx, &aggregate, point, command.node_variant_selection_strategy)?;
    let affected_occupied = aggregate
        .occupied
        .iter()
        .filter(|o| affected_covered.contains(o.as_point()))
        .cloned()
        .collect();
    Ok(EventsToPublish::on_content_stream(
        &command.content_stream_id,
        vec![Event::NodeAggregateWasRemoved(NodeAggregateWasRemoved {
            content_stream_id: command.content_stream_id.clone(),
            node_aggregate_id: command.node_aggregate_id.clone(),
            affected_occupied_dimension_space_points: affected_occupied,
            affected_covered_dimension_space_points: affected_covered,
        })],
        ExpectedVersion::Exact(version),
    ))
}

/// Occupied origins a value set on `origin` lands on, by scope
fn origins_in_scope(
    ctx: &CommandContext<'_>,
    aggregate: &NodeAggregate,
    origin: &OriginDimensionSpacePoint,
    scope: PropertyScope,
) -> Vec<OriginDimensionSpacePoint> {
    match scope {
        PropertyScope::Node => vec![origin.clone()],
        PropertyScope::Specializations => {
            let specializations = ctx.variation_graph.indexed_specializations(origin.as_point());
            aggregate
                .occupied
                .iter()
                .filter(|o| o == &origin || specializations.contains(o.as_point()))
                .cloned()
                .collect()
        }
        PropertyScope::NodeAggregate => aggregate.occupied.clone(),
    }
}

pub(super) fn set_properties(
    command: &SetSerializedNodeProperties,
    ctx: &CommandContext<'_>,
) -> Result<EventsToPublish> {
    let cs = &command.content_stream_id;
    let origin = &command.origin_dimension_space_point;

    let (graph, version) = ctx.require_content_stream(cs)?;
    let aggregate = require_node_aggregate(graph, &command.node_aggregate_id)?;
    ctx.require_allowed(origin.as_point())?;
    let node_type = ctx.require_node_type(&aggregate.node_type_name)?;

    if aggregate.classification.is_root() {
        return Err(ContentGraphError::NodeAggregateIsRoot {
            node_aggregate_id: aggregate.node_aggregate_id.to_string(),
        });
    }
    require_occupation(&aggregate, origin.as_point())?;

    let mut by_origin: BTreeMap<String, (OriginDimensionSpacePoint, SerializedPropertyValues)> = BTreeMap::new();
    for (name, value) in command.property_values.iter() {
        let definition = node_type
            .property(name.as_str())
            .ok_or_else(|| ContentGraphError::PropertyCannotBeSet {
                property_name: name.to_string(),
                node_type_name: aggregate.node_type_name.to_string(),
            })?;
        for target in origins_in_scope(ctx, &aggregate, origin, definition.scope) {
            by_origin
                .entry(target.hash().to_string())
                .or_insert_with(|| (target.clone(), SerializedPropertyValues::new()))
                .1
                .insert(name.clone(), value.clone());
        }
    }

    let events = by_origin
        .into_values()
        .map(|(target, property_values)| {
            Event::NodePropertiesWereSet(NodePropertiesWereSet {
                content_stream_id: cs.clone(),
                node_aggregate_id: command.node_aggregate_id.clone(),
                origin_dimension_space_point: target,
                property_values,
            })
        })
        .collect();
    Ok(EventsToPublish::on_content_stream(cs, events, ExpectedVersion::Exact(version)))
}

pub(super) fn set_references(command: &SetNodeReferences, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let cs = &command.content_stream_id;
    let origin = &command.source_origin_dimension_space_point;

    // existence
    let (graph, version) = ctx.require_content_stream(cs)?;
    let source = require_node_aggregate(graph, &command.source_node_aggregate_id)?;
    ctx.require_allowed(origin.as_point())?;
    let targets = command
        .references
        .iter()
        .map(|r| require_node_aggregate(graph, &r.target_node_aggregate_id))
        .collect::<Result<Vec<_>>>()?;
    let node_type = ctx.require_node_type(&source.node_type_name)?;

    // state
    require_occupation(&source, origin.as_point())?;
    let definition = node_type
        .reference(command.reference_name.as_str())
        .ok_or_else(|| ContentGraphError::ReferenceCannotBeSet {
            reference_name: command.reference_name.to_string(),
            node_type_name: source.node_type_name.to_string(),
        })?;

    // relational
    let affected = origins_in_scope(ctx, &source, origin, definition.scope);
    for affected_origin in &affected {
        for point in &source.coverage_of(affected_origin.as_point()) {
            for target in &targets {
                require_coverage(target, point)?;
            }
        }
    }

    Ok(EventsToPublish::on_content_stream(
        cs,
        vec![Event::NodeReferencesWereSet(NodeReferencesWereSet {
            content_stream_id: cs.clone(),
            source_node_aggregate_id: command.source_node_aggregate_id.clone(),
            affected_source_origin_dimension_space_points: affected,
            reference_name: command.reference_name.clone(),
            references: command
                .references
                .iter()
                .map(|r| SerializedReference {
                    target_node_aggregate_id: r.target_node_aggregate_id.clone(),
                    properties: r.properties.clone(),
                })
                .collect(),
        })],
        ExpectedVersion::Exact(version),
    ))
}
