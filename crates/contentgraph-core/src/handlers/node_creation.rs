use super::{require_absent, require_coverage, require_node_aggregate, CommandContext, EventsToPublish};
use crate::commands::{CreateNodeAggregateWithNode, CreateRootNodeAggregateWithNode};
use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet};
use crate::errors::{ContentGraphError, Result};
use crate::events::{Event, NodeAggregateWithNodeWasCreated, RootNodeAggregateWithNodeWasCreated, TetheredDescendant};
use crate::model::{
    InterdimensionalSibling, InterdimensionalSiblings, NodeAggregateClassification, NodeAggregateId,
    NodeTypeName,
};
use crate::node_types::NodeType;
use crate::projection::ContentGraph;
use crate::stream::ExpectedVersion;
use std::collections::BTreeMap;

pub(super) fn create_root(
    command: &CreateRootNodeAggregateWithNode,
    ctx: &CommandContext<'_>,
) -> Result<EventsToPublish> {
    let cs = &command.content_stream_id;
    let (graph, version) = ctx.require_content_stream(cs)?;
    let node_type = ctx.require_node_type(&command.node_type_name)?;

    if !node_type.root {
        return Err(ContentGraphError::NodeTypeIsNotOfTypeRoot {
            node_type_name: command.node_type_name.to_string(),
        });
    }
    require_absent(graph, &command.node_aggregate_id)?;
    let occupied = graph.root_node_aggregate_ids().into_iter().any(|id| {
        graph
            .node_aggregate(&id)
            .map(|a| a.node_type_name == command.node_type_name)
            .unwrap_or(false)
    });
    if occupied {
        return Err(ContentGraphError::RootNodeAggregateTypeIsAlreadyOccupied {
            content_stream_id: cs.to_string(),
            node_type_name: command.node_type_name.to_string(),
        });
    }

    Ok(EventsToPublish::on_content_stream(
        cs,
        vec![Event::RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated {
            content_stream_id: cs.clone(),
            node_aggregate_id: command.node_aggregate_id.clone(),
            node_type_name: command.node_type_name.clone(),
            covered_dimension_space_points: ctx.variation_graph.allowed_dimension_subspace().clone(),
            node_aggregate_classification: NodeAggregateClassification::Root,
        })],
        ExpectedVersion::Exact(version),
    ))
}

pub(super) fn create(command: &CreateNodeAggregateWithNode, ctx: &CommandContext<'_>) -> Result<EventsToPublish> {
    let cs = &command.content_stream_id;
    let origin = command.origin_dimension_space_point.as_point();

    // existence
    let (graph, version) = ctx.require_content_stream(cs)?;
    ctx.require_allowed(origin)?;
    let node_type = ctx.require_node_type(&command.node_type_name)?;
    let parent = require_node_aggregate(graph, &command.parent_node_aggregate_id)?;
    if let Some(sibling) = &command.succeeding_sibling_node_aggregate_id {
        require_node_aggregate(graph, sibling)?;
    }

    // state
    if node_type.is_abstract {
        return Err(ContentGraphError::NodeTypeIsAbstract {
            node_type_name: command.node_type_name.to_string(),
        });
    }
    if node_type.root {
        return Err(ContentGraphError::NodeTypeIsOfTypeRoot {
            node_type_name: command.node_type_name.to_string(),
        });
    }
    require_absent(graph, &command.node_aggregate_id)?;
    for name in command.initial_property_values.names() {
        if node_type.property(name.as_str()).is_none() {
            return Err(ContentGraphError::PropertyCannotBeSet {
                property_name: name.to_string(),
                node_type_name: command.node_type_name.to_string(),
            });
        }
    }
    let covered = ctx
        .variation_graph
        .specialization_set(origin, true, &DimensionSpacePointSet::new())?
        .intersection(&parent.covered);
    if let Some(node_name) = &command.node_name {
        for point in &covered {
            let taken = graph
                .child_aggregates(&command.parent_node_aggregate_id, point.hash())
                .iter()
                .filter_map(|id| graph.node_covering(id, point.hash()))
                .filter_map(|h| graph.node(h))
                .any(|n| n.node_name.as_ref() == Some(node_name));
            if taken {
                return Err(ContentGraphError::NodeNameIsAlreadyOccupied {
                    node_name: node_name.to_string(),
                    parent_node_aggregate_id: command.parent_node_aggregate_id.to_string(),
                    dimension_space_point: point.to_json_string(),
                });
            }
        }
    }

    // relational
    require_coverage(&parent, origin)?;
    let mut visiting = vec![command.node_type_name.clone()];
    let tethered_descendants = tethered_descendants(
        ctx,
        graph,
        command,
        node_type,
        "",
        &mut visiting,
    )?;

    let siblings = resolve_siblings(graph, command, &covered);
    let initial_property_values = node_type
        .default_values()
        .merge(&command.initial_property_values);

    Ok(EventsToPublish::on_content_stream(
        cs,
        vec![Event::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
            content_stream_id: cs.clone(),
            node_aggregate_id: command.node_aggregate_id.clone(),
            node_type_name: command.node_type_name.clone(),
            origin_dimension_space_point: command.origin_dimension_space_point.clone(),
            succeeding_siblings_for_coverage: siblings,
            parent_node_aggregate_id: command.parent_node_aggregate_id.clone(),
            node_name: command.node_name.clone(),
            initial_property_values,
            node_aggregate_classification: NodeAggregateClassification::Regular,
            tethered_descendants,
        })],
        ExpectedVersion::Exact(version),
    ))
}

/// Succeeding sibling per covered point
///
/// The requested sibling where it is a child of the parent; otherwise the
/// first sibling following it at the origin that is a child of the parent at
/// that point; otherwise the node is appended.
fn resolve_siblings(
    graph: &ContentGraph,
    command: &CreateNodeAggregateWithNode,
    covered: &DimensionSpacePointSet,
) -> InterdimensionalSiblings {
    let Some(requested) = &command.succeeding_sibling_node_aggregate_id else {
        return InterdimensionalSiblings::append_at(covered);
    };
    let parent = &command.parent_node_aggregate_id;
    let at_origin = graph.child_aggregates(parent, command.origin_dimension_space_point.hash());
    let following: Vec<&NodeAggregateId> = at_origin
        .iter()
        .skip_while(|id| *id != requested)
        .skip(1)
        .collect();

    InterdimensionalSiblings::new(
        covered
            .iter()
            .map(|point: &DimensionSpacePoint| {
                let children = graph.child_aggregates(parent, point.hash());
                let node_aggregate_id = if children.contains(requested) {
                    Some(requested.clone())
                } else {
                    following
                        .iter()
                        .find(|id| children.contains(**id))
                        .map(|id| (*id).clone())
                };
                InterdimensionalSibling {
                    dimension_space_point: point.clone(),
                    node_aggregate_id,
                }
            })
            .collect(),
    )
}

/// Tethered children of `node_type`, recursively, as embedded in the event
///
/// `path` is the node name path from the created node; ids not given in the
/// command are derived from the created node's id and that path.
fn tethered_descendants(
    ctx: &CommandContext<'_>,
    graph: &ContentGraph,
    command: &CreateNodeAggregateWithNode,
    node_type: &NodeType,
    path: &str,
    visiting: &mut Vec<NodeTypeName>,
) -> Result<Vec<TetheredDescendant>> {
    let mut descendants = Vec::new();
    for (node_name, child_type_name) in &node_type.tethered_children {
        let child_type = ctx.require_node_type(child_type_name)?;
        if child_type.root {
            return Err(ContentGraphError::NodeTypeIsOfTypeRoot {
                node_type_name: child_type_name.to_string(),
            });
        }
        if visiting.contains(child_type_name) {
            return Err(ContentGraphError::InvalidNodeTypeSchema {
                reason: format!("tethered children of {} form a cycle", child_type_name),
            });
        }

        let child_path = if path.is_empty() {
            node_name.to_string()
        } else {
            format!("{}/{}", path, node_name)
        };
        let node_aggregate_id = explicit_or_derived_id(
            &command.tethered_descendant_node_aggregate_ids,
            &command.node_aggregate_id,
            &child_path,
        );
        require_absent(graph, &node_aggregate_id)?;

        visiting.push(child_type_name.clone());
        let children = tethered_descendants(ctx, graph, command, child_type, &child_path, visiting)?;
        visiting.pop();

        descendants.push(TetheredDescendant {
            node_aggregate_id,
            node_name: node_name.clone(),
            node_type_name: child_type_name.clone(),
            initial_property_values: child_type.default_values(),
            children,
        });
    }
    Ok(descendants)
}

fn explicit_or_derived_id(
    explicit: &BTreeMap<String, NodeAggregateId>,
    node_aggregate_id: &NodeAggregateId,
    path: &str,
) -> NodeAggregateId {
    explicit
        .get(path)
        .cloned()
        .unwrap_or_else(|| NodeAggregateId::for_tethered_child(node_aggregate_id, path))
}
