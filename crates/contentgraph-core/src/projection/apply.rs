//! Event fold for one content stream
//!
//! ## Atomicity Contract
//!
//! `apply()` takes the graph by value and returns either the next graph or an
//! error. On error the caller keeps nothing of the partial work: the graph it
//! handed in is gone, so it must hold on to a clone (or the previous state)
//! if it wants to keep serving reads. `ProjectionState` does exactly that and
//! halts the stream.
//!
//! Stream lifecycle and workspace events are identity here; they are handled
//! one level up in `ProjectionState`.

use super::graph::{ContentGraph, EdgeId, HierarchyEdge, NodeHandle, NodeRecord, ReferenceEdge, RestrictionEdge};
use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
use crate::errors::{ContentGraphError, Result};
use crate::events::*;
use crate::model::{NodeAggregateClassification, NodeAggregateId};

/// Gap between sibling positions when appending or renumbering
pub const POSITION_OFFSET: i64 = 128;

fn violation(graph: &ContentGraph, reason: impl Into<String>) -> ContentGraphError {
    ContentGraphError::ProjectionIntegrityViolation {
        content_stream_id: graph.content_stream_id().to_string(),
        reason: reason.into(),
    }
}

/// Fold one event into the graph
///
/// # Errors
///
/// `ProjectionIntegrityViolation` when the event does not fit the graph:
/// a missing parent or node, a node that already exists at its origin.
pub fn apply(mut graph: ContentGraph, event: &Event) -> Result<ContentGraph> {
    match event {
        Event::RootNodeAggregateWithNodeWasCreated(e) => create_root_node(&mut graph, e)?,
        Event::NodeAggregateWithNodeWasCreated(e) => create_node(&mut graph, e)?,
        Event::NodePropertiesWereSet(e) => set_properties(&mut graph, e)?,
        Event::NodeReferencesWereSet(e) => set_references(&mut graph, e)?,
        Event::NodeAggregateWasDisabled(e) => disable(&mut graph, e)?,
        Event::NodeAggregateWasEnabled(e) => enable(&mut graph, e),
        Event::NodeAggregateWasRemoved(e) => remove(&mut graph, e)?,
        Event::DimensionSpacePointWasMoved(e) => move_point(&mut graph, &e.source, &e.target),
        Event::DimensionShineThroughWasAdded(e) => add_shine_through(&mut graph, &e.source, &e.target),
        Event::NodeSpecializationVariantWasCreated(e) => create_specialization(&mut graph, e)?,
        Event::NodeGeneralizationVariantWasCreated(e) => create_variant_below_parent(
            &mut graph,
            &e.node_aggregate_id,
            &e.source_origin,
            &e.generalization_origin,
            &e.generalization_coverage,
        )?,
        Event::NodePeerVariantWasCreated(e) => create_variant_below_parent(
            &mut graph,
            &e.node_aggregate_id,
            &e.source_origin,
            &e.peer_origin,
            &e.peer_coverage,
        )?,
        Event::ContentStreamWasCreated(_)
        | Event::ContentStreamWasForked(_)
        | Event::ContentStreamWasRemoved(_)
        | Event::RootWorkspaceWasCreated(_)
        | Event::WorkspaceWasCreated(_)
        | Event::WorkspaceWasDiscarded(_)
        | Event::WorkspaceWasPublished(_)
        | Event::WorkspaceWasRebased(_)
        | Event::WorkspaceRebaseFailed(_) => {}
    }
    Ok(graph)
}

fn add_node_or_fail(graph: &mut ContentGraph, record: NodeRecord) -> Result<NodeHandle> {
    let id = record.node_aggregate_id.clone();
    let origin = record.origin.clone();
    graph.add_node(record).ok_or_else(|| {
        violation(
            graph,
            format!("node aggregate {} already occupies {}", id, origin),
        )
    })
}

fn require_node(graph: &ContentGraph, id: &NodeAggregateId, origin: &OriginDimensionSpacePoint) -> Result<NodeHandle> {
    graph
        .node_handle(id, origin.as_point())
        .ok_or_else(|| violation(graph, format!("node aggregate {} has no node at {}", id, origin)))
}

fn create_root_node(graph: &mut ContentGraph, e: &RootNodeAggregateWithNodeWasCreated) -> Result<()> {
    if graph.aggregate_exists(&e.node_aggregate_id) {
        return Err(violation(
            graph,
            format!("node aggregate {} already exists", e.node_aggregate_id),
        ));
    }
    let origin = OriginDimensionSpacePoint::empty();
    let handle = add_node_or_fail(
        graph,
        NodeRecord {
            node_aggregate_id: e.node_aggregate_id.clone(),
            origin_hash: origin.hash().to_string(),
            origin,
            node_type_name: e.node_type_name.clone(),
            node_name: None,
            classification: NodeAggregateClassification::Root,
            properties: Default::default(),
        },
    )?;
    for point in &e.covered_dimension_space_points {
        graph.register_point(point);
        let position = append_position(graph, None, point.hash());
        graph.add_edge(None, handle, point.hash(), position);
    }
    Ok(())
}

fn create_node(graph: &mut ContentGraph, e: &NodeAggregateWithNodeWasCreated) -> Result<()> {
    let handle = add_node_or_fail(
        graph,
        NodeRecord {
            node_aggregate_id: e.node_aggregate_id.clone(),
            origin: e.origin_dimension_space_point.clone(),
            origin_hash: e.origin_dimension_space_point.hash().to_string(),
            node_type_name: e.node_type_name.clone(),
            node_name: e.node_name.clone(),
            classification: e.node_aggregate_classification,
            properties: e.initial_property_values.clone(),
        },
    )?;

    let mut covered = Vec::new();
    for sibling in e.succeeding_siblings_for_coverage.iter() {
        let point = &sibling.dimension_space_point;
        graph.register_point(point);
        let parent = graph
            .node_covering(&e.parent_node_aggregate_id, point.hash())
            .ok_or_else(|| {
                violation(
                    graph,
                    format!(
                        "parent {} of {} is not visible at {}",
                        e.parent_node_aggregate_id, e.node_aggregate_id, point
                    ),
                )
            })?;
        let position = match &sibling.node_aggregate_id {
            Some(succeeding) => position_before(graph, parent, succeeding, point.hash()),
            None => append_position(graph, Some(parent), point.hash()),
        };
        graph.add_edge(Some(parent), handle, point.hash(), position);
        inherit_restrictions(graph, &e.parent_node_aggregate_id, &e.node_aggregate_id, point.hash());
        covered.push(point.clone());
    }

    for descendant in &e.tethered_descendants {
        create_tethered(
            graph,
            &e.node_aggregate_id,
            handle,
            &e.origin_dimension_space_point,
            &covered,
            descendant,
        )?;
    }
    Ok(())
}

fn create_tethered(
    graph: &mut ContentGraph,
    parent_id: &NodeAggregateId,
    parent: NodeHandle,
    origin: &OriginDimensionSpacePoint,
    covered: &[DimensionSpacePoint],
    descendant: &TetheredDescendant,
) -> Result<()> {
    let handle = add_node_or_fail(
        graph,
        NodeRecord {
            node_aggregate_id: descendant.node_aggregate_id.clone(),
            origin: origin.clone(),
            origin_hash: origin.hash().to_string(),
            node_type_name: descendant.node_type_name.clone(),
            node_name: Some(descendant.node_name.clone()),
            classification: NodeAggregateClassification::Tethered,
            properties: descendant.initial_property_values.clone(),
        },
    )?;
    for point in covered {
        let position = append_position(graph, Some(parent), point.hash());
        graph.add_edge(Some(parent), handle, point.hash(), position);
        inherit_restrictions(graph, parent_id, &descendant.node_aggregate_id, point.hash());
    }
    for child in &descendant.children {
        create_tethered(graph, &descendant.node_aggregate_id, handle, origin, covered, child)?;
    }
    Ok(())
}

/// A new child is hidden wherever its parent is hidden
fn inherit_restrictions(graph: &mut ContentGraph, parent: &NodeAggregateId, child: &NodeAggregateId, point_hash: &str) {
    let inherited: Vec<RestrictionEdge> = graph
        .restrictions
        .iter()
        .filter(|r| &r.affected_node_aggregate_id == parent && r.dimension_space_point_hash == point_hash)
        .map(|r| RestrictionEdge {
            dimension_space_point_hash: point_hash.to_string(),
            origin_node_aggregate_id: r.origin_node_aggregate_id.clone(),
            affected_node_aggregate_id: child.clone(),
        })
        .collect();
    graph.restrictions.extend(inherited);
}

fn append_position(graph: &ContentGraph, parent: Option<NodeHandle>, point_hash: &str) -> i64 {
    graph
        .child_edges(parent, point_hash)
        .last()
        .map(|(_, e)| e.position + POSITION_OFFSET)
        .unwrap_or(POSITION_OFFSET)
}

/// Position directly before `succeeding` below `parent`
///
/// Falls back to appending when the sibling is not a child of `parent` at
/// the point. Renumbers the siblings when no gap is left.
fn position_before(graph: &mut ContentGraph, parent: NodeHandle, succeeding: &NodeAggregateId, point_hash: &str) -> i64 {
    let find = |graph: &ContentGraph| -> Option<(Option<i64>, i64)> {
        let edges = graph.child_edges(Some(parent), point_hash);
        let index = edges.iter().position(|(_, e)| {
            graph
                .node(e.child)
                .map(|n| &n.node_aggregate_id == succeeding)
                .unwrap_or(false)
        })?;
        let previous = index.checked_sub(1).map(|i| edges[i].1.position);
        Some((previous, edges[index].1.position))
    };

    let Some((previous, next)) = find(&*graph) else {
        return append_position(graph, Some(parent), point_hash);
    };
    let lower = previous.unwrap_or(next - 2 * POSITION_OFFSET);
    if next - lower >= 2 {
        return lower + (next - lower) / 2;
    }

    renumber(graph, parent, point_hash);
    match find(&*graph) {
        Some((previous, next)) => {
            let lower = previous.unwrap_or(next - 2 * POSITION_OFFSET);
            lower + (next - lower) / 2
        }
        None => append_position(graph, Some(parent), point_hash),
    }
}

fn renumber(graph: &mut ContentGraph, parent: NodeHandle, point_hash: &str) {
    let ids: Vec<EdgeId> = graph
        .child_edges(Some(parent), point_hash)
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    for (index, id) in ids.into_iter().enumerate() {
        graph.set_position(id, (index as i64 + 1) * POSITION_OFFSET);
    }
}

fn set_properties(graph: &mut ContentGraph, e: &NodePropertiesWereSet) -> Result<()> {
    let handle = require_node(graph, &e.node_aggregate_id, &e.origin_dimension_space_point)?;
    if let Some(node) = graph.nodes.get_mut(&handle) {
        node.properties = node.properties.merge(&e.property_values);
    }
    Ok(())
}

fn set_references(graph: &mut ContentGraph, e: &NodeReferencesWereSet) -> Result<()> {
    for origin in &e.affected_source_origin_dimension_space_points {
        let source = require_node(graph, &e.source_node_aggregate_id, origin)?;
        graph
            .references
            .retain(|r| !(r.source == source && r.name == e.reference_name));
        for (position, reference) in e.references.iter().enumerate() {
            graph.references.push(ReferenceEdge {
                source,
                name: e.reference_name.clone(),
                position: position as u32,
                target: reference.target_node_aggregate_id.clone(),
                properties: reference.properties.clone(),
            });
        }
    }
    Ok(())
}

fn disable(graph: &mut ContentGraph, e: &NodeAggregateWasDisabled) -> Result<()> {
    for point in &e.affected_dimension_space_points {
        let handle = graph
            .node_covering(&e.node_aggregate_id, point.hash())
            .ok_or_else(|| {
                violation(
                    graph,
                    format!("disabled node aggregate {} does not cover {}", e.node_aggregate_id, point),
                )
            })?;
        let mut affected = vec![e.node_aggregate_id.clone()];
        affected.extend(
            graph
                .descendants(handle, point.hash())
                .into_iter()
                .filter_map(|h| graph.node(h).map(|n| n.node_aggregate_id.clone())),
        );
        for id in affected {
            graph.restrictions.insert(RestrictionEdge {
                dimension_space_point_hash: point.hash().to_string(),
                origin_node_aggregate_id: e.node_aggregate_id.clone(),
                affected_node_aggregate_id: id,
            });
        }
    }
    Ok(())
}

fn enable(graph: &mut ContentGraph, e: &NodeAggregateWasEnabled) {
    graph.restrictions.retain(|r| {
        !(r.origin_node_aggregate_id == e.node_aggregate_id
            && e
                .affected_dimension_space_points
                .contains_hash(&r.dimension_space_point_hash))
    });
}

fn remove(graph: &mut ContentGraph, e: &NodeAggregateWasRemoved) -> Result<()> {
    let mut removed_aggregates = Vec::new();
    for point in &e.affected_covered_dimension_space_points {
        let Some(handle) = graph.node_covering(&e.node_aggregate_id, point.hash()) else {
            return Err(violation(
                graph,
                format!("removed node aggregate {} does not cover {}", e.node_aggregate_id, point),
            ));
        };
        let mut subtree = vec![handle];
        subtree.extend(graph.descendants(handle, point.hash()));
        for node in subtree {
            if let Some(record) = graph.node(node) {
                removed_aggregates.push((point.hash().to_string(), record.node_aggregate_id.clone()));
            }
            if let Some(edge) = graph.incoming_edge(node, point.hash()) {
                graph.remove_edge(edge);
            }
        }
    }

    graph.restrictions.retain(|r| {
        !removed_aggregates.iter().any(|(hash, id)| {
            &r.dimension_space_point_hash == hash
                && (&r.affected_node_aggregate_id == id || &r.origin_node_aggregate_id == id)
        })
    });

    // Nodes left without any incoming edge are gone for good.
    let orphans: Vec<NodeHandle> = graph
        .nodes
        .keys()
        .copied()
        .filter(|h| graph.incoming_edges(*h).is_empty())
        .collect();
    for orphan in orphans {
        let child_edges: Vec<EdgeId> = graph
            .edges
            .iter()
            .filter(|(_, edge)| edge.parent == Some(orphan))
            .map(|(id, _)| *id)
            .collect();
        for child_edge in child_edges {
            graph.remove_edge(child_edge);
        }
        graph.remove_node(orphan);
    }
    Ok(())
}

fn move_point(graph: &mut ContentGraph, source: &DimensionSpacePoint, target: &DimensionSpacePoint) {
    graph.register_point(target);
    let source_hash = source.hash().to_string();
    let target_hash = target.hash().to_string();

    let moved: Vec<NodeHandle> = graph
        .nodes
        .iter()
        .filter(|(_, n)| n.origin_hash == source_hash)
        .map(|(h, _)| *h)
        .collect();
    for handle in moved {
        if let Some(node) = graph.nodes.get_mut(&handle) {
            graph
                .node_index
                .remove(&(node.node_aggregate_id.clone(), node.origin_hash.clone()));
            node.origin = OriginDimensionSpacePoint::from_point(target.clone());
            node.origin_hash = target_hash.clone();
            graph
                .node_index
                .insert((node.node_aggregate_id.clone(), target_hash.clone()), handle);
        }
    }

    let edges: Vec<(EdgeId, HierarchyEdge)> = graph
        .edges
        .iter()
        .filter(|(_, e)| e.dimension_space_point_hash == source_hash)
        .map(|(id, e)| (*id, e.clone()))
        .collect();
    for (id, mut edge) in edges {
        edge.dimension_space_point_hash = target_hash.clone();
        graph.replace_edge(id, edge);
    }

    graph.restrictions = std::mem::take(&mut graph.restrictions)
        .into_iter()
        .map(|mut r| {
            if r.dimension_space_point_hash == source_hash {
                r.dimension_space_point_hash = target_hash.clone();
            }
            r
        })
        .collect();
}

fn add_shine_through(graph: &mut ContentGraph, source: &DimensionSpacePoint, target: &DimensionSpacePoint) {
    graph.register_point(target);
    let source_hash = source.hash();
    let target_hash = target.hash();

    let edges: Vec<HierarchyEdge> = graph
        .edges
        .values()
        .filter(|e| e.dimension_space_point_hash == source_hash)
        .cloned()
        .collect();
    for edge in edges {
        graph.add_edge(edge.parent, edge.child, target_hash, edge.position);
    }

    let restrictions: Vec<RestrictionEdge> = graph
        .restrictions
        .iter()
        .filter(|r| r.dimension_space_point_hash == source_hash)
        .map(|r| RestrictionEdge {
            dimension_space_point_hash: target_hash.to_string(),
            ..r.clone()
        })
        .collect();
    graph.restrictions.extend(restrictions);
}

fn copy_node(
    graph: &mut ContentGraph,
    id: &NodeAggregateId,
    source_origin: &OriginDimensionSpacePoint,
    target_origin: &OriginDimensionSpacePoint,
) -> Result<(NodeHandle, NodeHandle)> {
    let source = require_node(graph, id, source_origin)?;
    let mut record = graph
        .node(source)
        .cloned()
        .ok_or_else(|| violation(graph, format!("node record of {} missing", id)))?;
    record.origin = target_origin.clone();
    record.origin_hash = target_origin.hash().to_string();
    graph.register_point(target_origin.as_point());
    let target = add_node_or_fail(graph, record)?;

    let copied: Vec<ReferenceEdge> = graph
        .references
        .iter()
        .filter(|r| r.source == source)
        .map(|r| ReferenceEdge {
            source: target,
            ..r.clone()
        })
        .collect();
    graph.references.extend(copied);
    Ok((source, target))
}

fn create_specialization(graph: &mut ContentGraph, e: &NodeSpecializationVariantWasCreated) -> Result<()> {
    let (_, specialization) = copy_node(graph, &e.node_aggregate_id, &e.source_origin, &e.specialization_origin)?;

    for point in &e.specialization_coverage {
        graph.register_point(point);
        let previous = graph
            .node_covering(&e.node_aggregate_id, point.hash())
            .filter(|h| *h != specialization)
            .ok_or_else(|| {
                violation(
                    graph,
                    format!("node aggregate {} does not cover {}", e.node_aggregate_id, point),
                )
            })?;

        if let Some(incoming) = graph.incoming_edge(previous, point.hash()) {
            if let Some(edge) = graph.edge(incoming).cloned() {
                graph.replace_edge(
                    incoming,
                    HierarchyEdge {
                        child: specialization,
                        ..edge
                    },
                );
            }
        }

        let outgoing: Vec<(EdgeId, HierarchyEdge)> = graph
            .child_edges(Some(previous), point.hash())
            .into_iter()
            .map(|(id, edge)| (id, edge.clone()))
            .collect();
        for (id, edge) in outgoing {
            graph.replace_edge(
                id,
                HierarchyEdge {
                    parent: Some(specialization),
                    ..edge
                },
            );
        }
    }
    Ok(())
}

fn create_variant_below_parent(
    graph: &mut ContentGraph,
    id: &NodeAggregateId,
    source_origin: &OriginDimensionSpacePoint,
    target_origin: &OriginDimensionSpacePoint,
    coverage: &DimensionSpacePointSet,
) -> Result<()> {
    let (source, variant) = copy_node(graph, id, source_origin, target_origin)?;
    let parent_id = graph
        .parent_aggregate(source)
        .ok_or_else(|| violation(graph, format!("node aggregate {} has no parent", id)))?;

    for point in coverage {
        graph.register_point(point);
        let parent = graph.node_covering(&parent_id, point.hash()).ok_or_else(|| {
            violation(
                graph,
                format!("parent {} of {} is not visible at {}", parent_id, id, point),
            )
        })?;
        let position = append_position(graph, Some(parent), point.hash());
        graph.add_edge(Some(parent), variant, point.hash(), position);
        inherit_restrictions(graph, &parent_id, id, point.hash());
    }
    Ok(())
}
