//! Structural invariants of a content graph
//!
//! Each check is independent and read-only: it inspects the arena as it is
//! and reports every violation it finds instead of stopping at the first.
//! The fold maintains all of these; a violation means a bug or a corrupted
//! projection.

use crate::model::{ContentStreamId, NodeAggregateClassification, NodeAggregateId, NodeTypeName};
use crate::projection::{ContentGraph, NodeHandle, RestrictionEdge};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IntegrityCheck {
    HierarchyIntegrity,
    NoHierarchyCycles,
    SingleParentPerSubgraph,
    NonRootNodesHaveParents,
    NodesReachableFromRoot,
    NodeAggregateIdsUniquePerSubgraph,
    ConsistentNodeTypePerAggregate,
    ConsistentClassificationPerAggregate,
    ChildCoverageWithinParentCoverage,
    UniqueOriginPerAggregate,
    NodesCoverTheirOrigin,
    DistinctSiblingPositions,
    TetheredNodesAreNamed,
    RestrictionIntegrity,
    ReferenceIntegrity,
    DistinctReferencePositions,
}

impl IntegrityCheck {
    pub const ALL: [IntegrityCheck; 16] = [
        IntegrityCheck::HierarchyIntegrity,
        IntegrityCheck::NoHierarchyCycles,
        IntegrityCheck::SingleParentPerSubgraph,
        IntegrityCheck::NonRootNodesHaveParents,
        IntegrityCheck::NodesReachableFromRoot,
        IntegrityCheck::NodeAggregateIdsUniquePerSubgraph,
        IntegrityCheck::ConsistentNodeTypePerAggregate,
        IntegrityCheck::ConsistentClassificationPerAggregate,
        IntegrityCheck::ChildCoverageWithinParentCoverage,
        IntegrityCheck::UniqueOriginPerAggregate,
        IntegrityCheck::NodesCoverTheirOrigin,
        IntegrityCheck::DistinctSiblingPositions,
        IntegrityCheck::TetheredNodesAreNamed,
        IntegrityCheck::RestrictionIntegrity,
        IntegrityCheck::ReferenceIntegrity,
        IntegrityCheck::DistinctReferencePositions,
    ];
}

impl std::fmt::Display for IntegrityCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    pub check: IntegrityCheck,
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point_hash: Option<String>,
    pub node_aggregate_ids: Vec<NodeAggregateId>,
    pub message: String,
}

impl std::fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.check, self.content_stream_id, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub check: IntegrityCheck,
    pub violations: Vec<IntegrityViolation>,
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Run the given checks, one result per check in the given order
pub fn check(graph: &ContentGraph, checks: &[IntegrityCheck]) -> Vec<CheckResult> {
    checks
        .iter()
        .map(|check| {
            let mut report = Report {
                graph,
                check: *check,
                violations: Vec::new(),
            };
            match check {
                IntegrityCheck::HierarchyIntegrity => hierarchy_integrity(&mut report),
                IntegrityCheck::NoHierarchyCycles => no_hierarchy_cycles(&mut report),
                IntegrityCheck::SingleParentPerSubgraph => single_parent(&mut report),
                IntegrityCheck::NonRootNodesHaveParents => non_root_parents(&mut report),
                IntegrityCheck::NodesReachableFromRoot => reachable_from_root(&mut report),
                IntegrityCheck::NodeAggregateIdsUniquePerSubgraph => aggregate_ids_unique(&mut report),
                IntegrityCheck::ConsistentNodeTypePerAggregate => consistent_node_type(&mut report),
                IntegrityCheck::ConsistentClassificationPerAggregate => consistent_classification(&mut report),
                IntegrityCheck::ChildCoverageWithinParentCoverage => child_coverage(&mut report),
                IntegrityCheck::UniqueOriginPerAggregate => unique_origin(&mut report),
                IntegrityCheck::NodesCoverTheirOrigin => nodes_cover_origin(&mut report),
                IntegrityCheck::DistinctSiblingPositions => sibling_positions(&mut report),
                IntegrityCheck::TetheredNodesAreNamed => tethered_named(&mut report),
                IntegrityCheck::RestrictionIntegrity => restriction_integrity(&mut report),
                IntegrityCheck::ReferenceIntegrity => reference_integrity(&mut report),
                IntegrityCheck::DistinctReferencePositions => reference_positions(&mut report),
            }
            CheckResult {
                check: *check,
                violations: report.violations,
            }
        })
        .collect()
}

pub fn check_all(graph: &ContentGraph) -> Vec<CheckResult> {
    check(graph, &IntegrityCheck::ALL)
}

struct Report<'a> {
    graph: &'a ContentGraph,
    check: IntegrityCheck,
    violations: Vec<IntegrityViolation>,
}

impl Report<'_> {
    fn push(&mut self, point_hash: Option<&str>, ids: Vec<NodeAggregateId>, message: impl Into<String>) {
        self.violations.push(IntegrityViolation {
            check: self.check,
            content_stream_id: self.graph.content_stream_id().clone(),
            dimension_space_point_hash: point_hash.map(str::to_string),
            node_aggregate_ids: ids,
            message: message.into(),
        });
    }

    fn aggregate_of(&self, handle: NodeHandle) -> Vec<NodeAggregateId> {
        self.graph
            .node(handle)
            .map(|n| vec![n.node_aggregate_id.clone()])
            .unwrap_or_default()
    }
}

fn hierarchy_integrity(report: &mut Report<'_>) {
    let graph = report.graph;
    for (id, edge) in &graph.edges {
        let hash = edge.dimension_space_point_hash.as_str();
        if graph.node(edge.child).is_none() {
            report.push(Some(hash), vec![], format!("edge {:?} has no child node", id));
        }
        if let Some(parent) = edge.parent {
            if graph.node(parent).is_none() {
                report.push(
                    Some(hash),
                    report.aggregate_of(edge.child),
                    format!("edge {:?} has no parent node", id),
                );
            }
        }
        match graph.point(hash) {
            None => report.push(
                Some(hash),
                report.aggregate_of(edge.child),
                format!("edge {:?} refers to an unknown dimension space point", id),
            ),
            Some(point) if point.hash() != hash => report.push(
                Some(hash),
                report.aggregate_of(edge.child),
                format!("edge {:?} point hash does not match {}", id, point),
            ),
            Some(_) => {}
        }
    }
    for (hash, point) in &graph.points {
        if point.hash() != hash {
            report.push(Some(hash), vec![], format!("point {} is stored under a foreign hash", point));
        }
    }
    for (handle, node) in &graph.nodes {
        if node.origin.hash() != node.origin_hash {
            report.push(
                Some(&node.origin_hash),
                vec![node.node_aggregate_id.clone()],
                format!("node {:?} origin hash does not match {}", handle, node.origin),
            );
        }
        let indexed = graph.node_index.get(&(node.node_aggregate_id.clone(), node.origin_hash.clone()));
        if indexed != Some(handle) {
            report.push(
                Some(&node.origin_hash),
                vec![node.node_aggregate_id.clone()],
                format!("node {:?} is not indexed under its aggregate and origin", handle),
            );
        }
    }
}

fn no_hierarchy_cycles(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut reported: BTreeSet<(String, NodeHandle)> = BTreeSet::new();
    for edge in graph.edges.values() {
        let hash = edge.dimension_space_point_hash.as_str();
        let mut visited = BTreeSet::from([edge.child]);
        let mut current = edge.parent;
        while let Some(node) = current {
            if !visited.insert(node) {
                if reported.insert((hash.to_string(), node)) {
                    report.push(
                        Some(hash),
                        report.aggregate_of(node),
                        "hierarchy cycle".to_string(),
                    );
                }
                break;
            }
            current = graph.parent(node, hash);
        }
    }
}

fn single_parent(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut incoming: BTreeMap<(NodeHandle, &str), usize> = BTreeMap::new();
    for edge in graph.edges.values() {
        *incoming
            .entry((edge.child, edge.dimension_space_point_hash.as_str()))
            .or_default() += 1;
    }
    for ((child, hash), count) in incoming {
        if count > 1 {
            report.push(
                Some(hash),
                report.aggregate_of(child),
                format!("{} incoming edges", count),
            );
        }
    }
}

fn non_root_parents(report: &mut Report<'_>) {
    let graph = report.graph;
    for edge in graph.edges.values() {
        if edge.parent.is_some() {
            continue;
        }
        let is_root = graph
            .node(edge.child)
            .is_some_and(|n| n.classification.is_root());
        if !is_root {
            report.push(
                Some(&edge.dimension_space_point_hash),
                report.aggregate_of(edge.child),
                "non-root node has no parent",
            );
        }
    }
}

/// Every node visible in a subgraph must hang below one of its root nodes
fn reachable_from_root(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut visible: BTreeMap<&str, BTreeSet<NodeHandle>> = BTreeMap::new();
    let mut roots: BTreeMap<&str, Vec<NodeHandle>> = BTreeMap::new();
    let mut children: BTreeMap<(&str, NodeHandle), Vec<NodeHandle>> = BTreeMap::new();
    for edge in graph.edges.values() {
        let hash = edge.dimension_space_point_hash.as_str();
        visible.entry(hash).or_default().insert(edge.child);
        match edge.parent {
            Some(parent) => children.entry((hash, parent)).or_default().push(edge.child),
            None => {
                if graph.node(edge.child).is_some_and(|n| n.classification.is_root()) {
                    roots.entry(hash).or_default().push(edge.child);
                }
            }
        }
    }
    for (hash, nodes) in visible {
        let mut reached = BTreeSet::new();
        let mut pending = roots.remove(hash).unwrap_or_default();
        while let Some(node) = pending.pop() {
            if reached.insert(node) {
                if let Some(next) = children.get(&(hash, node)) {
                    pending.extend(next.iter().copied());
                }
            }
        }
        for node in nodes.difference(&reached) {
            report.push(Some(hash), report.aggregate_of(*node), "node is not reachable from a root node");
        }
    }
}

fn aggregate_ids_unique(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut visible: BTreeMap<(&str, &NodeAggregateId), BTreeSet<NodeHandle>> = BTreeMap::new();
    for edge in graph.edges.values() {
        if let Some(node) = graph.node(edge.child) {
            visible
                .entry((edge.dimension_space_point_hash.as_str(), &node.node_aggregate_id))
                .or_default()
                .insert(edge.child);
        }
    }
    for ((hash, id), handles) in visible {
        if handles.len() > 1 {
            report.push(
                Some(hash),
                vec![id.clone()],
                format!("{} nodes of the aggregate are visible", handles.len()),
            );
        }
    }
}

fn consistent_node_type(report: &mut Report<'_>) {
    let mut types: BTreeMap<&NodeAggregateId, BTreeSet<&NodeTypeName>> = BTreeMap::new();
    for node in report.graph.nodes.values() {
        types
            .entry(&node.node_aggregate_id)
            .or_default()
            .insert(&node.node_type_name);
    }
    for (id, names) in types {
        if names.len() > 1 {
            let names: Vec<&str> = names.iter().map(|n| n.as_str()).collect();
            report.push(None, vec![id.clone()], format!("node types {}", names.join(", ")));
        }
    }
}

fn consistent_classification(report: &mut Report<'_>) {
    let mut classes: BTreeMap<&NodeAggregateId, BTreeSet<&'static str>> = BTreeMap::new();
    for node in report.graph.nodes.values() {
        let class = match node.classification {
            NodeAggregateClassification::Root => "root",
            NodeAggregateClassification::Regular => "regular",
            NodeAggregateClassification::Tethered => "tethered",
        };
        classes.entry(&node.node_aggregate_id).or_default().insert(class);
    }
    for (id, classes) in classes {
        if classes.len() > 1 {
            let classes: Vec<&str> = classes.into_iter().collect();
            report.push(None, vec![id.clone()], format!("classifications {}", classes.join(", ")));
        }
    }
}

fn child_coverage(report: &mut Report<'_>) {
    let graph = report.graph;
    for edge in graph.edges.values() {
        let Some(parent) = edge.parent else {
            continue;
        };
        let hash = edge.dimension_space_point_hash.as_str();
        if graph.incoming_edge(parent, hash).is_none() {
            let mut ids = report.aggregate_of(edge.child);
            ids.extend(report.aggregate_of(parent));
            report.push(Some(hash), ids, "child is visible where its parent is not");
        }
    }
}

fn unique_origin(report: &mut Report<'_>) {
    let mut seen: BTreeMap<(&NodeAggregateId, &str), usize> = BTreeMap::new();
    for node in report.graph.nodes.values() {
        *seen
            .entry((&node.node_aggregate_id, node.origin_hash.as_str()))
            .or_default() += 1;
    }
    for ((id, hash), count) in seen {
        if count > 1 {
            report.push(Some(hash), vec![id.clone()], format!("{} nodes share the origin", count));
        }
    }
}

fn nodes_cover_origin(report: &mut Report<'_>) {
    let graph = report.graph;
    for (handle, node) in &graph.nodes {
        if node.classification.is_root() {
            continue;
        }
        if graph.incoming_edge(*handle, &node.origin_hash).is_none() {
            report.push(
                Some(&node.origin_hash),
                vec![node.node_aggregate_id.clone()],
                format!("node does not cover its origin {}", node.origin),
            );
        }
    }
}

fn sibling_positions(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut positions: BTreeMap<(&str, Option<NodeHandle>, i64), Vec<NodeHandle>> = BTreeMap::new();
    for edge in graph.edges.values() {
        positions
            .entry((edge.dimension_space_point_hash.as_str(), edge.parent, edge.position))
            .or_default()
            .push(edge.child);
    }
    for ((hash, _, position), children) in positions {
        if children.len() > 1 {
            let ids = children
                .into_iter()
                .flat_map(|c| report.aggregate_of(c))
                .collect();
            report.push(Some(hash), ids, format!("siblings share position {}", position));
        }
    }
}

fn tethered_named(report: &mut Report<'_>) {
    for node in report.graph.nodes.values() {
        if node.classification.is_tethered() && node.node_name.is_none() {
            report.push(
                Some(&node.origin_hash),
                vec![node.node_aggregate_id.clone()],
                "tethered node has no name",
            );
        }
    }
}

fn restriction_integrity(report: &mut Report<'_>) {
    let graph = report.graph;
    for restriction in &graph.restrictions {
        let hash = restriction.dimension_space_point_hash.as_str();
        let ids = vec![
            restriction.origin_node_aggregate_id.clone(),
            restriction.affected_node_aggregate_id.clone(),
        ];
        if graph.node_covering(&restriction.origin_node_aggregate_id, hash).is_none() {
            report.push(Some(hash), ids.clone(), "disabled aggregate does not cover the point");
        }
        let Some(affected) = graph.node_covering(&restriction.affected_node_aggregate_id, hash) else {
            report.push(Some(hash), ids, "restricted aggregate does not cover the point");
            continue;
        };
        for child in graph.children(Some(affected), hash) {
            let Some(node) = graph.node(child) else {
                continue;
            };
            let expected = RestrictionEdge {
                dimension_space_point_hash: hash.to_string(),
                origin_node_aggregate_id: restriction.origin_node_aggregate_id.clone(),
                affected_node_aggregate_id: node.node_aggregate_id.clone(),
            };
            if !graph.restrictions.contains(&expected) {
                report.push(
                    Some(hash),
                    vec![
                        restriction.origin_node_aggregate_id.clone(),
                        node.node_aggregate_id.clone(),
                    ],
                    "restriction does not reach a descendant",
                );
            }
        }
    }
}

fn reference_integrity(report: &mut Report<'_>) {
    let graph = report.graph;
    for reference in &graph.references {
        let Some(source) = graph.node(reference.source) else {
            report.push(None, vec![reference.target.clone()], format!("reference {} has no source node", reference.name));
            continue;
        };
        for point in &graph.covered_points(reference.source) {
            if graph.node_covering(&reference.target, point.hash()).is_none() {
                report.push(
                    Some(point.hash()),
                    vec![source.node_aggregate_id.clone(), reference.target.clone()],
                    format!("reference {} target is not visible where the source is", reference.name),
                );
            }
        }
    }
}

fn reference_positions(report: &mut Report<'_>) {
    let graph = report.graph;
    let mut positions: BTreeMap<(NodeHandle, &str, u32), usize> = BTreeMap::new();
    for reference in &graph.references {
        *positions
            .entry((reference.source, reference.name.as_str(), reference.position))
            .or_default() += 1;
    }
    for ((source, name, position), count) in positions {
        if count > 1 {
            report.push(
                None,
                report.aggregate_of(source),
                format!("{} references {} share position {}", count, name, position),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
    use crate::events::*;
    use crate::model::{
        InterdimensionalSiblings, NodeName, NodeTypeName, ReferenceName, SerializedPropertyValues,
    };
    use crate::projection::apply;

    fn id(s: &str) -> NodeAggregateId {
        NodeAggregateId::new(s).unwrap()
    }

    fn point() -> DimensionSpacePoint {
        DimensionSpacePoint::from_pairs([("language", "de")])
    }

    fn sample_graph() -> ContentGraph {
        let cs = ContentStreamId::new("cs").unwrap();
        let points = DimensionSpacePointSet::single(point());
        let events = vec![
            Event::RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated {
                content_stream_id: cs.clone(),
                node_aggregate_id: id("root"),
                node_type_name: NodeTypeName::new("Sites").unwrap(),
                covered_dimension_space_points: points.clone(),
                node_aggregate_classification: NodeAggregateClassification::Root,
            }),
            Event::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
                content_stream_id: cs.clone(),
                node_aggregate_id: id("a"),
                node_type_name: NodeTypeName::new("Page").unwrap(),
                origin_dimension_space_point: OriginDimensionSpacePoint::from_point(point()),
                succeeding_siblings_for_coverage: InterdimensionalSiblings::append_at(&points),
                parent_node_aggregate_id: id("root"),
                node_name: Some(NodeName::new("a").unwrap()),
                initial_property_values: SerializedPropertyValues::new(),
                node_aggregate_classification: NodeAggregateClassification::Regular,
                tethered_descendants: vec![],
            }),
            Event::NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated {
                content_stream_id: cs.clone(),
                node_aggregate_id: id("b"),
                node_type_name: NodeTypeName::new("Page").unwrap(),
                origin_dimension_space_point: OriginDimensionSpacePoint::from_point(point()),
                succeeding_siblings_for_coverage: InterdimensionalSiblings::append_at(&points),
                parent_node_aggregate_id: id("a"),
                node_name: None,
                initial_property_values: SerializedPropertyValues::new(),
                node_aggregate_classification: NodeAggregateClassification::Regular,
                tethered_descendants: vec![],
            }),
            Event::NodeReferencesWereSet(NodeReferencesWereSet {
                content_stream_id: cs.clone(),
                source_node_aggregate_id: id("b"),
                affected_source_origin_dimension_space_points: vec![OriginDimensionSpacePoint::from_point(point())],
                reference_name: ReferenceName::new("related").unwrap(),
                references: vec![SerializedReference {
                    target_node_aggregate_id: id("a"),
                    properties: None,
                }],
            }),
            Event::NodeAggregateWasDisabled(NodeAggregateWasDisabled {
                content_stream_id: cs.clone(),
                node_aggregate_id: id("a"),
                affected_dimension_space_points: points.clone(),
            }),
        ];
        events
            .iter()
            .try_fold(ContentGraph::new(cs), |graph, event| apply(graph, event))
            .unwrap()
    }

    fn violations(graph: &ContentGraph, check: IntegrityCheck) -> Vec<IntegrityViolation> {
        super::check(graph, &[check]).remove(0).violations
    }

    fn handle(graph: &ContentGraph, s: &str) -> NodeHandle {
        graph.node_handle(&id(s), &point()).unwrap()
    }

    #[test]
    fn test_folded_graph_passes_every_check() {
        let graph = sample_graph();
        let results = check_all(&graph);
        assert_eq!(results.len(), IntegrityCheck::ALL.len());
        for result in results {
            assert!(result.is_ok(), "{:?}", result.violations);
        }
    }

    #[test]
    fn test_second_parent_is_reported() {
        let mut graph = sample_graph();
        let b = handle(&graph, "b");
        graph.add_edge(None, b, point().hash(), 999);
        let found = violations(&graph, IntegrityCheck::SingleParentPerSubgraph);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_aggregate_ids, vec![id("b")]);
        assert_eq!(found[0].dimension_space_point_hash.as_deref(), Some(point().hash()));
    }

    #[test]
    fn test_non_root_node_without_parent_is_reported() {
        let mut graph = sample_graph();
        let b = handle(&graph, "b");
        let edge = graph.incoming_edge(b, point().hash()).unwrap();
        graph.remove_edge(edge);
        graph.add_edge(None, b, point().hash(), 9999);
        let found = violations(&graph, IntegrityCheck::NonRootNodesHaveParents);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_aggregate_ids, vec![id("b")]);
        // no second parent, so the older check stays silent
        assert!(violations(&graph, IntegrityCheck::SingleParentPerSubgraph).is_empty());
    }

    #[test]
    fn test_node_detached_from_root_is_reported() {
        let mut graph = sample_graph();
        let a = handle(&graph, "a");
        let edge = graph.incoming_edge(a, point().hash()).unwrap();
        graph.remove_edge(edge);
        let found = violations(&graph, IntegrityCheck::NodesReachableFromRoot);
        // a is gone from the subgraph, b still hangs below it
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_aggregate_ids, vec![id("b")]);
        assert!(violations(&graph, IntegrityCheck::NonRootNodesHaveParents).is_empty());
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut graph = sample_graph();
        let a = handle(&graph, "a");
        let b = handle(&graph, "b");
        let edge = graph.incoming_edge(a, point().hash()).unwrap();
        graph.remove_edge(edge);
        graph.add_edge(Some(b), a, point().hash(), 0);
        assert!(!violations(&graph, IntegrityCheck::NoHierarchyCycles).is_empty());
    }

    #[test]
    fn test_duplicate_sibling_position_is_reported() {
        let mut graph = sample_graph();
        let root = handle_at_root(&graph);
        let b = handle(&graph, "b");
        let position = graph.child_edges(Some(root), point().hash())[0].1.position;
        let edge = graph.incoming_edge(b, point().hash()).unwrap();
        graph.remove_edge(edge);
        graph.add_edge(Some(root), b, point().hash(), position);
        let found = violations(&graph, IntegrityCheck::DistinctSiblingPositions);
        assert_eq!(found.len(), 1);
    }

    fn handle_at_root(graph: &ContentGraph) -> NodeHandle {
        graph
            .node_handle(&id("root"), &DimensionSpacePoint::empty())
            .unwrap()
    }

    #[test]
    fn test_missing_restriction_propagation_is_reported() {
        let mut graph = sample_graph();
        graph.restrictions.retain(|r| r.affected_node_aggregate_id != id("b"));
        let found = violations(&graph, IntegrityCheck::RestrictionIntegrity);
        assert_eq!(found.len(), 1);
        assert!(found[0].node_aggregate_ids.contains(&id("b")));
    }

    #[test]
    fn test_corrupted_origin_hash_is_reported() {
        let mut graph = sample_graph();
        let b = handle(&graph, "b");
        graph.nodes.get_mut(&b).unwrap().origin_hash = "bogus".to_string();
        assert!(!violations(&graph, IntegrityCheck::HierarchyIntegrity).is_empty());
    }

    #[test]
    fn test_unnamed_tethered_node_is_reported() {
        let mut graph = sample_graph();
        let b = handle(&graph, "b");
        graph.nodes.get_mut(&b).unwrap().classification = NodeAggregateClassification::Tethered;
        assert_eq!(violations(&graph, IntegrityCheck::TetheredNodesAreNamed).len(), 1);
    }

    #[test]
    fn test_inconsistent_node_type_is_reported() {
        let mut graph = sample_graph();
        let a = handle(&graph, "a");
        let record = graph.node(a).unwrap().clone();
        let mut other = record.clone();
        other.origin = OriginDimensionSpacePoint::from_pairs([("language", "en")]);
        other.origin_hash = other.origin.hash().to_string();
        other.node_type_name = NodeTypeName::new("Other").unwrap();
        graph.add_node(other).unwrap();
        let found = violations(&graph, IntegrityCheck::ConsistentNodeTypePerAggregate);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].node_aggregate_ids, vec![id("a")]);
        // the stray node has no edge
        assert_eq!(violations(&graph, IntegrityCheck::NodesCoverTheirOrigin).len(), 1);
    }

    #[test]
    fn test_reference_to_invisible_target_is_reported() {
        let mut graph = sample_graph();
        graph.references[0].target = id("nowhere");
        assert_eq!(violations(&graph, IntegrityCheck::ReferenceIntegrity).len(), 1);
    }

    #[test]
    fn test_duplicate_reference_position_is_reported() {
        let mut graph = sample_graph();
        let duplicate = graph.references[0].clone();
        graph.references.push(duplicate);
        assert_eq!(violations(&graph, IntegrityCheck::DistinctReferencePositions).len(), 1);
    }

    #[test]
    fn test_child_outside_parent_coverage_is_reported() {
        let mut graph = sample_graph();
        let a = handle(&graph, "a");
        let b = handle(&graph, "b");
        let en = DimensionSpacePoint::from_pairs([("language", "en")]);
        graph.register_point(&en);
        graph.add_edge(Some(a), b, en.hash(), 0);
        assert_eq!(violations(&graph, IntegrityCheck::ChildCoverageWithinParentCoverage).len(), 1);
    }
}
