//! Content graph arena
//!
//! Nodes and hierarchy edges live in ordered maps keyed by integer handles;
//! adjacency is answered by secondary indexes. Nothing holds a reference to
//! another record, so the whole graph is a plain value: cloning it yields an
//! independent snapshot and two graphs compare with `==`.

use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
use crate::model::{
    ContentStreamId, NodeAggregateClassification, NodeAggregateId, NodeName, NodeTypeName,
    ReferenceName, SerializedPropertyValues,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeId(pub(crate) u64);

/// One variant of a node aggregate, materialized at its origin
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    pub node_aggregate_id: NodeAggregateId,
    pub origin: OriginDimensionSpacePoint,
    /// Denormalized copy of `origin.hash()`
    pub origin_hash: String,
    pub node_type_name: NodeTypeName,
    pub node_name: Option<NodeName>,
    pub classification: NodeAggregateClassification,
    pub properties: SerializedPropertyValues,
}

/// Parent → child at one dimension space point; `parent == None` is the root
/// marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyEdge {
    pub parent: Option<NodeHandle>,
    pub child: NodeHandle,
    pub dimension_space_point_hash: String,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceEdge {
    pub source: NodeHandle,
    pub name: ReferenceName,
    pub position: u32,
    pub target: NodeAggregateId,
    pub properties: Option<SerializedPropertyValues>,
}

/// `origin` being disabled hides `affected` at the point
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RestrictionEdge {
    pub dimension_space_point_hash: String,
    pub origin_node_aggregate_id: NodeAggregateId,
    pub affected_node_aggregate_id: NodeAggregateId,
}

/// Aggregate-level view assembled from the aggregate's nodes and edges
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAggregate {
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub node_name: Option<NodeName>,
    pub classification: NodeAggregateClassification,
    pub occupied: Vec<OriginDimensionSpacePoint>,
    /// origin hash → points the node at that origin is visible in
    pub coverage_by_origin: BTreeMap<String, DimensionSpacePointSet>,
    pub covered: DimensionSpacePointSet,
    pub disabled: DimensionSpacePointSet,
}

impl NodeAggregate {
    pub fn occupies(&self, origin: &DimensionSpacePoint) -> bool {
        self.occupied.iter().any(|o| o.as_point() == origin)
    }

    pub fn occupied_points(&self) -> DimensionSpacePointSet {
        self.occupied.iter().map(|o| o.to_point()).collect()
    }

    pub fn covers(&self, point: &DimensionSpacePoint) -> bool {
        self.covered.contains(point)
    }

    pub fn is_disabled_in(&self, point: &DimensionSpacePoint) -> bool {
        self.disabled.contains(point)
    }

    pub fn coverage_of(&self, origin: &DimensionSpacePoint) -> DimensionSpacePointSet {
        self.coverage_by_origin
            .get(origin.hash())
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentGraph {
    pub(crate) content_stream_id: ContentStreamId,
    pub(crate) next_handle: u64,
    pub(crate) next_edge: u64,
    pub(crate) nodes: BTreeMap<NodeHandle, NodeRecord>,
    pub(crate) node_index: BTreeMap<(NodeAggregateId, String), NodeHandle>,
    pub(crate) points: BTreeMap<String, DimensionSpacePoint>,
    pub(crate) edges: BTreeMap<EdgeId, HierarchyEdge>,
    pub(crate) children_index: BTreeMap<(String, Option<NodeHandle>), BTreeSet<EdgeId>>,
    pub(crate) incoming_index: BTreeMap<NodeHandle, BTreeSet<EdgeId>>,
    pub(crate) references: Vec<ReferenceEdge>,
    pub(crate) restrictions: BTreeSet<RestrictionEdge>,
}

impl ContentGraph {
    pub fn new(content_stream_id: ContentStreamId) -> Self {
        Self {
            content_stream_id,
            next_handle: 0,
            next_edge: 0,
            nodes: BTreeMap::new(),
            node_index: BTreeMap::new(),
            points: BTreeMap::new(),
            edges: BTreeMap::new(),
            children_index: BTreeMap::new(),
            incoming_index: BTreeMap::new(),
            references: Vec::new(),
            restrictions: BTreeSet::new(),
        }
    }

    pub fn content_stream_id(&self) -> &ContentStreamId {
        &self.content_stream_id
    }

    /// Same graph under another stream id, as a fork starts out
    pub(crate) fn rekeyed(mut self, content_stream_id: ContentStreamId) -> Self {
        self.content_stream_id = content_stream_id;
        self
    }

    // ----- mutation primitives (used by the fold only) -----

    pub(crate) fn register_point(&mut self, point: &DimensionSpacePoint) {
        self.points
            .entry(point.hash().to_string())
            .or_insert_with(|| point.clone());
    }

    /// Returns `None` when the aggregate already occupies the origin
    pub(crate) fn add_node(&mut self, record: NodeRecord) -> Option<NodeHandle> {
        let key = (record.node_aggregate_id.clone(), record.origin_hash.clone());
        if self.node_index.contains_key(&key) {
            return None;
        }
        self.register_point(record.origin.as_point());
        let handle = NodeHandle(self.next_handle);
        self.next_handle += 1;
        self.node_index.insert(key, handle);
        self.nodes.insert(handle, record);
        Some(handle)
    }

    pub(crate) fn remove_node(&mut self, handle: NodeHandle) {
        if let Some(record) = self.nodes.remove(&handle) {
            self.node_index
                .remove(&(record.node_aggregate_id, record.origin_hash));
        }
        self.incoming_index.remove(&handle);
        self.references.retain(|r| r.source != handle);
    }

    pub(crate) fn add_edge(
        &mut self,
        parent: Option<NodeHandle>,
        child: NodeHandle,
        point_hash: &str,
        position: i64,
    ) -> EdgeId {
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.children_index
            .entry((point_hash.to_string(), parent))
            .or_default()
            .insert(id);
        self.incoming_index.entry(child).or_default().insert(id);
        self.edges.insert(
            id,
            HierarchyEdge {
                parent,
                child,
                dimension_space_point_hash: point_hash.to_string(),
                position,
            },
        );
        id
    }

    pub(crate) fn remove_edge(&mut self, id: EdgeId) -> Option<HierarchyEdge> {
        let edge = self.edges.remove(&id)?;
        let key = (edge.dimension_space_point_hash.clone(), edge.parent);
        if let Some(set) = self.children_index.get_mut(&key) {
            set.remove(&id);
            if set.is_empty() {
                self.children_index.remove(&key);
            }
        }
        if let Some(set) = self.incoming_index.get_mut(&edge.child) {
            set.remove(&id);
            if set.is_empty() {
                self.incoming_index.remove(&edge.child);
            }
        }
        Some(edge)
    }

    /// Replace an edge, keeping indexes in sync
    pub(crate) fn replace_edge(&mut self, id: EdgeId, edge: HierarchyEdge) -> EdgeId {
        self.remove_edge(id);
        self.add_edge(edge.parent, edge.child, &edge.dimension_space_point_hash, edge.position)
    }

    pub(crate) fn set_position(&mut self, id: EdgeId, position: i64) {
        if let Some(edge) = self.edges.get_mut(&id) {
            edge.position = position;
        }
    }

    // ----- node lookups -----

    pub fn node(&self, handle: NodeHandle) -> Option<&NodeRecord> {
        self.nodes.get(&handle)
    }

    pub fn node_handle(&self, id: &NodeAggregateId, origin: &DimensionSpacePoint) -> Option<NodeHandle> {
        self.node_index
            .get(&(id.clone(), origin.hash().to_string()))
            .copied()
    }

    pub fn node_by_origin(&self, id: &NodeAggregateId, origin: &DimensionSpacePoint) -> Option<&NodeRecord> {
        self.node_handle(id, origin).and_then(|h| self.node(h))
    }

    /// All nodes of an aggregate, in origin hash order
    pub fn aggregate_nodes(&self, id: &NodeAggregateId) -> Vec<NodeHandle> {
        self.node_index
            .range((id.clone(), String::new())..)
            .take_while(|((aggregate, _), _)| aggregate == id)
            .map(|(_, handle)| *handle)
            .collect()
    }

    pub fn aggregate_exists(&self, id: &NodeAggregateId) -> bool {
        !self.aggregate_nodes(id).is_empty()
    }

    /// The aggregate's node visible at the point
    pub fn node_covering(&self, id: &NodeAggregateId, point_hash: &str) -> Option<NodeHandle> {
        self.aggregate_nodes(id)
            .into_iter()
            .find(|h| self.incoming_edge(*h, point_hash).is_some())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeHandle, &NodeRecord)> {
        self.nodes.iter().map(|(h, n)| (*h, n))
    }

    pub fn node_aggregate_ids(&self) -> BTreeSet<NodeAggregateId> {
        self.node_index.keys().map(|(id, _)| id.clone()).collect()
    }

    pub fn root_node_aggregate_ids(&self) -> Vec<NodeAggregateId> {
        self.nodes
            .values()
            .filter(|n| n.classification.is_root())
            .map(|n| n.node_aggregate_id.clone())
            .collect()
    }

    pub fn node_aggregate(&self, id: &NodeAggregateId) -> Option<NodeAggregate> {
        let handles = self.aggregate_nodes(id);
        let first = self.node(*handles.first()?)?;

        let mut occupied = Vec::new();
        let mut coverage_by_origin = BTreeMap::new();
        let mut covered = DimensionSpacePointSet::new();
        for handle in &handles {
            let Some(record) = self.node(*handle) else {
                continue;
            };
            occupied.push(record.origin.clone());
            let coverage = self.covered_points(*handle);
            covered = covered.union(&coverage);
            coverage_by_origin.insert(record.origin_hash.clone(), coverage);
        }

        let disabled = self
            .restrictions
            .iter()
            .filter(|r| &r.origin_node_aggregate_id == id && &r.affected_node_aggregate_id == id)
            .filter_map(|r| self.point(&r.dimension_space_point_hash).cloned())
            .collect();

        Some(NodeAggregate {
            node_aggregate_id: id.clone(),
            node_type_name: first.node_type_name.clone(),
            node_name: first.node_name.clone(),
            classification: first.classification,
            occupied,
            coverage_by_origin,
            covered,
            disabled,
        })
    }

    // ----- hierarchy lookups -----

    pub fn point(&self, hash: &str) -> Option<&DimensionSpacePoint> {
        self.points.get(hash)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&HierarchyEdge> {
        self.edges.get(&id)
    }

    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &HierarchyEdge)> {
        self.edges.iter().map(|(id, e)| (*id, e))
    }

    pub fn incoming_edges(&self, child: NodeHandle) -> Vec<EdgeId> {
        self.incoming_index
            .get(&child)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn incoming_edge(&self, child: NodeHandle, point_hash: &str) -> Option<EdgeId> {
        self.incoming_index.get(&child)?.iter().copied().find(|id| {
            self.edges
                .get(id)
                .map(|e| e.dimension_space_point_hash == point_hash)
                .unwrap_or(false)
        })
    }

    pub fn covered_points(&self, handle: NodeHandle) -> DimensionSpacePointSet {
        self.incoming_edges(handle)
            .into_iter()
            .filter_map(|id| self.edges.get(&id))
            .filter_map(|e| self.point(&e.dimension_space_point_hash).cloned())
            .collect()
    }

    /// `None` for root-level nodes and for nodes not visible at the point
    pub fn parent(&self, child: NodeHandle, point_hash: &str) -> Option<NodeHandle> {
        let id = self.incoming_edge(child, point_hash)?;
        self.edges.get(&id)?.parent
    }

    /// Outgoing edges at the point, ordered by position
    pub fn child_edges(&self, parent: Option<NodeHandle>, point_hash: &str) -> Vec<(EdgeId, &HierarchyEdge)> {
        let mut edges: Vec<_> = self
            .children_index
            .get(&(point_hash.to_string(), parent))
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id).map(|e| (*id, e)))
            .collect();
        edges.sort_by_key(|(id, e)| (e.position, *id));
        edges
    }

    pub fn children(&self, parent: Option<NodeHandle>, point_hash: &str) -> Vec<NodeHandle> {
        self.child_edges(parent, point_hash)
            .into_iter()
            .map(|(_, e)| e.child)
            .collect()
    }

    /// Child aggregates of `parent` at the point, in sibling order
    pub fn child_aggregates(&self, parent: &NodeAggregateId, point_hash: &str) -> Vec<NodeAggregateId> {
        let Some(parent_handle) = self.node_covering(parent, point_hash) else {
            return Vec::new();
        };
        self.children(Some(parent_handle), point_hash)
            .into_iter()
            .filter_map(|h| self.node(h).map(|n| n.node_aggregate_id.clone()))
            .collect()
    }

    /// Distinct children over all points
    pub fn all_children(&self, parent: NodeHandle) -> BTreeSet<NodeHandle> {
        self.edges
            .values()
            .filter(|e| e.parent == Some(parent))
            .map(|e| e.child)
            .collect()
    }

    /// Aggregate of the node's parent at any point it is visible in
    pub fn parent_aggregate(&self, child: NodeHandle) -> Option<NodeAggregateId> {
        self.incoming_edges(child)
            .into_iter()
            .filter_map(|id| self.edges.get(&id)?.parent)
            .find_map(|p| self.node(p).map(|n| n.node_aggregate_id.clone()))
    }

    /// Transitive descendants at the point, breadth first
    pub fn descendants(&self, handle: NodeHandle, point_hash: &str) -> Vec<NodeHandle> {
        let mut visited = BTreeSet::from([handle]);
        let mut queue = VecDeque::from([handle]);
        let mut result = Vec::new();
        while let Some(current) = queue.pop_front() {
            for child in self.children(Some(current), point_hash) {
                if visited.insert(child) {
                    result.push(child);
                    queue.push_back(child);
                }
            }
        }
        result
    }

    pub fn has_edges_at(&self, point_hash: &str) -> bool {
        self.edges
            .values()
            .any(|e| e.dimension_space_point_hash == point_hash)
    }

    pub fn node_count_at(&self, point_hash: &str) -> usize {
        self.edges
            .values()
            .filter(|e| e.dimension_space_point_hash == point_hash)
            .count()
    }

    // ----- references and restrictions -----

    pub fn references(&self) -> &[ReferenceEdge] {
        &self.references
    }

    /// Outgoing references of a node, ordered by name and position
    pub fn references_from(&self, source: NodeHandle, name: Option<&ReferenceName>) -> Vec<&ReferenceEdge> {
        let mut references: Vec<_> = self
            .references
            .iter()
            .filter(|r| r.source == source && name.map(|n| &r.name == n).unwrap_or(true))
            .collect();
        references.sort_by(|a, b| (&a.name, a.position).cmp(&(&b.name, b.position)));
        references
    }

    pub fn restrictions(&self) -> &BTreeSet<RestrictionEdge> {
        &self.restrictions
    }

    pub fn is_restricted(&self, id: &NodeAggregateId, point_hash: &str) -> bool {
        self.restrictions.iter().any(|r| {
            &r.affected_node_aggregate_id == id && r.dimension_space_point_hash == point_hash
        })
    }
}
