//! Read access to one dimension space point of a content graph

use super::graph::{ContentGraph, NodeHandle};
use crate::dimension::{DimensionSpacePoint, OriginDimensionSpacePoint};
use crate::model::{
    ContentStreamId, NodeAggregateClassification, NodeAggregateId, NodeName, NodeTypeName,
    ReferenceName, SerializedPropertyValues,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VisibilityConstraints {
    pub include_disabled: bool,
}

impl VisibilityConstraints {
    /// Disabled nodes and everything below them are hidden
    pub fn frontend() -> Self {
        Self {
            include_disabled: false,
        }
    }

    pub fn without_restrictions() -> Self {
        Self {
            include_disabled: true,
        }
    }
}

/// A node as seen from a subgraph
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub content_stream_id: ContentStreamId,
    pub dimension_space_point: DimensionSpacePoint,
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub node_type_name: NodeTypeName,
    pub node_name: Option<NodeName>,
    pub classification: NodeAggregateClassification,
    pub properties: SerializedPropertyValues,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    pub name: ReferenceName,
    pub node: Node,
    pub properties: Option<SerializedPropertyValues>,
}

/// The graph restricted to one point and a visibility rule
pub struct ContentSubgraph<'a> {
    graph: &'a ContentGraph,
    point: DimensionSpacePoint,
    visibility: VisibilityConstraints,
}

impl<'a> ContentSubgraph<'a> {
    pub fn new(
        graph: &'a ContentGraph,
        point: DimensionSpacePoint,
        visibility: VisibilityConstraints,
    ) -> Self {
        Self {
            graph,
            point,
            visibility,
        }
    }

    pub fn dimension_space_point(&self) -> &DimensionSpacePoint {
        &self.point
    }

    fn visible(&self, handle: NodeHandle) -> bool {
        let Some(record) = self.graph.node(handle) else {
            return false;
        };
        self.graph.incoming_edge(handle, self.point.hash()).is_some()
            && (self.visibility.include_disabled
                || !self
                    .graph
                    .is_restricted(&record.node_aggregate_id, self.point.hash()))
    }

    fn to_node(&self, handle: NodeHandle) -> Option<Node> {
        let record = self.graph.node(handle)?;
        Some(Node {
            content_stream_id: self.graph.content_stream_id().clone(),
            dimension_space_point: self.point.clone(),
            node_aggregate_id: record.node_aggregate_id.clone(),
            origin_dimension_space_point: record.origin.clone(),
            node_type_name: record.node_type_name.clone(),
            node_name: record.node_name.clone(),
            classification: record.classification,
            properties: record.properties.clone(),
        })
    }

    fn handle_of(&self, id: &NodeAggregateId) -> Option<NodeHandle> {
        self.graph
            .node_covering(id, self.point.hash())
            .filter(|h| self.visible(*h))
    }

    pub fn find_node_by_id(&self, id: &NodeAggregateId) -> Option<Node> {
        self.handle_of(id).and_then(|h| self.to_node(h))
    }

    /// `None` for root nodes, invisible children and invisible parents
    pub fn find_parent_node(&self, child: &NodeAggregateId) -> Option<Node> {
        let child = self.handle_of(child)?;
        let parent = self.graph.parent(child, self.point.hash())?;
        if !self.visible(parent) {
            return None;
        }
        self.to_node(parent)
    }

    pub fn find_child_nodes(&self, parent: &NodeAggregateId) -> Vec<Node> {
        let Some(parent) = self.handle_of(parent) else {
            return Vec::new();
        };
        self.graph
            .children(Some(parent), self.point.hash())
            .into_iter()
            .filter(|h| self.visible(*h))
            .filter_map(|h| self.to_node(h))
            .collect()
    }

    pub fn find_child_node_by_name(&self, parent: &NodeAggregateId, name: &NodeName) -> Option<Node> {
        self.find_child_nodes(parent)
            .into_iter()
            .find(|n| n.node_name.as_ref() == Some(name))
    }

    /// Outgoing references of the visible source node whose targets are
    /// visible too, by name and position
    pub fn find_references(&self, source: &NodeAggregateId, name: Option<&ReferenceName>) -> Vec<Reference> {
        let Some(source) = self.handle_of(source) else {
            return Vec::new();
        };
        self.graph
            .references_from(source, name)
            .into_iter()
            .filter_map(|reference| {
                let node = self.find_node_by_id(&reference.target)?;
                Some(Reference {
                    name: reference.name.clone(),
                    node,
                    properties: reference.properties.clone(),
                })
            })
            .collect()
    }

    pub fn find_root_nodes(&self) -> Vec<Node> {
        self.graph
            .children(None, self.point.hash())
            .into_iter()
            .filter(|h| self.visible(*h))
            .filter_map(|h| self.to_node(h))
            .collect()
    }

    /// Visible descendants, breadth first; hidden nodes hide their subtree
    pub fn find_descendants(&self, ancestor: &NodeAggregateId) -> Vec<Node> {
        let Some(start) = self.handle_of(ancestor) else {
            return Vec::new();
        };
        let mut result = Vec::new();
        let mut frontier = vec![start];
        let mut visited = std::collections::BTreeSet::from([start]);
        while !frontier.is_empty() {
            let mut next = Vec::new();
            for handle in frontier {
                for child in self.graph.children(Some(handle), self.point.hash()) {
                    if self.visible(child) && visited.insert(child) {
                        if let Some(node) = self.to_node(child) {
                            result.push(node);
                        }
                        next.push(child);
                    }
                }
            }
            frontier = next;
        }
        result
    }

    pub fn count_nodes(&self) -> usize {
        self.graph
            .edges()
            .filter(|(_, e)| e.dimension_space_point_hash == self.point.hash())
            .filter(|(_, e)| self.visible(e.child))
            .count()
    }
}
