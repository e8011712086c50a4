//! Domain events
//!
//! Events are the only source of truth: every projection is a fold over
//! them. The wire form is `{ "type": "<EventName>", "payload": { ... } }`
//! with camelCase payload fields; stores keep type and payload apart.

pub mod legacy;

use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
use crate::errors::{ContentGraphError, Result};
use crate::model::{
    ContentStreamId, InterdimensionalSiblings, NodeAggregateClassification, NodeAggregateId,
    NodeName, NodeTypeName, ReferenceName, SerializedPropertyValues, WorkspaceName,
};
use serde::{Deserialize, Serialize};

// ===== Content stream events =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasCreated {
    pub content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasForked {
    pub new_content_stream_id: ContentStreamId,
    pub source_content_stream_id: ContentStreamId,
    /// Version of the source stream the fork branches off at
    pub version_of_source_content_stream: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentStreamWasRemoved {
    pub content_stream_id: ContentStreamId,
}

// ===== Node creation =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootNodeAggregateWithNodeWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub covered_dimension_space_points: DimensionSpacePointSet,
    #[serde(default = "root_classification")]
    pub node_aggregate_classification: NodeAggregateClassification,
}

fn root_classification() -> NodeAggregateClassification {
    NodeAggregateClassification::Root
}

fn regular_classification() -> NodeAggregateClassification {
    NodeAggregateClassification::Regular
}

/// A tethered child created along with its parent, possibly with children
/// of its own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TetheredDescendant {
    pub node_aggregate_id: NodeAggregateId,
    pub node_name: NodeName,
    pub node_type_name: NodeTypeName,
    #[serde(default)]
    pub initial_property_values: SerializedPropertyValues,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TetheredDescendant>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWithNodeWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    /// One entry per covered point
    pub succeeding_siblings_for_coverage: InterdimensionalSiblings,
    pub parent_node_aggregate_id: NodeAggregateId,
    #[serde(default)]
    pub node_name: Option<NodeName>,
    #[serde(default)]
    pub initial_property_values: SerializedPropertyValues,
    #[serde(default = "regular_classification")]
    pub node_aggregate_classification: NodeAggregateClassification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tethered_descendants: Vec<TetheredDescendant>,
}

// ===== Node modification =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePropertiesWereSet {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub property_values: SerializedPropertyValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedReference {
    pub target_node_aggregate_id: NodeAggregateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SerializedPropertyValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReferencesWereSet {
    pub content_stream_id: ContentStreamId,
    pub source_node_aggregate_id: NodeAggregateId,
    pub affected_source_origin_dimension_space_points: Vec<OriginDimensionSpacePoint>,
    pub reference_name: ReferenceName,
    /// Ordered; an empty list clears the reference
    pub references: Vec<SerializedReference>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWasDisabled {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub affected_dimension_space_points: DimensionSpacePointSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWasEnabled {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub affected_dimension_space_points: DimensionSpacePointSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateWasRemoved {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub affected_occupied_dimension_space_points: Vec<OriginDimensionSpacePoint>,
    pub affected_covered_dimension_space_points: DimensionSpacePointSet,
}

// ===== Dimension space adjustment =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSpacePointWasMoved {
    pub content_stream_id: ContentStreamId,
    pub source: DimensionSpacePoint,
    pub target: DimensionSpacePoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionShineThroughWasAdded {
    pub content_stream_id: ContentStreamId,
    pub source: DimensionSpacePoint,
    pub target: DimensionSpacePoint,
}

// ===== Node variation =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSpecializationVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub specialization_origin: OriginDimensionSpacePoint,
    pub specialization_coverage: DimensionSpacePointSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeGeneralizationVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub generalization_origin: OriginDimensionSpacePoint,
    pub generalization_coverage: DimensionSpacePointSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePeerVariantWasCreated {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub peer_origin: OriginDimensionSpacePoint,
    pub peer_coverage: DimensionSpacePointSet,
}

// ===== Workspace events =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootWorkspaceWasCreated {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasCreated {
    pub workspace_name: WorkspaceName,
    pub base_workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasDiscarded {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
    pub previous_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasPublished {
    pub source_workspace_name: WorkspaceName,
    pub target_workspace_name: WorkspaceName,
    pub new_source_content_stream_id: ContentStreamId,
    pub previous_source_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceWasRebased {
    pub workspace_name: WorkspaceName,
    pub new_content_stream_id: ContentStreamId,
    pub previous_content_stream_id: ContentStreamId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRebaseFailed {
    pub workspace_name: WorkspaceName,
    pub candidate_content_stream_id: ContentStreamId,
    pub previous_content_stream_id: ContentStreamId,
    /// One entry per command that could not be re-applied
    pub failed_commands: Vec<String>,
}

/// Every event the repository records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    ContentStreamWasCreated(ContentStreamWasCreated),
    ContentStreamWasForked(ContentStreamWasForked),
    ContentStreamWasRemoved(ContentStreamWasRemoved),
    RootNodeAggregateWithNodeWasCreated(RootNodeAggregateWithNodeWasCreated),
    NodeAggregateWithNodeWasCreated(NodeAggregateWithNodeWasCreated),
    NodePropertiesWereSet(NodePropertiesWereSet),
    NodeReferencesWereSet(NodeReferencesWereSet),
    NodeAggregateWasDisabled(NodeAggregateWasDisabled),
    NodeAggregateWasEnabled(NodeAggregateWasEnabled),
    NodeAggregateWasRemoved(NodeAggregateWasRemoved),
    DimensionSpacePointWasMoved(DimensionSpacePointWasMoved),
    DimensionShineThroughWasAdded(DimensionShineThroughWasAdded),
    NodeSpecializationVariantWasCreated(NodeSpecializationVariantWasCreated),
    NodeGeneralizationVariantWasCreated(NodeGeneralizationVariantWasCreated),
    NodePeerVariantWasCreated(NodePeerVariantWasCreated),
    RootWorkspaceWasCreated(RootWorkspaceWasCreated),
    WorkspaceWasCreated(WorkspaceWasCreated),
    WorkspaceWasDiscarded(WorkspaceWasDiscarded),
    WorkspaceWasPublished(WorkspaceWasPublished),
    WorkspaceWasRebased(WorkspaceWasRebased),
    WorkspaceRebaseFailed(WorkspaceRebaseFailed),
}

/// Names of all event types, as stored
pub const EVENT_TYPES: &[&str] = &[
    "ContentStreamWasCreated",
    "ContentStreamWasForked",
    "ContentStreamWasRemoved",
    "RootNodeAggregateWithNodeWasCreated",
    "NodeAggregateWithNodeWasCreated",
    "NodePropertiesWereSet",
    "NodeReferencesWereSet",
    "NodeAggregateWasDisabled",
    "NodeAggregateWasEnabled",
    "NodeAggregateWasRemoved",
    "DimensionSpacePointWasMoved",
    "DimensionShineThroughWasAdded",
    "NodeSpecializationVariantWasCreated",
    "NodeGeneralizationVariantWasCreated",
    "NodePeerVariantWasCreated",
    "RootWorkspaceWasCreated",
    "WorkspaceWasCreated",
    "WorkspaceWasDiscarded",
    "WorkspaceWasPublished",
    "WorkspaceWasRebased",
    "WorkspaceRebaseFailed",
];

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::ContentStreamWasCreated(_) => "ContentStreamWasCreated",
            Event::ContentStreamWasForked(_) => "ContentStreamWasForked",
            Event::ContentStreamWasRemoved(_) => "ContentStreamWasRemoved",
            Event::RootNodeAggregateWithNodeWasCreated(_) => "RootNodeAggregateWithNodeWasCreated",
            Event::NodeAggregateWithNodeWasCreated(_) => "NodeAggregateWithNodeWasCreated",
            Event::NodePropertiesWereSet(_) => "NodePropertiesWereSet",
            Event::NodeReferencesWereSet(_) => "NodeReferencesWereSet",
            Event::NodeAggregateWasDisabled(_) => "NodeAggregateWasDisabled",
            Event::NodeAggregateWasEnabled(_) => "NodeAggregateWasEnabled",
            Event::NodeAggregateWasRemoved(_) => "NodeAggregateWasRemoved",
            Event::DimensionSpacePointWasMoved(_) => "DimensionSpacePointWasMoved",
            Event::DimensionShineThroughWasAdded(_) => "DimensionShineThroughWasAdded",
            Event::NodeSpecializationVariantWasCreated(_) => "NodeSpecializationVariantWasCreated",
            Event::NodeGeneralizationVariantWasCreated(_) => "NodeGeneralizationVariantWasCreated",
            Event::NodePeerVariantWasCreated(_) => "NodePeerVariantWasCreated",
            Event::RootWorkspaceWasCreated(_) => "RootWorkspaceWasCreated",
            Event::WorkspaceWasCreated(_) => "WorkspaceWasCreated",
            Event::WorkspaceWasDiscarded(_) => "WorkspaceWasDiscarded",
            Event::WorkspaceWasPublished(_) => "WorkspaceWasPublished",
            Event::WorkspaceWasRebased(_) => "WorkspaceWasRebased",
            Event::WorkspaceRebaseFailed(_) => "WorkspaceRebaseFailed",
        }
    }

    /// The content stream whose graph this event changes
    ///
    /// A fork names the new stream. Workspace events return `None`.
    pub fn content_stream_id(&self) -> Option<&ContentStreamId> {
        match self {
            Event::ContentStreamWasCreated(e) => Some(&e.content_stream_id),
            Event::ContentStreamWasForked(e) => Some(&e.new_content_stream_id),
            Event::ContentStreamWasRemoved(e) => Some(&e.content_stream_id),
            Event::RootNodeAggregateWithNodeWasCreated(e) => Some(&e.content_stream_id),
            Event::NodeAggregateWithNodeWasCreated(e) => Some(&e.content_stream_id),
            Event::NodePropertiesWereSet(e) => Some(&e.content_stream_id),
            Event::NodeReferencesWereSet(e) => Some(&e.content_stream_id),
            Event::NodeAggregateWasDisabled(e) => Some(&e.content_stream_id),
            Event::NodeAggregateWasEnabled(e) => Some(&e.content_stream_id),
            Event::NodeAggregateWasRemoved(e) => Some(&e.content_stream_id),
            Event::DimensionSpacePointWasMoved(e) => Some(&e.content_stream_id),
            Event::DimensionShineThroughWasAdded(e) => Some(&e.content_stream_id),
            Event::NodeSpecializationVariantWasCreated(e) => Some(&e.content_stream_id),
            Event::NodeGeneralizationVariantWasCreated(e) => Some(&e.content_stream_id),
            Event::NodePeerVariantWasCreated(e) => Some(&e.content_stream_id),
            Event::RootWorkspaceWasCreated(_)
            | Event::WorkspaceWasCreated(_)
            | Event::WorkspaceWasDiscarded(_)
            | Event::WorkspaceWasPublished(_)
            | Event::WorkspaceWasRebased(_)
            | Event::WorkspaceRebaseFailed(_) => None,
        }
    }

    /// Events that change nodes, edges or dimension space points of a graph
    pub fn is_node_event(&self) -> bool {
        self.content_stream_id().is_some()
            && !matches!(
                self,
                Event::ContentStreamWasCreated(_)
                    | Event::ContentStreamWasForked(_)
                    | Event::ContentStreamWasRemoved(_)
            )
    }

    /// Copy of a node event targeting another content stream
    ///
    /// Returns `None` for stream lifecycle and workspace events, which
    /// cannot be re-targeted.
    pub fn with_content_stream_id(&self, id: &ContentStreamId) -> Option<Event> {
        let mut event = self.clone();
        let slot = match &mut event {
            Event::RootNodeAggregateWithNodeWasCreated(e) => &mut e.content_stream_id,
            Event::NodeAggregateWithNodeWasCreated(e) => &mut e.content_stream_id,
            Event::NodePropertiesWereSet(e) => &mut e.content_stream_id,
            Event::NodeReferencesWereSet(e) => &mut e.content_stream_id,
            Event::NodeAggregateWasDisabled(e) => &mut e.content_stream_id,
            Event::NodeAggregateWasEnabled(e) => &mut e.content_stream_id,
            Event::NodeAggregateWasRemoved(e) => &mut e.content_stream_id,
            Event::DimensionSpacePointWasMoved(e) => &mut e.content_stream_id,
            Event::DimensionShineThroughWasAdded(e) => &mut e.content_stream_id,
            Event::NodeSpecializationVariantWasCreated(e) => &mut e.content_stream_id,
            Event::NodeGeneralizationVariantWasCreated(e) => &mut e.content_stream_id,
            Event::NodePeerVariantWasCreated(e) => &mut e.content_stream_id,
            _ => return None,
        };
        *slot = id.clone();
        Some(event)
    }

    /// Split into the stored `(type, payload)` pair
    ///
    /// # Errors
    ///
    /// `Serialization` if the payload cannot be encoded.
    pub fn to_stored(&self) -> Result<(String, serde_json::Value)> {
        let mut value = serde_json::to_value(self)?;
        let payload = value
            .get_mut("payload")
            .map(serde_json::Value::take)
            .ok_or_else(|| ContentGraphError::Serialization {
                message: format!("event {} has no payload", self.event_type()),
            })?;
        Ok((self.event_type().to_string(), payload))
    }

    /// Decode a stored event, migrating legacy payloads first
    ///
    /// # Errors
    ///
    /// `UnknownEventType` for unknown types, `Serialization` for payloads
    /// that do not match their type.
    pub fn from_stored(event_type: &str, payload: serde_json::Value) -> Result<Event> {
        if !EVENT_TYPES.contains(&event_type) {
            return Err(ContentGraphError::UnknownEventType {
                event_type: event_type.to_string(),
            });
        }
        let payload = legacy::upcast(event_type, payload);
        let event = serde_json::from_value(serde_json::json!({
            "type": event_type,
            "payload": payload,
        }))?;
        Ok(event)
    }
}
