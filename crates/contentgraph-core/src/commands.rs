//! Commands accepted by the content graph
//!
//! Every command is a plain serde record carrying the acting user. Commands
//! are validated structurally on construction (`new`) and again by the
//! handler, so a deserialized command cannot bypass the rules. Preconditions
//! that depend on state are checked by the handlers.

use crate::dimension::{DimensionSpacePoint, OriginDimensionSpacePoint};
use crate::errors::{ContentGraphError, Result};
use crate::model::{
    ContentStreamId, NodeAggregateId, NodeName, NodeTypeName, NodeVariantSelectionStrategy,
    ReferenceName, SerializedPropertyValues, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

fn invalid(command: &str, reason: impl Into<String>) -> ContentGraphError {
    ContentGraphError::InvalidCommand {
        command: command.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContentStream {
    pub content_stream_id: ContentStreamId,
    pub initiating_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkContentStream {
    pub new_content_stream_id: ContentStreamId,
    pub source_content_stream_id: ContentStreamId,
    pub initiating_user_id: UserId,
}

impl ForkContentStream {
    /// # Errors
    ///
    /// `InvalidCommand` when a stream would be forked onto itself.
    pub fn new(
        new_content_stream_id: ContentStreamId,
        source_content_stream_id: ContentStreamId,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            new_content_stream_id,
            source_content_stream_id,
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<()> {
        if self.new_content_stream_id == self.source_content_stream_id {
            return Err(invalid("ForkContentStream", "source and new content stream are identical"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveContentStream {
    pub content_stream_id: ContentStreamId,
    pub initiating_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRootNodeAggregateWithNode {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub initiating_user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeAggregateWithNode {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub node_type_name: NodeTypeName,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub parent_node_aggregate_id: NodeAggregateId,
    #[serde(default)]
    pub succeeding_sibling_node_aggregate_id: Option<NodeAggregateId>,
    #[serde(default)]
    pub node_name: Option<NodeName>,
    #[serde(default)]
    pub initial_property_values: SerializedPropertyValues,
    /// Node name path (e.g. `main/footer`) → id for tethered descendants;
    /// missing ids are derived deterministically
    #[serde(default)]
    pub tethered_descendant_node_aggregate_ids: BTreeMap<String, NodeAggregateId>,
    pub initiating_user_id: UserId,
}

impl CreateNodeAggregateWithNode {
    /// # Errors
    ///
    /// `InvalidCommand` when the node would be its own parent.
    pub fn new(
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        node_type_name: NodeTypeName,
        origin_dimension_space_point: OriginDimensionSpacePoint,
        parent_node_aggregate_id: NodeAggregateId,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            content_stream_id,
            node_aggregate_id,
            node_type_name,
            origin_dimension_space_point,
            parent_node_aggregate_id,
            succeeding_sibling_node_aggregate_id: None,
            node_name: None,
            initial_property_values: SerializedPropertyValues::new(),
            tethered_descendant_node_aggregate_ids: BTreeMap::new(),
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    pub fn with_node_name(mut self, node_name: NodeName) -> Self {
        self.node_name = Some(node_name);
        self
    }

    pub fn with_succeeding_sibling(mut self, sibling: NodeAggregateId) -> Self {
        self.succeeding_sibling_node_aggregate_id = Some(sibling);
        self
    }

    pub fn with_initial_property_values(mut self, values: SerializedPropertyValues) -> Self {
        self.initial_property_values = values;
        self
    }

    pub fn with_tethered_descendant_id(mut self, path: impl Into<String>, id: NodeAggregateId) -> Self {
        self.tethered_descendant_node_aggregate_ids.insert(path.into(), id);
        self
    }

    fn validate(&self) -> Result<()> {
        const NAME: &str = "CreateNodeAggregateWithNode";
        if self.parent_node_aggregate_id == self.node_aggregate_id {
            return Err(invalid(NAME, "a node cannot be its own parent"));
        }
        if let Some(sibling) = &self.succeeding_sibling_node_aggregate_id {
            if sibling == &self.node_aggregate_id || sibling == &self.parent_node_aggregate_id {
                return Err(invalid(NAME, "succeeding sibling must differ from node and parent"));
            }
        }
        let mut seen = BTreeSet::new();
        for id in self.tethered_descendant_node_aggregate_ids.values() {
            if id == &self.node_aggregate_id || !seen.insert(id) {
                return Err(invalid(NAME, format!("tethered descendant id {} is not unique", id)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeVariant {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub source_origin: OriginDimensionSpacePoint,
    pub target_origin: OriginDimensionSpacePoint,
    pub initiating_user_id: UserId,
}

impl CreateNodeVariant {
    /// # Errors
    ///
    /// `InvalidCommand` when source and target origin are equal.
    pub fn new(
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        source_origin: OriginDimensionSpacePoint,
        target_origin: OriginDimensionSpacePoint,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            content_stream_id,
            node_aggregate_id,
            source_origin,
            target_origin,
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<()> {
        if self.source_origin == self.target_origin {
            return Err(invalid("CreateNodeVariant", "source and target origin are identical"));
        }
        Ok(())
    }
}

/// Shared shape of the two dimension space adjustment commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionSpacePointAdjustment {
    pub content_stream_id: ContentStreamId,
    pub source: DimensionSpacePoint,
    pub target: DimensionSpacePoint,
    pub initiating_user_id: UserId,
}

impl DimensionSpacePointAdjustment {
    /// # Errors
    ///
    /// `InvalidCommand` when source and target are equal.
    pub fn new(
        content_stream_id: ContentStreamId,
        source: DimensionSpacePoint,
        target: DimensionSpacePoint,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            content_stream_id,
            source,
            target,
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<()> {
        if self.source == self.target {
            return Err(invalid("DimensionSpacePointAdjustment", "source and target are identical"));
        }
        Ok(())
    }
}

/// Shared shape of disable, enable and remove
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeAggregateVariantSelection {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub covered_dimension_space_point: DimensionSpacePoint,
    #[serde(default)]
    pub node_variant_selection_strategy: NodeVariantSelectionStrategy,
    pub initiating_user_id: UserId,
}

impl NodeAggregateVariantSelection {
    pub fn new(
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        covered_dimension_space_point: DimensionSpacePoint,
        node_variant_selection_strategy: NodeVariantSelectionStrategy,
        initiating_user_id: UserId,
    ) -> Self {
        Self {
            content_stream_id,
            node_aggregate_id,
            covered_dimension_space_point,
            node_variant_selection_strategy,
            initiating_user_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSerializedNodeProperties {
    pub content_stream_id: ContentStreamId,
    pub node_aggregate_id: NodeAggregateId,
    pub origin_dimension_space_point: OriginDimensionSpacePoint,
    pub property_values: SerializedPropertyValues,
    pub initiating_user_id: UserId,
}

impl SetSerializedNodeProperties {
    /// # Errors
    ///
    /// `InvalidCommand` when no property value is given.
    pub fn new(
        content_stream_id: ContentStreamId,
        node_aggregate_id: NodeAggregateId,
        origin_dimension_space_point: OriginDimensionSpacePoint,
        property_values: SerializedPropertyValues,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            content_stream_id,
            node_aggregate_id,
            origin_dimension_space_point,
            property_values,
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<()> {
        if self.property_values.is_empty() {
            return Err(invalid("SetSerializedNodeProperties", "no property values given"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeReferenceToWrite {
    pub target_node_aggregate_id: NodeAggregateId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<SerializedPropertyValues>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNodeReferences {
    pub content_stream_id: ContentStreamId,
    pub source_node_aggregate_id: NodeAggregateId,
    pub source_origin_dimension_space_point: OriginDimensionSpacePoint,
    pub reference_name: ReferenceName,
    /// Ordered; empty clears the reference
    pub references: Vec<NodeReferenceToWrite>,
    pub initiating_user_id: UserId,
}

impl SetNodeReferences {
    /// # Errors
    ///
    /// `InvalidCommand` when a target appears twice.
    pub fn new(
        content_stream_id: ContentStreamId,
        source_node_aggregate_id: NodeAggregateId,
        source_origin_dimension_space_point: OriginDimensionSpacePoint,
        reference_name: ReferenceName,
        references: Vec<NodeReferenceToWrite>,
        initiating_user_id: UserId,
    ) -> Result<Self> {
        let command = Self {
            content_stream_id,
            source_node_aggregate_id,
            source_origin_dimension_space_point,
            reference_name,
            references,
            initiating_user_id,
        };
        command.validate()?;
        Ok(command)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for reference in &self.references {
            if !seen.insert(&reference.target_node_aggregate_id) {
                return Err(invalid(
                    "SetNodeReferences",
                    format!("duplicate target {}", reference.target_node_aggregate_id),
                ));
            }
        }
        Ok(())
    }
}

/// Closed set of content stream commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    CreateContentStream(CreateContentStream),
    ForkContentStream(ForkContentStream),
    RemoveContentStream(RemoveContentStream),
    CreateRootNodeAggregateWithNode(CreateRootNodeAggregateWithNode),
    CreateNodeAggregateWithNode(CreateNodeAggregateWithNode),
    CreateNodeVariant(CreateNodeVariant),
    MoveDimensionSpacePoint(DimensionSpacePointAdjustment),
    AddDimensionShineThrough(DimensionSpacePointAdjustment),
    DisableNodeAggregate(NodeAggregateVariantSelection),
    EnableNodeAggregate(NodeAggregateVariantSelection),
    SetSerializedNodeProperties(SetSerializedNodeProperties),
    SetNodeReferences(SetNodeReferences),
    RemoveNodeAggregate(NodeAggregateVariantSelection),
}

impl Command {
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::CreateContentStream(_) => "CreateContentStream",
            Command::ForkContentStream(_) => "ForkContentStream",
            Command::RemoveContentStream(_) => "RemoveContentStream",
            Command::CreateRootNodeAggregateWithNode(_) => "CreateRootNodeAggregateWithNode",
            Command::CreateNodeAggregateWithNode(_) => "CreateNodeAggregateWithNode",
            Command::CreateNodeVariant(_) => "CreateNodeVariant",
            Command::MoveDimensionSpacePoint(_) => "MoveDimensionSpacePoint",
            Command::AddDimensionShineThrough(_) => "AddDimensionShineThrough",
            Command::DisableNodeAggregate(_) => "DisableNodeAggregate",
            Command::EnableNodeAggregate(_) => "EnableNodeAggregate",
            Command::SetSerializedNodeProperties(_) => "SetSerializedNodeProperties",
            Command::SetNodeReferences(_) => "SetNodeReferences",
            Command::RemoveNodeAggregate(_) => "RemoveNodeAggregate",
        }
    }

    /// The stream the command writes to
    pub fn content_stream_id(&self) -> &ContentStreamId {
        match self {
            Command::CreateContentStream(c) => &c.content_stream_id,
            Command::ForkContentStream(c) => &c.new_content_stream_id,
            Command::RemoveContentStream(c) => &c.content_stream_id,
            Command::CreateRootNodeAggregateWithNode(c) => &c.content_stream_id,
            Command::CreateNodeAggregateWithNode(c) => &c.content_stream_id,
            Command::CreateNodeVariant(c) => &c.content_stream_id,
            Command::MoveDimensionSpacePoint(c) | Command::AddDimensionShineThrough(c) => {
                &c.content_stream_id
            }
            Command::DisableNodeAggregate(c)
            | Command::EnableNodeAggregate(c)
            | Command::RemoveNodeAggregate(c) => &c.content_stream_id,
            Command::SetSerializedNodeProperties(c) => &c.content_stream_id,
            Command::SetNodeReferences(c) => &c.content_stream_id,
        }
    }

    pub fn initiating_user_id(&self) -> &UserId {
        match self {
            Command::CreateContentStream(c) => &c.initiating_user_id,
            Command::ForkContentStream(c) => &c.initiating_user_id,
            Command::RemoveContentStream(c) => &c.initiating_user_id,
            Command::CreateRootNodeAggregateWithNode(c) => &c.initiating_user_id,
            Command::CreateNodeAggregateWithNode(c) => &c.initiating_user_id,
            Command::CreateNodeVariant(c) => &c.initiating_user_id,
            Command::MoveDimensionSpacePoint(c) | Command::AddDimensionShineThrough(c) => {
                &c.initiating_user_id
            }
            Command::DisableNodeAggregate(c)
            | Command::EnableNodeAggregate(c)
            | Command::RemoveNodeAggregate(c) => &c.initiating_user_id,
            Command::SetSerializedNodeProperties(c) => &c.initiating_user_id,
            Command::SetNodeReferences(c) => &c.initiating_user_id,
        }
    }

    /// Re-run the structural checks of the command's constructor
    ///
    /// # Errors
    ///
    /// `InvalidCommand` as the constructor would.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::ForkContentStream(c) => c.validate(),
            Command::CreateNodeAggregateWithNode(c) => c.validate(),
            Command::CreateNodeVariant(c) => c.validate(),
            Command::MoveDimensionSpacePoint(c) | Command::AddDimensionShineThrough(c) => {
                c.validate()
            }
            Command::SetSerializedNodeProperties(c) => c.validate(),
            Command::SetNodeReferences(c) => c.validate(),
            Command::CreateContentStream(_)
            | Command::RemoveContentStream(_)
            | Command::CreateRootNodeAggregateWithNode(_)
            | Command::DisableNodeAggregate(_)
            | Command::EnableNodeAggregate(_)
            | Command::RemoveNodeAggregate(_) => Ok(()),
        }
    }

    /// Copy of a node command aimed at another content stream
    ///
    /// Used when a workspace is rebased. Stream lifecycle commands are not
    /// rebasable and return `None`.
    pub fn with_content_stream_id(&self, id: &ContentStreamId) -> Option<Command> {
        let mut command = self.clone();
        let slot = match &mut command {
            Command::CreateContentStream(_)
            | Command::ForkContentStream(_)
            | Command::RemoveContentStream(_) => return None,
            Command::CreateRootNodeAggregateWithNode(c) => &mut c.content_stream_id,
            Command::CreateNodeAggregateWithNode(c) => &mut c.content_stream_id,
            Command::CreateNodeVariant(c) => &mut c.content_stream_id,
            Command::MoveDimensionSpacePoint(c) | Command::AddDimensionShineThrough(c) => {
                &mut c.content_stream_id
            }
            Command::DisableNodeAggregate(c)
            | Command::EnableNodeAggregate(c)
            | Command::RemoveNodeAggregate(c) => &mut c.content_stream_id,
            Command::SetSerializedNodeProperties(c) => &mut c.content_stream_id,
            Command::SetNodeReferences(c) => &mut c.content_stream_id,
        };
        *slot = id.clone();
        Some(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyName, SerializedPropertyValue};
    use serde_json::json;

    fn cs() -> ContentStreamId {
        ContentStreamId::new("cs").unwrap()
    }

    fn id(s: &str) -> NodeAggregateId {
        NodeAggregateId::new(s).unwrap()
    }

    fn lang(v: &str) -> OriginDimensionSpacePoint {
        OriginDimensionSpacePoint::from_pairs([("language", v)])
    }

    #[test]
    fn test_variant_to_same_origin_is_invalid() {
        let err = CreateNodeVariant::new(cs(), id("n"), lang("de"), lang("de"), UserId::system())
            .unwrap_err();
        assert!(matches!(err, ContentGraphError::InvalidCommand { .. }));
    }

    #[test]
    fn test_node_cannot_be_its_own_parent() {
        let result = CreateNodeAggregateWithNode::new(
            cs(),
            id("n"),
            NodeTypeName::new("Acme:Page").unwrap(),
            lang("de"),
            id("n"),
            UserId::system(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_reference_targets_are_invalid() {
        let target = NodeReferenceToWrite {
            target_node_aggregate_id: id("t"),
            properties: None,
        };
        let result = SetNodeReferences::new(
            cs(),
            id("s"),
            lang("de"),
            ReferenceName::new("related").unwrap(),
            vec![target.clone(), target],
            UserId::system(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_property_values_are_invalid() {
        let result = SetSerializedNodeProperties::new(
            cs(),
            id("n"),
            lang("de"),
            SerializedPropertyValues::new(),
            UserId::system(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialized_command_is_validated_again() {
        let command: Command = serde_json::from_value(json!({
            "type": "MoveDimensionSpacePoint",
            "payload": {
                "contentStreamId": "cs",
                "source": { "language": "de" },
                "target": { "language": "de" },
                "initiatingUserId": "u"
            }
        }))
        .unwrap();
        assert!(command.validate().is_err());
    }

    #[test]
    fn test_rebase_retargets_node_commands_only() {
        let values = SerializedPropertyValues::new().with(
            PropertyName::new("title").unwrap(),
            SerializedPropertyValue::new(json!("x"), "string"),
        );
        let command = Command::SetSerializedNodeProperties(
            SetSerializedNodeProperties::new(cs(), id("n"), lang("de"), values, UserId::system())
                .unwrap(),
        );
        let other = ContentStreamId::new("other").unwrap();
        let retargeted = command.with_content_stream_id(&other).unwrap();
        assert_eq!(retargeted.content_stream_id(), &other);

        let create = Command::CreateContentStream(CreateContentStream {
            content_stream_id: cs(),
            initiating_user_id: UserId::system(),
        });
        assert!(create.with_content_stream_id(&other).is_none());
    }
}
