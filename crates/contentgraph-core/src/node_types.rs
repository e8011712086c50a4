//! Resolved node type schema
//!
//! Node types are declared elsewhere and arrive here already resolved
//! (inheritance flattened). The engine only needs to answer: does this type
//! exist, is it root or abstract, which properties and references may be
//! set, in which scope, and which tethered children does it bring along.

use crate::errors::{ContentGraphError, Result};
use crate::model::{NodeName, NodeTypeName, PropertyName, SerializedPropertyValue, SerializedPropertyValues};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a property or reference value applies when it is set on one variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropertyScope {
    /// Only the variant it was set on
    #[default]
    Node,
    /// The variant and every occupied specialization of its origin
    Specializations,
    /// Every variant of the aggregate
    NodeAggregate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(rename = "type", default = "default_property_type")]
    pub property_type: String,
    #[serde(default)]
    pub scope: PropertyScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

fn default_property_type() -> String {
    "string".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceDefinition {
    #[serde(default)]
    pub scope: PropertyScope,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeType {
    #[serde(skip)]
    name: Option<NodeTypeName>,
    #[serde(default)]
    pub root: bool,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: BTreeMap<PropertyName, PropertyDefinition>,
    #[serde(default)]
    pub references: BTreeMap<String, ReferenceDefinition>,
    #[serde(default)]
    pub tethered_children: BTreeMap<NodeName, NodeTypeName>,
}

impl NodeType {
    pub fn name(&self) -> Option<&NodeTypeName> {
        self.name.as_ref()
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.properties
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    pub fn reference(&self, name: &str) -> Option<&ReferenceDefinition> {
        self.references.get(name)
    }

    /// Declared defaults, typed with the declared property type
    pub fn default_values(&self) -> SerializedPropertyValues {
        let mut values = SerializedPropertyValues::new();
        for (name, definition) in &self.properties {
            if let Some(default) = &definition.default {
                values.insert(
                    name.clone(),
                    SerializedPropertyValue::new(default.clone(), definition.property_type.clone()),
                );
            }
        }
        values
    }
}

/// Lookup of resolved node types
pub trait NodeTypeSchema: Send + Sync {
    fn node_type(&self, name: &NodeTypeName) -> Option<&NodeType>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryNodeTypeSchema {
    node_types: BTreeMap<NodeTypeName, NodeType>,
}

impl InMemoryNodeTypeSchema {
    /// Build from a JSON object keyed by node type name
    ///
    /// ```json
    /// {
    ///   "Acme:Root": { "root": true },
    ///   "Acme:Page": {
    ///     "properties": { "title": { "type": "string", "scope": "node", "default": "" } },
    ///     "references": { "related": { "scope": "node" } },
    ///     "tetheredChildren": { "main": "Acme:Collection" }
    ///   }
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// `InvalidNodeTypeSchema` when the JSON does not have this shape or a
    /// name fails validation.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let raw: BTreeMap<String, NodeType> = serde_json::from_value(value.clone())
            .map_err(|e| ContentGraphError::InvalidNodeTypeSchema {
                reason: e.to_string(),
            })?;

        let mut node_types = BTreeMap::new();
        for (name, mut node_type) in raw {
            let name = NodeTypeName::new(name).map_err(|e| ContentGraphError::InvalidNodeTypeSchema {
                reason: e.to_string(),
            })?;
            node_type.name = Some(name.clone());
            node_types.insert(name, node_type);
        }
        Ok(Self { node_types })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| ContentGraphError::InvalidNodeTypeSchema {
                reason: e.to_string(),
            })?;
        Self::from_json(&value)
    }

    pub fn len(&self) -> usize {
        self.node_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_types.is_empty()
    }
}

impl NodeTypeSchema for InMemoryNodeTypeSchema {
    fn node_type(&self, name: &NodeTypeName) -> Option<&NodeType> {
        self.node_types.get(name)
    }
}
