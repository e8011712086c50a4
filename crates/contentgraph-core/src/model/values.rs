//! Value objects carried by commands, events and projected nodes

use crate::dimension::{DimensionSpacePoint, DimensionSpacePointSet};
use crate::model::{NodeAggregateId, PropertyName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeAggregateClassification {
    Root,
    Regular,
    Tethered,
}

impl NodeAggregateClassification {
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root)
    }

    pub fn is_tethered(&self) -> bool {
        matches!(self, Self::Tethered)
    }
}

/// A property value together with its declared type name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedPropertyValue {
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub value_type: String,
}

impl SerializedPropertyValue {
    pub fn new(value: serde_json::Value, value_type: impl Into<String>) -> Self {
        Self {
            value,
            value_type: value_type.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedPropertyValues(BTreeMap<PropertyName, SerializedPropertyValue>);

impl SerializedPropertyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: PropertyName, value: SerializedPropertyValue) -> Self {
        self.0.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: PropertyName, value: SerializedPropertyValue) {
        self.0.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&SerializedPropertyValue> {
        self.0.iter().find(|(k, _)| k.as_str() == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &PropertyName> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PropertyName, &SerializedPropertyValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Dictionary union; values in `other` win
    pub fn merge(&self, other: &SerializedPropertyValues) -> SerializedPropertyValues {
        let mut merged = self.0.clone();
        for (name, value) in &other.0 {
            merged.insert(name.clone(), value.clone());
        }
        Self(merged)
    }

    /// Subset containing only the given names
    pub fn only(&self, names: &[&PropertyName]) -> SerializedPropertyValues {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| names.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// The succeeding sibling of a new node at one covered point
///
/// `None` means the node is appended as the last child there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterdimensionalSibling {
    pub dimension_space_point: DimensionSpacePoint,
    pub node_aggregate_id: Option<NodeAggregateId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterdimensionalSiblings(Vec<InterdimensionalSibling>);

impl InterdimensionalSiblings {
    pub fn new(siblings: Vec<InterdimensionalSibling>) -> Self {
        Self(siblings)
    }

    /// Append at every point of `points`
    pub fn append_at(points: &DimensionSpacePointSet) -> Self {
        Self(
            points
                .iter()
                .map(|p| InterdimensionalSibling {
                    dimension_space_point: p.clone(),
                    node_aggregate_id: None,
                })
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterdimensionalSibling> {
        self.0.iter()
    }

    pub fn covered_points(&self) -> DimensionSpacePointSet {
        self.0
            .iter()
            .map(|s| s.dimension_space_point.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which variants of an aggregate a disable/enable/remove affects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeVariantSelectionStrategy {
    /// Only the given point
    OnlyGivenVariant,
    /// The given point and all its specializations
    #[default]
    AllSpecializations,
    /// Every point the aggregate covers
    AllVariants,
}
