//! Dimension configuration and the validated content dimension source

use crate::errors::{ContentGraphError, Result};
use crate::model::ContentDimensionId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wildcard key in value constraints
pub const CONSTRAINT_WILDCARD: &str = "*";

/// Raw dimension configuration as written by operators
///
/// Dimensions are listed in priority order: the first dimension is the most
/// significant when weighing points against each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    #[serde(default)]
    pub dimensions: Vec<DimensionDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionDefinition {
    pub id: String,
    #[serde(default)]
    pub values: Vec<DimensionValueDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionValueDefinition {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<String>,
    /// other dimension → (other value or `*`) → allowed
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, BTreeMap<String, bool>>,
}

/// Combination rule of one value towards another dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionConstraint {
    pub wildcard: bool,
    pub values: BTreeMap<String, bool>,
}

impl DimensionConstraint {
    fn allows(&self, other_value: &str) -> bool {
        self.values
            .get(other_value)
            .copied()
            .unwrap_or(self.wildcard)
    }
}

/// A validated value in a dimension's fallback forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDimensionValue {
    pub value: String,
    pub fallback: Option<String>,
    /// 0 for root values, fallback depth + 1 otherwise
    pub depth: u32,
    /// Values that fall back to this one
    pub specializations: Vec<String>,
    pub constraints: BTreeMap<String, DimensionConstraint>,
}

impl ContentDimensionValue {
    /// Whether this value may be combined with `other_value` of `other_dimension`
    pub fn allows_combination_with(&self, other_dimension: &str, other_value: &str) -> bool {
        self.constraints
            .get(other_dimension)
            .map(|c| c.allows(other_value))
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDimension {
    pub id: ContentDimensionId,
    /// Values in declaration order
    pub values: Vec<ContentDimensionValue>,
}

impl ContentDimension {
    pub fn value(&self, value: &str) -> Option<&ContentDimensionValue> {
        self.values.iter().find(|v| v.value == value)
    }

    pub fn max_depth(&self) -> u32 {
        self.values.iter().map(|v| v.depth).max().unwrap_or(0)
    }

    /// The value itself followed by its fallback chain up to the root
    pub fn fallback_chain(&self, value: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.value(value);
        while let Some(v) = current {
            chain.push(v.value.as_str());
            current = v.fallback.as_deref().and_then(|f| self.value(f));
        }
        chain
    }
}

/// Validated dimensions in priority order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentDimensionSource {
    dimensions: Vec<ContentDimension>,
}

impl ContentDimensionSource {
    pub fn dimensions(&self) -> &[ContentDimension] {
        &self.dimensions
    }

    pub fn dimension(&self, id: &str) -> Option<&ContentDimension> {
        self.dimensions.iter().find(|d| d.id.as_str() == id)
    }

    pub fn max_depth(&self) -> u32 {
        self.dimensions
            .iter()
            .map(ContentDimension::max_depth)
            .max()
            .unwrap_or(0)
    }
}

fn invalid(reason: impl Into<String>) -> ContentGraphError {
    ContentGraphError::InvalidDimensionConfiguration {
        reason: reason.into(),
    }
}

impl TryFrom<DimensionConfig> for ContentDimensionSource {
    type Error = ContentGraphError;

    fn try_from(config: DimensionConfig) -> Result<Self> {
        let mut seen_ids = BTreeSet::new();
        for definition in &config.dimensions {
            if !seen_ids.insert(definition.id.as_str()) {
                return Err(invalid(format!("duplicate dimension '{}'", definition.id)));
            }
        }

        let mut dimensions = Vec::with_capacity(config.dimensions.len());
        for definition in &config.dimensions {
            dimensions.push(build_dimension(definition, &config)?);
        }
        Ok(Self { dimensions })
    }
}

fn build_dimension(
    definition: &DimensionDefinition,
    config: &DimensionConfig,
) -> Result<ContentDimension> {
    let id = ContentDimensionId::new(definition.id.as_str())
        .map_err(|e| invalid(format!("dimension id: {}", e)))?;

    if definition.values.is_empty() {
        return Err(invalid(format!("dimension '{}' has no values", id)));
    }

    let mut fallbacks: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for value in &definition.values {
        if value.value.trim().is_empty() {
            return Err(invalid(format!("dimension '{}' has an empty value", id)));
        }
        if fallbacks
            .insert(value.value.as_str(), value.fallback.as_deref())
            .is_some()
        {
            return Err(invalid(format!(
                "duplicate value '{}' in dimension '{}'",
                value.value, id
            )));
        }
    }

    for value in &definition.values {
        if let Some(fallback) = &value.fallback {
            if !fallbacks.contains_key(fallback.as_str()) {
                return Err(invalid(format!(
                    "value '{}' of dimension '{}' falls back to undefined value '{}'",
                    value.value, id, fallback
                )));
            }
        }
    }

    let mut depths = BTreeMap::new();
    for value in &definition.values {
        depths.insert(value.value.as_str(), fallback_depth(&id, &value.value, &fallbacks)?);
    }

    let mut values = Vec::with_capacity(definition.values.len());
    for value in &definition.values {
        let specializations = definition
            .values
            .iter()
            .filter(|v| v.fallback.as_deref() == Some(value.value.as_str()))
            .map(|v| v.value.clone())
            .collect();
        values.push(ContentDimensionValue {
            value: value.value.clone(),
            fallback: value.fallback.clone(),
            depth: depths.get(value.value.as_str()).copied().unwrap_or(0),
            specializations,
            constraints: build_constraints(&id, value, config)?,
        });
    }

    Ok(ContentDimension { id, values })
}

/// Walks the fallback chain with a visited set; a revisit is a cycle
fn fallback_depth(
    dimension: &ContentDimensionId,
    value: &str,
    fallbacks: &BTreeMap<&str, Option<&str>>,
) -> Result<u32> {
    let mut visited = BTreeSet::new();
    let mut current = value;
    let mut depth = 0u32;
    visited.insert(current);
    while let Some(Some(next)) = fallbacks.get(current).copied() {
        if !visited.insert(next) {
            return Err(invalid(format!(
                "fallback cycle in dimension '{}' through value '{}'",
                dimension, next
            )));
        }
        current = next;
        depth += 1;
    }
    Ok(depth)
}

fn build_constraints(
    dimension: &ContentDimensionId,
    value: &DimensionValueDefinition,
    config: &DimensionConfig,
) -> Result<BTreeMap<String, DimensionConstraint>> {
    let mut constraints = BTreeMap::new();
    for (other_dimension, rules) in &value.constraints {
        let other = config
            .dimensions
            .iter()
            .find(|d| &d.id == other_dimension)
            .filter(|d| d.id != dimension.as_str())
            .ok_or_else(|| {
                invalid(format!(
                    "value '{}' of dimension '{}' constrains unknown dimension '{}'",
                    value.value, dimension, other_dimension
                ))
            })?;

        let mut constraint = DimensionConstraint {
            wildcard: true,
            values: BTreeMap::new(),
        };
        for (other_value, allowed) in rules {
            if other_value == CONSTRAINT_WILDCARD {
                constraint.wildcard = *allowed;
            } else if other.values.iter().any(|v| &v.value == other_value) {
                constraint.values.insert(other_value.clone(), *allowed);
            } else {
                return Err(invalid(format!(
                    "value '{}' of dimension '{}' constrains unknown value '{}' of '{}'",
                    value.value, dimension, other_value, other_dimension
                )));
            }
        }
        constraints.insert(other_dimension.clone(), constraint);
    }
    Ok(constraints)
}
