//! Identifiers and value objects

pub mod ids;
pub mod values;

pub use ids::{
    ContentDimensionId, ContentStreamId, NodeAggregateId, NodeName, NodeTypeName, PropertyName,
    ReferenceName, UserId, WorkspaceName,
};
pub use values::{
    InterdimensionalSibling, InterdimensionalSiblings, NodeAggregateClassification,
    NodeVariantSelectionStrategy, SerializedPropertyValue, SerializedPropertyValues,
};
