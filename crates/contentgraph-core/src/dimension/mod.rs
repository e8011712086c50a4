//! Dimension model
//!
//! Content varies along orthogonal dimensions (language, market, ...). Each
//! dimension's values form a fallback forest; the variation graph combines
//! the dimensions into the allowed dimension subspace and answers
//! generalization/specialization queries over it.

pub mod config;
pub mod space_point;
pub mod variation_graph;

pub use config::{
    ContentDimension, ContentDimensionSource, ContentDimensionValue, DimensionConfig,
    DimensionDefinition, DimensionValueDefinition,
};
pub use space_point::{DimensionSpacePoint, DimensionSpacePointSet, OriginDimensionSpacePoint};
pub use variation_graph::{InterDimensionalVariationGraph, VariantType};
