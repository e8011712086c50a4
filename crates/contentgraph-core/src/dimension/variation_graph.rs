//! Inter-dimensional variation graph
//!
//! Precomputes, for every point of the allowed dimension subspace, its
//! generalizations, specializations and normalized weight. All queries are
//! lookups into immutable indexes, so the graph can be shared through `Arc`
//! by every command handler without locking.
//!
//! ## Weights
//!
//! A point's weight folds the depths of its coordinates in dimension priority
//! order with base `max depth + 1`. A point is therefore always heavier than
//! each of its generalizations, and a difference in a more significant
//! dimension outweighs any difference in less significant ones.

use super::config::ContentDimensionSource;
use super::space_point::{DimensionSpacePoint, DimensionSpacePointSet};
use crate::errors::{ContentGraphError, Result};
use crate::model::ContentDimensionId;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Relation of one point to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Same,
    Specialization,
    Generalization,
    Peer,
}

#[derive(Debug, Clone)]
pub struct InterDimensionalVariationGraph {
    source: ContentDimensionSource,
    allowed: DimensionSpacePointSet,
    weights: BTreeMap<String, u64>,
    generalizations: BTreeMap<String, DimensionSpacePointSet>,
    specializations: BTreeMap<String, DimensionSpacePointSet>,
    direct_generalizations: BTreeMap<String, DimensionSpacePointSet>,
    direct_specializations: BTreeMap<String, DimensionSpacePointSet>,
    weighted_specializations: BTreeMap<String, BTreeMap<u64, DimensionSpacePointSet>>,
    primary_generalizations: BTreeMap<String, DimensionSpacePoint>,
}

impl InterDimensionalVariationGraph {
    /// Build the graph from validated dimensions
    ///
    /// # Errors
    ///
    /// `InvalidDimensionConfiguration` when the value constraints leave no
    /// allowed point at all.
    pub fn new(source: ContentDimensionSource) -> Result<Self> {
        let allowed = allowed_subspace(&source);
        if allowed.is_empty() {
            return Err(ContentGraphError::InvalidDimensionConfiguration {
                reason: "value constraints exclude every dimension space point".to_string(),
            });
        }

        let base = u64::from(source.max_depth()) + 1;
        let weights: BTreeMap<String, u64> = allowed
            .iter()
            .map(|p| (p.hash().to_string(), weight_of(&source, p, base)))
            .collect();

        let mut graph = Self {
            source,
            allowed: allowed.clone(),
            weights,
            generalizations: BTreeMap::new(),
            specializations: BTreeMap::new(),
            direct_generalizations: BTreeMap::new(),
            direct_specializations: BTreeMap::new(),
            weighted_specializations: BTreeMap::new(),
            primary_generalizations: BTreeMap::new(),
        };
        for point in allowed.iter() {
            let hash = point.hash().to_string();
            graph
                .generalizations
                .insert(hash.clone(), DimensionSpacePointSet::new());
            graph
                .specializations
                .insert(hash.clone(), DimensionSpacePointSet::new());
            graph
                .direct_generalizations
                .insert(hash.clone(), DimensionSpacePointSet::new());
            graph
                .direct_specializations
                .insert(hash.clone(), DimensionSpacePointSet::new());
            graph.weighted_specializations.insert(hash, BTreeMap::new());
        }

        for specialization in allowed.iter() {
            for generalization in allowed.iter() {
                if specialization == generalization
                    || !graph.is_generalization_of(generalization, specialization)
                {
                    continue;
                }
                graph.link(generalization, specialization);
            }
        }

        for point in allowed.iter() {
            if let Some(primary) = graph.lightest_generalization(point) {
                graph
                    .primary_generalizations
                    .insert(point.hash().to_string(), primary);
            }
        }

        tracing::debug!(
            allowed_points = graph.allowed.len(),
            dimensions = graph.source.dimensions().len(),
            "built inter-dimensional variation graph"
        );
        Ok(graph)
    }

    // Every coordinate of `generalization` lies on the fallback chain of the
    // corresponding coordinate of `specialization`.
    fn is_generalization_of(
        &self,
        generalization: &DimensionSpacePoint,
        specialization: &DimensionSpacePoint,
    ) -> bool {
        self.source.dimensions().iter().all(|dimension| {
            let id = dimension.id.as_str();
            match (
                generalization.coordinate(id),
                specialization.coordinate(id),
            ) {
                (Some(g), Some(s)) => dimension.fallback_chain(s).contains(&g),
                _ => false,
            }
        })
    }

    fn link(&mut self, generalization: &DimensionSpacePoint, specialization: &DimensionSpacePoint) {
        let g = generalization.hash().to_string();
        let s = specialization.hash().to_string();
        let difference = self.weight_of_hash(&s).saturating_sub(self.weight_of_hash(&g));

        if let Some(set) = self.generalizations.get_mut(&s) {
            set.insert(generalization.clone());
        }
        if let Some(set) = self.specializations.get_mut(&g) {
            set.insert(specialization.clone());
        }
        if let Some(by_weight) = self.weighted_specializations.get_mut(&g) {
            by_weight
                .entry(difference)
                .or_default()
                .insert(specialization.clone());
        }
        if self.is_direct_step(generalization, specialization) {
            if let Some(set) = self.direct_generalizations.get_mut(&s) {
                set.insert(generalization.clone());
            }
            if let Some(set) = self.direct_specializations.get_mut(&g) {
                set.insert(specialization.clone());
            }
        }
    }

    // Exactly one coordinate differs, and it differs by one fallback step.
    fn is_direct_step(&self, generalization: &DimensionSpacePoint, specialization: &DimensionSpacePoint) -> bool {
        let mut differing = self.source.dimensions().iter().filter(|d| {
            generalization.coordinate(d.id.as_str()) != specialization.coordinate(d.id.as_str())
        });
        match (differing.next(), differing.next()) {
            (Some(dimension), None) => {
                let id = dimension.id.as_str();
                specialization
                    .coordinate(id)
                    .and_then(|s| dimension.value(s))
                    .and_then(|v| v.fallback.as_deref())
                    == generalization.coordinate(id)
            }
            _ => false,
        }
    }

    fn lightest_generalization(&self, point: &DimensionSpacePoint) -> Option<DimensionSpacePoint> {
        let weight = self.weight_of_hash(point.hash());
        self.generalizations
            .get(point.hash())?
            .iter()
            .min_by_key(|g| (weight.saturating_sub(self.weight_of_hash(g.hash())), g.hash().to_string()))
            .cloned()
    }

    fn weight_of_hash(&self, hash: &str) -> u64 {
        self.weights.get(hash).copied().unwrap_or(0)
    }

    fn indexed(
        index: &BTreeMap<String, DimensionSpacePointSet>,
        point: &DimensionSpacePoint,
    ) -> DimensionSpacePointSet {
        index.get(point.hash()).cloned().unwrap_or_default()
    }

    pub fn source(&self) -> &ContentDimensionSource {
        &self.source
    }

    pub fn allowed_dimension_subspace(&self) -> &DimensionSpacePointSet {
        &self.allowed
    }

    pub fn is_allowed(&self, point: &DimensionSpacePoint) -> bool {
        self.allowed.contains(point)
    }

    /// Normalized weight; `None` outside the allowed subspace
    pub fn weight(&self, point: &DimensionSpacePoint) -> Option<u64> {
        self.weights.get(point.hash()).copied()
    }

    pub fn variant_type(&self, subject: &DimensionSpacePoint, object: &DimensionSpacePoint) -> VariantType {
        if subject == object {
            VariantType::Same
        } else if self.indexed_specializations_ref(object).contains(subject) {
            VariantType::Specialization
        } else if self.indexed_generalizations_ref(object).contains(subject) {
            VariantType::Generalization
        } else {
            VariantType::Peer
        }
    }

    fn indexed_specializations_ref(&self, point: &DimensionSpacePoint) -> &DimensionSpacePointSet {
        self.specializations
            .get(point.hash())
            .unwrap_or_else(|| empty_set())
    }

    fn indexed_generalizations_ref(&self, point: &DimensionSpacePoint) -> &DimensionSpacePointSet {
        self.generalizations
            .get(point.hash())
            .unwrap_or_else(|| empty_set())
    }

    /// The primary generalization, the one with the lowest weight difference
    pub fn generalization_of(&self, point: &DimensionSpacePoint) -> Option<DimensionSpacePoint> {
        self.primary_generalizations.get(point.hash()).cloned()
    }

    /// All strict generalizations
    pub fn indexed_generalizations(&self, point: &DimensionSpacePoint) -> DimensionSpacePointSet {
        Self::indexed(&self.generalizations, point)
    }

    /// All strict specializations
    pub fn indexed_specializations(&self, point: &DimensionSpacePoint) -> DimensionSpacePointSet {
        Self::indexed(&self.specializations, point)
    }

    pub fn direct_generalizations(&self, point: &DimensionSpacePoint) -> DimensionSpacePointSet {
        Self::indexed(&self.direct_generalizations, point)
    }

    pub fn direct_specializations(&self, point: &DimensionSpacePoint) -> DimensionSpacePointSet {
        Self::indexed(&self.direct_specializations, point)
    }

    /// Strict specializations grouped by weight difference to `point`
    pub fn weighted_specializations(
        &self,
        point: &DimensionSpacePoint,
    ) -> BTreeMap<u64, DimensionSpacePointSet> {
        self.weighted_specializations
            .get(point.hash())
            .cloned()
            .unwrap_or_default()
    }

    /// Strict specializations of `point` that keep its coordinate in every
    /// excluded dimension
    pub fn specializations_of(
        &self,
        point: &DimensionSpacePoint,
        excluded_dimensions: &[ContentDimensionId],
    ) -> DimensionSpacePointSet {
        self.indexed_specializations_ref(point)
            .iter()
            .filter(|s| {
                excluded_dimensions
                    .iter()
                    .all(|d| s.coordinate(d.as_str()) == point.coordinate(d.as_str()))
            })
            .cloned()
            .collect()
    }

    /// The points a variant originating in `origin` becomes visible in
    ///
    /// Specializations are walked from lightest to heaviest. An excluded
    /// point also excludes everything specializing it, since another variant
    /// already shines through there.
    ///
    /// # Errors
    ///
    /// `DimensionSpacePointNotFound` when `origin` is not allowed.
    pub fn specialization_set(
        &self,
        origin: &DimensionSpacePoint,
        include_origin: bool,
        excluded: &DimensionSpacePointSet,
    ) -> Result<DimensionSpacePointSet> {
        if !self.is_allowed(origin) {
            return Err(ContentGraphError::DimensionSpacePointNotFound {
                dimension_space_point: origin.to_json_string(),
            });
        }

        let mut result = DimensionSpacePointSet::new();
        if include_origin {
            result.insert(origin.clone());
        }
        let mut excluded = excluded.clone();
        let by_weight = self
            .weighted_specializations
            .get(origin.hash())
            .cloned()
            .unwrap_or_default();
        for specialization in by_weight.values().flat_map(|set| set.iter()) {
            if excluded.contains(specialization) {
                excluded = excluded.union(self.indexed_specializations_ref(specialization));
            } else {
                result.insert(specialization.clone());
            }
        }
        Ok(result)
    }

    /// Allowed points without any generalization
    pub fn root_generalizations(&self) -> DimensionSpacePointSet {
        self.allowed
            .iter()
            .filter(|p| self.indexed_generalizations_ref(p).is_empty())
            .cloned()
            .collect()
    }

    /// Points reachable from `point` over direct specialization edges
    ///
    /// Equals `indexed_specializations` whenever every intermediate point is
    /// allowed.
    pub fn reachable_specializations(&self, point: &DimensionSpacePoint) -> DimensionSpacePointSet {
        let mut visited = BTreeSet::from([point.hash().to_string()]);
        let mut queue: Vec<DimensionSpacePoint> =
            self.direct_specializations(point).iter().cloned().collect();
        let mut result = DimensionSpacePointSet::new();
        while let Some(next) = queue.pop() {
            if !visited.insert(next.hash().to_string()) {
                continue;
            }
            queue.extend(self.direct_specializations(&next).iter().cloned());
            result.insert(next);
        }
        result
    }
}

fn empty_set() -> &'static DimensionSpacePointSet {
    static EMPTY: OnceLock<DimensionSpacePointSet> = OnceLock::new();
    EMPTY.get_or_init(DimensionSpacePointSet::new)
}

fn weight_of(source: &ContentDimensionSource, point: &DimensionSpacePoint, base: u64) -> u64 {
    source.dimensions().iter().fold(0u64, |acc, dimension| {
        let depth = point
            .coordinate(dimension.id.as_str())
            .and_then(|v| dimension.value(v))
            .map(|v| u64::from(v.depth))
            .unwrap_or(0);
        acc.saturating_mul(base).saturating_add(depth)
    })
}

/// Cartesian product of all dimension values, filtered by value constraints
fn allowed_subspace(source: &ContentDimensionSource) -> DimensionSpacePointSet {
    let mut candidates = vec![BTreeMap::<String, String>::new()];
    for dimension in source.dimensions() {
        let mut next = Vec::with_capacity(candidates.len() * dimension.values.len());
        for partial in &candidates {
            for value in &dimension.values {
                let mut coordinates = partial.clone();
                coordinates.insert(dimension.id.to_string(), value.value.clone());
                next.push(coordinates);
            }
        }
        candidates = next;
    }

    candidates
        .into_iter()
        .filter(|coordinates| combination_allowed(source, coordinates))
        .map(DimensionSpacePoint::new)
        .collect()
}

fn combination_allowed(source: &ContentDimensionSource, coordinates: &BTreeMap<String, String>) -> bool {
    let chosen: Vec<_> = source
        .dimensions()
        .iter()
        .filter_map(|d| {
            let value = coordinates.get(d.id.as_str())?;
            Some((d.id.as_str(), d.value(value)?))
        })
        .collect();
    chosen.iter().all(|(dimension, value)| {
        chosen
            .iter()
            .filter(|(other, _)| other != dimension)
            .all(|(other, other_value)| value.allows_combination_with(other, &other_value.value))
    })
}
