//! Dimension space points and sets of them

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A coordinate in the dimension space: dimension id → value
///
/// Equality is by coordinates. The hash is computed once on construction and
/// is the key under which points are indexed everywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, String>",
    into = "BTreeMap<String, String>"
)]
pub struct DimensionSpacePoint {
    coordinates: BTreeMap<String, String>,
    hash: String,
}

impl DimensionSpacePoint {
    pub fn new(coordinates: BTreeMap<String, String>) -> Self {
        let hash = Self::compute_hash(&coordinates);
        Self { coordinates, hash }
    }

    /// The point without any coordinate, origin of root node aggregates
    pub fn empty() -> Self {
        Self::new(BTreeMap::new())
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    // Length-prefixed pairs in key order: no two coordinate maps share input bytes.
    fn compute_hash(coordinates: &BTreeMap<String, String>) -> String {
        let mut hasher = Sha256::new();
        for (dimension, value) in coordinates {
            hasher.update((dimension.len() as u64).to_le_bytes());
            hasher.update(dimension.as_bytes());
            hasher.update((value.len() as u64).to_le_bytes());
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn coordinates(&self) -> &BTreeMap<String, String> {
        &self.coordinates
    }

    pub fn coordinate(&self, dimension: &str) -> Option<&str> {
        self.coordinates.get(dimension).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Copy of this point with one coordinate replaced
    pub fn vary(&self, dimension: &str, value: &str) -> Self {
        let mut coordinates = self.coordinates.clone();
        coordinates.insert(dimension.to_string(), value.to_string());
        Self::new(coordinates)
    }

    /// JSON object form, used in error messages and log fields
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(&self.coordinates).unwrap_or_default()
    }
}

impl From<BTreeMap<String, String>> for DimensionSpacePoint {
    fn from(coordinates: BTreeMap<String, String>) -> Self {
        Self::new(coordinates)
    }
}

impl From<DimensionSpacePoint> for BTreeMap<String, String> {
    fn from(point: DimensionSpacePoint) -> Self {
        point.coordinates
    }
}

impl PartialEq for DimensionSpacePoint {
    fn eq(&self, other: &Self) -> bool {
        self.coordinates == other.coordinates
    }
}

impl Eq for DimensionSpacePoint {}

impl std::hash::Hash for DimensionSpacePoint {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl PartialOrd for DimensionSpacePoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DimensionSpacePoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.hash
            .cmp(&other.hash)
            .then_with(|| self.coordinates.cmp(&other.coordinates))
    }
}

impl std::fmt::Display for DimensionSpacePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json_string())
    }
}

/// A point a node variant originates in
///
/// Same coordinates as a plain point; the separate type keeps "where a node
/// lives" apart from "where it is visible".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginDimensionSpacePoint(DimensionSpacePoint);

impl OriginDimensionSpacePoint {
    pub fn empty() -> Self {
        Self(DimensionSpacePoint::empty())
    }

    pub fn from_point(point: DimensionSpacePoint) -> Self {
        Self(point)
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self(DimensionSpacePoint::from_pairs(pairs))
    }

    pub fn as_point(&self) -> &DimensionSpacePoint {
        &self.0
    }

    pub fn to_point(&self) -> DimensionSpacePoint {
        self.0.clone()
    }

    pub fn hash(&self) -> &str {
        self.0.hash()
    }
}

impl From<DimensionSpacePoint> for OriginDimensionSpacePoint {
    fn from(point: DimensionSpacePoint) -> Self {
        Self(point)
    }
}

impl std::fmt::Display for OriginDimensionSpacePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Set of points ordered by hash, serialized as a JSON array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "Vec<DimensionSpacePoint>",
    into = "Vec<DimensionSpacePoint>"
)]
pub struct DimensionSpacePointSet {
    points: BTreeMap<String, DimensionSpacePoint>,
}

impl DimensionSpacePointSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(point: DimensionSpacePoint) -> Self {
        let mut set = Self::new();
        set.insert(point);
        set
    }

    /// Returns false when the point was already present
    pub fn insert(&mut self, point: DimensionSpacePoint) -> bool {
        self.points.insert(point.hash().to_string(), point).is_none()
    }

    pub fn remove(&mut self, point: &DimensionSpacePoint) -> bool {
        self.points.remove(point.hash()).is_some()
    }

    pub fn contains(&self, point: &DimensionSpacePoint) -> bool {
        self.points.contains_key(point.hash())
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.points.contains_key(hash)
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<&DimensionSpacePoint> {
        self.points.get(hash)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionSpacePoint> {
        self.points.values()
    }

    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.points.keys().map(String::as_str)
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut points = self.points.clone();
        for (hash, point) in &other.points {
            points
                .entry(hash.clone())
                .or_insert_with(|| point.clone());
        }
        Self { points }
    }

    pub fn intersection(&self, other: &Self) -> Self {
        self.iter().filter(|p| other.contains(p)).cloned().collect()
    }

    pub fn difference(&self, other: &Self) -> Self {
        self.iter().filter(|p| !other.contains(p)).cloned().collect()
    }

    pub fn is_subset_of(&self, other: &Self) -> bool {
        self.points.keys().all(|h| other.contains_hash(h))
    }
}

impl FromIterator<DimensionSpacePoint> for DimensionSpacePointSet {
    fn from_iter<I: IntoIterator<Item = DimensionSpacePoint>>(iter: I) -> Self {
        let mut set = Self::new();
        for point in iter {
            set.insert(point);
        }
        set
    }
}

impl<'a> IntoIterator for &'a DimensionSpacePointSet {
    type Item = &'a DimensionSpacePoint;
    type IntoIter = std::collections::btree_map::Values<'a, String, DimensionSpacePoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.values()
    }
}

impl From<Vec<DimensionSpacePoint>> for DimensionSpacePointSet {
    fn from(points: Vec<DimensionSpacePoint>) -> Self {
        points.into_iter().collect()
    }
}

impl From<DimensionSpacePointSet> for Vec<DimensionSpacePoint> {
    fn from(set: DimensionSpacePointSet) -> Self {
        set.points.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(pairs: &[(&str, &str)]) -> DimensionSpacePoint {
        DimensionSpacePoint::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_hash_is_independent_of_insertion_order() {
        let a = point(&[("language", "de"), ("market", "CH")]);
        let b = point(&[("market", "CH"), ("language", "de")]);
        assert_eq!(a, b);
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_length_prefix_separates_ambiguous_concatenations() {
        let a = point(&[("ab", "c")]);
        let b = point(&[("a", "bc")]);
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn test_vary_replaces_one_coordinate() {
        let de = point(&[("language", "de"), ("market", "CH")]);
        let gsw = de.vary("language", "gsw");
        assert_eq!(gsw.coordinate("language"), Some("gsw"));
        assert_eq!(gsw.coordinate("market"), Some("CH"));
        assert_eq!(de.coordinate("language"), Some("de"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let p = point(&[("language", "de")]);
        assert_eq!(serde_json::to_string(&p).unwrap(), r#"{"language":"de"}"#);
        let back: DimensionSpacePoint = serde_json::from_str(r#"{"language":"de"}"#).unwrap();
        assert_eq!(back.hash(), p.hash());
    }

    #[test]
    fn test_set_operations() {
        let de = point(&[("language", "de")]);
        let en = point(&[("language", "en")]);
        let gsw = point(&[("language", "gsw")]);

        let a: DimensionSpacePointSet = vec![de.clone(), en.clone()].into();
        let b: DimensionSpacePointSet = vec![en.clone(), gsw.clone()].into();

        assert_eq!(a.union(&b).len(), 3);
        assert_eq!(a.intersection(&b), DimensionSpacePointSet::single(en.clone()));
        assert_eq!(a.difference(&b), DimensionSpacePointSet::single(de));
        assert!(DimensionSpacePointSet::single(en).is_subset_of(&a));
    }

    #[test]
    fn test_set_serializes_as_array() {
        let set = DimensionSpacePointSet::single(point(&[("language", "de")]));
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"[{"language":"de"}]"#);
        let back: DimensionSpacePointSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
