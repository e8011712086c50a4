#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use contentgraph_core::dimension::{
    DimensionConfig, DimensionDefinition, DimensionSpacePoint, DimensionSpacePointSet,
    DimensionValueDefinition, InterDimensionalVariationGraph, VariantType,
};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// A fallback forest over `v0..vn`, each value falling back to an earlier one or to nothing
fn fallback_forest() -> impl Strategy<Value = Vec<Option<usize>>> {
    prop::collection::vec(any::<u8>(), 1..8).prop_map(|seeds| {
        seeds
            .iter()
            .enumerate()
            .map(|(i, seed)| {
                if i == 0 || seed % 3 == 0 {
                    None
                } else {
                    Some(*seed as usize % i)
                }
            })
            .collect()
    })
}

fn graph_of(fallbacks: &[Option<usize>]) -> InterDimensionalVariationGraph {
    let values: Vec<(String, Option<String>)> = fallbacks
        .iter()
        .enumerate()
        .map(|(i, f)| (format!("v{}", i), f.map(|j| format!("v{}", j))))
        .collect();
    let borrowed: Vec<(&str, Option<&str>)> = values
        .iter()
        .map(|(v, f)| (v.as_str(), f.as_deref()))
        .collect();
    variation_graph_of(language_config_with(&borrowed))
}

fn points(graph: &InterDimensionalVariationGraph) -> Vec<DimensionSpacePoint> {
    graph.allowed_dimension_subspace().iter().cloned().collect()
}

proptest! {
    #[test]
    fn prop_one_point_per_value(fallbacks in fallback_forest()) {
        let graph = graph_of(&fallbacks);
        prop_assert_eq!(graph.allowed_dimension_subspace().len(), fallbacks.len());
    }

    #[test]
    fn prop_specialization_mirrors_generalization(fallbacks in fallback_forest()) {
        let graph = graph_of(&fallbacks);
        for a in points(&graph) {
            for b in points(&graph) {
                let forward = graph.variant_type(&a, &b);
                let backward = graph.variant_type(&b, &a);
                match forward {
                    VariantType::Same => prop_assert_eq!(backward, VariantType::Same),
                    VariantType::Specialization => prop_assert_eq!(backward, VariantType::Generalization),
                    VariantType::Generalization => prop_assert_eq!(backward, VariantType::Specialization),
                    VariantType::Peer => prop_assert_eq!(backward, VariantType::Peer),
                }
            }
        }
    }

    #[test]
    fn prop_unrestricted_specialization_set_is_origin_and_specializations(fallbacks in fallback_forest()) {
        let graph = graph_of(&fallbacks);
        for point in points(&graph) {
            let set = graph.specialization_set(&point, true, &DimensionSpacePointSet::new()).unwrap();
            let expected = DimensionSpacePointSet::single(point.clone())
                .union(&graph.indexed_specializations(&point));
            prop_assert_eq!(set, expected);
        }
    }

    #[test]
    fn prop_primary_generalization_follows_fallback(fallbacks in fallback_forest()) {
        let graph = graph_of(&fallbacks);
        for (i, fallback) in fallbacks.iter().enumerate() {
            let point = lang(&format!("v{}", i));
            let expected = fallback.map(|j| lang(&format!("v{}", j)));
            prop_assert_eq!(graph.generalization_of(&point), expected);
        }
    }

    #[test]
    fn prop_excluding_a_point_excludes_its_subtree(fallbacks in fallback_forest()) {
        let graph = graph_of(&fallbacks);
        for origin in points(&graph) {
            for excluded in graph.indexed_specializations(&origin).iter() {
                let set = graph
                    .specialization_set(&origin, true, &DimensionSpacePointSet::single(excluded.clone()))
                    .unwrap();
                prop_assert!(!set.contains(excluded));
                for below in graph.indexed_specializations(excluded).iter() {
                    prop_assert!(!set.contains(below));
                }
            }
        }
    }
}

#[test]
fn test_two_dimensions_span_the_product() {
    // GIVEN language (mul ← de) and market (all ← eu)
    let value = |v: &str, f: Option<&str>| DimensionValueDefinition {
        value: v.to_string(),
        fallback: f.map(str::to_string),
        constraints: BTreeMap::new(),
    };
    let config = DimensionConfig {
        dimensions: vec![
            DimensionDefinition {
                id: "language".to_string(),
                values: vec![value("mul", None), value("de", Some("mul"))],
            },
            DimensionDefinition {
                id: "market".to_string(),
                values: vec![value("all", None), value("eu", Some("all"))],
            },
        ],
    };

    // WHEN the variation graph is built
    let graph = variation_graph_of(config);

    // THEN every combination is allowed and specialization works per coordinate
    let point = |l: &str, m: &str| DimensionSpacePoint::from_pairs([("language", l), ("market", m)]);
    assert_eq!(graph.allowed_dimension_subspace().len(), 4);
    assert_eq!(graph.variant_type(&point("de", "eu"), &point("mul", "all")), VariantType::Specialization);
    assert_eq!(graph.variant_type(&point("de", "all"), &point("mul", "eu")), VariantType::Peer);
    assert_eq!(
        graph.root_generalizations(),
        DimensionSpacePointSet::single(point("mul", "all"))
    );
}

#[test]
fn test_constraints_remove_combinations() {
    // GIVEN de is not allowed together with market us
    let mut constraints = BTreeMap::new();
    constraints.insert("market".to_string(), BTreeMap::from([("us".to_string(), false)]));
    let config = DimensionConfig {
        dimensions: vec![
            DimensionDefinition {
                id: "language".to_string(),
                values: vec![
                    DimensionValueDefinition {
                        value: "en".to_string(),
                        fallback: None,
                        constraints: BTreeMap::new(),
                    },
                    DimensionValueDefinition {
                        value: "de".to_string(),
                        fallback: None,
                        constraints,
                    },
                ],
            },
            DimensionDefinition {
                id: "market".to_string(),
                values: vec![
                    DimensionValueDefinition {
                        value: "us".to_string(),
                        fallback: None,
                        constraints: BTreeMap::new(),
                    },
                    DimensionValueDefinition {
                        value: "eu".to_string(),
                        fallback: None,
                        constraints: BTreeMap::new(),
                    },
                ],
            },
        ],
    };

    let graph = variation_graph_of(config);

    let point = |l: &str, m: &str| DimensionSpacePoint::from_pairs([("language", l), ("market", m)]);
    assert_eq!(graph.allowed_dimension_subspace().len(), 3);
    assert!(!graph.is_allowed(&point("de", "us")));
    assert!(graph.is_allowed(&point("de", "eu")));
}
