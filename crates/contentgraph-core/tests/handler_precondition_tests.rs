#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::*;
use contentgraph_core::commands::{
    Command, CreateNodeAggregateWithNode, CreateNodeVariant, CreateRootNodeAggregateWithNode,
    ForkContentStream, NodeAggregateVariantSelection, NodeReferenceToWrite, RemoveContentStream,
    SetNodeReferences, SetSerializedNodeProperties,
};
use contentgraph_core::errors::ContentGraphError;
use contentgraph_core::events::{Event, NodePropertiesWereSet};
use contentgraph_core::handlers::{handle, CommandContext};
use contentgraph_core::model::{
    NodeAggregateId, NodeVariantSelectionStrategy, ReferenceName, SerializedPropertyValue,
    SerializedPropertyValues,
};
use contentgraph_core::stream::ExpectedVersion;
use serde_json::json;

fn props(name: &str, value: &str) -> SerializedPropertyValues {
    SerializedPropertyValues::new().with(
        contentgraph_core::model::PropertyName::new(name).unwrap(),
        SerializedPropertyValue::new(json!(value), "string"),
    )
}

fn selection(id: &str, at: &str, strategy: NodeVariantSelectionStrategy) -> NodeAggregateVariantSelection {
    NodeAggregateVariantSelection::new(csid("cs"), nid(id), lang(at), strategy, user())
}

// ===== Content streams =====

#[test]
fn test_create_existing_content_stream_is_rejected() {
    // GIVEN a content stream
    let mut harness = Harness::new();
    harness.create_content_stream("cs").unwrap();

    // WHEN it is created again
    let err = harness.create_content_stream("cs").unwrap_err();

    // THEN the id is taken
    assert!(matches!(err, ContentGraphError::ContentStreamAlreadyExists { .. }));
}

#[test]
fn test_fork_of_unknown_source_is_rejected() {
    let mut harness = Harness::new();
    let command = ForkContentStream::new(csid("fork"), csid("nowhere"), user()).unwrap();

    let err = harness.handle(Command::ForkContentStream(command)).unwrap_err();

    assert!(matches!(err, ContentGraphError::ContentStreamDoesNotExistYet { .. }));
}

#[test]
fn test_fork_onto_itself_is_an_invalid_command() {
    let err = ForkContentStream::new(csid("cs"), csid("cs"), user()).unwrap_err();
    assert!(matches!(err, ContentGraphError::InvalidCommand { .. }));
}

#[test]
fn test_removed_stream_rejects_node_commands_and_keeps_its_id() {
    // GIVEN a removed content stream
    let mut harness = Harness::with_root("cs");
    harness
        .handle(Command::RemoveContentStream(RemoveContentStream {
            content_stream_id: csid("cs"),
            initiating_user_id: user(),
        }))
        .unwrap();

    // WHEN a node is created in it, or the stream is created again
    let node_err = harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap_err();
    let create_err = harness.create_content_stream("cs").unwrap_err();

    // THEN both are rejected
    assert!(matches!(node_err, ContentGraphError::ContentStreamDoesNotExistYet { .. }));
    assert!(matches!(create_err, ContentGraphError::ContentStreamAlreadyExists { .. }));
    assert!(harness.projections.graph(&csid("cs")).is_none());
}

// ===== Root node aggregates =====

#[test]
fn test_root_type_can_only_be_used_once_per_stream() {
    let mut harness = Harness::with_root("cs");

    let err = harness
        .handle(Command::CreateRootNodeAggregateWithNode(CreateRootNodeAggregateWithNode {
            content_stream_id: csid("cs"),
            node_aggregate_id: nid("second-root"),
            node_type_name: type_name(ROOT_TYPE),
            initiating_user_id: user(),
        }))
        .unwrap_err();

    assert!(matches!(err, ContentGraphError::RootNodeAggregateTypeIsAlreadyOccupied { .. }));
}

#[test]
fn test_root_aggregate_requires_root_type() {
    let mut harness = Harness::new();
    harness.create_content_stream("cs").unwrap();

    let err = harness
        .handle(Command::CreateRootNodeAggregateWithNode(CreateRootNodeAggregateWithNode {
            content_stream_id: csid("cs"),
            node_aggregate_id: nid("root"),
            node_type_name: type_name(DOCUMENT_TYPE),
            initiating_user_id: user(),
        }))
        .unwrap_err();

    assert!(matches!(err, ContentGraphError::NodeTypeIsNotOfTypeRoot { .. }));
}

#[test]
fn test_root_covers_the_allowed_subspace() {
    let harness = Harness::with_root("cs");

    let root = harness.graph("cs").node_aggregate(&nid("root")).unwrap();

    assert_eq!(&root.covered, harness.variation_graph.allowed_dimension_subspace());
    assert!(root.classification.is_root());
}

// ===== Node creation =====

#[test]
fn test_node_creation_preconditions() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();

    let cases: Vec<(&str, &str, &str, &str, fn(&ContentGraphError) -> bool)> = vec![
        ("b", "Acme:Unknown", "mul", "root", |e| {
            matches!(e, ContentGraphError::NodeTypeNotFound { .. })
        }),
        ("b", "Acme:Abstract", "mul", "root", |e| {
            matches!(e, ContentGraphError::NodeTypeIsAbstract { .. })
        }),
        ("b", ROOT_TYPE, "mul", "root", |e| {
            matches!(e, ContentGraphError::NodeTypeIsOfTypeRoot { .. })
        }),
        ("b", DOCUMENT_TYPE, "fr", "root", |e| {
            matches!(e, ContentGraphError::DimensionSpacePointNotFound { .. })
        }),
        ("b", DOCUMENT_TYPE, "mul", "missing", |e| {
            matches!(e, ContentGraphError::NodeAggregateCurrentlyDoesNotExist { .. })
        }),
        ("a", DOCUMENT_TYPE, "mul", "root", |e| {
            matches!(e, ContentGraphError::NodeAggregateCurrentlyExists { .. })
        }),
        ("b", DOCUMENT_TYPE, "en", "a", |e| {
            matches!(
                e,
                ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }
            )
        }),
    ];

    for (id, node_type, at, parent, expected) in cases {
        let err = harness.create_node("cs", id, node_type, at, parent).unwrap_err();
        assert!(expected(&err), "{} {} {} {}: unexpected {:?}", id, node_type, at, parent, err);
    }
}

#[test]
fn test_undeclared_initial_property_is_rejected() {
    let mut harness = Harness::with_root("cs");
    let command = CreateNodeAggregateWithNode::new(
        csid("cs"),
        nid("a"),
        type_name(DOCUMENT_TYPE),
        origin("mul"),
        nid("root"),
        user(),
    )
    .unwrap()
    .with_initial_property_values(props("color", "red"));

    let err = harness.handle(Command::CreateNodeAggregateWithNode(command)).unwrap_err();

    assert!(matches!(err, ContentGraphError::PropertyCannotBeSet { .. }));
}

#[test]
fn test_node_name_is_unique_below_parent() {
    // GIVEN a child named "about" below the root
    let mut harness = Harness::with_root("cs");
    let named = |id: &str| {
        CreateNodeAggregateWithNode::new(
            csid("cs"),
            nid(id),
            type_name(DOCUMENT_TYPE),
            origin("mul"),
            nid("root"),
            user(),
        )
        .unwrap()
        .with_node_name(node_name("about"))
    };
    harness.handle(Command::CreateNodeAggregateWithNode(named("a"))).unwrap();

    // WHEN a sibling with the same name is created
    let err = harness.handle(Command::CreateNodeAggregateWithNode(named("b"))).unwrap_err();

    // THEN the name is occupied
    assert!(matches!(err, ContentGraphError::NodeNameIsAlreadyOccupied { .. }));
}

#[test]
fn test_defaults_are_merged_under_given_values() {
    let mut harness = Harness::with_root("cs");

    let events = harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();

    let Event::NodeAggregateWithNodeWasCreated(created) = &events[0] else {
        panic!("unexpected event {:?}", events[0]);
    };
    assert_eq!(
        created.initial_property_values.get("title").map(|v| v.value.clone()),
        Some(json!("untitled"))
    );
}

#[test]
fn test_created_node_covers_specializations_within_parent_coverage() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();

    harness.create_node("cs", "b", DOCUMENT_TYPE, "gsw", "a").unwrap();

    let graph = harness.graph("cs");
    let a = graph.node_aggregate(&nid("a")).unwrap();
    let b = graph.node_aggregate(&nid("b")).unwrap();
    assert_eq!(a.covered, [lang("de"), lang("gsw")].into_iter().collect());
    assert_eq!(b.covered, [lang("gsw")].into_iter().collect());
}

#[test]
fn test_node_command_expects_current_stream_version() {
    // GIVEN created (0) and root (1)
    let harness = Harness::with_root("cs");
    let command = CreateNodeAggregateWithNode::new(
        csid("cs"),
        nid("a"),
        type_name(DOCUMENT_TYPE),
        origin("mul"),
        nid("root"),
        user(),
    )
    .unwrap();

    // WHEN handled
    let ctx = CommandContext::new(&harness.variation_graph, &harness.node_types, &harness.projections);
    let to_publish = handle(&Command::CreateNodeAggregateWithNode(command), &ctx).unwrap();

    // THEN the batch expects exactly version 1 of the stream
    assert_eq!(to_publish.stream_name, "contentStream-cs");
    assert_eq!(to_publish.expected_version, ExpectedVersion::Exact(1));
}

#[test]
fn test_stale_snapshot_surfaces_as_version_mismatch() {
    // GIVEN events computed against a snapshot
    let mut harness = Harness::with_root("cs");
    let command = CreateNodeAggregateWithNode::new(
        csid("cs"),
        nid("a"),
        type_name(DOCUMENT_TYPE),
        origin("mul"),
        nid("root"),
        user(),
    )
    .unwrap();
    let to_publish = {
        let ctx = CommandContext::new(&harness.variation_graph, &harness.node_types, &harness.projections);
        handle(&Command::CreateNodeAggregateWithNode(command), &ctx).unwrap()
    };

    // WHEN another command lands on the stream first
    harness.create_node("cs", "b", DOCUMENT_TYPE, "mul", "root").unwrap();

    // THEN the stale batch no longer matches the stream version
    let current = harness.stream_version(&to_publish.stream_name);
    assert_eq!(current, Some(2));
    assert!(!to_publish.expected_version.is_satisfied_by(current));
}

// ===== Tethered descendants =====

#[test]
fn test_tethered_descendants_are_created_with_derived_ids() {
    // GIVEN a page type with main/footer tethered below it
    let mut harness = Harness::with_root("cs");

    // WHEN a page is created
    harness.create_node("cs", "page", PAGE_TYPE, "mul", "root").unwrap();

    // THEN main and main/footer exist, tethered, with deterministic ids
    let main_id = NodeAggregateId::for_tethered_child(&nid("page"), "main");
    let footer_id = NodeAggregateId::for_tethered_child(&nid("page"), "main/footer");
    let subgraph = harness.subgraph("cs", "gsw");
    let main = subgraph.find_child_node_by_name(&nid("page"), &node_name("main")).unwrap();
    assert_eq!(main.node_aggregate_id, main_id);
    assert!(main.classification.is_tethered());
    let footer = subgraph.find_child_node_by_name(&main_id, &node_name("footer")).unwrap();
    assert_eq!(footer.node_aggregate_id, footer_id);
}

#[test]
fn test_explicit_tethered_id_is_used() {
    let mut harness = Harness::with_root("cs");
    let command = CreateNodeAggregateWithNode::new(
        csid("cs"),
        nid("page"),
        type_name(PAGE_TYPE),
        origin("mul"),
        nid("root"),
        user(),
    )
    .unwrap()
    .with_tethered_descendant_id("main", nid("page-main"));

    harness.handle(Command::CreateNodeAggregateWithNode(command)).unwrap();

    let graph = harness.graph("cs");
    assert!(graph.aggregate_exists(&nid("page-main")));
    assert!(graph.aggregate_exists(&NodeAggregateId::for_tethered_child(&nid("page"), "main/footer")));
}

#[test]
fn test_tethered_aggregates_cannot_be_removed_or_varied() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "page", PAGE_TYPE, "mul", "root").unwrap();
    let main_id = NodeAggregateId::for_tethered_child(&nid("page"), "main");

    let remove_err = harness
        .handle(Command::RemoveNodeAggregate(NodeAggregateVariantSelection::new(
            csid("cs"),
            main_id.clone(),
            lang("mul"),
            NodeVariantSelectionStrategy::AllVariants,
            user(),
        )))
        .unwrap_err();
    let variant_err = harness
        .handle(Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), main_id, origin("mul"), origin("de"), user()).unwrap(),
        ))
        .unwrap_err();

    assert!(matches!(remove_err, ContentGraphError::TetheredNodeAggregateCannotBeRemoved { .. }));
    assert!(matches!(variant_err, ContentGraphError::NodeAggregateIsTethered { .. }));
}

// ===== Variants =====

#[test]
fn test_variant_preconditions() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();
    let variant = |source: &str, target: &str| {
        Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), nid("a"), origin(source), origin(target), user()).unwrap(),
        )
    };

    let unoccupied = harness.handle(variant("de", "en")).unwrap_err();
    harness.handle(variant("mul", "de")).unwrap();
    let occupied = harness.handle(variant("mul", "de")).unwrap_err();
    let root = harness
        .handle(Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), nid("root"), origin("mul"), origin("de"), user()).unwrap(),
        ))
        .unwrap_err();

    assert!(matches!(unoccupied, ContentGraphError::DimensionSpacePointIsNotYetOccupied { .. }));
    assert!(matches!(occupied, ContentGraphError::DimensionSpacePointIsAlreadyOccupied { .. }));
    assert!(matches!(root, ContentGraphError::NodeAggregateIsRoot { .. }));
}

#[test]
fn test_variant_type_selects_event() {
    // GIVEN a node at de
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();
    let variant = |source: &str, target: &str| {
        Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), nid("a"), origin(source), origin(target), user()).unwrap(),
        )
    };

    // WHEN varied towards gsw and mul
    let specialization = harness.handle(variant("de", "gsw")).unwrap();
    let generalization = harness.handle(variant("de", "mul")).unwrap();

    // THEN the variant type picks the event and the generalization fills the gaps
    assert!(matches!(specialization[0], Event::NodeSpecializationVariantWasCreated(_)));
    let Event::NodeGeneralizationVariantWasCreated(e) = &generalization[0] else {
        panic!("unexpected event {:?}", generalization[0]);
    };
    assert_eq!(e.generalization_coverage, [lang("mul"), lang("en")].into_iter().collect());
}

#[test]
fn test_peer_variant_covers_uncovered_part_of_target() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();

    let events = harness
        .handle(Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), nid("a"), origin("de"), origin("en"), user()).unwrap(),
        ))
        .unwrap();

    let Event::NodePeerVariantWasCreated(e) = &events[0] else {
        panic!("unexpected event {:?}", events[0]);
    };
    assert_eq!(e.peer_coverage, [lang("en")].into_iter().collect());
    let a = harness.graph("cs").node_aggregate(&nid("a")).unwrap();
    assert_eq!(a.covered, [lang("de"), lang("gsw"), lang("en")].into_iter().collect());
}

#[test]
fn test_tethered_children_follow_variant_of_parent() {
    // GIVEN a page with tethered main/footer at mul
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "page", PAGE_TYPE, "mul", "root").unwrap();

    // WHEN the page gets a de specialization
    let events = harness
        .handle(Command::CreateNodeVariant(
            CreateNodeVariant::new(csid("cs"), nid("page"), origin("mul"), origin("de"), user()).unwrap(),
        ))
        .unwrap();

    // THEN main and footer are specialized along with it
    assert_eq!(events.len(), 3);
    let main_id = NodeAggregateId::for_tethered_child(&nid("page"), "main");
    let footer_id = NodeAggregateId::for_tethered_child(&nid("page"), "main/footer");
    let graph = harness.graph("cs");
    for id in [&main_id, &footer_id] {
        let aggregate = graph.node_aggregate(id).unwrap();
        assert!(aggregate.occupies(&lang("de")), "{} not specialized", id);
        assert_eq!(aggregate.coverage_of(&lang("de")), [lang("de"), lang("gsw")].into_iter().collect());
    }
    let subgraph = harness.subgraph("cs", "gsw");
    let main = subgraph.find_child_node_by_name(&nid("page"), &node_name("main")).unwrap();
    assert_eq!(main.origin_dimension_space_point, origin("de"));
}

// ===== Disabling =====

#[test]
fn test_disable_and_enable_preconditions() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();

    let not_covered = harness
        .handle(Command::DisableNodeAggregate(selection(
            "a",
            "en",
            NodeVariantSelectionStrategy::OnlyGivenVariant,
        )))
        .unwrap_err();
    let not_disabled = harness
        .handle(Command::EnableNodeAggregate(selection(
            "a",
            "de",
            NodeVariantSelectionStrategy::OnlyGivenVariant,
        )))
        .unwrap_err();
    harness
        .handle(Command::DisableNodeAggregate(selection(
            "a",
            "de",
            NodeVariantSelectionStrategy::OnlyGivenVariant,
        )))
        .unwrap();
    let already_disabled = harness
        .handle(Command::DisableNodeAggregate(selection(
            "a",
            "de",
            NodeVariantSelectionStrategy::AllVariants,
        )))
        .unwrap_err();

    assert!(matches!(
        not_covered,
        ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }
    ));
    assert!(matches!(not_disabled, ContentGraphError::NodeAggregateCurrentlyEnabled { .. }));
    assert!(matches!(already_disabled, ContentGraphError::NodeAggregateCurrentlyDisabled { .. }));
}

#[test]
fn test_coverage_is_checked_before_disabled_state() {
    // GIVEN a covering de and gsw, disabled at de
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "de", "root").unwrap();
    harness
        .handle(Command::DisableNodeAggregate(selection(
            "a",
            "de",
            NodeVariantSelectionStrategy::AllVariants,
        )))
        .unwrap();

    // WHEN disabling and enabling it at en
    let disable = harness
        .handle(Command::DisableNodeAggregate(selection(
            "a",
            "en",
            NodeVariantSelectionStrategy::OnlyGivenVariant,
        )))
        .unwrap_err();
    let enable = harness
        .handle(Command::EnableNodeAggregate(selection(
            "a",
            "en",
            NodeVariantSelectionStrategy::OnlyGivenVariant,
        )))
        .unwrap_err();

    // THEN both fail on coverage, not on the enabled state at en
    assert!(
        matches!(disable, ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }),
        "{:?}",
        disable
    );
    assert!(
        matches!(enable, ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }),
        "{:?}",
        enable
    );
}

#[test]
fn test_selection_strategies() {
    // GIVEN a node at mul covering everything
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();
    let affected = |harness: &Harness, strategy| {
        let ctx = CommandContext::new(&harness.variation_graph, &harness.node_types, &harness.projections);
        let to_publish = handle(&Command::DisableNodeAggregate(selection("a", "de", strategy)), &ctx).unwrap();
        match &to_publish.events[0] {
            Event::NodeAggregateWasDisabled(e) => e.affected_dimension_space_points.clone(),
            other => panic!("unexpected event {:?}", other),
        }
    };

    // WHEN / THEN
    assert_eq!(
        affected(&harness, NodeVariantSelectionStrategy::OnlyGivenVariant),
        [lang("de")].into_iter().collect()
    );
    assert_eq!(
        affected(&harness, NodeVariantSelectionStrategy::AllSpecializations),
        [lang("de"), lang("gsw")].into_iter().collect()
    );
    assert_eq!(
        &affected(&harness, NodeVariantSelectionStrategy::AllVariants),
        harness.variation_graph.allowed_dimension_subspace()
    );
}

// ===== Properties and references =====

#[test]
fn test_property_preconditions() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();
    let set = |id: &str, at: &str, name: &str| {
        Command::SetSerializedNodeProperties(
            SetSerializedNodeProperties::new(csid("cs"), nid(id), origin(at), props(name, "x"), user()).unwrap(),
        )
    };

    let on_root = harness.handle(set("root", "mul", "title")).unwrap_err();
    let unoccupied = harness.handle(set("a", "de", "title")).unwrap_err();
    let undeclared = harness.handle(set("a", "mul", "color")).unwrap_err();
    let empty = SetSerializedNodeProperties::new(
        csid("cs"),
        nid("a"),
        origin("mul"),
        SerializedPropertyValues::new(),
        user(),
    )
    .unwrap_err();

    assert!(matches!(on_root, ContentGraphError::NodeAggregateIsRoot { .. }));
    assert!(matches!(unoccupied, ContentGraphError::DimensionSpacePointIsNotYetOccupied { .. }));
    assert!(matches!(undeclared, ContentGraphError::PropertyCannotBeSet { .. }));
    assert!(matches!(empty, ContentGraphError::InvalidCommand { .. }));
}

#[test]
fn test_properties_are_split_by_scope() {
    // GIVEN a document occupying mul, de and gsw
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();
    for (source, target) in [("mul", "de"), ("de", "gsw")] {
        harness
            .handle(Command::CreateNodeVariant(
                CreateNodeVariant::new(csid("cs"), nid("a"), origin(source), origin(target), user()).unwrap(),
            ))
            .unwrap();
    }

    // WHEN node, specializations and aggregate scoped values are set at de
    let values = props("title", "Titel")
        .merge(&props("layout", "wide"))
        .merge(&props("uriPathSegment", "about"));
    let events = harness
        .handle(Command::SetSerializedNodeProperties(
            SetSerializedNodeProperties::new(csid("cs"), nid("a"), origin("de"), values, user()).unwrap(),
        ))
        .unwrap();

    // THEN one event per origin carries exactly the values in scope there
    let by_origin: Vec<&NodePropertiesWereSet> = events
        .iter()
        .map(|e| match e {
            Event::NodePropertiesWereSet(e) => e,
            other => panic!("unexpected event {:?}", other),
        })
        .collect();
    assert_eq!(by_origin.len(), 3);
    let names_at = |at: &str| -> Vec<String> {
        let event = by_origin
            .iter()
            .find(|e| e.origin_dimension_space_point == origin(at))
            .unwrap();
        event.property_values.names().map(|n| n.to_string()).collect()
    };
    assert_eq!(names_at("mul"), vec!["uriPathSegment"]);
    assert_eq!(names_at("de"), vec!["layout", "title", "uriPathSegment"]);
    assert_eq!(names_at("gsw"), vec!["layout", "uriPathSegment"]);

    let graph = harness.graph("cs");
    let gsw = graph.node_by_origin(&nid("a"), &lang("gsw")).unwrap();
    assert_eq!(gsw.properties.get("layout").map(|v| v.value.clone()), Some(json!("wide")));
    assert_eq!(gsw.properties.get("title").map(|v| v.value.clone()), Some(json!("untitled")));
}

#[test]
fn test_reference_preconditions() {
    let mut harness = Harness::with_root("cs");
    harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap();
    harness.create_node("cs", "b", DOCUMENT_TYPE, "de", "root").unwrap();
    let refer = |name: &str, targets: &[&str]| {
        Command::SetNodeReferences(
            SetNodeReferences::new(
                csid("cs"),
                nid("a"),
                origin("mul"),
                ReferenceName::new(name).unwrap(),
                targets
                    .iter()
                    .map(|t| NodeReferenceToWrite {
                        target_node_aggregate_id: nid(t),
                        properties: None,
                    })
                    .collect(),
                user(),
            )
            .unwrap(),
        )
    };

    let undeclared = harness.handle(refer("likes", &["root"])).unwrap_err();
    let missing = harness.handle(refer("related", &["nobody"])).unwrap_err();
    // b is only visible at de and gsw, a at mul is visible everywhere
    let partial = harness.handle(refer("related", &["b"])).unwrap_err();

    assert!(matches!(undeclared, ContentGraphError::ReferenceCannotBeSet { .. }));
    assert!(matches!(missing, ContentGraphError::NodeAggregateCurrentlyDoesNotExist { .. }));
    assert!(matches!(
        partial,
        ContentGraphError::NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }
    ));
}

#[test]
fn test_duplicate_reference_target_is_an_invalid_command() {
    let target = || NodeReferenceToWrite {
        target_node_aggregate_id: nid("b"),
        properties: None,
    };
    let err = SetNodeReferences::new(
        csid("cs"),
        nid("a"),
        origin("mul"),
        ReferenceName::new("related").unwrap(),
        vec![target(), target()],
        user(),
    )
    .unwrap_err();

    assert!(matches!(err, ContentGraphError::InvalidCommand { .. }));
}

#[test]
fn test_root_cannot_be_removed() {
    let mut harness = Harness::with_root("cs");

    let err = harness
        .handle(Command::RemoveNodeAggregate(selection(
            "root",
            "mul",
            NodeVariantSelectionStrategy::AllVariants,
        )))
        .unwrap_err();

    assert!(matches!(err, ContentGraphError::NodeAggregateIsRoot { .. }));
}

// ===== Halted streams =====

#[test]
fn test_halted_stream_rejects_commands_but_can_be_removed() {
    // GIVEN a stream whose fold failed
    let mut harness = Harness::with_root("cs");
    harness.append(
        "contentStream-cs",
        2,
        Event::NodePropertiesWereSet(NodePropertiesWereSet {
            content_stream_id: csid("cs"),
            node_aggregate_id: nid("ghost"),
            origin_dimension_space_point: origin("mul"),
            property_values: props("title", "boo"),
        }),
    );
    let fold_err = harness.catch_up().unwrap_err();
    assert!(matches!(fold_err, ContentGraphError::ProjectionIntegrityViolation { .. }));

    // WHEN commands arrive for it
    let err = harness.create_node("cs", "a", DOCUMENT_TYPE, "mul", "root").unwrap_err();
    let removed = harness.handle(Command::RemoveContentStream(RemoveContentStream {
        content_stream_id: csid("cs"),
        initiating_user_id: user(),
    }));

    // THEN node commands are rejected and removal still works
    assert!(matches!(err, ContentGraphError::ContentStreamIsHalted { .. }));
    assert!(removed.is_ok());
}
