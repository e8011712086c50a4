#![allow(clippy::unwrap_used, clippy::expect_used)]

use contentgraph_core::errors::{CgError, CgErrorKind, ContentGraphError};
use contentgraph_core_types::{RequestId, TraceId};

#[test]
fn test_missing_node_aggregate_verifiable_by_kind() {
    let err = ContentGraphError::NodeAggregateCurrentlyDoesNotExist {
        content_stream_id: "cs-1".to_string(),
        node_aggregate_id: "a".to_string(),
    };

    let cg_err: CgError = err.into();

    assert_eq!(cg_err.kind(), CgErrorKind::NotFound);
    assert_eq!(cg_err.code(), "ERR_NOT_FOUND");
    assert_eq!(cg_err.entity_id(), Some("a"));
    assert_eq!(cg_err.content_stream_id(), Some("cs-1"));
}

#[test]
fn test_domain_error_is_kept_for_matching() {
    let err = ContentGraphError::NodeAggregateIsTethered {
        node_aggregate_id: "main".to_string(),
    };

    let cg_err: CgError = err.clone().into();

    assert_eq!(cg_err.kind(), CgErrorKind::PreconditionFailed);
    assert_eq!(cg_err.domain_error(), Some(&err));
    assert!(cg_err.message().contains("main"));
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (CgErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
        (CgErrorKind::NotFound, "ERR_NOT_FOUND"),
        (CgErrorKind::AlreadyExists, "ERR_ALREADY_EXISTS"),
        (CgErrorKind::PreconditionFailed, "ERR_PRECONDITION_FAILED"),
        (CgErrorKind::Concurrency, "ERR_CONCURRENCY"),
        (CgErrorKind::Timeout, "ERR_TIMEOUT"),
        (CgErrorKind::IntegrityViolation, "ERR_INTEGRITY_VIOLATION"),
        (CgErrorKind::InvalidConfiguration, "ERR_INVALID_CONFIGURATION"),
        (CgErrorKind::Serialization, "ERR_SERIALIZATION"),
        (CgErrorKind::Persistence, "ERR_PERSISTENCE"),
        (CgErrorKind::Io, "ERR_IO"),
        (CgErrorKind::Internal, "ERR_INTERNAL"),
    ];

    let mut seen = std::collections::HashSet::new();
    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
        assert!(seen.insert(expected_code), "duplicate code {}", expected_code);
    }
}

#[test]
fn test_rejections_and_transients_are_disjoint() {
    let cases = vec![
        (
            ContentGraphError::PropertyCannotBeSet {
                property_name: "color".to_string(),
                node_type_name: "Acme:Document".to_string(),
            },
            true,
            false,
        ),
        (
            ContentGraphError::ConcurrencyConflict {
                stream_name: "contentStream-cs".to_string(),
                expected: "version 3".to_string(),
                actual: Some(4),
            },
            false,
            true,
        ),
        (
            ContentGraphError::ContentStreamIsHalted {
                content_stream_id: "cs".to_string(),
                reason: "broken".to_string(),
            },
            false,
            false,
        ),
    ];

    for (err, rejection, transient) in cases {
        let cg_err: CgError = err.into();
        assert_eq!(cg_err.is_command_rejection(), rejection, "{}", cg_err);
        assert_eq!(cg_err.is_transient(), transient, "{}", cg_err);
    }
}

#[test]
fn test_workspace_errors_carry_workspace_name() {
    let err = ContentGraphError::BaseWorkspaceHasBeenModifiedInTheMeantime {
        workspace_name: "user-a".to_string(),
        fork_version: 7,
    };

    let cg_err: CgError = err.into();

    assert_eq!(cg_err.kind(), CgErrorKind::PreconditionFailed);
    assert_eq!(cg_err.entity_id(), Some("user-a"));
}

#[test]
fn test_builder_context_and_display() {
    let request_id = RequestId::new();
    let cg_err = CgError::new(CgErrorKind::Persistence)
        .with_op("commit")
        .with_content_stream_id("cs-9")
        .with_message("disk full")
        .with_request_id(request_id.clone())
        .with_trace_id(TraceId::new());

    let display = cg_err.to_string();

    assert!(display.starts_with("[ERR_PERSISTENCE]"));
    assert!(display.contains("in operation 'commit'"));
    assert!(display.contains("disk full"));
    assert!(display.contains("cs-9"));
    assert_eq!(cg_err.request_id(), Some(&request_id));
    assert!(cg_err.trace_id().is_some());
}

#[test]
fn test_source_chain() {
    let inner = CgError::new(CgErrorKind::Io).with_message("connection reset");
    let outer = CgError::new(CgErrorKind::Persistence)
        .with_message("commit failed")
        .with_source(inner);

    let source = std::error::Error::source(&outer).unwrap();

    assert!(source.to_string().contains("connection reset"));
    assert_eq!(outer.source_error().map(|e| e.kind()), Some(CgErrorKind::Io));
}

#[test]
fn test_every_precondition_error_is_a_rejection() {
    let errors = vec![
        ContentGraphError::NodeTypeIsAbstract {
            node_type_name: "Acme:Abstract".to_string(),
        },
        ContentGraphError::DimensionSpacePointIsNotYetOccupied {
            node_aggregate_id: "a".to_string(),
            dimension_space_point: "{\"language\":\"de\"}".to_string(),
        },
        ContentGraphError::NodeNameIsAlreadyOccupied {
            node_name: "about".to_string(),
            parent_node_aggregate_id: "root".to_string(),
            dimension_space_point: "{\"language\":\"de\"}".to_string(),
        },
        ContentGraphError::WorkspaceDoesNotExist {
            workspace_name: "user-a".to_string(),
        },
    ];

    for err in errors {
        assert!(err.is_command_rejection(), "{:?}", err);
    }
}
