//! Shared fixtures: a repository over a `language` dimension with a small
//! node type schema, plus command builders

use contentgraph_core::commands::{
    Command, CreateContentStream, CreateNodeAggregateWithNode, CreateRootNodeAggregateWithNode,
    SetSerializedNodeProperties,
};
use contentgraph_core::dimension::{
    ContentDimensionSource, DimensionConfig, DimensionDefinition, DimensionSpacePoint,
    DimensionValueDefinition, InterDimensionalVariationGraph, OriginDimensionSpacePoint,
};
use contentgraph_core::model::{
    ContentStreamId, NodeAggregateId, NodeTypeName, PropertyName, SerializedPropertyValue,
    SerializedPropertyValues, UserId, WorkspaceName,
};
use contentgraph_core::node_types::InMemoryNodeTypeSchema;
use contentgraph_core::projection::VisibilityConstraints;
use contentgraph_engine::{CatchUpMode, ContentRepository, WorkspaceCommand};
use contentgraph_store::{EventStore, InMemoryEventStore};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const ROOT_TYPE: &str = "Acme:Root";
pub const DOCUMENT_TYPE: &str = "Acme:Document";

#[allow(dead_code)]
pub fn lang(value: &str) -> DimensionSpacePoint {
    DimensionSpacePoint::from_pairs([("language", value)])
}

#[allow(dead_code)]
pub fn origin(value: &str) -> OriginDimensionSpacePoint {
    OriginDimensionSpacePoint::from_pairs([("language", value)])
}

#[allow(dead_code)]
pub fn nid(id: &str) -> NodeAggregateId {
    NodeAggregateId::new(id).unwrap()
}

#[allow(dead_code)]
pub fn csid(id: &str) -> ContentStreamId {
    ContentStreamId::new(id).unwrap()
}

#[allow(dead_code)]
pub fn ws(name: &str) -> WorkspaceName {
    WorkspaceName::new(name).unwrap()
}

#[allow(dead_code)]
pub fn user() -> UserId {
    UserId::new("editor").unwrap()
}

/// mul ← de, mul ← en
#[allow(dead_code)]
pub fn language_graph() -> InterDimensionalVariationGraph {
    let value = |v: &str, f: Option<&str>| DimensionValueDefinition {
        value: v.to_string(),
        fallback: f.map(str::to_string),
        constraints: BTreeMap::new(),
    };
    let config = DimensionConfig {
        dimensions: vec![DimensionDefinition {
            id: "language".to_string(),
            values: vec![value("mul", None), value("de", Some("mul")), value("en", Some("mul"))],
        }],
    };
    InterDimensionalVariationGraph::new(ContentDimensionSource::try_from(config).unwrap()).unwrap()
}

#[allow(dead_code)]
pub fn node_types() -> Arc<InMemoryNodeTypeSchema> {
    Arc::new(
        InMemoryNodeTypeSchema::from_json(&serde_json::json!({
            "Acme:Root": { "root": true },
            "Acme:Document": {
                "properties": {
                    "title": { "type": "string", "scope": "node", "default": "untitled" }
                }
            }
        }))
        .unwrap(),
    )
}

#[allow(dead_code)]
pub fn repository_on(store: Arc<dyn EventStore>, mode: CatchUpMode) -> ContentRepository {
    ContentRepository::new(language_graph(), node_types(), store, mode).unwrap()
}

#[allow(dead_code)]
pub fn repository(mode: CatchUpMode) -> ContentRepository {
    repository_on(Arc::new(InMemoryEventStore::new()), mode)
}

#[allow(dead_code)]
pub fn create_content_stream(cs: &str) -> Command {
    Command::CreateContentStream(CreateContentStream {
        content_stream_id: csid(cs),
        initiating_user_id: user(),
    })
}

#[allow(dead_code)]
pub fn create_root(cs: &str) -> Command {
    Command::CreateRootNodeAggregateWithNode(CreateRootNodeAggregateWithNode {
        content_stream_id: csid(cs),
        node_aggregate_id: nid("root"),
        node_type_name: NodeTypeName::new(ROOT_TYPE).unwrap(),
        initiating_user_id: user(),
    })
}

/// A document below the root, originating in `at`
#[allow(dead_code)]
pub fn create_document(cs: &str, id: &str, at: &str) -> Command {
    Command::CreateNodeAggregateWithNode(
        CreateNodeAggregateWithNode::new(
            csid(cs),
            nid(id),
            NodeTypeName::new(DOCUMENT_TYPE).unwrap(),
            origin(at),
            nid("root"),
            user(),
        )
        .unwrap(),
    )
}

#[allow(dead_code)]
pub fn set_title(cs: &str, id: &str, at: &str, title: &str) -> Command {
    Command::SetSerializedNodeProperties(
        SetSerializedNodeProperties::new(
            csid(cs),
            nid(id),
            origin(at),
            SerializedPropertyValues::new().with(
                PropertyName::new("title").unwrap(),
                SerializedPropertyValue::new(serde_json::json!(title), "string"),
            ),
            user(),
        )
        .unwrap(),
    )
}

/// Title of `id` as seen at `at`, `None` when the node is not visible there
#[allow(dead_code)]
pub fn title(repository: &ContentRepository, cs: &str, id: &str, at: &str) -> Option<String> {
    repository
        .with_subgraph(&csid(cs), lang(at), VisibilityConstraints::frontend(), |subgraph| {
            subgraph
                .find_node_by_id(&nid(id))
                .and_then(|node| node.properties.get("title").cloned())
                .and_then(|value| value.value.as_str().map(str::to_string))
        })
        .unwrap()
}

/// `live` on content stream `cs-live` with a root node
#[allow(dead_code)]
pub fn with_live_workspace(repository: &ContentRepository) {
    repository
        .handle_workspace(&WorkspaceCommand::CreateRootWorkspace {
            workspace_name: WorkspaceName::live(),
            new_content_stream_id: csid("cs-live"),
            initiating_user_id: user(),
        })
        .unwrap();
    repository.handle(&create_root("cs-live")).unwrap();
}

/// `name` based on `live`, working on `cs`
#[allow(dead_code)]
pub fn with_user_workspace(repository: &ContentRepository, name: &str, cs: &str) {
    repository
        .handle_workspace(&WorkspaceCommand::CreateWorkspace {
            workspace_name: ws(name),
            base_workspace_name: WorkspaceName::live(),
            new_content_stream_id: csid(cs),
            initiating_user_id: user(),
        })
        .unwrap();
}

#[allow(dead_code)]
pub fn current_content_stream(repository: &ContentRepository, name: &str) -> ContentStreamId {
    repository
        .with_projections(|p| p.workspace(&ws(name)).unwrap().current_content_stream_id.clone())
        .unwrap()
}
