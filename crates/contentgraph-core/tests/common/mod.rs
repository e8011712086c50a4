//! Shared fixtures: a language dimension, a small node type schema and an
//! in-memory event log that runs commands through handlers and projections

use contentgraph_core::commands::{
    Command, CreateContentStream, CreateNodeAggregateWithNode, CreateRootNodeAggregateWithNode,
};
use contentgraph_core::dimension::{
    ContentDimensionSource, DimensionConfig, DimensionDefinition, DimensionSpacePoint,
    DimensionValueDefinition, InterDimensionalVariationGraph, OriginDimensionSpacePoint,
};
use contentgraph_core::errors::{ContentGraphError, Result};
use contentgraph_core::events::Event;
use contentgraph_core::handlers::{handle, CommandContext};
use contentgraph_core::model::{ContentStreamId, NodeAggregateId, NodeName, NodeTypeName, UserId};
use contentgraph_core::node_types::InMemoryNodeTypeSchema;
use contentgraph_core::projection::{
    ContentGraph, ContentSubgraph, ProjectionState, RecordedEvent, VisibilityConstraints,
};
use std::collections::BTreeMap;

pub const ROOT_TYPE: &str = "Acme:Root";
pub const DOCUMENT_TYPE: &str = "Acme:Document";
pub const PAGE_TYPE: &str = "Acme:Page";
pub const TEXT_TYPE: &str = "Acme:Text";

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
pub fn type_name(name: &str) -> NodeTypeName {
    NodeTypeName::new(name).unwrap()
}

#[allow(dead_code)]
pub fn node_name(name: &str) -> NodeName {
    NodeName::new(name).unwrap()
}

#[allow(dead_code)]
pub fn user() -> UserId {
    UserId::system()
}

fn value(value: &str, fallback: Option<&str>) -> DimensionValueDefinition {
    DimensionValueDefinition {
        value: value.to_string(),
        fallback: fallback.map(str::to_string),
        constraints: BTreeMap::new(),
    }
}

/// One `language` dimension with the given (value, fallback) pairs
#[allow(dead_code)]
pub fn language_config_with(values: &[(&str, Option<&str>)]) -> DimensionConfig {
    DimensionConfig {
        dimensions: vec![DimensionDefinition {
            id: "language".to_string(),
            values: values.iter().map(|(v, f)| value(v, *f)).collect(),
        }],
    }
}

/// mul ← de ← gsw, mul ← en
#[allow(dead_code)]
pub fn language_config() -> DimensionConfig {
    language_config_with(&[("mul", None), ("de", Some("mul")), ("en", Some("mul")), ("gsw", Some("de"))])
}

#[allow(dead_code)]
pub fn variation_graph_of(config: DimensionConfig) -> InterDimensionalVariationGraph {
    InterDimensionalVariationGraph::new(ContentDimensionSource::try_from(config).unwrap()).unwrap()
}

#[allow(dead_code)]
pub fn language_graph() -> InterDimensionalVariationGraph {
    variation_graph_of(language_config())
}

#[allow(dead_code)]
pub fn node_types() -> InMemoryNodeTypeSchema {
    InMemoryNodeTypeSchema::from_json(&serde_json::json!({
        "Acme:Root": { "root": true },
        "Acme:Abstract": { "abstract": true },
        "Acme:Document": {
            "properties": {
                "title": { "type": "string", "scope": "node", "default": "untitled" },
                "layout": { "type": "string", "scope": "specializations" },
                "uriPathSegment": { "type": "string", "scope": "nodeAggregate" }
            },
            "references": {
                "related": { "scope": "node" },
                "shared": { "scope": "nodeAggregate" }
            }
        },
        "Acme:Page": {
            "properties": { "title": { "type": "string" } },
            "tetheredChildren": { "main": "Acme:Collection" }
        },
        "Acme:Collection": {
            "tetheredChildren": { "footer": "Acme:Text" }
        },
        "Acme:Text": {
            "properties": { "text": { "type": "string" } }
        }
    }))
    .unwrap()
}

/// Handlers, projections and an event log wired together in memory
#[allow(dead_code)]
pub struct Harness {
    pub variation_graph: InterDimensionalVariationGraph,
    pub node_types: InMemoryNodeTypeSchema,
    pub projections: ProjectionState,
    pub log: Vec<RecordedEvent>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new() -> Self {
        Self {
            variation_graph: language_graph(),
            node_types: node_types(),
            projections: ProjectionState::new(),
            log: Vec::new(),
        }
    }

    /// Content stream `cs` with root aggregate `root`
    pub fn with_root(cs: &str) -> Self {
        let mut harness = Self::new();
        harness.create_content_stream(cs).unwrap();
        harness
            .handle(Command::CreateRootNodeAggregateWithNode(CreateRootNodeAggregateWithNode {
                content_stream_id: csid(cs),
                node_aggregate_id: nid("root"),
                node_type_name: type_name(ROOT_TYPE),
                initiating_user_id: user(),
            }))
            .unwrap();
        harness
    }

    /// Handle, check the expected version, append and catch up
    pub fn handle(&mut self, command: Command) -> Result<Vec<Event>> {
        let to_publish = {
            let ctx = CommandContext::new(&self.variation_graph, &self.node_types, &self.projections);
            handle(&command, &ctx)?
        };
        let current = self.stream_version(&to_publish.stream_name);
        if !to_publish.expected_version.is_satisfied_by(current) {
            return Err(ContentGraphError::ConcurrencyConflict {
                stream_name: to_publish.stream_name.clone(),
                expected: to_publish.expected_version.to_string(),
                actual: current,
            });
        }
        let mut version = current.map(|v| v + 1).unwrap_or(0);
        for event in &to_publish.events {
            self.append(&to_publish.stream_name, version, event.clone());
            version += 1;
        }
        self.catch_up()?;
        Ok(to_publish.events)
    }

    /// Record an event without catching up
    pub fn append(&mut self, stream_name: &str, version: u64, event: Event) {
        self.log.push(RecordedEvent {
            sequence_number: self.log.len() as u64 + 1,
            stream_name: stream_name.to_string(),
            version,
            event,
            metadata: serde_json::Value::Null,
        });
    }

    /// Fold everything after the checkpoint; the first fold failure is returned
    pub fn catch_up(&mut self) -> Result<()> {
        let pending: Vec<RecordedEvent> = self
            .log
            .iter()
            .filter(|r| r.sequence_number > self.projections.checkpoint())
            .cloned()
            .collect();
        let mut first_error = None;
        for recorded in &pending {
            if let Err(err) = self.projections.apply_recorded(recorded, &self.log) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn stream_version(&self, stream_name: &str) -> Option<u64> {
        self.log
            .iter()
            .filter(|r| r.stream_name == stream_name)
            .map(|r| r.version)
            .max()
    }

    pub fn create_content_stream(&mut self, cs: &str) -> Result<Vec<Event>> {
        self.handle(Command::CreateContentStream(CreateContentStream {
            content_stream_id: csid(cs),
            initiating_user_id: user(),
        }))
    }

    pub fn create_node(
        &mut self,
        cs: &str,
        id: &str,
        node_type: &str,
        at: &str,
        parent: &str,
    ) -> Result<Vec<Event>> {
        let command = CreateNodeAggregateWithNode::new(
            csid(cs),
            nid(id),
            type_name(node_type),
            origin(at),
            nid(parent),
            user(),
        )?;
        self.handle(Command::CreateNodeAggregateWithNode(command))
    }

    pub fn graph(&self, cs: &str) -> &ContentGraph {
        self.projections.graph(&csid(cs)).unwrap()
    }

    pub fn subgraph(&self, cs: &str, at: &str) -> ContentSubgraph<'_> {
        ContentSubgraph::new(self.graph(cs), lang(at), VisibilityConstraints::frontend())
    }
}
