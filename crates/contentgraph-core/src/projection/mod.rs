//! Read side: content graph per content stream, content stream and
//! workspace projections, and the state that bundles them

pub mod apply;
pub mod content_stream;
pub mod graph;
pub mod state;
pub mod subgraph;
pub mod workspace;

pub use apply::{apply, POSITION_OFFSET};
pub use content_stream::{ContentStreamProjection, ContentStreamRecord, ContentStreamState};
pub use graph::{
    ContentGraph, EdgeId, HierarchyEdge, NodeAggregate, NodeHandle, NodeRecord, ReferenceEdge,
    RestrictionEdge,
};
pub use state::{EventHistory, ProjectionState, RecordedEvent};
pub use subgraph::{ContentSubgraph, Node, Reference, VisibilityConstraints};
pub use workspace::{Workspace, WorkspaceProjection};
