use contentgraph_core_types::{RequestId, TraceId};
use thiserror::Error;

/// Result type alias using ContentGraphError
pub type Result<T> = std::result::Result<T, ContentGraphError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the repository maps onto exactly one kind. The
/// kind decides how a caller should react: command rejections are actionable
/// validation feedback, transient kinds are retried, everything else is an
/// operator alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CgErrorKind {
    // Command rejections
    InvalidInput,
    NotFound,
    AlreadyExists,
    PreconditionFailed,

    // Transient
    Concurrency,
    Timeout,

    // Fatal
    IntegrityViolation,
    InvalidConfiguration,
    Serialization,
    Persistence,
    Io,
    Internal,
}

impl CgErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            CgErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            CgErrorKind::NotFound => "ERR_NOT_FOUND",
            CgErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            CgErrorKind::PreconditionFailed => "ERR_PRECONDITION_FAILED",
            CgErrorKind::Concurrency => "ERR_CONCURRENCY",
            CgErrorKind::Timeout => "ERR_TIMEOUT",
            CgErrorKind::IntegrityViolation => "ERR_INTEGRITY_VIOLATION",
            CgErrorKind::InvalidConfiguration => "ERR_INVALID_CONFIGURATION",
            CgErrorKind::Serialization => "ERR_SERIALIZATION",
            CgErrorKind::Persistence => "ERR_PERSISTENCE",
            CgErrorKind::Io => "ERR_IO",
            CgErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// True for failures caused by the command itself. The caller can fix
    /// the input and retry.
    pub fn is_command_rejection(&self) -> bool {
        matches!(
            self,
            CgErrorKind::InvalidInput
                | CgErrorKind::NotFound
                | CgErrorKind::AlreadyExists
                | CgErrorKind::PreconditionFailed
        )
    }

    /// True for failures where re-validating and retrying the whole command
    /// is expected to succeed eventually
    pub fn is_transient(&self) -> bool {
        matches!(self, CgErrorKind::Concurrency | CgErrorKind::Timeout)
    }
}

/// Canonical structured error type
///
/// Carries the classification fields for programmatic handling plus the
/// context (operation, entity, content stream, correlation ids) needed to
/// act on the failure.
#[derive(Debug, Clone)]
pub struct CgError {
    kind: CgErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    content_stream_id: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<CgError>>,
    domain: Option<ContentGraphError>,
}

impl CgError {
    /// Create a new error with the specified kind
    pub fn new(kind: CgErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            content_stream_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
            domain: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity ID context (node aggregate, workspace, node type, ...)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add content stream context
    pub fn with_content_stream_id(mut self, id: impl Into<String>) -> Self {
        self.content_stream_id = Some(id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: CgError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> CgErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn content_stream_id(&self) -> Option<&str> {
        self.content_stream_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&CgError> {
        self.source.as_deref()
    }

    /// The typed domain error this error was converted from, if any
    ///
    /// Lets callers match on the precise precondition that failed instead of
    /// parsing the message.
    pub fn domain_error(&self) -> Option<&ContentGraphError> {
        self.domain.as_ref()
    }

    pub fn is_command_rejection(&self) -> bool {
        self.kind.is_command_rejection()
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for CgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(content_stream_id) = &self.content_stream_id {
            write!(f, " (content_stream_id: {})", content_stream_id)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for CgError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for the content graph domain
///
/// Precondition variants are raised by command handlers before any event is
/// emitted. Integrity variants are raised while folding events and are never
/// retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContentGraphError {
    // ===== Configuration Errors =====
    #[error("Invalid dimension configuration: {reason}")]
    InvalidDimensionConfiguration { reason: String },

    #[error("Invalid node type schema: {reason}")]
    InvalidNodeTypeSchema { reason: String },

    // ===== Input Errors =====
    /// An identifier or name failed validation
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: String,
        value: String,
        reason: String,
    },

    /// A command record is structurally invalid
    #[error("Invalid command {command}: {reason}")]
    InvalidCommand { command: String, reason: String },

    // ===== Existence Preconditions =====
    #[error("Content stream already exists: {content_stream_id}")]
    ContentStreamAlreadyExists { content_stream_id: String },

    #[error("Content stream does not exist yet: {content_stream_id}")]
    ContentStreamDoesNotExistYet { content_stream_id: String },

    #[error("Dimension space point {dimension_space_point} is not within the allowed dimension subspace")]
    DimensionSpacePointNotFound { dimension_space_point: String },

    #[error("Node type not found: {node_type_name}")]
    NodeTypeNotFound { node_type_name: String },

    #[error("Node aggregate {node_aggregate_id} does not exist in content stream {content_stream_id}")]
    NodeAggregateCurrentlyDoesNotExist {
        content_stream_id: String,
        node_aggregate_id: String,
    },

    #[error("Node aggregate {node_aggregate_id} already exists in content stream {content_stream_id}")]
    NodeAggregateCurrentlyExists {
        content_stream_id: String,
        node_aggregate_id: String,
    },

    #[error("Workspace does not exist: {workspace_name}")]
    WorkspaceDoesNotExist { workspace_name: String },

    #[error("Workspace already exists: {workspace_name}")]
    WorkspaceAlreadyExists { workspace_name: String },

    #[error("Base workspace {base_workspace_name} of {workspace_name} does not exist")]
    BaseWorkspaceDoesNotExist {
        workspace_name: String,
        base_workspace_name: String,
    },

    #[error("Workspace {workspace_name} has no base workspace")]
    WorkspaceHasNoBaseWorkspace { workspace_name: String },

    // ===== State Preconditions =====
    #[error("Dimension space point {dimension_space_point} already has nodes in content stream {content_stream_id}")]
    DimensionSpacePointAlreadyExists {
        content_stream_id: String,
        dimension_space_point: String,
    },

    #[error("Node aggregate {node_aggregate_id} already occupies {dimension_space_point}")]
    DimensionSpacePointIsAlreadyOccupied {
        node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Node aggregate {node_aggregate_id} does not occupy {dimension_space_point} yet")]
    DimensionSpacePointIsNotYetOccupied {
        node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Node aggregate {node_aggregate_id} is already disabled at {dimension_space_point}")]
    NodeAggregateCurrentlyDisabled {
        node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Node aggregate {node_aggregate_id} is not disabled at {dimension_space_point}")]
    NodeAggregateCurrentlyEnabled {
        node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Node aggregate {node_aggregate_id} is a root node aggregate")]
    NodeAggregateIsRoot { node_aggregate_id: String },

    #[error("Node aggregate {node_aggregate_id} is tethered to its parent")]
    NodeAggregateIsTethered { node_aggregate_id: String },

    #[error("Tethered node aggregate {node_aggregate_id} cannot be removed")]
    TetheredNodeAggregateCannotBeRemoved { node_aggregate_id: String },

    #[error("Node type {node_type_name} is abstract")]
    NodeTypeIsAbstract { node_type_name: String },

    #[error("Node type {node_type_name} is a root node type")]
    NodeTypeIsOfTypeRoot { node_type_name: String },

    #[error("Node type {node_type_name} is not a root node type")]
    NodeTypeIsNotOfTypeRoot { node_type_name: String },

    #[error("A root node aggregate of type {node_type_name} already exists in content stream {content_stream_id}")]
    RootNodeAggregateTypeIsAlreadyOccupied {
        content_stream_id: String,
        node_type_name: String,
    },

    #[error("Property {property_name} is not declared by node type {node_type_name}")]
    PropertyCannotBeSet {
        property_name: String,
        node_type_name: String,
    },

    #[error("Reference {reference_name} is not declared by node type {node_type_name}")]
    ReferenceCannotBeSet {
        reference_name: String,
        node_type_name: String,
    },

    #[error("Node name {node_name} is already taken below {parent_node_aggregate_id} at {dimension_space_point}")]
    NodeNameIsAlreadyOccupied {
        node_name: String,
        parent_node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Content stream {content_stream_id} is halted after a projection failure: {reason}")]
    ContentStreamIsHalted {
        content_stream_id: String,
        reason: String,
    },

    // ===== Relational Preconditions =====
    #[error("Dimension space point {dimension_space_point} is no specialization of {generalization}")]
    DimensionSpacePointIsNoSpecialization {
        dimension_space_point: String,
        generalization: String,
    },

    #[error("Node aggregate {node_aggregate_id} does not cover {dimension_space_point}")]
    NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint {
        node_aggregate_id: String,
        dimension_space_point: String,
    },

    #[error("Base workspace of {workspace_name} has been modified since the fork at version {fork_version}")]
    BaseWorkspaceHasBeenModifiedInTheMeantime {
        workspace_name: String,
        fork_version: u64,
    },

    #[error("Rebase of workspace {workspace_name} failed: {failures:?}")]
    WorkspaceRebaseFailed {
        workspace_name: String,
        failures: Vec<String>,
    },

    // ===== Concurrency =====
    #[error("Concurrency conflict on stream {stream_name}: expected {expected}, actual {actual:?}")]
    ConcurrencyConflict {
        stream_name: String,
        expected: String,
        actual: Option<u64>,
    },

    // ===== Projection Integrity =====
    #[error("Projection integrity violation in content stream {content_stream_id}: {reason}")]
    ProjectionIntegrityViolation {
        content_stream_id: String,
        reason: String,
    },

    #[error("Fork source {source_content_stream_id} of content stream {content_stream_id} cannot be replayed: {reason}")]
    ForkSourceUnavailable {
        content_stream_id: String,
        source_content_stream_id: String,
        reason: String,
    },

    // ===== Generic Errors =====
    #[error("Unknown event type: {event_type}")]
    UnknownEventType { event_type: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ContentGraphError {
    /// Classify this error into the canonical kind taxonomy
    pub fn kind(&self) -> CgErrorKind {
        use ContentGraphError::*;
        match self {
            InvalidDimensionConfiguration { .. } | InvalidNodeTypeSchema { .. } => {
                CgErrorKind::InvalidConfiguration
            }
            InvalidIdentifier { .. } | InvalidCommand { .. } => CgErrorKind::InvalidInput,
            ContentStreamDoesNotExistYet { .. }
            | DimensionSpacePointNotFound { .. }
            | NodeTypeNotFound { .. }
            | NodeAggregateCurrentlyDoesNotExist { .. }
            | WorkspaceDoesNotExist { .. }
            | BaseWorkspaceDoesNotExist { .. } => CgErrorKind::NotFound,
            ContentStreamAlreadyExists { .. }
            | NodeAggregateCurrentlyExists { .. }
            | WorkspaceAlreadyExists { .. }
            | DimensionSpacePointAlreadyExists { .. }
            | DimensionSpacePointIsAlreadyOccupied { .. }
            | RootNodeAggregateTypeIsAlreadyOccupied { .. }
            | NodeNameIsAlreadyOccupied { .. } => CgErrorKind::AlreadyExists,
            WorkspaceHasNoBaseWorkspace { .. }
            | DimensionSpacePointIsNotYetOccupied { .. }
            | NodeAggregateCurrentlyDisabled { .. }
            | NodeAggregateCurrentlyEnabled { .. }
            | NodeAggregateIsRoot { .. }
            | NodeAggregateIsTethered { .. }
            | TetheredNodeAggregateCannotBeRemoved { .. }
            | NodeTypeIsAbstract { .. }
            | NodeTypeIsOfTypeRoot { .. }
            | NodeTypeIsNotOfTypeRoot { .. }
            | PropertyCannotBeSet { .. }
            | ReferenceCannotBeSet { .. }
            | DimensionSpacePointIsNoSpecialization { .. }
            | NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint { .. }
            | BaseWorkspaceHasBeenModifiedInTheMeantime { .. }
            | WorkspaceRebaseFailed { .. } => CgErrorKind::PreconditionFailed,
            ConcurrencyConflict { .. } => CgErrorKind::Concurrency,
            ContentStreamIsHalted { .. }
            | ProjectionIntegrityViolation { .. }
            | ForkSourceUnavailable { .. } => CgErrorKind::IntegrityViolation,
            UnknownEventType { .. } | Serialization { .. } => CgErrorKind::Serialization,
            Internal { .. } => CgErrorKind::Internal,
        }
    }

    pub fn is_command_rejection(&self) -> bool {
        self.kind().is_command_rejection()
    }

    fn content_stream_context(&self) -> Option<&str> {
        use ContentGraphError::*;
        match self {
            ContentStreamAlreadyExists { content_stream_id }
            | ContentStreamDoesNotExistYet { content_stream_id }
            | NodeAggregateCurrentlyDoesNotExist {
                content_stream_id, ..
            }
            | NodeAggregateCurrentlyExists {
                content_stream_id, ..
            }
            | DimensionSpacePointAlreadyExists {
                content_stream_id, ..
            }
            | RootNodeAggregateTypeIsAlreadyOccupied {
                content_stream_id, ..
            }
            | ContentStreamIsHalted {
                content_stream_id, ..
            }
            | ProjectionIntegrityViolation {
                content_stream_id, ..
            }
            | ForkSourceUnavailable {
                content_stream_id, ..
            } => Some(content_stream_id),
            _ => None,
        }
    }

    fn entity_context(&self) -> Option<&str> {
        use ContentGraphError::*;
        match self {
            NodeAggregateCurrentlyDoesNotExist {
                node_aggregate_id, ..
            }
            | NodeAggregateCurrentlyExists {
                node_aggregate_id, ..
            }
            | DimensionSpacePointIsAlreadyOccupied {
                node_aggregate_id, ..
            }
            | DimensionSpacePointIsNotYetOccupied {
                node_aggregate_id, ..
            }
            | NodeAggregateCurrentlyDisabled {
                node_aggregate_id, ..
            }
            | NodeAggregateCurrentlyEnabled {
                node_aggregate_id, ..
            }
            | NodeAggregateIsRoot { node_aggregate_id }
            | NodeAggregateIsTethered { node_aggregate_id }
            | TetheredNodeAggregateCannotBeRemoved { node_aggregate_id }
            | NodeAggregateDoesCurrentlyNotCoverDimensionSpacePoint {
                node_aggregate_id, ..
            } => Some(node_aggregate_id),
            NodeTypeNotFound { node_type_name }
            | NodeTypeIsAbstract { node_type_name }
            | NodeTypeIsOfTypeRoot { node_type_name }
            | NodeTypeIsNotOfTypeRoot { node_type_name } => Some(node_type_name),
            WorkspaceDoesNotExist { workspace_name }
            | WorkspaceAlreadyExists { workspace_name }
            | BaseWorkspaceDoesNotExist { workspace_name, .. }
            | WorkspaceHasNoBaseWorkspace { workspace_name }
            | BaseWorkspaceHasBeenModifiedInTheMeantime { workspace_name, .. }
            | WorkspaceRebaseFailed { workspace_name, .. } => Some(workspace_name),
            ConcurrencyConflict { stream_name, .. } => Some(stream_name),
            _ => None,
        }
    }
}

/// Conversion from the domain error to the canonical facility
///
/// The domain error is kept alongside so callers can still match on it.
impl From<ContentGraphError> for CgError {
    fn from(err: ContentGraphError) -> Self {
        let mut ex = CgError::new(err.kind()).with_message(err.to_string());
        if let Some(content_stream_id) = err.content_stream_context() {
            ex = ex.with_content_stream_id(content_stream_id);
        }
        if let Some(entity_id) = err.entity_context() {
            ex = ex.with_entity_id(entity_id);
        }
        ex.domain = Some(err);
        ex
    }
}

impl From<serde_json::Error> for ContentGraphError {
    fn from(err: serde_json::Error) -> Self {
        ContentGraphError::Serialization {
            message: err.to_string(),
        }
    }
}
