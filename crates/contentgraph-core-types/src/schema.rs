//! Canonical schema constants for structured logging
//!
//! Every crate logs with these keys so that log pipelines can index them
//! without per-crate mappings.

// Canonical field keys
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";
pub const FIELD_REQUEST_ID: &str = "request_id";
pub const FIELD_TRACE_ID: &str = "trace_id";

// Domain identifiers
pub const FIELD_CONTENT_STREAM_ID: &str = "content_stream_id";
pub const FIELD_NODE_AGGREGATE_ID: &str = "node_aggregate_id";
pub const FIELD_WORKSPACE_NAME: &str = "workspace_name";
pub const FIELD_STREAM_NAME: &str = "stream_name";
pub const FIELD_COMMAND: &str = "command";

// Event store positions
pub const FIELD_SEQUENCE_NUMBER: &str = "sequence_number";
pub const FIELD_VERSION: &str = "version";
pub const FIELD_EVENT_COUNT: &str = "event_count";

// Error fields
pub const FIELD_ERR_KIND: &str = "err_kind";
pub const FIELD_ERR_CODE: &str = "err_code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";
