//! Operation boundary macros
//!
//! All three macros stamp `component` with the calling module path and take
//! the event name from `contentgraph_core_types::schema`.

/// Log the start of an operation
///
/// ```
/// # use contentgraph_core::log_op_start;
/// log_op_start!("handle_command");
/// log_op_start!("handle_command", content_stream_id = "cs-1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// ```
/// # use contentgraph_core::log_op_end;
/// log_op_end!("handle_command", duration_ms = 3);
/// log_op_end!("handle_command", duration_ms = 3, event_count = 2);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log the failed end of an operation
///
/// The error is converted into a `CgError` to obtain `err_kind` and
/// `err_code`, so both `ContentGraphError` and `CgError` are accepted.
///
/// ```ignore
/// # use contentgraph_core::{log_op_error, errors::ContentGraphError};
/// let err = ContentGraphError::WorkspaceDoesNotExist { workspace_name: "user-a".into() };
/// log_op_error!("publish_workspace", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {{
        let cg_err: $crate::errors::CgError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?cg_err.kind(),
            err_code = cg_err.code(),
        );
    }};
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let cg_err: $crate::errors::CgError = $err.into();
        tracing::error!(
            component = module_path!(),
            op = $op,
            event = contentgraph_core_types::schema::EVENT_END_ERROR,
            duration_ms = $duration,
            err_kind = ?cg_err.kind(),
            err_code = cg_err.code(),
            $($field)*
        );
    }};
}
