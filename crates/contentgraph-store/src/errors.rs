//! Error handling for contentgraph-store
//!
//! Wraps contentgraph-core CgError with store-specific helpers

use contentgraph_core::errors::{CgError, CgErrorKind, ContentGraphError};
use contentgraph_core::stream::ExpectedVersion;

/// Result type alias using CgError
pub type Result<T> = std::result::Result<T, CgError>;

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> CgError {
    CgError::new(CgErrorKind::Persistence)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> CgError {
    CgError::new(CgErrorKind::IntegrityViolation)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// Optimistic concurrency failure on commit
pub fn concurrency_conflict(stream_name: &str, expected: ExpectedVersion, actual: Option<u64>) -> CgError {
    ContentGraphError::ConcurrencyConflict {
        stream_name: stream_name.to_string(),
        expected: expected.to_string(),
        actual,
    }
    .into()
}

/// Create a database error from rusqlite::Error
///
/// Busy and locked databases are reported as `Timeout` so callers retry.
pub fn from_rusqlite(err: rusqlite::Error) -> CgError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ) =>
        {
            CgErrorKind::Timeout
        }
        _ => CgErrorKind::Persistence,
    };
    CgError::new(kind)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create a serialization error for a stored payload
pub fn from_serde(op: &str, err: serde_json::Error) -> CgError {
    CgError::new(CgErrorKind::Serialization)
        .with_op(op.to_string())
        .with_message(err.to_string())
}

/// The lock guarding a store was poisoned by a panicking writer
pub fn poisoned(op: &str) -> CgError {
    CgError::new(CgErrorKind::Internal)
        .with_op(op.to_string())
        .with_message("event store lock poisoned")
}
