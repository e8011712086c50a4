//! Event stream naming and optimistic concurrency expectations

use crate::model::{ContentStreamId, WorkspaceName};
use serde::{Deserialize, Serialize};

const CONTENT_STREAM_PREFIX: &str = "contentStream-";
const WORKSPACE_PREFIX: &str = "workspace-";

/// What the writer believes the stream's version to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpectedVersion {
    /// No check
    Any,
    /// The stream must not have any event yet
    NoStream,
    /// The stream must have at least one event
    StreamExists,
    /// The version of the stream's last event
    Exact(u64),
}

impl ExpectedVersion {
    /// Whether a stream at `current` (`None` = empty) satisfies this
    pub fn is_satisfied_by(&self, current: Option<u64>) -> bool {
        match (self, current) {
            (ExpectedVersion::Any, _) => true,
            (ExpectedVersion::NoStream, None) => true,
            (ExpectedVersion::StreamExists, Some(_)) => true,
            (ExpectedVersion::Exact(expected), Some(actual)) => *expected == actual,
            _ => false,
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("any"),
            ExpectedVersion::NoStream => f.write_str("no stream"),
            ExpectedVersion::StreamExists => f.write_str("stream exists"),
            ExpectedVersion::Exact(v) => write!(f, "version {}", v),
        }
    }
}

pub fn content_stream_name(id: &ContentStreamId) -> String {
    format!("{}{}", CONTENT_STREAM_PREFIX, id)
}

pub fn workspace_stream_name(name: &WorkspaceName) -> String {
    format!("{}{}", WORKSPACE_PREFIX, name)
}

/// Inverse of `content_stream_name`
pub fn content_stream_id_of(stream_name: &str) -> Option<ContentStreamId> {
    stream_name
        .strip_prefix(CONTENT_STREAM_PREFIX)
        .and_then(|id| ContentStreamId::new(id).ok())
}
