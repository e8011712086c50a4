//! Validated identifier newtypes
//!
//! Every identifier rejects empty input on construction and on
//! deserialization, so an id held by the domain is always well formed.

use crate::errors::{ContentGraphError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

macro_rules! validated_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $check:path) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// # Errors
            ///
            /// Returns `InvalidIdentifier` when the value is malformed.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                $check(&value).map_err(|reason| ContentGraphError::InvalidIdentifier {
                    kind: $kind.to_string(),
                    value: value.clone(),
                    reason: reason.to_string(),
                })?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ContentGraphError;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

fn non_empty(value: &str) -> std::result::Result<(), &'static str> {
    if value.trim().is_empty() {
        return Err("must not be empty");
    }
    if value.trim() != value {
        return Err("must not have leading or trailing whitespace");
    }
    Ok(())
}

fn node_name(value: &str) -> std::result::Result<(), &'static str> {
    non_empty(value)?;
    if value.chars().any(|c| c == '/' || c.is_whitespace()) {
        return Err("must not contain '/' or whitespace");
    }
    Ok(())
}

fn workspace_name(value: &str) -> std::result::Result<(), &'static str> {
    non_empty(value)?;
    if value.len() > 36 {
        return Err("must be at most 36 characters");
    }
    let mut chars = value.chars();
    let starts_alphanumeric = chars
        .next()
        .map(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .unwrap_or(false);
    if !starts_alphanumeric || !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("must be lowercase alphanumeric with dashes, starting alphanumeric");
    }
    Ok(())
}

validated_id!(
    /// One append-only branch of the event log
    ContentStreamId, "content stream id", non_empty
);
validated_id!(
    /// Identity shared by all variants of a node
    NodeAggregateId, "node aggregate id", non_empty
);
validated_id!(WorkspaceName, "workspace name", workspace_name);
validated_id!(UserId, "user id", non_empty);
validated_id!(NodeTypeName, "node type name", non_empty);
validated_id!(NodeName, "node name", node_name);
validated_id!(PropertyName, "property name", non_empty);
validated_id!(ReferenceName, "reference name", non_empty);
validated_id!(ContentDimensionId, "content dimension id", non_empty);

impl ContentStreamId {
    /// Fresh time-ordered id
    pub fn create() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl NodeAggregateId {
    pub fn create() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Deterministic id for a tethered descendant that was not given one
    ///
    /// `path` is the node name path below `parent`, e.g. `main/footer`.
    pub fn for_tethered_child(parent: &NodeAggregateId, path: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(parent.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(path.as_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("tethered-{}", &digest[..32]))
    }
}

impl WorkspaceName {
    /// The conventional name of the root workspace
    pub fn live() -> Self {
        Self("live".to_string())
    }
}

impl UserId {
    /// Acting user for commands issued by the system itself
    pub fn system() -> Self {
        Self("system".to_string())
    }
}
