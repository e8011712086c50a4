//! Migration checksums
//!
//! The runner records a SHA256 of each migration's SQL and refuses to start
//! when an applied migration has been edited since.

use sha2::{Digest, Sha256};

/// Hex encoded SHA256 of the migration text
pub fn compute_checksum(sql: &str) -> String {
    hex::encode(Sha256::digest(sql.as_bytes()))
}
