use crate::errors::{ContentGraphError, Result};
use crate::projection::ContentGraph;

use super::invariants;

/// Validate a whole content graph
///
/// Runs every integrity check and fails on the first violation found. For
/// an exhaustive report call `invariants::check_all` directly.
///
/// # Errors
///
/// `ProjectionIntegrityViolation` describing the first violation.
pub fn validate_graph(graph: &ContentGraph) -> Result<()> {
    let first = invariants::check_all(graph)
        .into_iter()
        .flat_map(|result| result.violations)
        .next();
    match first {
        Some(violation) => Err(ContentGraphError::ProjectionIntegrityViolation {
            content_stream_id: violation.content_stream_id.to_string(),
            reason: violation.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ContentStreamId;

    #[test]
    fn test_validate_empty_graph() {
        let graph = ContentGraph::new(ContentStreamId::new("cs").unwrap());
        assert!(validate_graph(&graph).is_ok());
    }
}
