//! Error taxonomy shared across the workspace.
//!
//! Gateway failures (`Upstream`) are never surfaced to API callers; the
//! engine swallows them and degrades the environment status instead.
//! `Storage` is a distinct internal sentinel so persistence failures are
//! never confused with "not found".

use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Concurrent-writer or illegal-transition conflict. A version or
    /// status compare-and-set that lost the race reports this variant.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Outbound gateway (mining / topics / email) failure.
    #[error("Upstream service error: {0}")]
    Upstream(String),

    /// Persistence-layer failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// True for conflicts, which callers may treat as "someone else already
    /// did this" rather than a hard failure.
    pub fn is_conflict(&self) -> bool {
        matches!(self, CoreError::Conflict(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display_names_entity_and_id() {
        let err = CoreError::NotFound {
            entity: "environment",
            id: 42,
        };
        assert_eq!(err.to_string(), "Entity not found: environment with id 42");
    }

    #[test]
    fn storage_is_not_confused_with_not_found() {
        let err = CoreError::Storage("connection reset".into());
        assert!(err.to_string().starts_with("Storage error"));
        assert!(!matches!(err, CoreError::NotFound { .. }));
    }

    #[test]
    fn is_conflict_only_matches_conflict() {
        assert!(CoreError::Conflict("version mismatch".into()).is_conflict());
        assert!(!CoreError::Validation("bad input".into()).is_conflict());
    }
}
