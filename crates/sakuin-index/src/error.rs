//! Error types for the index crate.

use std::fmt;
use std::time::Duration;

use sakuin_merge::MergeError;
use sakuin_store::StoreError;
use serde::Serialize;

/// One side of an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Half {
    Object,
    Document,
}

impl fmt::Display for Half {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object => f.write_str("object"),
            Self::Document => f.write_str("document"),
        }
    }
}

fn list_halves(halves: &[Half]) -> String {
    halves
        .iter()
        .map(Half::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors that can occur during index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("metadata document not found: {0}")]
    DocumentNotFound(String),

    /// The randomness source failed while generating an identifier.
    #[error("failed to allocate identifier: {0}")]
    Allocation(#[source] rand::Error),

    /// An upsert hit a type conflict; the stored document is unchanged.
    #[error(transparent)]
    MergeConflict(#[from] MergeError),

    #[error("store error: {0}")]
    Backend(#[source] StoreError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {0:?}")]
    TimedOut(Duration),

    /// One store applied its half and the other failed, leaving the entry
    /// inconsistent. `applied` names the halves that were written.
    #[error("partial write to {id} (applied: {}): {source}", list_halves(.applied))]
    PartialWrite {
        id: String,
        applied: Vec<Half>,
        #[source]
        source: Box<IndexError>,
    },

    /// A store task panicked or a lock was poisoned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexError {
    /// The condition that caused the failure, looking through
    /// [`IndexError::PartialWrite`].
    pub fn cause(&self) -> &IndexError {
        match self {
            Self::PartialWrite { source, .. } => source.cause(),
            other => other,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self.cause(),
            Self::ObjectNotFound(_) | Self::DocumentNotFound(_)
        )
    }
}

impl From<StoreError> for IndexError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectNotFound(id) => Self::ObjectNotFound(id),
            StoreError::DocumentNotFound(id) => Self::DocumentNotFound(id),
            StoreError::Merge(e) => Self::MergeConflict(e),
            other => Self::Backend(other),
        }
    }
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_route_to_dedicated_variants() {
        let err = IndexError::from(StoreError::ObjectNotFound("a".into()));
        assert!(matches!(err, IndexError::ObjectNotFound(ref id) if id == "a"));

        let err = IndexError::from(StoreError::DocumentNotFound("b".into()));
        assert!(matches!(err, IndexError::DocumentNotFound(ref id) if id == "b"));

        let conflict = MergeError::TypeConflict {
            field: "x".into(),
            dst_kind: "number",
            src_kind: "document",
        };
        let err = IndexError::from(StoreError::Merge(conflict.clone()));
        assert!(matches!(err, IndexError::MergeConflict(ref e) if *e == conflict));

        let err = IndexError::from(StoreError::Backend("disk on fire".into()));
        assert!(matches!(err, IndexError::Backend(_)));
    }

    #[test]
    fn partial_write_names_applied_halves() {
        let err = IndexError::PartialWrite {
            id: "id-1".into(),
            applied: vec![Half::Object],
            source: Box::new(IndexError::Backend(StoreError::Backend("down".into()))),
        };
        assert_eq!(
            err.to_string(),
            "partial write to id-1 (applied: object): store error: backend failure: down"
        );
        assert!(matches!(err.cause(), IndexError::Backend(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_is_seen_through_partial_write() {
        let err = IndexError::PartialWrite {
            id: "id-2".into(),
            applied: vec![Half::Document],
            source: Box::new(IndexError::ObjectNotFound("id-2".into())),
        };
        assert!(err.is_not_found());
    }
}
