use sakuin_merge::MergeError;

/// Errors from object and document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object is stored under the id.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// No document is stored under the id.
    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// An upsert could not merge the incoming document with the stored one.
    #[error("merge failed: {0}")]
    Merge(#[from] MergeError),

    /// Stored data could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend-specific failure.
    #[error("backend failure: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns `true` for either not-found variant.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_) | Self::DocumentNotFound(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
