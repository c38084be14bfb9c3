use thiserror::Error;

/// Errors from merging two documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    /// A field is a nested document on one side and a plain value on the
    /// other. The field's shape changed between writes and is not coerced.
    #[error("type conflict at field `{field}`: destination has {dst_kind}, source has {src_kind}")]
    TypeConflict {
        field: String,
        dst_kind: &'static str,
        src_kind: &'static str,
    },
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
