use thiserror::Error;

/// Errors from converting external data into sakuin types.
#[derive(Debug, Error)]
pub enum TypeError {
    /// A document must be a JSON object at the top level.
    #[error("expected a JSON object, found {0}")]
    NotAnObject(&'static str),

    /// The input was not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
