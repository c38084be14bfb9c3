use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    /// The declared content type is not `multipart/form-data`.
    #[error("invalid content type: {0}")]
    InvalidContentType(String),

    /// The form's `boundary` parameter is absent.
    #[error("missing boundary")]
    MissingBoundary,

    /// The metadata part does not start with a JSON value.
    #[error("invalid metadata part: {0}")]
    Metadata(#[source] serde_json::Error),

    /// The metadata part is present but holds no JSON value.
    #[error("metadata part is empty")]
    EmptyMetadata,

    /// The body is not well-formed multipart data.
    #[error("malformed multipart body: {0}")]
    Malformed(#[source] multer::Error),

    /// The underlying body stream failed. Carries the stream's own error.
    #[error("failed to read request body: {0}")]
    Read(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DecodeError {
    /// Returns `true` when the request itself is at fault rather than the
    /// transport beneath it.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Read(_))
    }
}

impl From<multer::Error> for DecodeError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::StreamReadFailed(source) => Self::Read(source),
            other => Self::Malformed(other),
        }
    }
}

pub type DecodeResult<T> = Result<T, DecodeError>;
