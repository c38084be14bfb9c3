use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use http_body_util::LengthLimitError;
use sakuin_index::IndexError;
use sakuin_multipart::DecodeError;
use sakuin_types::TypeError;
use serde_json::json;
use thiserror::Error;

/// Failures while bootstrapping or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] sakuin_store::StoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

/// Failures of a single API request, rendered as `{"message": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("must provide object part in form data")]
    MissingObject,

    #[error("invalid metadata document: {0}")]
    InvalidMetadata(#[from] TypeError),

    #[error("expected content type application/json, got {0:?}")]
    ExpectedJson(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Index(err) => match err.cause() {
                IndexError::ObjectNotFound(_) | IndexError::DocumentNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                IndexError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Decode(err) if exceeds_body_limit(err) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Decode(err) if err.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MissingObject | Self::InvalidMetadata(_) | Self::ExpectedJson(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

/// Whether the body stream was cut off by the request size limit.
fn exceeds_body_limit(err: &DecodeError) -> bool {
    let DecodeError::Read(source) = err else {
        return false;
    };
    let mut current: Option<&(dyn StdError + 'static)> = Some(source.as_ref());
    while let Some(err) = current {
        if err.is::<LengthLimitError>() {
            return true;
        }
        current = err.source();
    }
    false
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}
