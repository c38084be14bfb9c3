use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use mime::Mime;
use sakuin_index::{
    CreateRequest, CreateResponse, DeleteResponse, Indexer, UpdateRequest, UpdateResponse,
};
use sakuin_multipart::{read_parts, Parts};
use sakuin_types::Document;
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<Indexer>,
    /// Parent of every request's cancellation scope; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(indexer: Arc<Indexer>) -> Self {
        Self {
            indexer,
            shutdown: CancellationToken::new(),
        }
    }

    /// A cancellation scope for one request. Dropping the returned guard
    /// cancels it, so abandoned requests stop their store calls.
    fn request_scope(&self) -> (CancellationToken, tokio_util::sync::DropGuard) {
        let token = self.shutdown.child_token();
        let guard = token.clone().drop_guard();
        (token, guard)
    }
}

/// Body of `GET /index/{id}`.
#[derive(Debug, Serialize)]
pub struct EntryBody {
    pub id: String,
    pub metadata: Document,
    /// Hex encoding of the object bytes.
    pub object: String,
}

fn content_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

async fn decode_form(headers: &HeaderMap, body: Body) -> Result<Parts, ApiError> {
    Ok(read_parts(body.into_data_stream(), content_type(headers)).await?)
}

fn parse_metadata(raw: Option<Bytes>) -> Result<Option<Document>, ApiError> {
    raw.map(|raw| Document::from_json_slice(&raw))
        .transpose()
        .map_err(ApiError::from)
}

/// Health check handler.
pub async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler.
pub async fn info_handler() -> Json<serde_json::Value> {
    Json(json!({
        "name": "sakuin",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /index`: create an entry from a multipart form.
#[tracing::instrument(skip_all)]
pub async fn create_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<CreateResponse>, ApiError> {
    let parts = decode_form(&headers, body).await?;
    let object = parts.object.ok_or(ApiError::MissingObject)?;
    let metadata = parse_metadata(parts.metadata)?;

    let (cancel, _guard) = state.request_scope();
    let created = state
        .indexer
        .create(CreateRequest { object, metadata }, &cancel)
        .await?;
    Ok(Json(created))
}

/// `GET /index/{id}`: both halves, object hex-encoded.
#[tracing::instrument(skip(state))]
pub async fn read_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EntryBody>, ApiError> {
    let (cancel, _guard) = state.request_scope();
    let entry = state.indexer.read(&id, &cancel).await?;
    Ok(Json(EntryBody {
        id: entry.id,
        metadata: entry.metadata,
        object: hex::encode(&entry.object),
    }))
}

/// `PUT /index/{id}`: update either or both halves from a multipart form.
#[tracing::instrument(skip(state, headers, body))]
pub async fn update_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<UpdateResponse>, ApiError> {
    let parts = decode_form(&headers, body).await?;
    let metadata = parse_metadata(parts.metadata)?;

    let (cancel, _guard) = state.request_scope();
    let updated = state
        .indexer
        .update(
            UpdateRequest {
                id,
                object: parts.object,
                metadata,
            },
            &cancel,
        )
        .await?;
    Ok(Json(updated))
}

/// `DELETE /index/{id}`.
#[tracing::instrument(skip(state))]
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let (cancel, _guard) = state.request_scope();
    Ok(Json(state.indexer.delete(&id, &cancel).await?))
}

/// `GET /index/{id}/object`: raw object bytes.
#[tracing::instrument(skip(state))]
pub async fn get_object_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let (cancel, _guard) = state.request_scope();
    let object = state.indexer.read_object(&id, &cancel).await?;
    Ok(([(CONTENT_TYPE, "application/octet-stream")], object).into_response())
}

/// `PUT /index/{id}/object`: replace the object with the raw body.
#[tracing::instrument(skip(state, body), fields(size = body.len()))]
pub async fn put_object_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ApiError> {
    let (cancel, _guard) = state.request_scope();
    let updated = state
        .indexer
        .update(
            UpdateRequest {
                id,
                object: Some(body),
                metadata: None,
            },
            &cancel,
        )
        .await?;
    Ok(Json(updated))
}

/// `GET /index/{id}/metadata`: the metadata document as JSON.
#[tracing::instrument(skip(state))]
pub async fn get_metadata_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Document>, ApiError> {
    let (cancel, _guard) = state.request_scope();
    Ok(Json(state.indexer.read_metadata(&id, &cancel).await?))
}

/// `PUT /index/{id}/metadata`: merge a JSON document into the stored one.
#[tracing::instrument(skip(state, headers, body))]
pub async fn put_metadata_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ApiError> {
    let declared = content_type(&headers);
    let is_json = declared
        .parse::<Mime>()
        .is_ok_and(|mime| mime.essence_str() == mime::APPLICATION_JSON.essence_str());
    if !is_json {
        return Err(ApiError::ExpectedJson(declared.to_owned()));
    }
    let metadata = Document::from_json_slice(&body)?;

    let (cancel, _guard) = state.request_scope();
    let updated = state
        .indexer
        .update(
            UpdateRequest {
                id,
                object: None,
                metadata: Some(metadata),
            },
            &cancel,
        )
        .await?;
    Ok(Json(updated))
}
