use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all sakuin endpoints.
///
/// Request bodies larger than `max_body_bytes` are rejected with 413.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/info", get(handler::info_handler))
        .route("/index", post(handler::create_handler))
        .route(
            "/index/:id",
            get(handler::read_handler)
                .put(handler::update_handler)
                .delete(handler::delete_handler),
        )
        .route(
            "/index/:id/object",
            get(handler::get_object_handler).put(handler::put_object_handler),
        )
        .route(
            "/index/:id/metadata",
            get(handler::get_metadata_handler).put(handler::put_metadata_handler),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
