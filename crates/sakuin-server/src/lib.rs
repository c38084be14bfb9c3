//! HTTP server for sakuin.
//!
//! Exposes the dual-store [`Indexer`](sakuin_index::Indexer) over a small
//! REST API: entries are created and updated from `multipart/form-data`
//! bodies carrying an `object` part and an optional JSON `metadata` part.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{ServerConfig, StorageConfig};
pub use error::{ApiError, ServerError, ServerResult};
pub use handler::AppState;
pub use server::SakuinServer;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    const BOUNDARY: &str = "sakuin-boundary";

    fn app() -> Router {
        SakuinServer::new(ServerConfig::default()).unwrap().router()
    }

    fn form(fields: &[(&str, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, data) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart(method: &str, uri: &str, fields: &[(&str, &[u8])]) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(form(fields)))
            .unwrap()
    }

    fn empty(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    async fn create(app: &Router, object: &[u8], metadata: &[u8]) -> String {
        let response = send(
            app,
            multipart("POST", "/index", &[("metadata", metadata), ("object", object)]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response).await["id"]
            .as_str()
            .unwrap()
            .to_owned()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = send(&app(), empty("GET", "/health")).await;
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let response = send(&app(), empty("GET", "/info")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response).await["name"], "sakuin");
    }

    #[tokio::test]
    async fn create_then_read_entry() {
        let app = app();
        let id = create(&app, b"hi", br#"{"title":"greeting"}"#).await;

        let response = send(&app, empty("GET", &format!("/index/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "id": id, "metadata": { "title": "greeting" }, "object": "6869" })
        );
    }

    #[tokio::test]
    async fn create_without_object_is_rejected() {
        let response = send(
            &app(),
            multipart("POST", "/index", &[("metadata", br#"{"a":1}"#)]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "must provide object part in form data" })
        );
    }

    #[tokio::test]
    async fn create_with_json_body_is_rejected() {
        let request = Request::builder()
            .method("POST")
            .uri("/index")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"a":1}"#))
            .unwrap();
        let response = send(&app(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_with_non_object_metadata_is_rejected() {
        let response = send(
            &app(),
            multipart("POST", "/index", &[("metadata", b"[1,2]"), ("object", b"x")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_unknown_entry_is_404() {
        let response = send(&app(), empty("GET", "/index/does-not-exist")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_json(response).await["message"].is_string());
    }

    #[tokio::test]
    async fn object_routes_return_raw_bytes() {
        let app = app();
        let id = create(&app, b"\x00\x01\x02", b"{}").await;

        let response = send(&app, empty("GET", &format!("/index/{id}/object"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "application/octet-stream"
        );
        assert_eq!(body_bytes(response).await, b"\x00\x01\x02");

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/index/{id}/object"))
            .body(Body::from("replaced"))
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::OK);

        let response = send(&app, empty("GET", &format!("/index/{id}/object"))).await;
        assert_eq!(body_bytes(response).await, b"replaced");
    }

    #[tokio::test]
    async fn metadata_routes_merge_json() {
        let app = app();
        let id = create(&app, b"x", br#"{"a":1,"nested":{"x":1}}"#).await;

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/index/{id}/metadata"))
            .header("content-type", "application/json; charset=utf-8")
            .body(Body::from(r#"{"b":2,"nested":{"y":2}}"#))
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::OK);

        let response = send(&app, empty("GET", &format!("/index/{id}/metadata"))).await;
        assert_eq!(
            body_json(response).await,
            json!({ "a": 1, "b": 2, "nested": { "x": 1, "y": 2 } })
        );
    }

    #[tokio::test]
    async fn metadata_put_requires_json_content_type() {
        let app = app();
        let id = create(&app, b"x", b"{}").await;

        let request = Request::builder()
            .method("PUT")
            .uri(format!("/index/{id}/metadata"))
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"b":2}"#))
            .unwrap();
        assert_eq!(send(&app, request).await.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn multipart_update_touches_supplied_halves() {
        let app = app();
        let id = create(&app, b"old", br#"{"v":1}"#).await;

        let response = send(
            &app,
            multipart("PUT", &format!("/index/{id}"), &[("object", b"new")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "applied": ["object"] }));

        let response = send(&app, empty("GET", &format!("/index/{id}"))).await;
        let body = body_json(response).await;
        assert_eq!(body["object"], hex::encode(b"new"));
        assert_eq!(body["metadata"], json!({ "v": 1 }));
    }

    #[tokio::test]
    async fn update_unknown_entry_is_404() {
        let response = send(
            &app(),
            multipart("PUT", "/index/ghost", &[("object", b"x")]),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let app = app();
        let id = create(&app, b"x", br#"{"a":1}"#).await;

        let response = send(&app, empty("DELETE", &format!("/index/{id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, empty("GET", &format!("/index/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&app, empty("DELETE", &format!("/index/{id}"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let config = ServerConfig {
            max_body_bytes: 16,
            ..ServerConfig::default()
        };
        let app = SakuinServer::new(config).unwrap().router();
        let body = form(&[("object", &[0u8; 64])]);
        let request = Request::builder()
            .method("POST")
            .uri("/index")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("content-length", body.len())
            .body(Body::from(body))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn oversized_streamed_body_is_rejected() {
        let config = ServerConfig {
            max_body_bytes: 16,
            ..ServerConfig::default()
        };
        let app = SakuinServer::new(config).unwrap().router();
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = form(&[("object", &[0u8; 64])])
            .chunks(8)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        let request = Request::builder()
            .method("POST")
            .uri("/index")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();
        assert!(request.headers().get("content-length").is_none());

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body_json(response).await["message"].is_string());
    }
}
