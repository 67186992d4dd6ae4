use super::*;
use crate::coordinator::test_helpers::{
    Outcome, ScriptedExtractor, create_test_coordinator, test_config, wait_for_event,
};
use crate::types::{Event, ItemStatus, QueueSnapshot};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tokio::sync::Semaphore;
use tower::ServiceExt; // for oneshot


const BOUNDARY: &str = "intake-test-boundary";

/// Router backed by a scripted extractor; the coordinator is returned for inspection
fn test_app(config: Config, extractor: ScriptedExtractor) -> (Router, Arc<UploadCoordinator>) {
    let (coordinator, _extractor) = create_test_coordinator(config.clone(), extractor);
    let coordinator = Arc::new(coordinator);
    (
        create_router(coordinator.clone(), Arc::new(config)),
        coordinator,
    )
}

/// Build a multipart body with one part per `(field, file_name, content)`
fn multipart_body(parts: &[(&str, &str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, file_name, content) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(content.as_bytes());
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(parts: &[(&str, &str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/batches")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Poll until the coordinator releases its drain lock
async fn wait_until_idle(coordinator: &UploadCoordinator) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while coordinator.is_busy() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_api_server_spawns() {
    let mut config = test_config();
    config.api.bind_address = "127.0.0.1:0".parse().unwrap(); // Port 0 = OS assigns a free port
    let (coordinator, _extractor) = create_test_coordinator(config.clone(), ScriptedExtractor::new());

    let handle = tokio::spawn(start_api_server(Arc::new(coordinator), Arc::new(config)));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!handle.is_finished(), "server should keep running");
    handle.abort();
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _coordinator) = test_app(test_config(), ScriptedExtractor::new());

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_cors_disabled() {
    let mut config = test_config();
    config.api.cors_enabled = false;
    let (app, _coordinator) = test_app(config, ScriptedExtractor::new());

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        !response
            .headers()
            .contains_key("access-control-allow-origin")
    );
}

#[tokio::test]
async fn test_api_key_guards_routes() {
    let mut config = test_config();
    config.api.api_key = Some("intake-secret".to_string());
    let (app, _coordinator) = test_app(config, ScriptedExtractor::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/queue")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/queue")
                .header("X-Api-Key", "intake-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_build_cors_layer_with_specific_origins() {
    // Invalid header values are skipped rather than failing the build
    let _layer = build_cors_layer(&[
        "http://localhost:3000".to_string(),
        "not a header\n".to_string(),
    ]);
}
