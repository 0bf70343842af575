//! Integration tests for probes, metrics and the shared middleware.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::spawn_app;
use tower::ServiceExt;

#[tokio::test]
async fn health_and_readiness_report_ok() {
    let app = spawn_app();

    let health = app.get("/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "healthy");
    assert_eq!(health.body["service"], "club-service");

    let ready = app.get("/ready").await;
    assert_eq!(ready.status, StatusCode::OK);
    assert_eq!(ready.body["checks"]["database"], "up");
}

#[tokio::test]
async fn metrics_are_exposed_after_traffic() {
    let app = spawn_app();
    app.post("/api/transactions/imports", serde_json::json!([]))
        .await;

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = http_body_util::BodyExt::collect(response.into_body())
        .await
        .unwrap()
        .to_bytes();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("club_http_requests_total"));
}

#[tokio::test]
async fn request_id_is_echoed_and_security_headers_are_set() {
    let app = spawn_app();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "test-request-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "test-request-42");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn unknown_ids_are_not_found_across_resources() {
    let app = spawn_app();
    let id = uuid::Uuid::new_v4();

    for uri in [
        format!("/api/transactions/{id}"),
        format!("/api/receipts/{id}"),
        format!("/api/mappings/{id}"),
        format!("/api/roles/{id}"),
        format!("/api/roles/{id}/elections"),
    ] {
        let response = app.get(&uri).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND, "{uri}");
        assert!(response.body["error"].as_str().is_some(), "{uri}");
    }
}
