//! Common test utilities for club-service integration tests.
//!
//! The router runs over the in-memory store and a mock identity provider and
//! is driven request by request with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use club_service::models::{Creditor, Donor, Member};
use club_service::services::{MemoryStore, MockIdentityProvider};
use club_service::startup::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Once};
use tower::ServiceExt;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,club_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<MockIdentityProvider>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub fn spawn_app() -> TestApp {
    init_tracing();

    let store = Arc::new(MemoryStore::new());
    let identity = Arc::new(MockIdentityProvider::new());
    let state = AppState::new(store.clone(), identity.clone(), 2);

    TestApp {
        router: build_router(state),
        store,
        identity,
    }
}

impl TestApp {
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router call failed");

        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        // Extractor rejections answer in plain text.
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse { status, body }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn put(&self, uri: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> TestResponse {
        self.request(Method::DELETE, uri, None).await
    }

    pub fn seed_member(&self, first_name: &str, last_name: &str) -> Member {
        let subject = format!("{}.{}", first_name, last_name).to_lowercase();
        self.store.insert_member(first_name, last_name, &subject)
    }

    pub fn seed_donor(&self, name: &str) -> Donor {
        self.store.insert_donor(name)
    }

    pub fn seed_creditor(&self, name: &str) -> Creditor {
        self.store.insert_creditor(name)
    }

    pub async fn transactions(&self) -> Vec<Value> {
        let response = self.get("/api/transactions").await;
        assert_eq!(response.status, StatusCode::OK);
        response.body.as_array().cloned().unwrap_or_default()
    }
}
