//! Prometheus metrics for club-service.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::time::Instant;

/// Counter for HTTP requests by method, route and status.
pub static HTTP_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_http_requests_total",
        "Total number of HTTP requests",
        &["method", "route", "status"]
    )
    .expect("Failed to register HTTP_REQUESTS")
});

/// Histogram for HTTP request duration by method and route.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "club_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "route"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register HTTP_REQUEST_DURATION")
});

/// Histogram for database query duration.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "club_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for imported statement lines by outcome (imported, skipped).
pub static TRANSACTION_IMPORTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_transaction_imports_total",
        "Total number of imported statement lines",
        &["outcome"]
    )
    .expect("Failed to register TRANSACTION_IMPORTS")
});

/// Counter for mapping lookups by outcome (matched, unmatched).
pub static MAPPING_MATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_mapping_matches_total",
        "Total number of mapping lookups",
        &["outcome"]
    )
    .expect("Failed to register MAPPING_MATCHES")
});

/// Counter for receipts attached during import.
pub static RECEIPT_ATTACHMENTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_receipt_attachments_total",
        "Total number of receipts attached to imported transactions",
        &["source"]
    )
    .expect("Failed to register RECEIPT_ATTACHMENTS")
});

/// Counter for election ledger operations.
pub static ELECTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_elections_total",
        "Total number of election ledger operations",
        &["operation"]
    )
    .expect("Failed to register ELECTIONS")
});

/// Counter for identity provider requests by operation and status.
pub static IDENTITY_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_identity_requests_total",
        "Total number of identity provider requests",
        &["operation", "status"]
    )
    .expect("Failed to register IDENTITY_REQUESTS")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "club_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&HTTP_REQUESTS);
    Lazy::force(&HTTP_REQUEST_DURATION);
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&TRANSACTION_IMPORTS);
    Lazy::force(&MAPPING_MATCHES);
    Lazy::force(&RECEIPT_ATTACHMENTS);
    Lazy::force(&ELECTIONS);
    Lazy::force(&IDENTITY_REQUESTS);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn record_transaction_import(outcome: &str) {
    TRANSACTION_IMPORTS.with_label_values(&[outcome]).inc();
}

pub fn record_mapping_match(outcome: &str) {
    MAPPING_MATCHES.with_label_values(&[outcome]).inc();
}

pub fn record_receipt_attachment() {
    RECEIPT_ATTACHMENTS.with_label_values(&["import"]).inc();
}

pub fn record_election(operation: &str) {
    ELECTIONS.with_label_values(&[operation]).inc();
}

pub fn record_identity_request(operation: &str, status: &str) {
    IDENTITY_REQUESTS
        .with_label_values(&[operation, status])
        .inc();
}

pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}

/// Records request count and latency, labelled by route template rather than
/// the raw path so ids do not explode label cardinality.
pub async fn http_metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    HTTP_REQUESTS
        .with_label_values(&[&method, &route, &status])
        .inc();
    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &route])
        .observe(start.elapsed().as_secs_f64());

    response
}
