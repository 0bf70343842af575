//! Integration tests for receipts and their windows.

mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::{json, Value};
use uuid::Uuid;

fn receipt(creditor_id: Uuid, from: &str, to: &str) -> Value {
    json!({
        "name": "Invoice",
        "validFrom": from,
        "validTo": to,
        "creditorId": creditor_id
    })
}

#[tokio::test]
async fn create_and_fetch_receipt() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Paper Street Soap Co");

    let created = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-06", "2023-11-08"))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["validFrom"], "2023-11-06");

    let id = created.body["receiptId"].as_str().unwrap().to_string();
    let fetched = app.get(&format!("/api/receipts/{id}")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, created.body);

    let listed = app.get("/api/receipts").await;
    assert_eq!(listed.body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn window_containing_the_new_start_is_a_conflict() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    app.post("/api/receipts", receipt(creditor.creditor_id, "2023-11-01", "2023-11-06"))
        .await;

    let response = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-06", "2023-11-20"))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert_eq!(app.get("/api/receipts").await.body.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn window_containing_the_new_end_is_a_conflict() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    app.post("/api/receipts", receipt(creditor.creditor_id, "2023-11-06", "2023-11-10"))
        .await;

    let response = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-10-01", "2023-11-06"))
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn other_creditors_windows_do_not_conflict() {
    let app = spawn_app();
    let lou = app.seed_creditor("Lou's Tavern");
    let soap = app.seed_creditor("Paper Street Soap Co");

    app.post("/api/receipts", receipt(lou.creditor_id, "2023-11-01", "2023-11-30"))
        .await;
    let response = app
        .post("/api/receipts", receipt(soap.creditor_id, "2023-11-01", "2023-11-30"))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
}

#[tokio::test]
async fn updating_a_receipt_ignores_its_own_window() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    let created = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-06", "2023-11-08"))
        .await;
    let id = created.body["receiptId"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/api/receipts/{id}"),
            receipt(creditor.creditor_id, "2023-11-06", "2023-11-12"),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["validTo"], "2023-11-12");
}

#[tokio::test]
async fn updating_into_another_window_is_a_conflict() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    app.post("/api/receipts", receipt(creditor.creditor_id, "2023-11-01", "2023-11-05"))
        .await;
    let second = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-10", "2023-11-15"))
        .await;
    let id = second.body["receiptId"].as_str().unwrap().to_string();

    let response = app
        .put(
            &format!("/api/receipts/{id}"),
            receipt(creditor.creditor_id, "2023-11-04", "2023-11-15"),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    let unchanged = app.get(&format!("/api/receipts/{id}")).await;
    assert_eq!(unchanged.body["validFrom"], "2023-11-10");
}

#[tokio::test]
async fn inverted_window_is_a_bad_request() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");

    let response = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-08", "2023-11-06"))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn empty_name_fails_validation() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");

    let response = app
        .post(
            "/api/receipts",
            json!({
                "name": "",
                "validFrom": "2023-11-06",
                "validTo": "2023-11-08",
                "creditorId": creditor.creditor_id
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_creditor_and_receipt_are_not_found() {
    let app = spawn_app();

    let response = app
        .post("/api/receipts", receipt(Uuid::new_v4(), "2023-11-06", "2023-11-08"))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = app.get(&format!("/api/receipts/{}", Uuid::new_v4())).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_receipt_detaches_it_from_transactions() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    let created = app
        .post("/api/receipts", receipt(creditor.creditor_id, "2023-11-01", "2023-11-30"))
        .await;
    let id = created.body["receiptId"].as_str().unwrap().to_string();

    let transaction = app
        .post(
            "/api/transactions",
            json!({
                "bookingDay": "2023-11-07",
                "valueDay": "2023-11-07",
                "name": "Lou",
                "description": "rent",
                "amount": "-100.00",
                "reference": { "type": "creditor", "creditor": creditor.creditor_id },
                "receiptId": id
            }),
        )
        .await;
    assert_eq!(transaction.status, StatusCode::CREATED);

    let deleted = app.delete(&format!("/api/receipts/{id}")).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("/api/receipts/{id}")).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.transactions().await[0]["receiptId"], Value::Null);

    let again = app.delete(&format!("/api/receipts/{id}")).await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}
