//! Integration tests for mapping and transaction CRUD.

mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::{json, Value};
use uuid::Uuid;

#[tokio::test]
async fn mappings_are_listed_in_creation_order() {
    let app = spawn_app();
    for matcher in ["rent", "soap", "tavern"] {
        let response = app.post("/api/mappings", json!({ "matcher": matcher })).await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let listed = app.get("/api/mappings").await;
    let matchers: Vec<&str> = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["matcher"].as_str())
        .collect();
    assert_eq!(matchers, ["rent", "soap", "tavern"]);
}

#[tokio::test]
async fn mapping_reference_must_exist() {
    let app = spawn_app();

    let response = app
        .post(
            "/api/mappings",
            json!({
                "matcher": "soap",
                "reference": { "type": "creditor", "creditor": Uuid::new_v4() }
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/api/mappings").await.body, json!([]));
}

#[tokio::test]
async fn unknown_reference_type_is_rejected() {
    let app = spawn_app();

    let response = app
        .post(
            "/api/mappings",
            json!({
                "matcher": "soap",
                "reference": { "type": "sponsor", "sponsor": Uuid::new_v4() }
            }),
        )
        .await;

    assert!(response.status.is_client_error());
}

#[tokio::test]
async fn update_and_delete_mapping() {
    let app = spawn_app();
    let member = app.seed_member("Marla", "Singer");
    let created = app.post("/api/mappings", json!({ "matcher": "rent" })).await;
    let id = created.body["mappingId"].as_str().unwrap().to_string();

    let updated = app
        .put(
            &format!("/api/mappings/{id}"),
            json!({
                "matcher": "membership",
                "reference": { "type": "member", "member": member.member_id }
            }),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["matcher"], "membership");
    assert_eq!(updated.body["reference"]["member"], json!(member.member_id));

    assert_eq!(
        app.delete(&format!("/api/mappings/{id}")).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        app.get(&format!("/api/mappings/{id}")).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn blank_matcher_is_rejected() {
    let app = spawn_app();

    let empty = app.post("/api/mappings", json!({ "matcher": "" })).await;
    assert_eq!(empty.status, StatusCode::UNPROCESSABLE_ENTITY);

    let blank = app.post("/api/mappings", json!({ "matcher": "   " })).await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manual_transaction_crud() {
    let app = spawn_app();
    let donor = app.seed_donor("Bob");

    let created = app
        .post(
            "/api/transactions",
            json!({
                "bookingDay": "2023-11-07",
                "valueDay": "2023-11-07",
                "name": "Bob",
                "description": "donation",
                "amount": "25.00",
                "reference": { "type": "donor", "donor": donor.donor_id }
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["transactionId"].as_str().unwrap().to_string();

    let fetched = app.get(&format!("/api/transactions/{id}")).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["reference"]["donor"], json!(donor.donor_id));

    assert_eq!(
        app.delete(&format!("/api/transactions/{id}")).await.status,
        StatusCode::NO_CONTENT
    );
    assert!(app.transactions().await.is_empty());
}

#[tokio::test]
async fn manual_transaction_with_unknown_receipt_is_not_found() {
    let app = spawn_app();

    let response = app
        .post(
            "/api/transactions",
            json!({
                "bookingDay": "2023-11-07",
                "valueDay": "2023-11-07",
                "name": "Lou",
                "description": "rent",
                "amount": "-100.00",
                "receiptId": Uuid::new_v4()
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.transactions().await, Vec::<Value>::new());
}
