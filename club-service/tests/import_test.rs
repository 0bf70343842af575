//! Integration tests for bank statement import.

mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::{json, Value};
use uuid::Uuid;

fn line(day: &str, name: &str, description: &str, amount: &str) -> Value {
    json!({
        "bookingDay": day,
        "valueDay": day,
        "name": name,
        "description": description,
        "amount": amount
    })
}

#[tokio::test]
async fn import_responds_no_content() {
    let app = spawn_app();

    let response = app
        .post(
            "/api/transactions/imports",
            json!([line("2023-11-07", "Marla Singer", "rent", "-450.00")]),
        )
        .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(response.body, Value::Null);
    assert_eq!(app.transactions().await.len(), 1);
}

#[tokio::test]
async fn reimporting_a_statement_is_idempotent() {
    let app = spawn_app();
    let batch = json!([
        line("2023-11-07", "Marla Singer", "rent", "-450.00"),
        line("2023-11-08", "Tyler Durden", "soap sales", "120.00"),
    ]);

    let first = app.post("/api/transactions/imports", batch.clone()).await;
    let second = app.post("/api/transactions/imports", batch).await;

    assert_eq!(first.status, StatusCode::NO_CONTENT);
    assert_eq!(second.status, StatusCode::NO_CONTENT);
    assert_eq!(app.transactions().await.len(), 2);
}

#[tokio::test]
async fn any_differing_key_field_imports_a_new_transaction() {
    let app = spawn_app();
    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "Marla Singer", "rent", "-450.00")]),
    )
    .await;

    app.post(
        "/api/transactions/imports",
        json!([
            line("2023-11-07", "Marla Singer", "rent", "-450.00"),
            line("2023-11-07", "Marla Singer", "rent", "-451.00"),
            line("2023-11-07", "Marla Singer", "Rent", "-450.00"),
        ]),
    )
    .await;

    assert_eq!(app.transactions().await.len(), 3);
}

#[tokio::test]
async fn identical_lines_within_one_batch_are_both_imported() {
    let app = spawn_app();
    let item = line("2023-11-07", "Lou", "tavern", "-20.00");

    app.post("/api/transactions/imports", json!([item.clone(), item.clone()]))
        .await;
    assert_eq!(app.transactions().await.len(), 2);

    // Both now count as stored.
    app.post("/api/transactions/imports", json!([item])).await;
    assert_eq!(app.transactions().await.len(), 2);
}

#[tokio::test]
async fn earliest_mapping_wins_over_later_matches() {
    let app = spawn_app();
    let first_purpose = Uuid::new_v4();
    let second_purpose = Uuid::new_v4();

    app.post(
        "/api/mappings",
        json!({ "matcher": "Soap", "purposeId": first_purpose }),
    )
    .await;
    app.post(
        "/api/mappings",
        json!({ "matcher": "oap", "purposeId": second_purpose }),
    )
    .await;

    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "Robert Paulson", "Robert Paulson - soap order", "-9.99")]),
    )
    .await;

    let transactions = app.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["purposeId"], json!(first_purpose));
}

#[tokio::test]
async fn matcher_ignores_case() {
    let app = spawn_app();
    let area = Uuid::new_v4();
    app.post("/api/mappings", json!({ "matcher": "Ikea", "areaId": area }))
        .await;

    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "IKEA", "payment to IKEA STORE", "-80.00")]),
    )
    .await;

    let transactions = app.transactions().await;
    assert_eq!(transactions[0]["areaId"], json!(area));
    assert_eq!(transactions[0]["reference"], Value::Null);
    assert_eq!(transactions[0]["purposeId"], Value::Null);
}

#[tokio::test]
async fn unmatched_line_is_imported_bare() {
    let app = spawn_app();
    app.post("/api/mappings", json!({ "matcher": "soap" })).await;

    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "Marla Singer", "rent", "-450.00")]),
    )
    .await;

    let transaction = &app.transactions().await[0];
    for field in ["reference", "receiptId", "purposeId", "areaId"] {
        assert_eq!(transaction[field], Value::Null, "{field} should be unset");
    }
    assert_eq!(transaction["description"], "rent");
}

#[tokio::test]
async fn full_mapping_attaches_reference_receipt_purpose_and_area() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Paper Street Soap Co");
    let purpose = Uuid::new_v4();
    let area = Uuid::new_v4();

    let receipt = app
        .post(
            "/api/receipts",
            json!({
                "name": "Soap contract",
                "validFrom": "2023-11-01",
                "validTo": "2023-11-30",
                "creditorId": creditor.creditor_id
            }),
        )
        .await;
    assert_eq!(receipt.status, StatusCode::CREATED);

    let mapping = app
        .post(
            "/api/mappings",
            json!({
                "matcher": "Soap",
                "reference": { "type": "creditor", "creditor": creditor.creditor_id },
                "purposeId": purpose,
                "areaId": area
            }),
        )
        .await;
    assert_eq!(mapping.status, StatusCode::CREATED);

    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "Paper Street", "soap order", "-12.50")]),
    )
    .await;

    let transaction = &app.transactions().await[0];
    assert_eq!(
        transaction["reference"],
        json!({ "type": "creditor", "creditor": creditor.creditor_id })
    );
    assert_eq!(transaction["receiptId"], receipt.body["receiptId"]);
    assert_eq!(transaction["purposeId"], json!(purpose));
    assert_eq!(transaction["areaId"], json!(area));
}

#[tokio::test]
async fn receipt_is_looked_up_by_value_day() {
    let app = spawn_app();
    let creditor = app.seed_creditor("Lou's Tavern");
    app.post(
        "/api/receipts",
        json!({
            "name": "November",
            "validFrom": "2023-11-06",
            "validTo": "2023-11-08",
            "creditorId": creditor.creditor_id
        }),
    )
    .await;
    app.post(
        "/api/mappings",
        json!({
            "matcher": "tavern",
            "reference": { "type": "creditor", "creditor": creditor.creditor_id }
        }),
    )
    .await;

    app.post(
        "/api/transactions/imports",
        json!([
            {
                "bookingDay": "2023-11-09",
                "valueDay": "2023-11-08",
                "name": "Lou",
                "description": "Tavern rent",
                "amount": "-100.00"
            },
            {
                "bookingDay": "2023-11-08",
                "valueDay": "2023-11-09",
                "name": "Lou",
                "description": "Tavern rent",
                "amount": "-100.00"
            }
        ]),
    )
    .await;

    let transactions = app.transactions().await;
    assert_eq!(transactions.len(), 2);
    assert_ne!(transactions[0]["receiptId"], Value::Null);
    assert_eq!(transactions[1]["receiptId"], Value::Null);
    assert_eq!(
        transactions[1]["reference"]["creditor"],
        json!(creditor.creditor_id)
    );
}

#[tokio::test]
async fn only_creditor_references_get_receipts() {
    let app = spawn_app();
    let donor = app.seed_donor("Bob");

    app.post(
        "/api/mappings",
        json!({
            "matcher": "donation",
            "reference": { "type": "donor", "donor": donor.donor_id }
        }),
    )
    .await;

    app.post(
        "/api/transactions/imports",
        json!([line("2023-11-07", "Bob", "Donation", "50.00")]),
    )
    .await;

    let transaction = &app.transactions().await[0];
    assert_eq!(
        transaction["reference"],
        json!({ "type": "donor", "donor": donor.donor_id })
    );
    assert_eq!(transaction["receiptId"], Value::Null);
}

#[tokio::test]
async fn mapping_to_a_removed_party_aborts_the_rest_of_the_batch() {
    let app = spawn_app();
    let member = app.seed_member("Robert", "Paulson");
    app.post(
        "/api/mappings",
        json!({
            "matcher": "membership",
            "reference": { "type": "member", "member": member.member_id }
        }),
    )
    .await;
    app.store.remove_member(member.member_id);

    let response = app
        .post(
            "/api/transactions/imports",
            json!([
                line("2023-11-01", "Marla Singer", "rent", "-450.00"),
                line("2023-11-02", "Robert Paulson", "Membership fee", "30.00"),
                line("2023-11-03", "Tyler Durden", "soap sales", "120.00"),
            ]),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    let transactions = app.transactions().await;
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0]["description"], "rent");
}

#[tokio::test]
async fn malformed_import_body_is_rejected() {
    let app = spawn_app();

    let response = app
        .post(
            "/api/transactions/imports",
            json!([{ "bookingDay": "not-a-date", "name": "x" }]),
        )
        .await;

    assert!(response.status.is_client_error());
    assert!(app.transactions().await.is_empty());
}
