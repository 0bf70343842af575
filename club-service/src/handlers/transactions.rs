//! Transaction handlers, including the bank statement import.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{NewReference, NewTransaction, Transaction, TransactionImport};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub booking_day: NaiveDate,
    pub value_day: NaiveDate,
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: String,
    #[validate(length(max = 1024, message = "Description must be at most 1024 characters"))]
    pub description: String,
    pub amount: Decimal,
    pub reference: Option<NewReference>,
    pub receipt_id: Option<Uuid>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

impl From<TransactionRequest> for NewTransaction {
    fn from(req: TransactionRequest) -> Self {
        Self {
            booking_day: req.booking_day,
            value_day: req.value_day,
            name: req.name,
            description: req.description,
            amount: req.amount,
            reference: req.reference,
            receipt_id: req.receipt_id,
            purpose_id: req.purpose_id,
            area_id: req.area_id,
        }
    }
}

/// Import a bank statement.
///
/// POST /api/transactions/imports
///
/// Lines already stored are skipped. Responds 204 without a body.
pub async fn import_transactions(
    State(state): State<AppState>,
    Json(items): Json<Vec<TransactionImport>>,
) -> Result<StatusCode, AppError> {
    state.importer.import(items).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(req): Json<TransactionRequest>,
) -> Result<(StatusCode, Json<Transaction>), AppError> {
    req.validate()?;
    let transaction = state.transactions.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// GET /api/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.transactions.list().await?))
}

/// GET /api/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.transactions.get(transaction_id).await?))
}

/// DELETE /api/transactions/:id
pub async fn delete_transaction(
    State(state): State<AppState>,
    Path(transaction_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.transactions.delete(transaction_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
