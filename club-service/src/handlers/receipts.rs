//! Receipt CRUD.
//!
//! Creating or moving a receipt fails with 409 when its window touches
//! another receipt of the same creditor.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{NewReceipt, Receipt};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub creditor_id: Uuid,
}

impl From<ReceiptRequest> for NewReceipt {
    fn from(req: ReceiptRequest) -> Self {
        Self {
            name: req.name,
            valid_from: req.valid_from,
            valid_to: req.valid_to,
            creditor_id: req.creditor_id,
        }
    }
}

/// POST /api/receipts
pub async fn create_receipt(
    State(state): State<AppState>,
    Json(req): Json<ReceiptRequest>,
) -> Result<(StatusCode, Json<Receipt>), AppError> {
    req.validate()?;
    let receipt = state.receipts.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/receipts
pub async fn list_receipts(State(state): State<AppState>) -> Result<Json<Vec<Receipt>>, AppError> {
    Ok(Json(state.receipts.list().await?))
}

/// GET /api/receipts/:id
pub async fn get_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<Receipt>, AppError> {
    Ok(Json(state.receipts.get(receipt_id).await?))
}

/// PUT /api/receipts/:id
pub async fn update_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
    Json(req): Json<ReceiptRequest>,
) -> Result<Json<Receipt>, AppError> {
    req.validate()?;
    Ok(Json(state.receipts.update(receipt_id, req.into()).await?))
}

/// DELETE /api/receipts/:id
pub async fn delete_receipt(
    State(state): State<AppState>,
    Path(receipt_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.receipts.delete(receipt_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
