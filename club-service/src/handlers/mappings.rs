use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Mapping, NewMapping, NewReference};
use crate::startup::AppState;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MappingRequest {
    #[validate(length(min = 1, max = 255, message = "Matcher must be 1-255 characters"))]
    pub matcher: String,
    pub reference: Option<NewReference>,
    pub purpose_id: Option<Uuid>,
    pub area_id: Option<Uuid>,
}

impl From<MappingRequest> for NewMapping {
    fn from(req: MappingRequest) -> Self {
        Self {
            matcher: req.matcher,
            reference: req.reference,
            purpose_id: req.purpose_id,
            area_id: req.area_id,
        }
    }
}

/// POST /api/mappings
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(req): Json<MappingRequest>,
) -> Result<(StatusCode, Json<Mapping>), AppError> {
    req.validate()?;
    let mapping = state.mappings.create(req.into()).await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// GET /api/mappings
pub async fn list_mappings(State(state): State<AppState>) -> Result<Json<Vec<Mapping>>, AppError> {
    Ok(Json(state.mappings.list().await?))
}

/// GET /api/mappings/:id
pub async fn get_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<Uuid>,
) -> Result<Json<Mapping>, AppError> {
    Ok(Json(state.mappings.get(mapping_id).await?))
}

/// PUT /api/mappings/:id
pub async fn update_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<Uuid>,
    Json(req): Json<MappingRequest>,
) -> Result<Json<Mapping>, AppError> {
    req.validate()?;
    Ok(Json(state.mappings.update(mapping_id, req.into()).await?))
}

/// DELETE /api/mappings/:id
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(mapping_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.mappings.delete(mapping_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
