//! Role handlers.
//!
//! Role, permission and holder changes are mirrored into the identity
//! provider before they are stored.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use service_core::error::AppError;
use std::collections::BTreeSet;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Election, NewRole, Role};
use crate::startup::AppState;

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PermissionRequest {
    #[validate(length(min = 1, max = 100, message = "Permission must be 1-100 characters"))]
    pub permission: String,
}

/// Holder body: either the bare member id or `{"memberId": "..."}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum HolderRequest {
    MemberId(Uuid),
    #[serde(rename_all = "camelCase")]
    Member { member_id: Uuid },
}

impl HolderRequest {
    pub fn member_id(&self) -> Uuid {
        match *self {
            Self::MemberId(id) | Self::Member { member_id: id } => id,
        }
    }
}

// ============================================================================
// Role Handlers
// ============================================================================

/// POST /api/roles
pub async fn create_role(
    State(state): State<AppState>,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    req.validate()?;
    let role = state
        .roles
        .create_role(NewRole {
            name: req.name,
            permissions: req.permissions,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// GET /api/roles
pub async fn list_roles(State(state): State<AppState>) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(state.roles.list_roles().await?))
}

/// GET /api/roles/:id
pub async fn get_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Role>, AppError> {
    Ok(Json(state.roles.get_role(role_id).await?))
}

/// DELETE /api/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.roles.delete_role(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/roles/:id/permissions
pub async fn add_permission(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(req): Json<PermissionRequest>,
) -> Result<Json<Role>, AppError> {
    req.validate()?;
    Ok(Json(
        state.roles.add_permission(role_id, &req.permission).await?,
    ))
}

/// DELETE /api/roles/:id/permissions/:permission
pub async fn remove_permission(
    State(state): State<AppState>,
    Path((role_id, permission)): Path<(Uuid, String)>,
) -> Result<Json<Role>, AppError> {
    Ok(Json(
        state.roles.remove_permission(role_id, &permission).await?,
    ))
}

// ============================================================================
// Holder Handlers
// ============================================================================

/// Make a member the exclusive holder of the role.
///
/// PUT /api/roles/:id/holder
pub async fn set_holder(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
    Json(req): Json<HolderRequest>,
) -> Result<StatusCode, AppError> {
    state.roles.set_holder(role_id, req.member_id()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/roles/:id/holder
pub async fn remove_holder(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.roles.remove_holder(role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/roles/:id/elections
pub async fn list_elections(
    State(state): State<AppState>,
    Path(role_id): Path<Uuid>,
) -> Result<Json<Vec<Election>>, AppError> {
    Ok(Json(state.roles.elections(role_id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn holder_body_accepts_bare_id_or_object() {
        let id = Uuid::new_v4();
        let bare: HolderRequest = serde_json::from_value(json!(id)).unwrap();
        let object: HolderRequest = serde_json::from_value(json!({ "memberId": id })).unwrap();
        assert_eq!(bare.member_id(), id);
        assert_eq!(object.member_id(), id);
    }
}
