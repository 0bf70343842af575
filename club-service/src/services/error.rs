use super::identity::IdentityError;
use chrono::NaiveDate;
use service_core::error::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Receipt window of creditor {creditor_id} overlaps receipt {existing} on {date}")]
    OverlappingReceipt {
        creditor_id: Uuid,
        existing: Uuid,
        date: NaiveDate,
    },

    #[error("Window starts on {valid_from} but ends on {valid_to}")]
    InvalidWindow {
        valid_from: NaiveDate,
        valid_to: NaiveDate,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Identity provider error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Storage failures that may succeed when the same write is attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::OverlappingReceipt { .. } => "overlapping_receipt",
            Self::InvalidWindow { .. } => "invalid_window",
            Self::Validation(_) => "validation",
            Self::Identity(_) => "identity",
            Self::Database(_) => "database",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        super::metrics::record_error(err.kind());
        match err {
            ServiceError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(err.to_string())),
            ServiceError::OverlappingReceipt { .. } => {
                AppError::Conflict(anyhow::anyhow!(err.to_string()))
            }
            ServiceError::InvalidWindow { .. } | ServiceError::Validation(_) => {
                AppError::BadRequest(anyhow::anyhow!(err.to_string()))
            }
            ServiceError::Identity(e) => AppError::BadGateway(e.to_string()),
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Internal(e) => AppError::InternalError(e),
        }
    }
}
