use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Structured error body returned on every failure path.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Unprocessable Entity")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid line items: {0}")]
    InvalidLineItems(String),

    #[error("Out of stock: {0}")]
    OutOfStock(String),

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid return state: {0}")]
    InvalidReturnState(String),

    #[error("Return must include at least one line item")]
    EmptyReturn,

    #[error("Actor is not the assigned delivery staff for record {0}")]
    NotAssigned(Uuid),

    #[error("Staff not found: {0}")]
    StaffNotFound(Uuid),

    #[error("Collected amount {collected} does not match order total {expected}")]
    AmountMismatch { collected: String, expected: String },

    #[error("COD record {0} is closed")]
    RecordClosed(Uuid),

    #[error("Return {0} is already completed")]
    AlreadyCompleted(Uuid),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidLineItems(_)
            | Self::EmptyReturn
            | Self::StaffNotFound(_) => StatusCode::BAD_REQUEST,
            Self::OutOfStock(_) | Self::AmountMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidTransition { .. }
            | Self::InvalidStatus(_)
            | Self::InvalidReturnState(_)
            | Self::RecordClosed(_)
            | Self::AlreadyCompleted(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::NotAssigned(_) => StatusCode::FORBIDDEN,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_family_maps_to_409() {
        let errors = [
            ServiceError::InvalidTransition {
                from: "shipped".into(),
                to: "cancelled".into(),
            },
            ServiceError::InvalidStatus("unknown".into()),
            ServiceError::InvalidReturnState("pending".into()),
            ServiceError::RecordClosed(Uuid::new_v4()),
            ServiceError::AlreadyCompleted(Uuid::new_v4()),
        ];
        for err in errors {
            assert_eq!(err.status_code(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn internal_errors_redact_details() {
        let err = ServiceError::InternalError("connection pool state dump".into());
        assert_eq!(err.response_message(), "Internal server error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn reconciliation_failure_is_unprocessable() {
        let err = ServiceError::AmountMismatch {
            collected: "20.00".into(),
            expected: "26.50".into(),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("26.50"));
    }
}
