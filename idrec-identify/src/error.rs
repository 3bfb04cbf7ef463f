//! Error types for idrec-identify
//!
//! Validation problems are the client's fault (400). Invariant violations
//! and store failures are internal faults (500) and are logged here.

use crate::reconcile::ReconcileError;
use crate::service::ServiceError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Identify cycle failure
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Service(ServiceError::Reconcile(ReconcileError::Validation(msg))) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            ApiError::Service(ServiceError::Reconcile(ReconcileError::InvariantViolation(_))) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INVARIANT_VIOLATION",
                self.to_string(),
            ),
            ApiError::Service(ServiceError::StoreUnavailable(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_UNAVAILABLE",
                self.to_string(),
            ),
        };

        if status.is_server_error() {
            error!("Request failed: {}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
