use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Errors surfaced by the return workflow.
///
/// Messages are shown to the operator as-is, so validation messages are
/// written as instructions and store errors carry the backend's text.
#[derive(Debug, Error)]
pub enum AppError {
    /// Input rejected before anything was written.
    #[error("{0}")]
    Validation(String),

    /// Action not allowed from the current flow step or review status.
    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::InvalidTransition(_) => (StatusCode::BAD_REQUEST, "invalid_transition"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Store(StoreError::Conflict(_)) => (StatusCode::CONFLICT, "conflict"),
            AppError::Store(StoreError::SchemaDrift(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "schema_drift")
            }
            AppError::Store(StoreError::Backend(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "backend_error")
            }
        }
    }
}

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorResponse {
            error: kind.to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::validation("bad"), StatusCode::BAD_REQUEST),
            (AppError::not_found("Invoice"), StatusCode::NOT_FOUND),
            (
                AppError::Store(StoreError::Conflict("raced".into())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::Store(StoreError::Backend("boom".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_backend_message_is_passed_through() {
        let err = AppError::from(StoreError::backend("permission denied for table payments"));
        assert_eq!(err.to_string(), "permission denied for table payments");
        assert_eq!(AppError::not_found("Invoice").to_string(), "Invoice not found");
    }
}
