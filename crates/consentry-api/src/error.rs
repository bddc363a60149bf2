//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from the ledger, compliance, and trust crates to
//! HTTP status codes with JSON error bodies. Internal error details are
//! never exposed in responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// The error payload.
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`].
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404). Never retried.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422). The invalid transition is
    /// rejected, never partially applied.
    #[error("validation error: {0}")]
    Validation(String),

    /// Request body could not be parsed (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failure — missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller's role does not match the operation (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A uniqueness constraint rejected the write (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure inside rule evaluation or scoring (500). The
    /// whole request fails — a partial scan could under-report risk.
    /// Message is logged but not returned to the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status code and machine-readable code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<consentry_core::ValidationError> for AppError {
    fn from(err: consentry_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<consentry_core::ConsentryError> for AppError {
    fn from(err: consentry_core::ConsentryError) -> Self {
        use consentry_core::ConsentryError;
        match &err {
            ConsentryError::NotFound(_) => Self::NotFound(err.to_string()),
            ConsentryError::Validation(_) => Self::Validation(err.to_string()),
            ConsentryError::Permission(_) => Self::Forbidden(err.to_string()),
            ConsentryError::Conflict(_) => Self::Conflict(err.to_string()),
            ConsentryError::Computation(_) | ConsentryError::Json(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<consentry_ledger::LedgerError> for AppError {
    fn from(err: consentry_ledger::LedgerError) -> Self {
        use consentry_ledger::LedgerError;
        match &err {
            LedgerError::UnknownConsentType(_)
            | LedgerError::UnknownRequest(_)
            | LedgerError::UnknownGrant { .. } => Self::NotFound(err.to_string()),
            LedgerError::DuplicateRequest { .. } => Self::Conflict(err.to_string()),
            LedgerError::NotRequestSubject { .. } => Self::Forbidden(err.to_string()),
            LedgerError::Validation(_) => Self::Validation(err.to_string()),
        }
    }
}

impl From<consentry_compliance::RecorderError> for AppError {
    fn from(err: consentry_compliance::RecorderError) -> Self {
        Self::NotFound(err.to_string())
    }
}

impl From<consentry_trust::DirectoryError> for AppError {
    fn from(err: consentry_trust::DirectoryError) -> Self {
        Self::NotFound(err.to_string())
    }
}
