//! Error types for nap-audit
//!
//! Batch-level failures abort a run and reach the invoker. Per-record lookup
//! failures never appear here; they become `error` rows in the report.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failure that aborts a whole audit run
#[derive(Debug, Error)]
pub enum AuditError {
    /// Input missing required columns or unreadable (before any lookup)
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Report destination unreachable or unwritable (after all rows computed)
    #[error("Sink write failed: {0}")]
    SinkWrite(String),

    /// Configuration problem detected at run time
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<nap_common::Error> for AuditError {
    fn from(err: nap_common::Error) -> Self {
        AuditError::Config(err.to_string())
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Conflict (409) - an audit run is already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Audit run failed (500)
    #[error(transparent)]
    Audit(#[from] AuditError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Audit(AuditError::MalformedInput(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "MALFORMED_INPUT")
            }
            ApiError::Audit(AuditError::SinkWrite(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SINK_WRITE_ERROR")
            }
            ApiError::Audit(AuditError::Config(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
