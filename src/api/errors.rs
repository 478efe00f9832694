//! API error types and JSON responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// API errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request rejected by the CSRF guard; the message is the validation
    /// failure reason (never a stored token value).
    #[error("{0}")]
    CsrfViolation(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("We encountered an internal error. Please try again.")]
    Internal(String),
}

impl ApiError {
    /// Stable error code used as the `error` field of the JSON body.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::CsrfViolation(_) => "CSRF Protection Violation",
            ApiError::InvalidArgument(_) => "Invalid Argument",
            ApiError::Internal(_) => "Internal Error",
        }
    }

    /// Get the HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::CsrfViolation(_) => StatusCode::FORBIDDEN,
            ApiError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.code(),
            "message": self.to_string(),
            "timestamp": crate::csrf::now_ms(),
        });

        (self.status_code(), Json(body)).into_response()
    }
}
