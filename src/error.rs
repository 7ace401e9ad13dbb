// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable (persistence failure, safe to retry)
    TransientStoreError(String),

    // 400 Bad Request
    ValidationError(String),

    // 401 Unauthorized (missing or invalid credentials)
    Unauthorized(String),

    // 403 Forbidden (wrong role, or not the attempt owner)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 403 Forbidden: the quiz window has not opened yet
    NotYetAvailable(String),

    // 403 Forbidden: the quiz window has already closed
    WindowClosed(String),

    // 409 Conflict: the attempt is terminal
    AlreadySubmitted(String),
}

impl AppError {
    /// Stable machine-readable kind, sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal_error",
            AppError::TransientStoreError(_) => "transient_store_error",
            AppError::ValidationError(_) => "validation_error",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::NotYetAvailable(_) => "not_yet_available",
            AppError::WindowClosed(_) => "window_closed",
            AppError::AlreadySubmitted(_) => "already_submitted",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::TransientStoreError(msg) => {
                tracing::error!("Store error: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Storage temporarily unavailable".to_string(),
                )
            }
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::NotYetAvailable(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::WindowClosed(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::AlreadySubmitted(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::TransientStoreError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::TransientStoreError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
