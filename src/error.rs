//! # Error Handling
//!
//! Custom error types and their conversion to HTTP responses.
//!
//! ## Error Taxonomy:
//! - **NotFound**: unknown project/chunk/audio-file id in a scoped query —
//!   surfaced as 404, never silently ignored
//! - **ValidationError**: missing required scoping or malformed submission,
//!   rejected before any write (400)
//! - **BadRequest**: malformed payloads and natural-key conflicts (400)
//! - **Internal / ConfigError**: server-side failures (500)
//!
//! Collaborator failures are deliberately absent from this taxonomy: a
//! failed remote trigger is logged and swallowed, it never fails the local
//! write that caused it.

use crate::store::StoreError;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Application error variants, each carrying a human-readable message.
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors (I/O failures, poisoned state, etc.)
    Internal(String),

    /// Client sent invalid or malformed data
    BadRequest(String),

    /// Requested resource was not found
    NotFound(String),

    /// Configuration file or environment variable problems
    ConfigError(String),

    /// Input failed validation rules
    ValidationError(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

/// Conversion of application errors to JSON HTTP responses.
///
/// ## Response Format:
/// ```json
/// {
///   "error": {
///     "type": "not_found",
///     "message": "project 550e8400-... not found",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::BadRequest(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "bad_request",
                msg.clone(),
            ),
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::ConfigError(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
            AppError::ValidationError(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "validation_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// Store failures map onto the HTTP taxonomy: a dangling reference is a
/// 404, a natural-key conflict is the client's error.
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::Duplicate(_) => AppError::BadRequest(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

/// Shorthand for handler results.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_http_taxonomy() {
        let not_found: AppError = StoreError::NotFound("chunk 42".to_string()).into();
        assert!(matches!(not_found, AppError::NotFound(_)));

        let duplicate: AppError = StoreError::Duplicate("audio file A1".to_string()).into();
        assert!(matches!(duplicate, AppError::BadRequest(_)));
    }

    #[test]
    fn test_error_response_status_codes() {
        use actix_web::http::StatusCode;

        let cases = [
            (AppError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (AppError::ConfigError("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, expected) in cases {
            assert_eq!(error.error_response().status(), expected);
        }
    }
}
