//! # REST API Handlers
//!
//! HTTP endpoints for the annotation pipeline, grouped by resource:
//! - **projects**: tenancy boundary CRUD
//! - **audio**: source-file lifecycle and the explicit pipeline triggers
//! - **chunks**: chunk records, category buckets, the transcription queue
//! - **evaluations**: the per-(chunk, evaluator) upsert
//! - **stats**: corpus statistics, per-flag totals, leaderboard
//! - **config**: runtime configuration read/update

pub mod audio;
pub mod chunks;
pub mod config;
pub mod evaluations;
pub mod projects;
pub mod stats;

use crate::error::AppError;
use actix_web::HttpRequest;
use serde::Deserialize;
use uuid::Uuid;

/// Optional project scope accepted by every read endpoint.
#[derive(Debug, Deserialize)]
pub struct ScopeQuery {
    pub project_id: Option<Uuid>,
}

/// The requesting user's identity, carried in the `x-user-id` header by the
/// auth tier in front of this service.
pub fn request_user(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Like `request_user`, but submission endpoints require the identity.
pub fn require_user(req: &HttpRequest) -> Result<String, AppError> {
    request_user(req).ok_or_else(|| {
        AppError::ValidationError("missing x-user-id header identifying the submitter".to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_request_user_reads_header() {
        let req = TestRequest::default()
            .insert_header(("x-user-id", "reviewer-1"))
            .to_http_request();
        assert_eq!(request_user(&req).as_deref(), Some("reviewer-1"));
    }

    #[test]
    fn test_request_user_rejects_blank_identity() {
        let req = TestRequest::default()
            .insert_header(("x-user-id", "   "))
            .to_http_request();
        assert!(request_user(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(request_user(&req).is_none());
        assert!(require_user(&req).is_err());
    }
}
