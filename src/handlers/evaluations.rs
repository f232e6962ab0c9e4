//! # Evaluation Handlers
//!
//! The submission endpoint behind the reviewer UI. Submissions are
//! idempotent per (chunk, evaluator): resubmitting replaces the stored
//! record rather than stacking a duplicate, so a reviewer can correct a
//! mistaken judgment without inflating the chunk's evaluation count.

use crate::error::AppError;
use crate::evaluation::flags::{EvaluationFlags, FlagSchemaVersion};
use crate::evaluation::stats::chunk_aggregate;
use crate::handlers::require_user;
use crate::state::AppState;
use crate::store::EvaluationSubmission;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitEvaluationRequest {
    pub flags: EvaluationFlags,
    /// Defaults to the current flag schema when absent
    pub schema: Option<FlagSchemaVersion>,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Submit (or replace) the requester's evaluation of a chunk.
///
/// ## Endpoint: `POST /api/v1/chunks/{id}/evaluations`
///
/// ## Request Body:
/// ```json
/// {
///   "flags": {"background_noise": true, "speaker_overlap": false},
///   "notes": "faint traffic noise",
///   "started_at": "2025-01-01T12:00:00Z",
///   "ended_at": "2025-01-01T12:00:41Z"
/// }
/// ```
///
/// ## Response:
/// 201 on first submission, 200 on replacement; both carry the stored
/// record and the chunk's recomputed aggregate.
pub async fn submit_evaluation(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<SubmitEvaluationRequest>,
) -> Result<HttpResponse, AppError> {
    let chunk_id = path.into_inner();
    let evaluator = require_user(&req)?;

    if let (Some(start), Some(end)) = (request.started_at, request.ended_at) {
        if end < start {
            return Err(AppError::ValidationError(
                "ended_at must not precede started_at".to_string(),
            ));
        }
    }

    let (result, created) = app_state.store.upsert_evaluation(
        chunk_id,
        EvaluationSubmission {
            evaluator: evaluator.clone(),
            schema: request.schema.unwrap_or_default(),
            flags: request.flags,
            notes: request.notes.clone(),
            started_at: request.started_at,
            ended_at: request.ended_at,
        },
    )?;
    app_state.record_evaluation_submission();
    info!(
        chunk = %chunk_id,
        evaluator = %evaluator,
        defects = result.flags.defect_count(),
        replaced = !created,
        "evaluation stored"
    );

    let aggregate = chunk_aggregate(&app_state.store, chunk_id);
    let duration_secs = result.evaluation_duration_secs();
    let body = json!({
        "evaluation": result,
        "evaluation_duration_secs": duration_secs,
        "aggregate": aggregate
    });
    Ok(if created {
        HttpResponse::Created().json(body)
    } else {
        HttpResponse::Ok().json(body)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::store::models::{Gender, Locale};
    use crate::store::NewChunk;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};

    fn seeded_state() -> (AppState, Uuid) {
        let state = AppState::new(AppConfig::default()).unwrap();
        let project = state.store.insert_project("helpline-2025", None, "admin");
        let (chunk, _) = state.store.insert_or_get_chunk(
            NewChunk {
                project_id: project.id,
                relative_path: "chunks/call_chunk_0001.wav".to_string(),
                duration_secs: 4.5,
                gender: Gender::default(),
                locale: Locale::default(),
            },
            "segmenter",
        );
        (state, chunk.id)
    }

    /// First submission creates (201); a resubmission replaces (200) and the
    /// aggregate still reports a single evaluation.
    #[actix_web::test]
    async fn test_submit_then_resubmit_upserts() {
        let (state, chunk_id) = seeded_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route(
                    "/chunks/{id}/evaluations",
                    web::post().to(submit_evaluation),
                ),
        )
        .await;

        let request = test::TestRequest::post()
            .uri(&format!("/chunks/{}/evaluations", chunk_id))
            .insert_header(("x-user-id", "reviewer-1"))
            .set_json(serde_json::json!({
                "flags": {"background_noise": true}
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let request = test::TestRequest::post()
            .uri(&format!("/chunks/{}/evaluations", chunk_id))
            .insert_header(("x-user-id", "reviewer-1"))
            .set_json(serde_json::json!({
                "flags": {"speaker_overlap": true},
                "notes": "corrected after relisten"
            }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(response).await;
        assert_eq!(body["aggregate"]["evaluation_count"], 1);
        assert_eq!(body["evaluation"]["flags"]["speaker_overlap"], true);
        assert_eq!(body["evaluation"]["flags"]["background_noise"], false);
    }

    /// A submission without evaluator identity is rejected before any write.
    #[actix_web::test]
    async fn test_submit_without_identity_is_rejected() {
        let (state, chunk_id) = seeded_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route(
                    "/chunks/{id}/evaluations",
                    web::post().to(submit_evaluation),
                ),
        )
        .await;

        let request = test::TestRequest::post()
            .uri(&format!("/chunks/{}/evaluations", chunk_id))
            .set_json(serde_json::json!({"flags": {}}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.evaluations_for_chunk(chunk_id).is_empty());
    }

    #[actix_web::test]
    async fn test_submit_to_unknown_chunk_is_not_found() {
        let (state, _) = seeded_state();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route(
                    "/chunks/{id}/evaluations",
                    web::post().to(submit_evaluation),
                ),
        )
        .await;

        let request = test::TestRequest::post()
            .uri(&format!("/chunks/{}/evaluations", Uuid::new_v4()))
            .insert_header(("x-user-id", "reviewer-1"))
            .set_json(serde_json::json!({"flags": {}}))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
