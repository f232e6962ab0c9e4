//! # Chunk Handlers
//!
//! Chunk registration and the two derived listings the reviewer and
//! transcription UIs are built on: the category buckets
//! (0/1/2/3+ evaluations) and the ready-for-transcription queue.

use crate::error::AppError;
use crate::evaluation::categorize::{categorize_chunks, ready_for_transcription};
use crate::evaluation::stats::chunk_aggregate;
use crate::handlers::{request_user, ScopeQuery};
use crate::pipeline::{StorageFolder, StorageLayout};
use crate::state::AppState;
use crate::store::models::{Gender, Locale};
use crate::store::{ChunkPatch, NewChunk};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterChunkRequest {
    /// File name under the chunks/ folder of the shared storage
    pub file_name: String,
    pub duration_secs: f64,
    pub project_id: Uuid,
    pub gender: Option<Gender>,
    pub locale: Option<Locale>,
}

#[derive(Debug, Deserialize)]
pub struct PatchChunkRequest {
    pub feature_text: Option<String>,
    pub gender: Option<Gender>,
    pub locale: Option<Locale>,
}

/// Register a chunk produced outside the local segmenter (bulk import or
/// the GPU tier's remote chunking).
///
/// ## Endpoint: `POST /api/v1/chunks`
pub async fn register_chunk(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<RegisterChunkRequest>,
) -> Result<HttpResponse, AppError> {
    if request.file_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "file_name must not be empty".to_string(),
        ));
    }
    if !(request.duration_secs.is_finite() && request.duration_secs >= 0.0) {
        return Err(AppError::ValidationError(
            "duration_secs must be a non-negative number".to_string(),
        ));
    }
    if app_state.store.get_project(request.project_id).is_none() {
        return Err(AppError::NotFound(format!(
            "project {} not found",
            request.project_id
        )));
    }

    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let (chunk, created) = app_state.store.insert_or_get_chunk(
        NewChunk {
            project_id: request.project_id,
            relative_path: StorageLayout::relative_path(
                StorageFolder::Chunks,
                request.file_name.trim(),
            ),
            duration_secs: request.duration_secs,
            gender: request.gender.unwrap_or_default(),
            locale: request.locale.unwrap_or_default(),
        },
        &user,
    );
    if created {
        app_state.record_chunks_created(1);
        info!(chunk = %chunk.id, file = %chunk.relative_path, "chunk registered");
    }

    Ok(if created {
        HttpResponse::Created().json(chunk)
    } else {
        HttpResponse::Ok().json(chunk)
    })
}

/// ## Endpoint: `GET /api/v1/chunks`
pub async fn list_chunks(
    app_state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let mut chunks = app_state.store.list_chunks(scope);
    chunks.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(HttpResponse::Ok().json(json!({
        "count": chunks.len(),
        "chunks": chunks
    })))
}

/// ## Endpoint: `GET /api/v1/chunks/{id}`
///
/// Returns the chunk record together with its recomputed aggregate.
pub async fn get_chunk(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let chunk = app_state
        .store
        .get_chunk(id)
        .ok_or_else(|| AppError::NotFound(format!("chunk {} not found", id)))?;
    let aggregate = chunk_aggregate(&app_state.store, id);
    Ok(HttpResponse::Ok().json(json!({
        "chunk": chunk,
        "aggregate": aggregate
    })))
}

/// Attach ground-truth text or correct the gender/locale tags.
///
/// ## Endpoint: `PATCH /api/v1/chunks/{id}`
pub async fn patch_chunk(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    request: web::Json<PatchChunkRequest>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let chunk = app_state.store.patch_chunk(
        id,
        ChunkPatch {
            feature_text: request.feature_text.clone(),
            gender: request.gender,
            locale: request.locale,
        },
        &user,
    )?;
    Ok(HttpResponse::Ok().json(chunk))
}

/// The category buckets driving the reviewer worklist.
///
/// ## Endpoint: `GET /api/v1/chunks/categories`
///
/// Each listed chunk carries `evaluated_by_user` relative to the requester
/// (from the `x-user-id` header) so the UI can skip chunks the requester
/// already judged.
pub async fn chunk_categories(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let requester = request_user(&req);
    let categories = categorize_chunks(&app_state.store, scope, requester.as_deref());

    Ok(HttpResponse::Ok().json(json!({
        "counts": {
            "not_evaluated": categories.not_evaluated.len(),
            "one_evaluation": categories.one_evaluation.len(),
            "two_evaluations": categories.two_evaluations.len(),
            "three_or_more": categories.three_or_more.len()
        },
        "categories": categories
    })))
}

/// The transcription queue: chunks past quorum with an acceptable score.
///
/// ## Endpoint: `GET /api/v1/chunks/ready-for-transcription`
pub async fn chunks_ready_for_transcription(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let requester = request_user(&req);
    let rule = app_state.readiness_rule();
    let ready = ready_for_transcription(&app_state.store, scope, requester.as_deref(), rule);

    Ok(HttpResponse::Ok().json(json!({
        "count": ready.len(),
        "quorum": rule.quorum,
        "badness_threshold": rule.badness_threshold,
        "chunks": ready
    })))
}
