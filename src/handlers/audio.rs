//! # Source Audio Handlers
//!
//! Lifecycle of a source recording: registration of the raw file, reviewer
//! approval of the processed version, registration of the diarization
//! result, and local segmentation into chunks.
//!
//! ## Pipeline Triggers:
//! Each lifecycle write calls its remote trigger synchronously and
//! deliberately — there are no hidden on-save hooks, so ordering and
//! failure handling are visible here in one place. A trigger failure is
//! logged and reported in the response, but never fails the local write;
//! the "processed" mark specifically is only applied after the
//! collaborator accepts, which keeps a failed preprocess retriable.

use crate::error::AppError;
use crate::handlers::{request_user, ScopeQuery};
use crate::pipeline::{StorageFolder, StorageLayout};
use crate::segmenter::{segment_spans, writer};
use crate::state::AppState;
use crate::store::models::{Gender, Locale, ProcessingStage};
use crate::store::NewChunk;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterAudioRequest {
    /// External identifier from the telephony export
    pub audio_id: String,
    /// File name under the raw/ folder of the shared storage
    pub file_name: String,
    pub project_id: Uuid,
    pub file_size: Option<u64>,
    pub duration_secs: Option<f64>,
}

/// Register a raw recording and fire the preprocess trigger.
///
/// ## Endpoint: `POST /api/v1/audio-files`
///
/// ## Response:
/// The stored record plus `preprocess_accepted`. When the collaborator
/// accepted, the record is already marked processed; otherwise it stays
/// raw and an operator can re-register or replay later.
pub async fn register_audio_file(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<RegisterAudioRequest>,
) -> Result<HttpResponse, AppError> {
    if request.audio_id.trim().is_empty() || request.file_name.trim().is_empty() {
        return Err(AppError::ValidationError(
            "audio_id and file_name must not be empty".to_string(),
        ));
    }
    // Creation requires a resolvable project before any write happens.
    if app_state.store.get_project(request.project_id).is_none() {
        return Err(AppError::NotFound(format!(
            "project {} not found",
            request.project_id
        )));
    }

    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let relative = StorageLayout::relative_path(StorageFolder::Raw, request.file_name.trim());
    let mut file = app_state.store.register_audio_file(
        request.audio_id.trim(),
        &relative,
        request.file_size,
        request.duration_secs,
        request.project_id,
        &user,
    )?;
    info!(audio = %file.audio_id, project = %file.project_id, "raw audio registered");

    let accepted = app_state
        .pipeline
        .trigger_preprocess(&app_state.layout.gpu_path(&file.relative_path), file.project_id)
        .await;
    if accepted {
        file = app_state.store.mark_processed(file.id, &user)?;
    } else {
        app_state.record_failed_trigger();
    }

    Ok(HttpResponse::Created().json(json!({
        "audio_file": file,
        "preprocess_accepted": accepted
    })))
}

/// ## Endpoint: `GET /api/v1/audio-files`
pub async fn list_audio_files(
    app_state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let mut files = app_state.store.list_audio_files(scope);
    files.sort_by(|a, b| a.audio_id.cmp(&b.audio_id));
    Ok(HttpResponse::Ok().json(json!({
        "count": files.len(),
        "audio_files": files
    })))
}

/// ## Endpoint: `GET /api/v1/audio-files/{id}`
pub async fn get_audio_file(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let file = app_state
        .store
        .get_audio_file(id)
        .ok_or_else(|| AppError::NotFound(format!("audio file {} not found", id)))?;
    Ok(HttpResponse::Ok().json(file))
}

/// Approve the processed audio and fire the diarize trigger.
///
/// ## Endpoint: `POST /api/v1/audio-files/{id}/approve`
pub async fn approve_audio_file(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let file = app_state
        .store
        .get_audio_file(id)
        .ok_or_else(|| AppError::NotFound(format!("audio file {} not found", id)))?;
    if !file.is_processed {
        return Err(AppError::ValidationError(
            "audio file has not been processed yet".to_string(),
        ));
    }

    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let file = app_state.store.approve_audio_file(id, &user)?;
    info!(audio = %file.audio_id, "processed audio approved");

    let accepted = app_state
        .pipeline
        .trigger_diarize(&app_state.layout.gpu_path(&file.relative_path), file.project_id)
        .await;
    if !accepted {
        app_state.record_failed_trigger();
    }

    Ok(HttpResponse::Ok().json(json!({
        "audio_file": file,
        "diarize_accepted": accepted
    })))
}

/// Record the arrival of a diarization result and fire the chunk trigger.
///
/// ## Endpoint: `POST /api/v1/audio-files/{id}/diarization`
pub async fn register_diarization(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let file = app_state
        .store
        .get_audio_file(id)
        .ok_or_else(|| AppError::NotFound(format!("audio file {} not found", id)))?;
    if !file.is_approved {
        return Err(AppError::ValidationError(
            "audio file must be approved before diarization results are accepted".to_string(),
        ));
    }

    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let file = app_state.store.mark_diarized(id, &user)?;
    info!(audio = %file.audio_id, "diarization result registered");

    let accepted = app_state
        .pipeline
        .trigger_chunk(&app_state.layout.gpu_path(&file.relative_path), file.project_id)
        .await;
    if !accepted {
        app_state.record_failed_trigger();
    }

    Ok(HttpResponse::Ok().json(json!({
        "audio_file": file,
        "chunk_accepted": accepted
    })))
}

/// Segment a cleaned recording locally and materialize its chunks.
///
/// ## Endpoint: `POST /api/v1/audio-files/{id}/segment`
///
/// Runs the adaptive silence segmentation over the file's cleaned audio,
/// writes each span as an independent WAV under `chunks/`, and records one
/// `AudioChunk` per file. Chunk-file writes run in parallel; record
/// creation serializes through the store so a re-run never duplicates
/// chunk rows.
pub async fn segment_audio_file(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let file = app_state
        .store
        .get_audio_file(id)
        .ok_or_else(|| AppError::NotFound(format!("audio file {} not found", id)))?;
    if file.stage == ProcessingStage::Raw {
        return Err(AppError::ValidationError(
            "audio file must be preprocessed before segmentation".to_string(),
        ));
    }

    let config = app_state.get_config();
    let settings = config.segmenter.clone();
    let source_path = app_state.layout.web_path(&file.relative_path);

    // Decode off the async runtime; the file can be minutes of audio.
    let sample_rate = settings.sample_rate;
    let samples = tokio::task::spawn_blocking(move || {
        writer::load_mono_samples(&source_path, sample_rate)
    })
    .await
    .map_err(|err| AppError::Internal(format!("audio load task failed: {}", err)))?
    .map_err(|err| AppError::BadRequest(format!("failed to load source audio: {}", err)))?;

    let spans = segment_spans(&samples, &settings);
    let file_prefix = file
        .relative_path
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .unwrap_or("chunk")
        .to_string();

    let written = writer::write_chunk_files(
        &app_state.layout.chunks_dir(),
        &file_prefix,
        Arc::new(samples),
        &spans,
        settings.sample_rate,
    )
    .await?;

    let user = request_user(&req).unwrap_or_else(|| "segmenter".to_string());
    let mut chunks = Vec::with_capacity(written.len());
    let mut created_count = 0u64;
    for materialized in &written {
        let (chunk, created) = app_state.store.insert_or_get_chunk(
            NewChunk {
                project_id: file.project_id,
                relative_path: StorageLayout::relative_path(
                    StorageFolder::Chunks,
                    &materialized.file_name,
                ),
                duration_secs: materialized.duration_secs,
                gender: Gender::default(),
                locale: Locale::default(),
            },
            &user,
        );
        if created {
            created_count += 1;
        }
        chunks.push(chunk);
    }
    app_state.record_chunks_created(created_count);
    info!(
        audio = %file.audio_id,
        spans = spans.len(),
        created = created_count,
        "segmentation finished"
    );

    let speech_secs: f64 = spans
        .iter()
        .map(|span| span.duration_secs(settings.sample_rate))
        .sum();
    Ok(HttpResponse::Ok().json(json!({
        "audio_file_id": file.id,
        "spans": spans.len(),
        "speech_secs": speech_secs,
        "chunks_created": created_count,
        "chunks": chunks
    })))
}
