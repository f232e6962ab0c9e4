//! # Statistics & Leaderboard Handlers
//!
//! Dashboard projections: corpus completion statistics, per-flag defect
//! totals, and the evaluator leaderboard. All honor the same optional
//! `project_id` scope as the chunk listings.

use crate::error::AppError;
use crate::evaluation::stats::{chunk_statistics, flag_statistics, leaderboard};
use crate::handlers::ScopeQuery;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;

/// ## Endpoint: `GET /api/v1/statistics/chunks`
pub async fn get_chunk_statistics(
    app_state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let rule = app_state.readiness_rule();
    let statistics = chunk_statistics(&app_state.store, scope, rule);
    Ok(HttpResponse::Ok().json(json!({
        "project_id": scope,
        "statistics": statistics
    })))
}

/// ## Endpoint: `GET /api/v1/statistics/flags`
pub async fn get_flag_statistics(
    app_state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let statistics = flag_statistics(&app_state.store, scope);
    Ok(HttpResponse::Ok().json(json!({
        "project_id": scope,
        "statistics": statistics
    })))
}

/// ## Endpoint: `GET /api/v1/leaderboard`
pub async fn get_leaderboard(
    app_state: web::Data<AppState>,
    query: web::Query<ScopeQuery>,
) -> Result<HttpResponse, AppError> {
    let scope = app_state.store.resolve_scope(query.project_id)?;
    let entries = leaderboard(&app_state.store, scope);
    Ok(HttpResponse::Ok().json(json!({
        "project_id": scope,
        "count": entries.len(),
        "leaderboard": entries
    })))
}
