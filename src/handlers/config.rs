//! # Runtime Configuration Handlers
//!
//! Read and partially update the running configuration. Updates go through
//! the same validation as startup loading; an invalid update is rejected
//! and the running configuration is untouched.

use crate::error::AppError;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::info;

/// ## Endpoint: `GET /api/v1/config`
pub async fn get_config(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(app_state.get_config()))
}

/// Apply a partial configuration update from a JSON body.
///
/// ## Endpoint: `PUT /api/v1/config`
///
/// Only the runtime-tunable sections apply here (`server`, `evaluation`,
/// `pipeline`); see `AppConfig::update_from_json`.
pub async fn update_config(
    app_state: web::Data<AppState>,
    body: String,
) -> Result<HttpResponse, AppError> {
    let mut config = app_state.get_config();
    config
        .update_from_json(&body)
        .map_err(|err| AppError::ValidationError(err.to_string()))?;
    app_state
        .update_config(config.clone())
        .map_err(AppError::ValidationError)?;
    info!(
        quorum = config.evaluation.quorum,
        badness_threshold = config.evaluation.badness_threshold,
        "configuration updated"
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": "Configuration updated",
        "config": config
    })))
}
