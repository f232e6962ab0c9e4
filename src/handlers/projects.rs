//! # Project Handlers
//!
//! Projects are the tenancy boundary: every chunk and evaluation belongs to
//! exactly one. An unknown project id anywhere in the API is a 404, never a
//! silently-empty result.

use crate::error::AppError;
use crate::handlers::request_user;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub description: Option<String>,
}

/// ## Endpoint: `POST /api/v1/projects`
pub async fn create_project(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    request: web::Json<CreateProjectRequest>,
) -> Result<HttpResponse, AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::ValidationError(
            "project name must not be empty".to_string(),
        ));
    }

    let user = request_user(&req).unwrap_or_else(|| "system".to_string());
    let project = app_state
        .store
        .insert_project(name, request.description.clone(), &user);
    info!(project = %project.id, name = %project.name, "project created");

    Ok(HttpResponse::Created().json(project))
}

/// ## Endpoint: `GET /api/v1/projects`
pub async fn list_projects(app_state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let mut projects = app_state.store.list_projects();
    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(HttpResponse::Ok().json(json!({
        "count": projects.len(),
        "projects": projects
    })))
}

/// ## Endpoint: `GET /api/v1/projects/{id}`
pub async fn get_project(
    app_state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let project = app_state
        .store
        .get_project(id)
        .ok_or_else(|| AppError::NotFound(format!("project {} not found", id)))?;
    Ok(HttpResponse::Ok().json(project))
}
