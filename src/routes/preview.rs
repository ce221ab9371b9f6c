//! Preview registry routes.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::ApiError;
use crate::services::preview::{NewPreview, PreviewError, PreviewUrl, ProjectPreviews};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    pub preview: PreviewUrl,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewListResponse {
    pub success: bool,
    pub preview_urls: Vec<PreviewUrl>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ProjectResponse {
    pub success: bool,
    #[serde(flatten)]
    pub project: ProjectPreviews,
}

fn preview_id(raw: &str) -> Result<Uuid, PreviewError> {
    Uuid::parse_str(raw).map_err(|_| PreviewError::NotFound)
}

/// `POST /api/preview`: register a preview and make it active.
pub async fn add(
    State(state): State<AppState>,
    Json(body): Json<NewPreview>,
) -> Result<(StatusCode, Json<PreviewResponse>), ApiError> {
    let preview = state.previews.add(body).await?;
    Ok((StatusCode::CREATED, Json(PreviewResponse { success: true, preview })))
}

/// `GET /api/preview?projectId=`
pub async fn list(State(state): State<AppState>, Query(query): Query<ProjectQuery>) -> Json<PreviewListResponse> {
    let project_id = query.project_id.filter(|p| !p.is_empty());
    let preview_urls = state.previews.list(project_id.as_deref()).await;
    Json(PreviewListResponse { success: true, count: preview_urls.len(), preview_urls })
}

/// `GET /api/preview/{projectId}`
pub async fn project(State(state): State<AppState>, Path(project_id): Path<String>) -> Json<ProjectResponse> {
    Json(ProjectResponse { success: true, project: state.previews.project(&project_id).await })
}

/// `PUT /api/preview/{id}/activate`
pub async fn activate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let preview = state.previews.activate(preview_id(&id)?).await?;
    Ok(Json(PreviewResponse { success: true, preview }))
}

/// `DELETE /api/preview/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.previews.remove(preview_id(&id)?).await?;
    Ok(Json(json!({ "success": true, "message": "Preview URL removed successfully" })))
}

/// `DELETE /api/preview?projectId=`: clear one project, or everything.
pub async fn clear(State(state): State<AppState>, Query(query): Query<ProjectQuery>) -> Json<serde_json::Value> {
    let project_id = query.project_id.filter(|p| !p.is_empty());
    let removed = state.previews.clear(project_id.as_deref()).await;
    tracing::info!(project = ?project_id, removed, "preview: cleared");
    let message = match project_id {
        Some(id) => format!("Preview URLs cleared for project {id}"),
        None => "All preview URLs cleared".to_string(),
    };
    Json(json!({ "success": true, "message": message }))
}

#[cfg(test)]
#[path = "preview_test.rs"]
mod tests;
