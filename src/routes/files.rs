//! Workspace file routes.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::services::workspace::FileItem;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    pub dir: Option<String>,
}

#[derive(Deserialize)]
pub struct PathQuery {
    pub path: Option<String>,
}

#[derive(Deserialize)]
pub struct WriteBody {
    pub path: Option<String>,
    pub content: Option<String>,
}

#[derive(Deserialize)]
pub struct PathBody {
    pub path: Option<String>,
}

#[derive(Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileItem>,
}

#[derive(Serialize)]
pub struct FileContentResponse {
    pub path: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct FileChangeResponse {
    pub success: bool,
    pub path: String,
}

fn required_path(path: Option<String>) -> Result<String, ApiError> {
    path.filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("File path is required"))
}

/// `GET /api/files/list?dir=`: list one directory (default: workspace root).
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<FileListResponse>, ApiError> {
    let dir = query.dir.filter(|d| !d.is_empty()).unwrap_or_else(|| ".".into());
    let files = state.workspace.list(&dir).await?;
    Ok(Json(FileListResponse { files }))
}

/// `GET /api/files?path=`: read a text file.
pub async fn read(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileContentResponse>, ApiError> {
    let path = required_path(query.path)?;
    let content = state.workspace.read(&path).await?;
    Ok(Json(FileContentResponse { path, content }))
}

/// `POST /api/files`: write a file, creating parent directories.
pub async fn write(
    State(state): State<AppState>,
    Json(body): Json<WriteBody>,
) -> Result<Json<FileChangeResponse>, ApiError> {
    let (Some(path), Some(content)) = (body.path.filter(|p| !p.is_empty()), body.content) else {
        return Err(ApiError::bad_request("File path and content are required"));
    };
    let full = state.workspace.write(&path, &content).await?;
    tracing::info!(path = %state.workspace.relative(&full), bytes = content.len(), "files: written");
    Ok(Json(FileChangeResponse { success: true, path }))
}

/// `DELETE /api/files`: path from the JSON body or the query string.
pub async fn delete(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
    body: Option<Json<PathBody>>,
) -> Result<Json<FileChangeResponse>, ApiError> {
    let from_body = body.and_then(|Json(b)| b.path).filter(|p| !p.is_empty());
    let path = required_path(from_body.or(query.path))?;
    state.workspace.delete(&path).await?;
    tracing::info!(%path, "files: deleted");
    Ok(Json(FileChangeResponse { success: true, path }))
}

/// `POST /api/files/directory`: `mkdir -p`.
pub async fn create_directory(
    State(state): State<AppState>,
    Json(body): Json<PathBody>,
) -> Result<Json<FileChangeResponse>, ApiError> {
    let path = body
        .path
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::bad_request("Directory path is required"))?;
    state.workspace.create_dir(&path).await?;
    Ok(Json(FileChangeResponse { success: true, path }))
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
