//! Sandbox ("webcontainer") session routes.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiError;
use crate::services::sandbox::{Execution, SandboxError, SandboxSession};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionBody {
    pub session_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteBody {
    pub session_id: Option<String>,
    pub command: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub success: bool,
    pub session: SandboxSession,
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(flatten)]
    pub execution: Execution,
}

/// `POST /api/webcontainer/session`: create a session or return the existing one.
pub async fn create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionBody>>,
) -> Json<SessionResponse> {
    let session_id = body.and_then(|Json(b)| b.session_id);
    let session = state.sandbox.create_or_get(session_id.as_deref()).await;
    Json(SessionResponse { success: true, session })
}

/// `GET /api/webcontainer/session/{id}`
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.sandbox.get(&id).await.ok_or(SandboxError::NotFound)?;
    Ok(Json(SessionResponse { success: true, session }))
}

/// `DELETE /api/webcontainer/session/{id}`
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.sandbox.remove(&id).await?;
    Ok(Json(json!({ "success": true, "message": "Session cleaned up successfully" })))
}

/// `POST /api/webcontainer/execute`: run a command in a ready session.
pub async fn execute(
    State(state): State<AppState>,
    Json(body): Json<ExecuteBody>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let session_id = body.session_id.unwrap_or_default();
    let command = body.command.unwrap_or_default();
    let execution = state.sandbox.execute(&session_id, &command).await?;
    Ok(Json(ExecuteResponse { success: true, execution }))
}

#[cfg(test)]
#[path = "webcontainer_test.rs"]
mod tests;
