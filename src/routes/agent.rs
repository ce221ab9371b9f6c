//! Coding agent routes.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::json;

use super::ApiError;
use crate::services::agent::{AgentActivity, AgentReply};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AgentBody {
    pub message: Option<String>,
}

/// `POST /api/agent`: run one request through the tool loop.
///
/// Provider failures come back inside the reply text; only a missing API
/// key is an HTTP error.
pub async fn generate(
    State(state): State<AppState>,
    Json(body): Json<AgentBody>,
) -> Result<Json<AgentReply>, ApiError> {
    let llm = state.llm().await?;
    let max_turns = state.settings.get().await.max_turns;
    let message = body.message.unwrap_or_default();
    let reply = state
        .agent
        .generate(llm.client.as_ref(), llm.generation, max_turns, &message)
        .await;
    Ok(Json(reply))
}

/// `GET /api/agent/operations`: operation log and files written.
pub async fn operations(State(state): State<AppState>) -> Json<AgentActivity> {
    Json(state.agent.activity())
}

/// `DELETE /api/agent/session`: drop the conversation and logs.
pub async fn reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.agent.reset();
    Json(json!({ "success": true }))
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
