//! Chat routes: single-turn Q&A against the shared chat history.

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ApiError;
use crate::services::chat::{ChatError, ChatTurn};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ChatBody {
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    pub reply: String,
}

#[derive(Serialize)]
pub struct ChatHistory {
    pub history: Vec<ChatTurn>,
}

/// `POST /api/chat`: send a message, get the model's reply.
pub async fn send(State(state): State<AppState>, Json(body): Json<ChatBody>) -> Result<Json<ChatReply>, ApiError> {
    let message = body.message.unwrap_or_default();
    if message.trim().is_empty() {
        return Err(ChatError::EmptyMessage.into());
    }
    let llm = state.llm().await?;
    let reply = state.chat.chat(llm.client.as_ref(), &message).await?;
    Ok(Json(ChatReply { reply }))
}

/// `GET /api/chat/history`
pub async fn history(State(state): State<AppState>) -> Json<ChatHistory> {
    Json(ChatHistory { history: state.chat.history().await })
}

/// `DELETE /api/chat/history`
pub async fn clear_history(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.chat.clear_history().await;
    Json(json!({ "success": true }))
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
