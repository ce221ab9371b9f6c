//! Assistant settings routes.
//!
//! Responses always carry the masked view; a masked key sent back by a
//! client (`***abcd`) is treated as "unchanged".

use axum::extract::{Path, State};
use axum::response::Json;

use super::ApiError;
use crate::services::settings::{MaskedSettings, McpServerConfig, SettingsPatch, SettingsUpdate};
use crate::state::AppState;

async fn applied(state: &AppState, update: SettingsUpdate) -> Json<MaskedSettings> {
    if update.llm_changed {
        state.refresh_llm().await;
    }
    Json(update.settings.masked())
}

/// `GET /api/settings`
pub async fn get_settings(State(state): State<AppState>) -> Json<MaskedSettings> {
    Json(state.settings.get().await.masked())
}

/// `PUT /api/settings`: partial update.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(mut patch): Json<SettingsPatch>,
) -> Result<Json<MaskedSettings>, ApiError> {
    if patch.api_key.as_deref().is_some_and(|k| k.starts_with("***")) {
        patch.api_key = None;
    }
    let update = state.settings.update(patch).await?;
    Ok(applied(&state, update).await)
}

/// `POST /api/settings/mcp-servers`: add, or replace by name.
pub async fn add_mcp_server(
    State(state): State<AppState>,
    Json(server): Json<McpServerConfig>,
) -> Result<Json<MaskedSettings>, ApiError> {
    let update = state.settings.add_mcp_server(server).await?;
    Ok(applied(&state, update).await)
}

/// `PUT /api/settings/mcp-servers/{name}`
pub async fn update_mcp_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(mut server): Json<McpServerConfig>,
) -> Result<Json<MaskedSettings>, ApiError> {
    if server.name.is_empty() {
        server.name.clone_from(&name);
    }
    let update = state.settings.update_mcp_server(&name, server).await?;
    Ok(applied(&state, update).await)
}

/// `DELETE /api/settings/mcp-servers/{name}`
pub async fn remove_mcp_server(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<MaskedSettings>, ApiError> {
    let update = state.settings.remove_mcp_server(&name).await?;
    Ok(applied(&state, update).await)
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
