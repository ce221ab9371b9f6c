//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the JSON API under `/api`: workspace files, chat, the coding agent,
//! assistant settings, sandbox sessions and the preview registry. Every
//! route shares `AppState`; CORS is open and requests are traced.
//!
//! Service errors convert into [`ApiError`], which renders as
//! `{"error": message}` with a status picked per error variant.

pub mod agent;
pub mod chat;
pub mod files;
pub mod preview;
pub mod settings;
pub mod webcontainer;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post, put};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::services::agent::AgentError;
use crate::services::chat::ChatError;
use crate::services::preview::PreviewError;
use crate::services::sandbox::SandboxError;
use crate::services::settings::SettingsError;
use crate::services::workspace::WorkspaceError;
use crate::state::AppState;

/// Full API router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/files/list", get(files::list))
        .route("/api/files", get(files::read).post(files::write).delete(files::delete))
        .route("/api/files/directory", post(files::create_directory))
        .route("/api/chat", post(chat::send))
        .route("/api/chat/history", get(chat::history).delete(chat::clear_history))
        .route("/api/agent", post(agent::generate))
        .route("/api/agent/operations", get(agent::operations))
        .route("/api/agent/session", axum::routing::delete(agent::reset))
        .route("/api/settings", get(settings::get_settings).put(settings::update_settings))
        .route("/api/settings/mcp-servers", post(settings::add_mcp_server))
        .route(
            "/api/settings/mcp-servers/{name}",
            put(settings::update_mcp_server).delete(settings::remove_mcp_server),
        )
        .route("/api/webcontainer/session", post(webcontainer::create_session))
        .route(
            "/api/webcontainer/session/{id}",
            get(webcontainer::get_session).delete(webcontainer::delete_session),
        )
        .route("/api/webcontainer/execute", post(webcontainer::execute))
        .route("/api/preview", get(preview::list).post(preview::add).delete(preview::clear))
        .route("/api/preview/{id}", get(preview::project).delete(preview::remove))
        .route("/api/preview/{id}/activate", put(preview::activate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `GET /api/health`
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "timestamp": now_rfc3339() }))
}

pub(crate) fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error response body: `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }

    fn internal(err: &impl std::fmt::Display) -> Self {
        error!(error = %err, "request failed");
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(err: WorkspaceError) -> Self {
        match err {
            WorkspaceError::AccessDenied => Self { status: StatusCode::FORBIDDEN, message: err.to_string() },
            WorkspaceError::NotFound(_) => Self::not_found(err.to_string()),
            WorkspaceError::Io { .. } => Self::internal(&err),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match &err {
            ChatError::EmptyMessage => Self::bad_request(err.to_string()),
            ChatError::Upstream(source) => {
                error!(error = %source, "chat: upstream failure");
                Self { status: StatusCode::BAD_GATEWAY, message: err.to_string() }
            }
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(err: AgentError) -> Self {
        Self { status: StatusCode::SERVICE_UNAVAILABLE, message: err.to_string() }
    }
}

impl From<PreviewError> for ApiError {
    fn from(err: PreviewError) -> Self {
        match err {
            PreviewError::MissingUrl | PreviewError::InvalidUrl => Self::bad_request(err.to_string()),
            PreviewError::NotFound => Self::not_found(err.to_string()),
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::MissingFields | SandboxError::NotReady => Self::bad_request(err.to_string()),
            SandboxError::NotFound => Self::not_found(err.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Invalid(_) => Self::bad_request(err.to_string()),
            SettingsError::ServerNotFound(_) => Self::not_found(err.to_string()),
            SettingsError::Io { .. } | SettingsError::Parse(_) => Self::internal(&err),
        }
    }
}

// =============================================================================
// TEST SUPPORT
// =============================================================================

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use axum::http::{Method, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::state::AppState;

    /// Send one request through a fresh router and decode the JSON reply
    /// (`Value::Null` for an empty or non-JSON body).
    pub async fn send(state: &AppState, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = super::app(state.clone())
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
