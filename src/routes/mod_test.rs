use axum::http::{Method, StatusCode};

use super::test_support::send;
use super::*;
use crate::llm::types::LlmError;
use crate::state::test_helpers::test_app_state;

#[tokio::test]
async fn health_reports_ok() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (_dir, state) = test_app_state().await;
    let (status, _) = send(&state, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[test]
fn workspace_errors_map_to_statuses() {
    assert_eq!(ApiError::from(WorkspaceError::AccessDenied).status, StatusCode::FORBIDDEN);
    assert_eq!(ApiError::from(WorkspaceError::NotFound("a.txt".into())).status, StatusCode::NOT_FOUND);
    let io = WorkspaceError::Io { path: "a".into(), source: std::io::Error::other("disk") };
    assert_eq!(ApiError::from(io).status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn chat_and_agent_errors_map_to_statuses() {
    assert_eq!(ApiError::from(ChatError::EmptyMessage).status, StatusCode::BAD_REQUEST);
    let upstream = ChatError::Upstream(LlmError::ApiResponse { status: 500, body: "x".into() });
    assert_eq!(ApiError::from(upstream).status, StatusCode::BAD_GATEWAY);
    assert_eq!(ApiError::from(AgentError::NotConfigured).status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn store_errors_map_to_statuses() {
    assert_eq!(ApiError::from(PreviewError::InvalidUrl).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(PreviewError::NotFound).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(SandboxError::NotReady).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(SandboxError::NotFound).status, StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(SettingsError::Invalid("bad".into())).status, StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::from(SettingsError::ServerNotFound("x".into())).status, StatusCode::NOT_FOUND);
}
