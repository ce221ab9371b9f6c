use std::time::Duration;

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::routes::test_support::send;
use crate::services::sandbox::SandboxStore;
use crate::state::AppState;
use crate::state::test_helpers::test_app_state;

async fn instant_state() -> (tempfile::TempDir, AppState) {
    let (dir, mut state) = test_app_state().await;
    state.sandbox = SandboxStore::new(Duration::ZERO);
    (dir, state)
}

async fn wait_until_ready(state: &AppState, id: &str) {
    for _ in 0..100 {
        let (_, body) = send(state, Method::GET, &format!("/api/webcontainer/session/{id}"), None).await;
        if body["session"]["status"] == "ready" {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {id} never became ready");
}

#[tokio::test]
async fn new_session_starts_initializing() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::POST, "/api/webcontainer/session", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["session"]["status"], "initializing");
    assert!(body["session"]["id"].as_str().unwrap().starts_with("session_"));

    let id = body["session"]["id"].as_str().unwrap();
    let (status, body) = send(
        &state,
        Method::POST,
        "/api/webcontainer/execute",
        Some(json!({ "sessionId": id, "command": "ls" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "WebContainer not ready");
}

#[tokio::test]
async fn named_session_is_reused() {
    let (_dir, state) = test_app_state().await;
    let (_, first) =
        send(&state, Method::POST, "/api/webcontainer/session", Some(json!({ "sessionId": "proj" }))).await;
    let (_, second) =
        send(&state, Method::POST, "/api/webcontainer/session", Some(json!({ "sessionId": "proj" }))).await;
    assert_eq!(first["session"]["id"], "proj");
    assert_eq!(first["session"]["createdAt"], second["session"]["createdAt"]);
}

#[tokio::test]
async fn ready_session_runs_dev_server_with_preview_urls() {
    let (_dir, state) = instant_state().await;
    send(&state, Method::POST, "/api/webcontainer/session", Some(json!({ "sessionId": "s1" }))).await;
    wait_until_ready(&state, "s1").await;

    let (status, body) = send(
        &state,
        Method::POST,
        "/api/webcontainer/execute",
        Some(json!({ "sessionId": "s1", "command": "npm run dev" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["exitCode"], 0);
    assert!(body["output"].as_str().unwrap().contains("http://localhost:5173"));
    let ports: Vec<u64> = body["previewUrls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["port"].as_u64().unwrap())
        .collect();
    assert_eq!(ports, vec![3000, 5173]);
}

#[tokio::test]
async fn execute_validates_its_input() {
    let (_dir, state) = test_app_state().await;
    let (status, body) =
        send(&state, Method::POST, "/api/webcontainer/execute", Some(json!({ "sessionId": "s1" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session ID and command are required");

    let (status, _) = send(
        &state,
        Method::POST,
        "/api/webcontainer/execute",
        Some(json!({ "sessionId": "ghost", "command": "ls" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let (_dir, state) = test_app_state().await;
    send(&state, Method::POST, "/api/webcontainer/session", Some(json!({ "sessionId": "s1" }))).await;

    let (status, body) = send(&state, Method::DELETE, "/api/webcontainer/session/s1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Session cleaned up successfully");

    let (status, body) = send(&state, Method::GET, "/api/webcontainer/session/s1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Session not found");
}
