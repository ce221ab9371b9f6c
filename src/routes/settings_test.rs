use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::routes::test_support::send;
use crate::state::test_helpers::test_app_state;

#[tokio::test]
async fn defaults_are_returned_without_a_key() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::GET, "/api/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiKey"], "");
    assert_eq!(body["hasApiKey"], false);
    assert_eq!(body["model"], "gemini-2.0-flash");
    assert_eq!(body["maxTurns"], 5);
    assert_eq!(body["enableMCP"], false);
}

#[tokio::test]
async fn saving_a_key_masks_it_and_enables_the_llm() {
    let (dir, state) = test_app_state().await;
    assert!(state.llm().await.is_err());

    let (status, body) = send(
        &state,
        Method::PUT,
        "/api/settings",
        Some(json!({ "apiKey": "AIza-secret-1234", "maxTurns": 8 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["apiKey"], "***1234");
    assert_eq!(body["maxTurns"], 8);
    assert!(state.llm().await.is_ok());

    let saved = std::fs::read_to_string(dir.path().join(".ide-server/settings.json")).unwrap();
    assert!(saved.contains("AIza-secret-1234"));
}

#[tokio::test]
async fn masked_key_round_trip_keeps_the_stored_key() {
    let (_dir, state) = test_app_state().await;
    send(&state, Method::PUT, "/api/settings", Some(json!({ "apiKey": "AIza-secret-1234" }))).await;
    send(&state, Method::PUT, "/api/settings", Some(json!({ "apiKey": "***1234", "enableMCP": true }))).await;

    let settings = state.settings.get().await;
    assert_eq!(settings.api_key, "AIza-secret-1234");
    assert!(settings.enable_mcp);
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::PUT, "/api/settings", Some(json!({ "maxTurns": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "maxTurns must be at least 1");
}

#[tokio::test]
async fn mcp_servers_can_be_added_updated_and_removed() {
    let (_dir, state) = test_app_state().await;
    let server = json!({ "name": "fs", "command": "npx", "args": ["-y", "@mcp/fs"] });
    let (status, body) = send(&state, Method::POST, "/api/settings/mcp-servers", Some(server)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mcpServers"][0]["command"], "npx");

    let (status, body) = send(
        &state,
        Method::PUT,
        "/api/settings/mcp-servers/fs",
        Some(json!({ "name": "", "command": "node", "args": ["fs.js"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mcpServers"], json!([{ "name": "fs", "command": "node", "args": ["fs.js"] }]));

    let (status, body) = send(&state, Method::DELETE, "/api/settings/mcp-servers/fs", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mcpServers"], json!([]));
}

#[tokio::test]
async fn unknown_mcp_server_is_not_found() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::DELETE, "/api/settings/mcp-servers/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "MCP server not found: ghost");
}
