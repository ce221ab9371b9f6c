use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use crate::routes::test_support::send;
use crate::state::AppState;
use crate::state::test_helpers::test_app_state;

async fn add(state: &AppState, body: Value) -> Value {
    let (status, body) = send(state, Method::POST, "/api/preview", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    body["preview"].clone()
}

#[tokio::test]
async fn add_returns_created_preview() {
    let (_dir, state) = test_app_state().await;
    let preview = add(&state, json!({ "url": "http://localhost:5173/app", "projectId": "p1" })).await;
    assert_eq!(preview["title"], "localhost:5173/app");
    assert_eq!(preview["isActive"], true);
    assert_eq!(preview["projectId"], "p1");
}

#[tokio::test]
async fn add_rejects_missing_and_invalid_urls() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::POST, "/api/preview", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");

    let (status, body) = send(&state, Method::POST, "/api/preview", Some(json!({ "url": "not a url" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid URL format");
}

#[tokio::test]
async fn list_and_project_views() {
    let (_dir, state) = test_app_state().await;
    add(&state, json!({ "url": "http://localhost:3000", "projectId": "p1", "timestamp": 1 })).await;
    let newest = add(&state, json!({ "url": "http://localhost:4000", "projectId": "p1", "timestamp": 2 })).await;
    add(&state, json!({ "url": "http://localhost:5000", "projectId": "p2", "timestamp": 3 })).await;

    let (_, body) = send(&state, Method::GET, "/api/preview", None).await;
    assert_eq!(body["count"], 3);

    let (_, body) = send(&state, Method::GET, "/api/preview?projectId=p1", None).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["previewUrls"][0]["id"], newest["id"]);

    let (status, body) = send(&state, Method::GET, "/api/preview/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["projectId"], "p1");
    assert_eq!(body["activePreview"]["id"], newest["id"]);
}

#[tokio::test]
async fn activate_switches_the_active_preview() {
    let (_dir, state) = test_app_state().await;
    let first = add(&state, json!({ "url": "http://localhost:3000", "projectId": "p1" })).await;
    add(&state, json!({ "url": "http://localhost:4000", "projectId": "p1" })).await;

    let uri = format!("/api/preview/{}/activate", first["id"].as_str().unwrap());
    let (status, body) = send(&state, Method::PUT, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["preview"]["isActive"], true);

    let (_, body) = send(&state, Method::GET, "/api/preview/p1", None).await;
    assert_eq!(body["activePreview"]["id"], first["id"]);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let (_dir, state) = test_app_state().await;
    let (status, body) = send(&state, Method::PUT, "/api/preview/not-a-uuid/activate", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Preview URL not found");

    let uri = format!("/api/preview/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&state, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn remove_and_clear() {
    let (_dir, state) = test_app_state().await;
    let a = add(&state, json!({ "url": "http://localhost:3000", "projectId": "p1" })).await;
    add(&state, json!({ "url": "http://localhost:4000", "projectId": "p2" })).await;
    add(&state, json!({ "url": "http://localhost:5000", "projectId": "p3" })).await;

    let (status, body) = send(&state, Method::DELETE, &format!("/api/preview/{}", a["id"].as_str().unwrap()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Preview URL removed successfully");

    let (_, body) = send(&state, Method::DELETE, "/api/preview?projectId=p2", None).await;
    assert_eq!(body["message"], "Preview URLs cleared for project p2");
    let (_, body) = send(&state, Method::GET, "/api/preview", None).await;
    assert_eq!(body["count"], 1);

    let (_, body) = send(&state, Method::DELETE, "/api/preview", None).await;
    assert_eq!(body["message"], "All preview URLs cleared");
    let (_, body) = send(&state, Method::GET, "/api/preview", None).await;
    assert_eq!(body["count"], 0);
}
