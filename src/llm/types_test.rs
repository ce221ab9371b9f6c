use super::*;

// =============================================================================
// LlmError display
// =============================================================================

#[test]
fn api_response_display_carries_status_and_body() {
    let err = LlmError::ApiResponse { status: 429, body: "Resource has been exhausted (e.g. check quota).".into() };
    let text = err.to_string();
    assert!(text.contains("429"));
    assert!(text.contains("quota"));
}

#[test]
fn missing_api_key_display_names_var() {
    let err = LlmError::MissingApiKey { var: "GEMINI_API_KEY".into() };
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

// =============================================================================
// ContentBlock serde
// =============================================================================

#[test]
fn tool_use_block_tagged_as_tool_use() {
    let block = ContentBlock::ToolUse { id: "call_1".into(), name: "read_file".into(), input: serde_json::json!({}) };
    let json = serde_json::to_value(&block).unwrap();
    assert_eq!(json["type"], "tool_use");
    assert_eq!(json["name"], "read_file");
}

#[test]
fn tool_result_omits_is_error_when_none() {
    let block = ContentBlock::ToolResult {
        tool_use_id: "call_1".into(),
        name: "read_file".into(),
        content: "ok".into(),
        is_error: None,
    };
    let json = serde_json::to_value(&block).unwrap();
    assert!(json.get("is_error").is_none());
}

#[test]
fn content_text_is_untagged_string() {
    let msg = Message::user("hi");
    let json = serde_json::to_value(&msg).unwrap();
    assert_eq!(json["content"], "hi");
    assert_eq!(json["role"], "user");
}

// =============================================================================
// ChatResponse::text
// =============================================================================

fn response(content: Vec<ContentBlock>) -> ChatResponse {
    ChatResponse { content, model: "m".into(), stop_reason: "STOP".into(), input_tokens: 0, output_tokens: 0 }
}

#[test]
fn text_joins_text_blocks() {
    let resp = response(vec![
        ContentBlock::Text { text: "a".into() },
        ContentBlock::ToolUse { id: "1".into(), name: "x".into(), input: serde_json::json!({}) },
        ContentBlock::Text { text: "b".into() },
    ]);
    assert_eq!(resp.text().as_deref(), Some("a\nb"));
}

#[test]
fn text_none_when_only_tool_calls() {
    let resp = response(vec![ContentBlock::ToolUse { id: "1".into(), name: "x".into(), input: serde_json::json!({}) }]);
    assert!(resp.text().is_none());
}

#[test]
fn text_skips_empty_segments() {
    let resp = response(vec![ContentBlock::Text { text: String::new() }]);
    assert!(resp.text().is_none());
}
