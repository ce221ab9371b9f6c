use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use tokio::sync::Notify;

use super::*;
use crate::llm::types::{ChatResponse, LlmError, Tool};
use crate::state::test_helpers::{MockLlm, text_response, tool_call_response};

fn agent() -> (tempfile::TempDir, Agent) {
    let dir = tempfile::tempdir().unwrap();
    let root = std::fs::canonicalize(dir.path()).unwrap();
    let agent = Agent::new(Workspace::new(root), PreviewStore::new(), reqwest::Client::new(), RetryPolicy::default());
    (dir, agent)
}

/// First call writes a file; the second blocks until `release` is notified.
#[derive(Default)]
struct GatedLlm {
    calls: AtomicUsize,
    waiting: Notify,
    release: Notify,
}

#[async_trait::async_trait]
impl LlmChat for GatedLlm {
    async fn chat(
        &self,
        _max_tokens: u32,
        _system: &str,
        _messages: &[Message],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LlmError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Ok(tool_call_response("write_file", json!({ "path": "slow.txt", "content": "s" })));
        }
        self.waiting.notify_one();
        self.release.notified().await;
        Ok(text_response("finished"))
    }

    fn model(&self) -> &str {
        "gated"
    }
}

fn kinds(ops: &[OperationLog]) -> Vec<OperationKind> {
    ops.iter().map(|o| o.kind).collect()
}

fn last_tool_result(messages: &[Message]) -> (String, Option<bool>) {
    match &messages.last().unwrap().content {
        Content::Blocks(blocks) => match &blocks[0] {
            ContentBlock::ToolResult { content, is_error, .. } => (content.clone(), *is_error),
            other => panic!("expected tool result, got {other:?}"),
        },
        Content::Text(t) => panic!("expected blocks, got text {t}"),
    }
}

// =============================================================================
// generate
// =============================================================================

#[tokio::test]
async fn empty_request_is_answered_without_calling_the_model() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![]);
    let reply = agent.generate(&llm, 1, 5, "  \n ").await;
    assert_eq!(reply.text, EMPTY_REQUEST_REPLY);
    assert!(reply.operation_progress.is_empty());
    assert_eq!(llm.call_count(), 0);
}

#[tokio::test]
async fn text_only_answer_ends_the_loop() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![Ok(text_response("All good."))]);
    let reply = agent.generate(&llm, 1, 5, "check the project").await;
    assert_eq!(reply.text, "All good.");
    assert!(reply.pending_actions.is_empty());
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn tool_calls_are_executed_and_fed_back() {
    let (dir, agent) = agent();
    let llm = MockLlm::new(vec![
        Ok(tool_call_response("write_file", json!({ "path": "hello.txt", "content": "hi" }))),
        Ok(text_response("Created hello.txt")),
    ]);

    let reply = agent.generate(&llm, 1, 5, "create hello.txt").await;
    assert_eq!(reply.text, "Created hello.txt");
    assert_eq!(kinds(&reply.operation_progress), vec![OperationKind::Create]);
    assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hi");

    let calls = llm.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].len(), 3);
    let (content, is_error) = last_tool_result(&calls[1]);
    assert!(content.contains("\"success\":true"));
    assert_eq!(is_error, None);
}

#[tokio::test]
async fn tool_failures_go_back_to_the_model() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![
        Ok(tool_call_response("read_file", json!({ "filePath": "missing.txt" }))),
        Ok(tool_call_response("launch_rockets", json!({}))),
        Ok(text_response("That file does not exist.")),
    ]);

    let reply = agent.generate(&llm, 1, 5, "read missing.txt").await;
    assert_eq!(reply.text, "That file does not exist.");

    let calls = llm.calls();
    let (content, is_error) = last_tool_result(&calls[1]);
    assert!(content.contains("File not found: missing.txt"));
    assert_eq!(is_error, Some(true));
    let (content, _) = last_tool_result(&calls[2]);
    assert!(content.contains("Unknown tool: launch_rockets"));
}

#[tokio::test]
async fn turn_budget_limits_model_calls() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![
        Ok(tool_call_response("list_dir", json!({ "dirPath": "." }))),
        Ok(tool_call_response("list_dir", json!({ "dirPath": "." }))),
        Ok(tool_call_response("list_dir", json!({ "dirPath": "." }))),
    ]);

    let reply = agent.generate(&llm, 1, 2, "loop forever").await;
    assert_eq!(llm.call_count(), 2);
    assert_eq!(reply.text, EMPTY_RESPONSE_REPLY);
    assert_eq!(reply.operation_progress.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_retries_are_logged() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![
        Err(LlmError::ApiResponse { status: 429, body: "429 Too Many Requests".into() }),
        Ok(text_response("back again")),
    ]);

    let reply = agent.generate(&llm, 1, 5, "hello").await;
    assert_eq!(reply.text, "back again");
    assert_eq!(kinds(&reply.operation_progress), vec![OperationKind::Retry]);
    assert_eq!(reply.operation_progress[0].message, "Rate limited, retrying in 10s (attempt 1/5)");
    assert_eq!(reply.operation_progress[0].details["delayMs"], 10_000);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_return_the_apology() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(
        (0..5)
            .map(|_| Err(LlmError::ApiResponse { status: 429, body: "quota exceeded".into() }))
            .collect(),
    );

    let reply = agent.generate(&llm, 1, 5, "hello").await;
    assert_eq!(reply.text, RATE_LIMIT_APOLOGY);
    assert_eq!(llm.call_count(), 5);
    assert_eq!(reply.operation_progress.len(), 4);
}

#[tokio::test]
async fn provider_errors_are_reported_in_the_reply() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![Err(LlmError::ApiResponse { status: 400, body: "API key not valid".into() })]);

    let reply = agent.generate(&llm, 1, 5, "hello").await;
    assert_eq!(reply.text, "I encountered an error processing your request: [400] API key not valid");
    assert_eq!(kinds(&reply.operation_progress), vec![OperationKind::Error]);
    assert_eq!(llm.call_count(), 1);
}

#[tokio::test]
async fn empty_model_text_is_reported() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![Ok(text_response("   "))]);
    let reply = agent.generate(&llm, 1, 5, "hello").await;
    assert_eq!(reply.text, EMPTY_RESPONSE_REPLY);
}

#[tokio::test]
async fn pending_actions_are_extracted_from_the_answer() {
    let (_dir, agent) = agent();
    let answer = r#"{"text": "Plan ready", "pendingActions": [{"type": "run", "command": "npm test"}]}"#;
    let llm = MockLlm::new(vec![Ok(text_response(answer))]);

    let reply = agent.generate(&llm, 1, 5, "plan it").await;
    assert_eq!(reply.text, "Plan ready");
    assert_eq!(reply.pending_actions, vec![json!({ "type": "run", "command": "npm test" })]);
}

// =============================================================================
// conversation + activity
// =============================================================================

#[tokio::test]
async fn conversation_is_replayed_within_a_generation() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![Ok(text_response("first")), Ok(text_response("second"))]);
    agent.generate(&llm, 1, 5, "one").await;
    agent.generate(&llm, 1, 5, "two").await;

    let calls = llm.calls();
    assert_eq!(calls[1], vec![Message::user("one"), Message::assistant("first"), Message::user("two")]);
}

#[tokio::test]
async fn new_generation_starts_a_new_conversation() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![]);
    agent.generate(&llm, 1, 5, "one").await;
    agent.generate(&llm, 2, 5, "two").await;

    let calls = llm.calls();
    assert_eq!(calls[1], vec![Message::user("two")]);
}

#[tokio::test]
async fn activity_accumulates_until_reset() {
    let (_dir, agent) = agent();
    let llm = MockLlm::new(vec![
        Ok(tool_call_response("write_file", json!({ "path": "a.txt", "content": "a" }))),
        Ok(text_response("ok")),
        Ok(tool_call_response("write_file", json!({ "path": "b.txt", "content": "b" }))),
        Ok(text_response("ok")),
    ]);
    agent.generate(&llm, 1, 5, "write a").await;
    let reply = agent.generate(&llm, 1, 5, "write b").await;
    assert_eq!(reply.operation_progress.len(), 1);

    let activity = agent.activity();
    assert_eq!(activity.operations.len(), 2);
    assert_eq!(activity.files_written, vec!["a.txt".to_string(), "b.txt".to_string()]);

    agent.reset();
    let activity = agent.activity();
    assert!(activity.operations.is_empty());
    assert!(activity.files_written.is_empty());
}

// =============================================================================
// extract_pending_actions
// =============================================================================

#[test]
fn plain_text_passes_through() {
    let (text, actions) = extract_pending_actions("Just an answer with {braces}.");
    assert_eq!(text, "Just an answer with {braces}.");
    assert!(actions.is_empty());
}

#[test]
fn fenced_block_is_used_when_the_outer_span_is_not_json() {
    let raw = "Use {braces} here.\n```json\n{\"text\": \"t\", \"pendingActions\": [1, 2]}\n```";
    let (text, actions) = extract_pending_actions(raw);
    assert_eq!(text, "t");
    assert_eq!(actions, vec![json!(1), json!(2)]);
}

#[test]
fn malformed_json_keeps_the_original_text() {
    let raw = "{\"pendingActions\": [oops}";
    let (text, actions) = extract_pending_actions(raw);
    assert_eq!(text, raw);
    assert!(actions.is_empty());
}

#[test]
fn missing_text_field_keeps_the_original_text() {
    let raw = "{\"pendingActions\": []}";
    let (text, actions) = extract_pending_actions(raw);
    assert_eq!(text, raw);
    assert!(actions.is_empty());
}

// =============================================================================
// in-flight requests
// =============================================================================

#[tokio::test]
async fn activity_is_readable_while_a_request_runs() {
    let (_dir, agent) = agent();
    let llm = Arc::new(GatedLlm::default());

    let running = {
        let (agent, llm) = (agent.clone(), llm.clone());
        tokio::spawn(async move { agent.generate(llm.as_ref(), 1, 5, "write slowly").await })
    };
    llm.waiting.notified().await;

    let activity = agent.activity();
    assert_eq!(kinds(&activity.operations), vec![OperationKind::Create]);
    assert_eq!(activity.files_written, vec!["slow.txt".to_string()]);

    llm.release.notify_one();
    let reply = running.await.unwrap();
    assert_eq!(reply.text, "finished");
    assert_eq!(reply.operation_progress.len(), 1);
}

#[tokio::test]
async fn reset_during_a_request_does_not_wait_and_discards_the_exchange() {
    let (_dir, agent) = agent();
    let llm = Arc::new(GatedLlm::default());

    let running = {
        let (agent, llm) = (agent.clone(), llm.clone());
        tokio::spawn(async move { agent.generate(llm.as_ref(), 1, 5, "write slowly").await })
    };
    llm.waiting.notified().await;

    agent.reset();
    assert!(agent.activity().operations.is_empty());

    llm.release.notify_one();
    let reply = running.await.unwrap();
    assert_eq!(reply.text, "finished");
    assert!(reply.operation_progress.is_empty());
    assert!(agent.conversation().history.is_empty());
}
