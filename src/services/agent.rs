//! Coding agent: tool-calling loop over the workspace toolbox.
//!
//! DESIGN
//! ======
//! One agent session per server. A request runs up to `maxTurns` model
//! calls; each call goes through the rate-limit retry wrapper, and every
//! tool call the model makes is executed and fed back as a tool result
//! until the model answers with text only.
//!
//! A turn mutex serialises requests. The conversation and the operation log
//! sit behind their own short-lived locks, never held across an LLM call or
//! a tool run, so progress can be read and the session reset while a
//! request is in flight. The conversation carries request/answer pairs only;
//! tool traffic is not replayed. When the LLM client is rebuilt (new key or
//! model) the conversation starts over.

use std::sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError};

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::preview::PreviewStore;
use super::tools::{OperationKind, OperationLog, ToolContext, ToolSession, execute_tool};
use super::workspace::Workspace;
use crate::llm::LlmChat;
use crate::llm::retry::{RATE_LIMIT_APOLOGY, RetryError, RetryPolicy, call_with_retry};
use crate::llm::tools::agent_tools;
use crate::llm::types::{Content, ContentBlock, Message};

const AGENT_MAX_TOKENS: u32 = 8000;
const MAX_HISTORY: usize = 20;

pub const EMPTY_REQUEST_REPLY: &str = "Error: User request is empty or invalid. Please try again.";
pub const EMPTY_RESPONSE_REPLY: &str = "Error: AI response is empty or invalid. Please try again.";

const SYSTEM_PROMPT: &str = "You are an expert AI programming assistant working inside the user's workspace.

You can inspect and change the project with the provided tools: read and list files, write and edit \
files, search by content or file name, run shell commands, edit percent-format notebooks, fetch web \
pages and inspect the project setup. All paths are relative to the workspace root.

Guidelines:
- Read a file before editing it; prefer replace_string_in_file for small edits.
- Keep changes minimal and consistent with the existing code style.
- After running a dev server, report the preview URL it printed.
- When you are done, reply with a short summary of what you changed.

If you want the user to confirm follow-up steps, answer with a JSON object of the form \
{\"text\": \"<summary>\", \"pendingActions\": [ ... ]}.";

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("AI assistant is not configured: set GEMINI_API_KEY or save an API key in settings")]
    NotConfigured,
}

/// Answer to one agent request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentReply {
    pub text: String,
    pub operation_progress: Vec<OperationLog>,
    pub pending_actions: Vec<Value>,
}

impl AgentReply {
    fn plain(text: impl Into<String>, operation_progress: Vec<OperationLog>) -> Self {
        Self { text: text.into(), operation_progress, pending_actions: Vec::new() }
    }
}

/// Everything the agent has done since the last reset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentActivity {
    pub operations: Vec<OperationLog>,
    pub files_written: Vec<String>,
}

#[derive(Debug, Default)]
struct Conversation {
    /// LLM client generation the conversation belongs to.
    generation: u64,
    /// Bumped by `reset`; a request started before a reset does not write
    /// its exchange back.
    epoch: u64,
    history: Vec<Message>,
}

#[derive(Clone)]
pub struct Agent {
    turn: Arc<Mutex<()>>,
    conversation: Arc<StdMutex<Conversation>>,
    tools: ToolSession,
    workspace: Workspace,
    previews: PreviewStore,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl Agent {
    #[must_use]
    pub fn new(workspace: Workspace, previews: PreviewStore, http: reqwest::Client, policy: RetryPolicy) -> Self {
        Self {
            turn: Arc::default(),
            conversation: Arc::default(),
            tools: ToolSession::default(),
            workspace,
            previews,
            http,
            policy,
        }
    }

    /// Run one request through the tool loop.
    ///
    /// Never fails: provider errors, exhausted retries and empty answers all
    /// come back as reply text.
    pub async fn generate(&self, llm: &dyn LlmChat, generation: u64, max_turns: u32, request: &str) -> AgentReply {
        let request = request.trim();
        if request.is_empty() {
            return AgentReply::plain(EMPTY_REQUEST_REPLY, Vec::new());
        }

        let _turn = self.turn.lock().await;
        let (epoch, mut messages) = {
            let mut conversation = self.conversation();
            if conversation.generation != generation {
                info!(from = conversation.generation, to = generation, "agent: LLM client changed, new conversation");
                conversation.history.clear();
                conversation.generation = generation;
            }
            (conversation.epoch, conversation.history.clone())
        };
        let first_op = self.tools.mark();

        messages.push(Message::user(request));
        let tools = agent_tools();
        let max_turns = max_turns.max(1);
        info!(request_len = request.len(), max_turns, model = llm.model(), "agent: request received");

        let mut final_text: Option<String> = None;
        for turn in 0..max_turns {
            let result = call_with_retry(
                self.policy,
                || llm.chat(AGENT_MAX_TOKENS, SYSTEM_PROMPT, &messages, Some(&tools)),
                |notice| {
                    self.tools.record(
                        OperationKind::Retry,
                        format!(
                            "Rate limited, retrying in {}s (attempt {}/{})",
                            notice.delay.as_secs(),
                            notice.attempt,
                            notice.max_attempts
                        ),
                        json!({
                            "attempt": notice.attempt,
                            "maxAttempts": notice.max_attempts,
                            "delayMs": u64::try_from(notice.delay.as_millis()).unwrap_or(u64::MAX),
                        }),
                    );
                },
            )
            .await;

            let response = match result {
                Ok(response) => response,
                Err(RetryError::Exhausted { attempts, .. }) => {
                    warn!(turn, attempts, "agent: rate limited, returning apology");
                    return AgentReply::plain(RATE_LIMIT_APOLOGY, self.tools.operations_since(first_op));
                }
                Err(RetryError::Fatal(err)) => {
                    warn!(turn, error = %err, "agent: provider call failed");
                    self.tools.record(OperationKind::Error, format!("Error: {err}"), json!({ "error": err.to_string() }));
                    return AgentReply::plain(
                        format!("I encountered an error processing your request: {err}"),
                        self.tools.operations_since(first_op),
                    );
                }
            };

            info!(
                turn,
                stop_reason = %response.stop_reason,
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                "agent: LLM response"
            );

            if let Some(text) = response.text() {
                final_text = Some(text);
            }

            let tool_calls: Vec<(String, String, Value)> = response
                .content
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
                    _ => None,
                })
                .collect();
            if tool_calls.is_empty() {
                break;
            }

            messages.push(Message { role: "assistant".into(), content: Content::Blocks(response.content) });

            let mut results = Vec::with_capacity(tool_calls.len());
            for (id, name, input) in tool_calls {
                info!(turn, tool = %name, "agent: executing tool");
                let mut ctx = ToolContext {
                    workspace: &self.workspace,
                    previews: &self.previews,
                    http: &self.http,
                    session: &self.tools,
                };
                let (content, is_error) = match execute_tool(&mut ctx, &name, &input).await {
                    Ok(value) => (value.to_string(), None),
                    Err(e) => {
                        warn!(turn, tool = %name, error = %e, "agent: tool error");
                        (json!({ "error": e.to_string() }).to_string(), Some(true))
                    }
                };
                results.push(ContentBlock::ToolResult { tool_use_id: id, name, content, is_error });
            }
            messages.push(Message { role: "user".into(), content: Content::Blocks(results) });

            if turn + 1 == max_turns {
                warn!(max_turns, "agent: turn limit reached");
            }
        }

        let operations = self.tools.operations_since(first_op);
        let Some(raw) = final_text.filter(|t| !t.trim().is_empty()) else {
            warn!("agent: empty response");
            return AgentReply::plain(EMPTY_RESPONSE_REPLY, operations);
        };

        {
            let mut conversation = self.conversation();
            if conversation.epoch == epoch && conversation.generation == generation {
                conversation.history.push(Message::user(request));
                conversation.history.push(Message::assistant(raw.clone()));
                if conversation.history.len() > MAX_HISTORY {
                    let excess = conversation.history.len() - MAX_HISTORY;
                    conversation.history.drain(..excess);
                }
            }
        }

        let (text, pending_actions) = extract_pending_actions(&raw);
        info!(operations = operations.len(), pending = pending_actions.len(), "agent: request complete");
        AgentReply { text, operation_progress: operations, pending_actions }
    }

    /// Snapshot of the operation log; does not wait for a running request.
    pub fn activity(&self) -> AgentActivity {
        AgentActivity { operations: self.tools.operations(), files_written: self.tools.files_written() }
    }

    /// Drop the conversation, operation log and terminal state. A request
    /// still running keeps going but does not write its exchange back.
    pub fn reset(&self) {
        {
            let mut conversation = self.conversation();
            conversation.history.clear();
            conversation.epoch += 1;
        }
        self.tools.clear();
        info!("agent: session reset");
    }

    fn conversation(&self) -> std::sync::MutexGuard<'_, Conversation> {
        self.conversation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn json_object_res() -> &'static [Regex; 2] {
    static RES: OnceLock<[Regex; 2]> = OnceLock::new();
    RES.get_or_init(|| {
        [r"\{[\s\S]*\}", r"```(?:json)?\s*(\{[\s\S]*?\})\s*```"]
            .map(|p| Regex::new(p).expect("json object pattern is valid"))
    })
}

/// Split a `{"text": ..., "pendingActions": [...]}` answer into its parts.
///
/// The outermost brace span is tried first, then a fenced json block. Text
/// that does not mention `pendingActions` or holds no such object is
/// returned unchanged.
pub(crate) fn extract_pending_actions(text: &str) -> (String, Vec<Value>) {
    if !text.contains("pendingActions") {
        return (text.to_string(), Vec::new());
    }
    let [bare, fenced] = json_object_res();
    let candidates = [
        bare.find(text).map(|m| m.as_str()),
        fenced.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str()),
    ];
    for candidate in candidates.into_iter().flatten() {
        let Ok(parsed) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };
        if let Some(actions) = parsed.get("pendingActions").and_then(Value::as_array) {
            let reply = parsed
                .get("text")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .unwrap_or(text);
            return (reply.to_string(), actions.clone());
        }
    }
    (text.to_string(), Vec::new())
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
