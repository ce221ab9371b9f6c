//! Chat proxy: stateless-per-request Gemini chat with a rolling history.
//!
//! DESIGN
//! ======
//! Each request replays the stored history plus the new message. Only a
//! successful exchange is recorded; history is trimmed to the last
//! [`MAX_HISTORY`] turns. When rate-limit retries run out the apology text
//! is returned as the reply and history stays as it was.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::llm::LlmChat;
use crate::llm::retry::{RATE_LIMIT_APOLOGY, RetryError, RetryPolicy, call_with_retry};
use crate::llm::types::{LlmError, Message};

pub const MAX_HISTORY: usize = 20;
const CHAT_MAX_TOKENS: u32 = 8192;

const SYSTEM_PROMPT: &str = "You are an AI coding assistant integrated into an IDE. You help developers with:
- Understanding and explaining code
- Writing and refactoring code
- Debugging and problem-solving
- Answering technical questions
- Providing best practices and suggestions

Be concise, helpful, and accurate. Format code using markdown code blocks.";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message is required")]
    EmptyMessage,
    #[error("Failed to process chat message")]
    Upstream(#[source] LlmError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    fn to_message(&self) -> Message {
        match self.role {
            ChatRole::User => Message::user(self.text.clone()),
            ChatRole::Model => Message::assistant(self.text.clone()),
        }
    }
}

#[derive(Clone, Default)]
pub struct ChatService {
    history: Arc<Mutex<Vec<ChatTurn>>>,
    policy: RetryPolicy,
}

impl ChatService {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { history: Arc::default(), policy }
    }

    /// Send `message` with the current history and return the model's reply.
    ///
    /// # Errors
    ///
    /// [`ChatError::EmptyMessage`] for blank input, [`ChatError::Upstream`]
    /// for any non-rate-limit provider failure.
    pub async fn chat(&self, llm: &dyn LlmChat, message: &str) -> Result<String, ChatError> {
        if message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let mut messages: Vec<Message> = self
            .history
            .lock()
            .await
            .iter()
            .map(ChatTurn::to_message)
            .collect();
        messages.push(Message::user(message));
        info!(history = messages.len() - 1, model = llm.model(), "chat: sending message");

        let result = call_with_retry(
            self.policy,
            || llm.chat(CHAT_MAX_TOKENS, SYSTEM_PROMPT, &messages, None),
            |_| {},
        )
        .await;

        let response = match result {
            Ok(response) => response,
            Err(RetryError::Exhausted { attempts, .. }) => {
                warn!(attempts, "chat: rate limited, returning apology");
                return Ok(RATE_LIMIT_APOLOGY.to_string());
            }
            Err(RetryError::Fatal(err)) => {
                warn!(error = %err, "chat: provider call failed");
                return Err(ChatError::Upstream(err));
            }
        };

        let reply = response.text().unwrap_or_default();
        let mut history = self.history.lock().await;
        history.push(ChatTurn { role: ChatRole::User, text: message.to_string() });
        history.push(ChatTurn { role: ChatRole::Model, text: reply.clone() });
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
        Ok(reply)
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    pub async fn history(&self) -> Vec<ChatTurn> {
        self.history.lock().await.clone()
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
