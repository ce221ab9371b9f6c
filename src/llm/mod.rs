//! LLM: Gemini adapter for the chat proxy and the coding agent.
//!
//! DESIGN
//! ======
//! `LlmClient` is configured from environment variables (optionally
//! overridden by saved assistant settings) and implements [`LlmChat`], the
//! seam every caller and test goes through. Rate-limit handling lives in
//! [`retry`], above the client, so mocks exercise it too.

pub mod config;
pub mod gemini;
pub mod retry;
pub mod tools;
pub mod types;

use config::LlmConfig;
pub use types::LlmChat;
use types::{ChatResponse, LlmError, Message, Tool};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete LLM client backed by the Gemini REST API.
///
/// Built by [`LlmClient::from_config`] from the environment config layered
/// with saved settings.
pub struct LlmClient {
    inner: gemini::GeminiClient,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = gemini::GeminiClient::new(config.api_key, config.base_url, config.temperature, config.timeouts)?;
        Ok(Self { inner, model: config.model })
    }
}

#[async_trait::async_trait]
impl LlmChat for LlmClient {
    async fn chat(
        &self,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LlmError> {
        self.inner
            .chat(&self.model, max_tokens, system, messages, tools)
            .await
    }

    fn model(&self) -> &str {
        &self.model
    }
}
