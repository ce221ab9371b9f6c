//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the workspace, the in-memory stores (previews, sandbox sessions,
//! settings), the chat and agent services, and the current LLM client.
//!
//! The LLM client lives in a slot with a generation counter. Saving a new
//! API key or model rebuilds the client and bumps the generation; the agent
//! compares generations to know when its conversation belongs to an old
//! client.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::llm::config::{DEFAULT_GEMINI_MODEL, LlmConfig};
use crate::llm::retry::RetryPolicy;
use crate::llm::{LlmChat, LlmClient};
use crate::services::agent::{Agent, AgentError};
use crate::services::chat::ChatService;
use crate::services::preview::PreviewStore;
use crate::services::sandbox::SandboxStore;
use crate::services::settings::{AssistantSettings, SettingsStore};
use crate::services::workspace::Workspace;

/// The LLM client a request should use, with the generation it belongs to.
#[derive(Clone)]
pub struct LlmHandle {
    pub client: Arc<dyn LlmChat>,
    pub generation: u64,
}

#[derive(Default)]
struct LlmSlot {
    client: Option<Arc<dyn LlmChat>>,
    generation: u64,
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub workspace: Workspace,
    pub previews: PreviewStore,
    pub sandbox: SandboxStore,
    pub settings: SettingsStore,
    pub chat: ChatService,
    pub agent: Agent,
    llm: Arc<RwLock<LlmSlot>>,
    /// Environment LLM config; saved settings are layered on top of it.
    base_llm: Option<LlmConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: ServerConfig,
        settings: SettingsStore,
        base_llm: Option<LlmConfig>,
        http: reqwest::Client,
        policy: RetryPolicy,
    ) -> Self {
        let workspace = Workspace::new(config.workspace_path);
        let previews = PreviewStore::new();
        let agent = Agent::new(workspace.clone(), previews.clone(), http, policy);
        Self {
            workspace,
            previews,
            sandbox: SandboxStore::default(),
            settings,
            chat: ChatService::new(policy),
            agent,
            llm: Arc::default(),
            base_llm,
        }
    }

    /// Current LLM client.
    ///
    /// # Errors
    ///
    /// [`AgentError::NotConfigured`] when no API key is available.
    pub async fn llm(&self) -> Result<LlmHandle, AgentError> {
        let slot = self.llm.read().await;
        slot.client
            .clone()
            .map(|client| LlmHandle { client, generation: slot.generation })
            .ok_or(AgentError::NotConfigured)
    }

    /// Swap the LLM client and start a new generation.
    pub async fn set_llm(&self, client: Option<Arc<dyn LlmChat>>) {
        let mut slot = self.llm.write().await;
        slot.generation += 1;
        slot.client = client;
    }

    /// Rebuild the LLM client from the environment config plus saved
    /// settings. Returns whether a client is now configured.
    pub async fn refresh_llm(&self) -> bool {
        let settings = self.settings.get().await;
        let client = build_llm(self.base_llm.clone(), &settings);
        let configured = client.is_some();
        match &client {
            Some(c) => info!(model = c.model(), "llm: client configured"),
            None => warn!("llm: no API key configured; chat and agent are disabled"),
        }
        self.set_llm(client).await;
        configured
    }
}

/// Layer saved settings over the environment config. The default model in
/// settings does not override `GEMINI_MODEL`.
fn build_llm(base: Option<LlmConfig>, settings: &AssistantSettings) -> Option<Arc<dyn LlmChat>> {
    let model = if settings.model == DEFAULT_GEMINI_MODEL { "" } else { settings.model.as_str() };
    let config = base
        .unwrap_or_else(|| LlmConfig::with_api_key(""))
        .with_overrides(&settings.api_key, model);
    if config.api_key.is_empty() {
        return None;
    }
    match LlmClient::from_config(config) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "llm: client build failed");
            None
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
