//! Assistant settings: model, API key, turn budget, MCP server list.
//!
//! DESIGN
//! ======
//! Settings live in one JSON file (`SETTINGS_PATH`). The in-memory copy is
//! authoritative; every mutation rewrites the file before returning. A
//! missing file means defaults. The stored API key never leaves the server
//! unmasked.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::llm::config::DEFAULT_GEMINI_MODEL;

pub const DEFAULT_MAX_TURNS: u32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("{0}")]
    Invalid(String),
    #[error("MCP server not found: {0}")]
    ServerNotFound(String),
    #[error("settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssistantSettings {
    pub api_key: String,
    pub model: String,
    pub max_turns: u32,
    #[serde(rename = "enableMCP")]
    pub enable_mcp: bool,
    pub mcp_servers: Vec<McpServerConfig>,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            enable_mcp: false,
            mcp_servers: Vec::new(),
        }
    }
}

impl AssistantSettings {
    /// Client-facing view with the API key masked.
    #[must_use]
    pub fn masked(&self) -> MaskedSettings {
        MaskedSettings {
            api_key: mask_key(&self.api_key),
            has_api_key: !self.api_key.is_empty(),
            model: self.model.clone(),
            max_turns: self.max_turns,
            enable_mcp: self.enable_mcp,
            mcp_servers: self.mcp_servers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaskedSettings {
    pub api_key: String,
    pub has_api_key: bool,
    pub model: String,
    pub max_turns: u32,
    #[serde(rename = "enableMCP")]
    pub enable_mcp: bool,
    pub mcp_servers: Vec<McpServerConfig>,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_turns: Option<u32>,
    #[serde(rename = "enableMCP")]
    pub enable_mcp: Option<bool>,
    pub mcp_servers: Option<Vec<McpServerConfig>>,
}

/// Result of a mutation; `llm_changed` is set when the key or model moved.
#[derive(Debug, Clone)]
pub struct SettingsUpdate {
    pub settings: AssistantSettings,
    pub llm_changed: bool,
}

/// `***` plus the last four characters; keys of four characters or fewer
/// are masked completely.
fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return String::new();
    }
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{tail}")
}

#[derive(Clone)]
pub struct SettingsStore {
    path: PathBuf,
    current: Arc<RwLock<AssistantSettings>>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults when the file is absent.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed settings file.
    pub async fn load(path: PathBuf) -> Result<Self, SettingsError> {
        let settings = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AssistantSettings::default(),
            Err(source) => return Err(SettingsError::Io { path: path.display().to_string(), source }),
        };
        Ok(Self { path, current: Arc::new(RwLock::new(settings)) })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> AssistantSettings {
        self.current.read().await.clone()
    }

    /// Replace every setting at once.
    ///
    /// # Errors
    ///
    /// Validation or persistence failure.
    pub async fn save_all(&self, settings: AssistantSettings) -> Result<SettingsUpdate, SettingsError> {
        let mut current = self.current.write().await;
        self.save_locked(&mut current, settings).await
    }

    /// Merge `patch` into the current settings and persist.
    ///
    /// # Errors
    ///
    /// Validation or persistence failure.
    pub async fn update(&self, patch: SettingsPatch) -> Result<SettingsUpdate, SettingsError> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        if let Some(api_key) = patch.api_key {
            next.api_key = api_key.trim().to_string();
        }
        if let Some(model) = patch.model {
            next.model = model.trim().to_string();
        }
        if let Some(max_turns) = patch.max_turns {
            next.max_turns = max_turns;
        }
        if let Some(enable_mcp) = patch.enable_mcp {
            next.enable_mcp = enable_mcp;
        }
        if let Some(servers) = patch.mcp_servers {
            next.mcp_servers = servers;
        }
        self.save_locked(&mut current, next).await
    }

    /// Add an MCP server, replacing any existing entry with the same name.
    ///
    /// # Errors
    ///
    /// Validation or persistence failure.
    pub async fn add_mcp_server(&self, server: McpServerConfig) -> Result<SettingsUpdate, SettingsError> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        match next.mcp_servers.iter_mut().find(|s| s.name == server.name) {
            Some(existing) => *existing = server,
            None => next.mcp_servers.push(server),
        }
        self.save_locked(&mut current, next).await
    }

    /// # Errors
    ///
    /// [`SettingsError::ServerNotFound`] when `name` is not configured.
    pub async fn update_mcp_server(
        &self,
        name: &str,
        server: McpServerConfig,
    ) -> Result<SettingsUpdate, SettingsError> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        let existing = next
            .mcp_servers
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| SettingsError::ServerNotFound(name.to_string()))?;
        *existing = server;
        self.save_locked(&mut current, next).await
    }

    /// # Errors
    ///
    /// [`SettingsError::ServerNotFound`] when `name` is not configured.
    pub async fn remove_mcp_server(&self, name: &str) -> Result<SettingsUpdate, SettingsError> {
        let mut current = self.current.write().await;
        let mut next = current.clone();
        let before = next.mcp_servers.len();
        next.mcp_servers.retain(|s| s.name != name);
        if next.mcp_servers.len() == before {
            return Err(SettingsError::ServerNotFound(name.to_string()));
        }
        self.save_locked(&mut current, next).await
    }

    /// Validate, persist, then swap in `next`. The caller holds the write
    /// guard for the whole read-modify-write.
    async fn save_locked(
        &self,
        current: &mut AssistantSettings,
        next: AssistantSettings,
    ) -> Result<SettingsUpdate, SettingsError> {
        validate(&next)?;
        let llm_changed = current.api_key != next.api_key || current.model != next.model;
        self.persist(&next).await?;
        *current = next.clone();
        info!(model = %next.model, max_turns = next.max_turns, "settings: saved");
        Ok(SettingsUpdate { settings: next, llm_changed })
    }

    async fn persist(&self, settings: &AssistantSettings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io { path: self.path.display().to_string(), source };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, body).await.map_err(io_err)
    }
}

fn validate(settings: &AssistantSettings) -> Result<(), SettingsError> {
    if settings.model.is_empty() {
        return Err(SettingsError::Invalid("model must not be empty".into()));
    }
    if settings.max_turns == 0 {
        return Err(SettingsError::Invalid("maxTurns must be at least 1".into()));
    }
    for server in &settings.mcp_servers {
        if server.name.trim().is_empty() || server.command.trim().is_empty() {
            return Err(SettingsError::Invalid("MCP servers need a name and a command".into()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;
