//! Server configuration parsed from environment variables.
//!
//! `.env` is loaded by `main` before [`ServerConfig::from_env`] runs, so
//! values from the file and the process environment look the same here.

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3001;
const SETTINGS_FILE: &str = ".ide-server/settings.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("WORKSPACE_PATH is required")]
    MissingWorkspace,
    #[error("workspace path {path} is not accessible: {reason}")]
    WorkspaceUnavailable { path: String, reason: String },
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid NODE_ENV '{0}' (expected development, production or test)")]
    InvalidEnv(String),
}

/// Deployment environment, named after the `NODE_ENV` values the web client uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
    Test,
}

impl AppEnv {
    fn parse(raw: Option<&str>) -> Result<Self, ConfigError> {
        match raw.unwrap_or("development") {
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnv(other.to_string())),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Canonical workspace root every file operation is confined to.
    pub workspace_path: PathBuf,
    pub port: u16,
    pub env: AppEnv,
    /// JSON file holding assistant settings.
    pub settings_path: PathBuf,
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Required:
    /// - `WORKSPACE_PATH`
    ///
    /// Optional:
    /// - `PORT`: default 3001
    /// - `NODE_ENV`: `development` (default), `production` or `test`
    /// - `SETTINGS_PATH`: default `<workspace>/.ide-server/settings.json`
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ServerConfig::from_env`] but reads values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the offending variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_workspace = lookup("WORKSPACE_PATH")
            .filter(|p| !p.trim().is_empty())
            .ok_or(ConfigError::MissingWorkspace)?;
        let workspace_path =
            std::fs::canonicalize(&raw_workspace).map_err(|e| ConfigError::WorkspaceUnavailable {
                path: raw_workspace.clone(),
                reason: e.to_string(),
            })?;
        if !workspace_path.is_dir() {
            return Err(ConfigError::WorkspaceUnavailable { path: raw_workspace, reason: "not a directory".into() });
        }

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let env = AppEnv::parse(lookup("NODE_ENV").as_deref())?;
        let settings_path = lookup("SETTINGS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(|| workspace_path.join(SETTINGS_FILE), PathBuf::from);

        Ok(Self { workspace_path, port, env, settings_path })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
