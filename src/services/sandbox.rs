//! Sandbox sessions: server-side bookkeeping for browser WebContainers.
//!
//! The container itself runs in the browser; this store tracks session
//! lifecycle and answers `execute` with canned output so the client can
//! exercise its terminal and preview plumbing.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::preview::{DetectedUrl, parse_preview_urls};

pub const DEFAULT_SESSION_ID: &str = "default";
pub const DEFAULT_READY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("Session ID and command are required")]
    MissingFields,
    #[error("Session not found")]
    NotFound,
    #[error("WebContainer not ready")]
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Initializing,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxSession {
    pub id: String,
    pub status: SessionStatus,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub output: String,
    pub exit_code: i32,
    pub timestamp: u64,
    pub preview_urls: Vec<DetectedUrl>,
}

/// A session plus the incarnation that its readiness timer belongs to, so a
/// timer left over from a removed session cannot touch a re-created one.
#[derive(Debug)]
struct Tracked {
    session: SandboxSession,
    incarnation: u64,
}

#[derive(Clone)]
pub struct SandboxStore {
    sessions: Arc<RwLock<HashMap<String, Tracked>>>,
    incarnations: Arc<AtomicU64>,
    ready_delay: Duration,
}

impl Default for SandboxStore {
    fn default() -> Self {
        Self::new(DEFAULT_READY_DELAY)
    }
}

impl SandboxStore {
    #[must_use]
    pub fn new(ready_delay: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            incarnations: Arc::new(AtomicU64::new(0)),
            ready_delay,
        }
    }

    /// Return the session named `session_id` (or `"default"`), creating it
    /// when absent. New sessions start `initializing` and flip to `ready`
    /// after the store's ready delay.
    pub async fn create_or_get(&self, session_id: Option<&str>) -> SandboxSession {
        let session_id = session_id.filter(|id| !id.is_empty());
        let lookup = session_id.unwrap_or(DEFAULT_SESSION_ID);

        let mut sessions = self.sessions.write().await;
        if let Some(existing) = sessions.get(lookup) {
            return existing.session.clone();
        }

        let created_at = super::now_ms();
        let id = session_id.map_or_else(|| format!("session_{created_at}"), str::to_string);
        let session = SandboxSession {
            id: id.clone(),
            status: SessionStatus::Initializing,
            created_at,
        };
        let incarnation = self.incarnations.fetch_add(1, Ordering::Relaxed);
        sessions.insert(id.clone(), Tracked { session: session.clone(), incarnation });
        drop(sessions);
        info!(session = %id, "sandbox: session created");

        let store = self.sessions.clone();
        let delay = self.ready_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(t) = store.write().await.get_mut(&id).filter(|t| t.incarnation == incarnation) {
                t.session.status = SessionStatus::Ready;
                debug!(session = %id, "sandbox: session ready");
            }
        });

        session
    }

    pub async fn get(&self, id: &str) -> Option<SandboxSession> {
        self.sessions.read().await.get(id).map(|t| t.session.clone())
    }

    /// # Errors
    ///
    /// [`SandboxError::NotFound`] for an unknown id.
    pub async fn remove(&self, id: &str) -> Result<(), SandboxError> {
        if self.sessions.write().await.remove(id).is_none() {
            return Err(SandboxError::NotFound);
        }
        info!(session = %id, "sandbox: session removed");
        Ok(())
    }

    /// Run `command` in a ready session.
    ///
    /// # Errors
    ///
    /// Missing fields, unknown session, or a session still initializing.
    pub async fn execute(&self, session_id: &str, command: &str) -> Result<Execution, SandboxError> {
        if session_id.is_empty() || command.trim().is_empty() {
            return Err(SandboxError::MissingFields);
        }
        let status = self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|t| t.session.status)
            .ok_or(SandboxError::NotFound)?;
        if status != SessionStatus::Ready {
            return Err(SandboxError::NotReady);
        }

        let output = simulate(command);
        let exit_code = i32::from(output.contains("Error"));
        debug!(session = %session_id, command, exit_code, "sandbox: executed");
        Ok(Execution {
            preview_urls: parse_preview_urls(&output),
            output,
            exit_code,
            timestamp: super::now_ms(),
        })
    }
}

fn simulate(command: &str) -> String {
    let lower = command.to_lowercase();
    if lower.contains("npm run dev") || lower.contains("yarn dev") {
        return "Starting development server...\n\
                ✓ Server running on http://localhost:3000\n\
                ✓ Server running on http://localhost:5173\n\
                Ready! Open your browser to http://localhost:3000"
            .to_string();
    }
    if lower.contains("npm start") || lower.contains("yarn start") {
        return "Starting production server...\n\
                ✓ Server running on http://localhost:8080\n\
                Ready! Open your browser to http://localhost:8080"
            .to_string();
    }
    if lower.contains("ls") || lower.contains("dir") {
        return "file1.txt\nfile2.js\nfolder/".to_string();
    }
    format!("Command executed: {command}")
}

#[cfg(test)]
#[path = "sandbox_test.rs"]
mod tests;
