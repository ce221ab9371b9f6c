//! Preview registry: dev-server URLs announced by sandboxes and the agent.
//!
//! DESIGN
//! ======
//! Previews are grouped by project; at most one per project is active.
//! Adding a preview makes it the active one. The store is in-memory and
//! keeps insertion order so equal timestamps sort stably.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

pub const DEFAULT_PROJECT: &str = "default";
const DISPLAY_URL_MAX: usize = 50;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PreviewError {
    #[error("URL is required")]
    MissingUrl,
    #[error("Invalid URL format")]
    InvalidUrl,
    #[error("Preview URL not found")]
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewUrl {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub timestamp: u64,
    pub is_active: bool,
    pub project_id: String,
}

/// Fields accepted when registering a preview.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPreview {
    pub url: Option<String>,
    pub title: Option<String>,
    pub timestamp: Option<u64>,
    pub project_id: Option<String>,
}

/// Previews of one project plus its active entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPreviews {
    pub project_id: String,
    pub preview_urls: Vec<PreviewUrl>,
    pub active_preview: Option<PreviewUrl>,
    pub count: usize,
}

#[derive(Clone, Default)]
pub struct PreviewStore {
    previews: Arc<RwLock<Vec<PreviewUrl>>>,
}

impl PreviewStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a preview and make it the project's active one.
    ///
    /// # Errors
    ///
    /// [`PreviewError::MissingUrl`] / [`PreviewError::InvalidUrl`].
    pub async fn add(&self, new: NewPreview) -> Result<PreviewUrl, PreviewError> {
        let url = new
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or(PreviewError::MissingUrl)?;
        let parsed = Url::parse(&url).map_err(|_| PreviewError::InvalidUrl)?;
        let project_id = new
            .project_id
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

        let preview = PreviewUrl {
            id: Uuid::new_v4(),
            title: new
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| title_from_url(&parsed)),
            url,
            timestamp: new.timestamp.unwrap_or_else(super::now_ms),
            is_active: true,
            project_id,
        };

        let mut previews = self.previews.write().await;
        for p in previews.iter_mut().filter(|p| p.project_id == preview.project_id) {
            p.is_active = false;
        }
        previews.push(preview.clone());
        info!(id = %preview.id, project = %preview.project_id, url = %preview.url, "preview: added");
        Ok(preview)
    }

    /// All previews (optionally of one project), active first then newest first.
    pub async fn list(&self, project_id: Option<&str>) -> Vec<PreviewUrl> {
        let previews = self.previews.read().await;
        let mut out: Vec<PreviewUrl> = previews
            .iter()
            .filter(|p| project_id.is_none_or(|id| p.project_id == id))
            .cloned()
            .collect();
        sort_previews(&mut out);
        out
    }

    pub async fn project(&self, project_id: &str) -> ProjectPreviews {
        let preview_urls = self.list(Some(project_id)).await;
        let active_preview = preview_urls.iter().find(|p| p.is_active).cloned();
        ProjectPreviews {
            project_id: project_id.to_string(),
            count: preview_urls.len(),
            preview_urls,
            active_preview,
        }
    }

    /// # Errors
    ///
    /// [`PreviewError::NotFound`] for an unknown id.
    pub async fn activate(&self, id: Uuid) -> Result<PreviewUrl, PreviewError> {
        let mut previews = self.previews.write().await;
        let project_id = previews
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.project_id.clone())
            .ok_or(PreviewError::NotFound)?;

        let mut activated = None;
        for p in previews.iter_mut().filter(|p| p.project_id == project_id) {
            p.is_active = p.id == id;
            if p.is_active {
                activated = Some(p.clone());
            }
        }
        activated.ok_or(PreviewError::NotFound)
    }

    /// Remove a preview. If it was active, the project's most recent
    /// remaining preview takes over.
    ///
    /// # Errors
    ///
    /// [`PreviewError::NotFound`] for an unknown id.
    pub async fn remove(&self, id: Uuid) -> Result<(), PreviewError> {
        let mut previews = self.previews.write().await;
        let index = previews
            .iter()
            .position(|p| p.id == id)
            .ok_or(PreviewError::NotFound)?;
        let removed = previews.remove(index);

        if removed.is_active {
            // max_by_key keeps the last maximum, so the newest insertion wins ties.
            if let Some(next) = previews
                .iter_mut()
                .filter(|p| p.project_id == removed.project_id)
                .max_by_key(|p| p.timestamp)
            {
                next.is_active = true;
            }
        }
        Ok(())
    }

    /// Clear one project's previews, or everything. Returns how many were dropped.
    pub async fn clear(&self, project_id: Option<&str>) -> usize {
        let mut previews = self.previews.write().await;
        let before = previews.len();
        match project_id {
            Some(id) => previews.retain(|p| p.project_id != id),
            None => previews.clear(),
        }
        before - previews.len()
    }
}

fn sort_previews(previews: &mut [PreviewUrl]) {
    previews.sort_by(|a, b| {
        b.is_active
            .cmp(&a.is_active)
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
}

/// `host[:port][path]`, omitting default ports and the bare `/` path.
fn title_from_url(url: &Url) -> String {
    let mut title = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port().filter(|p| *p != 80 && *p != 443) {
        title.push_str(&format!(":{port}"));
    }
    if url.path() != "/" {
        title.push_str(url.path());
    }
    if title.is_empty() { url.to_string() } else { title }
}

// =============================================================================
// URL DETECTION
// =============================================================================

/// A local dev-server URL found in terminal output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedUrl {
    pub url: String,
    pub display_url: String,
    pub port: u16,
}

fn local_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:(?:https?://)?(?:localhost|127\.0\.0\.1)(?::\d+)?|local[^:]:\s+https?://(?:localhost|127\.0\.0\.1):\d+)",
        )
        .expect("local url pattern is valid")
    })
}

fn port_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r":(\d+)").expect("port pattern is valid"))
}

/// Localhost / 127.0.0.1 URLs with an explicit port, one per port.
#[must_use]
pub fn parse_preview_urls(text: &str) -> Vec<DetectedUrl> {
    let mut seen = Vec::new();
    let mut out = Vec::new();

    for m in local_url_re().find_iter(text) {
        let matched = m.as_str();
        let Some(port) = port_re()
            .captures(matched)
            .and_then(|c| c.get(1))
            .and_then(|p| p.as_str().parse::<u16>().ok())
        else {
            continue;
        };
        if seen.contains(&port) {
            continue;
        }
        seen.push(port);

        let lower = matched.to_ascii_lowercase();
        let url = if lower.starts_with("http://") || lower.starts_with("https://") {
            matched.to_string()
        } else if let Some(idx) = lower.find("http") {
            matched[idx..].to_string()
        } else {
            format!("http://{matched}")
        };
        out.push(DetectedUrl { display_url: display_url(&url), url, port });
    }
    out
}

fn display_url(url: &str) -> String {
    let lower = url.to_ascii_lowercase();
    let without_scheme = if lower.starts_with("https://") {
        &url[8..]
    } else if lower.starts_with("http://") {
        &url[7..]
    } else {
        url
    };
    without_scheme
        .strip_suffix('/')
        .unwrap_or(without_scheme)
        .chars()
        .take(DISPLAY_URL_MAX)
        .collect()
}

fn dev_server_res() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?i)https?://localhost:\d+(?:/\S*)?",
            r"(?i)https?://127\.0\.0\.1:\d+(?:/\S*)?",
            r"(?i)https?://0\.0\.0\.0:\d+(?:/\S*)?",
            r"(?i)https?://[a-z0-9.-]+\.local:\d+(?:/\S*)?",
            r"(?i)https?://\d+\.\d+\.\d+\.\d+:\d+(?:/\S*)?",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("dev server pattern is valid"))
        .collect()
    })
}

/// Full `http(s)://host:port[/path]` URLs of local dev servers, deduplicated
/// in discovery order.
#[must_use]
pub fn detect_dev_server_urls(text: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for re in dev_server_res() {
        for m in re.find_iter(text) {
            let url = m.as_str().trim().to_string();
            if !out.contains(&url) {
                out.push(url);
            }
        }
    }
    out
}

#[cfg(test)]
#[path = "preview_test.rs"]
mod tests;
