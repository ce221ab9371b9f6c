//! Agent toolbox: executes model tool calls against the workspace.
//!
//! DESIGN
//! ======
//! `execute_tool` is a `match` over the tool names declared in
//! `llm::tools::agent_tools`. Each tool reads its arguments straight from
//! the JSON input, does its work through [`ToolContext`], records an
//! [`OperationLog`] entry, and returns a JSON result. A failing tool
//! returns a [`ToolError`]; the agent hands that back to the model as an
//! error result and keeps going.

mod file;
mod notebook;
mod project;
mod search;
mod terminal;
mod web;

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;

use super::preview::PreviewStore;
use super::workspace::{Workspace, WorkspaceError};

pub use terminal::TerminalRun;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{0} is required")]
    MissingArg(&'static str),
    #[error("{0}")]
    InvalidArg(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("{0}")]
    Failed(String),
    #[error("Unknown tool: {0}")]
    Unknown(String),
}

// =============================================================================
// OPERATION LOG
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
    Search,
    Command,
    Create,
    Retry,
    Error,
}

/// A user-visible record of something the agent did.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationLog {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub message: String,
    pub details: Value,
    pub timestamp: u64,
}

impl OperationLog {
    #[must_use]
    pub fn new(kind: OperationKind, message: impl Into<String>, details: Value) -> Self {
        let bytes: [u8; 6] = rand::random();
        let mut id = String::from("op_");
        for b in bytes {
            let _ = write!(id, "{b:02x}");
        }
        Self { id, kind, message: message.into(), details, timestamp: super::now_ms() }
    }
}

#[derive(Debug, Default)]
struct SessionLog {
    operations: Vec<OperationLog>,
    /// Workspace-relative paths written by the agent, first write order.
    files_written: Vec<String>,
    last_terminal: Option<TerminalRun>,
    /// Operations dropped by `clear`, so sequence marks stay monotonic.
    cleared: usize,
}

/// Per-session side effects that outlive a single tool call.
///
/// Cloneable handle; every method locks only long enough to copy or append,
/// so the log can be read while an agent request is still running.
#[derive(Debug, Clone, Default)]
pub struct ToolSession {
    log: Arc<Mutex<SessionLog>>,
}

impl ToolSession {
    fn lock(&self) -> MutexGuard<'_, SessionLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, kind: OperationKind, message: impl Into<String>, details: Value) {
        self.lock().operations.push(OperationLog::new(kind, message, details));
    }

    /// Sequence number of the next operation; pass it to [`Self::operations_since`].
    #[must_use]
    pub fn mark(&self) -> usize {
        let log = self.lock();
        log.cleared + log.operations.len()
    }

    /// Operations recorded at or after `mark` that have not been cleared.
    #[must_use]
    pub fn operations_since(&self, mark: usize) -> Vec<OperationLog> {
        let log = self.lock();
        let start = mark.saturating_sub(log.cleared).min(log.operations.len());
        log.operations[start..].to_vec()
    }

    #[must_use]
    pub fn operations(&self) -> Vec<OperationLog> {
        self.lock().operations.clone()
    }

    #[must_use]
    pub fn files_written(&self) -> Vec<String> {
        self.lock().files_written.clone()
    }

    #[must_use]
    pub fn last_terminal(&self) -> Option<TerminalRun> {
        self.lock().last_terminal.clone()
    }

    /// Drop the operation log, written-file list and terminal state.
    pub fn clear(&self) {
        let mut log = self.lock();
        log.cleared += log.operations.len();
        log.operations.clear();
        log.files_written.clear();
        log.last_terminal = None;
    }

    fn mark_written(&self, path: &str) {
        let mut log = self.lock();
        if !log.files_written.iter().any(|p| p == path) {
            log.files_written.push(path.to_string());
        }
    }

    fn set_last_terminal(&self, run: TerminalRun) {
        self.lock().last_terminal = Some(run);
    }
}

// =============================================================================
// CONTEXT + DISPATCH
// =============================================================================

pub struct ToolContext<'a> {
    pub workspace: &'a Workspace,
    pub previews: &'a PreviewStore,
    pub http: &'a reqwest::Client,
    pub session: &'a ToolSession,
}

/// Run one tool call.
///
/// # Errors
///
/// Returns the tool's failure, or [`ToolError::Unknown`] for an unknown name.
pub async fn execute_tool(ctx: &mut ToolContext<'_>, name: &str, input: &Value) -> Result<Value, ToolError> {
    match name {
        "read_file" => file::read_file(ctx, input).await,
        "list_dir" => file::list_dir(ctx, input).await,
        "write_file" => file::write_file(ctx, input).await,
        "replace_string_in_file" => file::replace_string_in_file(ctx, input).await,
        "insert_edit_into_file" => file::insert_edit_into_file(ctx, input).await,
        "grep_search" => search::grep_search(ctx, input).await,
        "file_search" => search::file_search(ctx, input).await,
        "run_in_terminal" => terminal::run_in_terminal(ctx, input).await,
        "get_terminal_output" => terminal::get_terminal_output(ctx),
        "edit_notebook_file" => notebook::edit_notebook_file(ctx, input).await,
        "get_notebook_summary" => notebook::get_notebook_summary(ctx, input).await,
        "fetch_webpage" => web::fetch_webpage(ctx, input).await,
        "get_project_setup_info" => project::get_project_setup_info(ctx, input).await,
        _ => Err(ToolError::Unknown(name.to_string())),
    }
}

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

/// First string value among `keys` (camelCase and snake_case spellings).
fn str_arg<'v>(input: &'v Value, keys: &[&str]) -> Option<&'v str> {
    keys.iter().find_map(|k| input.get(*k).and_then(Value::as_str))
}

fn required_str<'v>(input: &'v Value, keys: &[&str], label: &'static str) -> Result<&'v str, ToolError> {
    str_arg(input, keys)
        .filter(|s| !s.trim().is_empty())
        .ok_or(ToolError::MissingArg(label))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn u64_arg(input: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|k| {
        input.get(*k).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        })
    })
}

fn bool_arg(input: &Value, key: &str) -> Option<bool> {
    input.get(key).and_then(Value::as_bool)
}

/// File name and extension used in operation details.
fn file_meta(path: &str) -> (String, String) {
    let p = std::path::Path::new(path);
    let name = p
        .file_name()
        .map_or_else(|| path.to_string(), |n| n.to_string_lossy().into_owned());
    let ext = p
        .extension()
        .map_or_else(|| "file".to_string(), |e| e.to_string_lossy().into_owned());
    (name, ext)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
