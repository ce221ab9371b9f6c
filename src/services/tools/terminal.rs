//! Shell command execution for the agent.
//!
//! Commands run through `sh -c` inside the workspace. Output is captured by
//! two reader tasks into shared buffers so that a timed-out command still
//! reports what it printed before being killed. Dev-server URLs found in the
//! output are registered with the preview store.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{OperationKind, ToolContext, ToolError, required_str, str_arg, u64_arg};
use crate::services::preview::{NewPreview, detect_dev_server_urls};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;
const READER_GRACE: Duration = Duration::from_millis(200);

const EXIT_TIMEOUT: i32 = 124;
const EXIT_NOT_EXECUTABLE: i32 = 126;
const EXIT_NOT_FOUND: i32 = 127;

/// The most recent command and what it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalRun {
    pub command: String,
    pub cwd: String,
    pub output: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    /// Output or stderr hit the capture cap and was cut short.
    pub truncated: bool,
}

impl TerminalRun {
    fn success(&self) -> bool {
        self.exit_code == 0 && !self.timed_out
    }
}

#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

type Buffer = Arc<Mutex<Captured>>;

/// Drain a pipe, keeping at most [`MAX_OUTPUT_BYTES`]. Reading continues past
/// the cap so the child never blocks on a full pipe.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, buf: Buffer) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut out = buf.lock().await;
                let room = MAX_OUTPUT_BYTES.saturating_sub(out.bytes.len());
                if n > room {
                    out.truncated = true;
                }
                out.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
        }
    }
}

async fn take(buf: &Buffer) -> (String, bool) {
    let captured = buf.lock().await;
    (String::from_utf8_lossy(&captured.bytes).into_owned(), captured.truncated)
}

fn spawn_error_code(err: &std::io::Error) -> i32 {
    match err.kind() {
        std::io::ErrorKind::NotFound => EXIT_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => EXIT_NOT_EXECUTABLE,
        _ => -1,
    }
}

async fn run_command(command: &str, cwd: &std::path::Path, cwd_rel: &str, timeout: Duration) -> TerminalRun {
    let finished = |output: String, stderr: String, exit_code: i32, timed_out: bool, truncated: bool| TerminalRun {
        command: command.to_string(),
        cwd: cwd_rel.to_string(),
        output,
        stderr,
        exit_code,
        timed_out,
        truncated,
    };
    let mut child = match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => return finished(String::new(), e.to_string(), spawn_error_code(&e), false, false),
    };

    let stdout: Buffer = Arc::default();
    let stderr: Buffer = Arc::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(pipe) = child.stdout.take() {
        readers.push(tokio::spawn(pump(pipe, Arc::clone(&stdout))));
    }
    if let Some(pipe) = child.stderr.take() {
        readers.push(tokio::spawn(pump(pipe, Arc::clone(&stderr))));
    }

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code().unwrap_or(-1), false),
        Ok(Err(e)) => {
            warn!(error = %e, "terminal: wait failed");
            (-1, false)
        }
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            (EXIT_TIMEOUT, true)
        }
    };

    // Background grandchildren can keep the pipes open; stop waiting on them.
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(READER_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }

    let (output, out_truncated) = take(&stdout).await;
    let (stderr, err_truncated) = take(&stderr).await;
    finished(output, stderr, exit_code, timed_out, out_truncated || err_truncated)
}

pub(super) async fn run_in_terminal(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let command = required_str(input, &["command"], "command")?;
    let timeout_ms = u64_arg(input, &["timeout"]).unwrap_or(DEFAULT_TIMEOUT_MS).max(1);
    let cwd_arg = str_arg(input, &["cwd"]).filter(|c| !c.trim().is_empty()).unwrap_or(".");

    let cwd = ctx.workspace.resolve(cwd_arg)?;
    if !tokio::fs::metadata(&cwd).await.is_ok_and(|m| m.is_dir()) {
        return Err(ToolError::NotFound(format!("Directory not found: {cwd_arg}")));
    }
    let cwd_rel = ctx.workspace.relative(&cwd);

    ctx.session.record(
        OperationKind::Command,
        format!("Executing: {command}"),
        json!({ "command": command, "workingDirectory": cwd_rel, "timeout": timeout_ms }),
    );
    info!(%command, cwd = %cwd_rel, timeout_ms, "terminal: running");

    let run = run_command(command, &cwd, &cwd_rel, Duration::from_millis(timeout_ms)).await;
    info!(
        command = %run.command,
        exit_code = run.exit_code,
        timed_out = run.timed_out,
        truncated = run.truncated,
        "terminal: finished"
    );

    let error = if run.timed_out {
        format!("Command timed out after {timeout_ms}ms")
    } else if run.exit_code != 0 {
        let stderr = run.stderr.trim();
        if stderr.is_empty() { format!("Command failed with exit code {}", run.exit_code) } else { stderr.to_string() }
    } else {
        String::new()
    };

    let preview_urls = register_previews(ctx, &format!("{} {}", run.output, run.stderr)).await;
    let result = json!({
        "success": run.success(),
        "output": run.output,
        "error": error,
        "exitCode": run.exit_code,
        "stderr": run.stderr,
        "truncated": run.truncated,
        "previewUrls": preview_urls,
    });
    ctx.session.set_last_terminal(run);
    Ok(result)
}

/// Register every dev-server URL in `text` as a preview; returns the ones kept.
async fn register_previews(ctx: &mut ToolContext<'_>, text: &str) -> Vec<String> {
    let mut registered = Vec::new();
    for url in detect_dev_server_urls(text) {
        let Ok(parsed) = Url::parse(&url) else {
            continue;
        };
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => continue,
        };
        let title = format!("Dev Server: {host}");
        let new = NewPreview { url: Some(url.clone()), title: Some(title.clone()), ..NewPreview::default() };
        match ctx.previews.add(new).await {
            Ok(_) => {
                ctx.session.record(
                    OperationKind::Create,
                    format!("Preview detected: {title}"),
                    json!({ "url": url, "title": title, "type": "preview" }),
                );
                registered.push(url);
            }
            Err(e) => warn!(%url, error = %e, "terminal: preview not registered"),
        }
    }
    registered
}

pub(super) fn get_terminal_output(ctx: &mut ToolContext<'_>) -> Result<Value, ToolError> {
    let run = ctx
        .session
        .last_terminal()
        .ok_or_else(|| ToolError::Failed("No terminal command has been run yet".into()))?;
    ctx.session.record(
        OperationKind::Read,
        format!("Read terminal output: {}", run.command),
        json!({ "command": run.command }),
    );
    Ok(json!({
        "success": run.success(),
        "command": run.command,
        "cwd": run.cwd,
        "output": run.output,
        "stderr": run.stderr,
        "exitCode": run.exit_code,
        "timedOut": run.timed_out,
        "truncated": run.truncated,
    }))
}
