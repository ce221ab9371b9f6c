//! `fetch_webpage`: HTTP GET of an http(s) URL with a timeout, returning
//! at most 20 000 characters of the body.

use std::time::Duration;

use reqwest::Url;
use serde_json::{Value, json};

use super::{OperationKind, ToolContext, ToolError, required_str, u64_arg};

const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const MAX_CONTENT_CHARS: usize = 20_000;

pub(super) async fn fetch_webpage(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let url = required_str(input, &["url"], "url")?;
    let timeout_ms = u64_arg(input, &["timeout"]).unwrap_or(DEFAULT_TIMEOUT_MS).max(1);

    let parsed = Url::parse(url).map_err(|_| ToolError::InvalidArg(format!("Invalid URL: {url}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ToolError::InvalidArg(format!("Only http and https URLs are supported: {url}")));
    }

    ctx.session.record(
        OperationKind::Read,
        format!("Fetching webpage: {url}"),
        json!({ "url": url, "timeout": timeout_ms }),
    );

    let response = ctx
        .http
        .get(parsed)
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| ToolError::Failed(format!("Failed to fetch webpage: {e}")))?;

    let status = response.status();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let body = response
        .text()
        .await
        .map_err(|e| ToolError::Failed(format!("Failed to read webpage body: {e}")))?;

    let truncated = body.chars().count() > MAX_CONTENT_CHARS;
    let content: String = if truncated { body.chars().take(MAX_CONTENT_CHARS).collect() } else { body };

    Ok(json!({
        "success": status.is_success(),
        "statusCode": status.as_u16(),
        "contentType": content_type,
        "content": content,
        "truncated": truncated,
    }))
}
