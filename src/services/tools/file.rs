//! File tools: read, list, write, and in-place edits.

use serde_json::{Value, json};

use super::{OperationKind, ToolContext, ToolError, file_meta, required_str, str_arg, u64_arg};
use crate::services::workspace::WorkspaceError;

const DEFAULT_END_LINE: u64 = 100;
const PREVIEW_CHARS: usize = 100;

fn preview(text: &str) -> String {
    if text.chars().count() > PREVIEW_CHARS {
        let head: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Read an existing file, mapping absence to the tool's "File not found" text.
async fn read_existing(ctx: &ToolContext<'_>, path: &str) -> Result<String, ToolError> {
    let full = ctx.workspace.resolve(path)?;
    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(ToolError::InvalidArg(format!("{path} is not a file"))),
        Err(_) => return Err(ToolError::NotFound(format!("File not found: {path}"))),
    }
    ctx.workspace.read(path).await.map_err(|e| match e {
        WorkspaceError::NotFound(_) => ToolError::NotFound(format!("File not found: {path}")),
        other => ToolError::Workspace(other),
    })
}

pub(super) async fn read_file(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["filePath", "file_path"], "File path (filePath or file_path)")?;
    let start = u64_arg(input, &["startLineNumberBaseZero", "start_line_number_base_zero"]).unwrap_or(0);
    let end = u64_arg(input, &["endLineNumberBaseZero", "end_line_number_base_zero"]).unwrap_or(DEFAULT_END_LINE);

    let content = read_existing(ctx, path).await?;
    let lines: Vec<&str> = content.split('\n').collect();
    let total = lines.len();
    let start = usize::try_from(start).unwrap_or(usize::MAX);
    let end = usize::try_from(end).unwrap_or(usize::MAX).min(total - 1);

    let selected = if start <= end { lines[start..=end].join("\n") } else { String::new() };
    let outline = if total > end + 1 { format!("... and {} more lines", total - end - 1) } else { String::new() };

    let (file_name, file_type) = file_meta(path);
    ctx.session.record(
        OperationKind::Read,
        format!("Read {file_name} L{}-{}", start.saturating_add(1), end + 1),
        json!({
            "filePath": path,
            "fileName": file_name,
            "fileType": file_type,
            "linesRead": { "start": start.saturating_add(1), "end": end + 1, "total": total },
        }),
    );

    Ok(json!({
        "content": selected,
        "startLine": start,
        "endLine": end,
        "totalLines": total,
        "outline": outline,
    }))
}

pub(super) async fn list_dir(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let dir = str_arg(input, &["dirPath", "dir_path", "path"]).unwrap_or(".");
    let full = ctx.workspace.resolve(dir)?;
    match tokio::fs::metadata(&full).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => return Err(ToolError::InvalidArg(format!("{dir} is not a directory"))),
        Err(_) => return Err(ToolError::NotFound(format!("Directory not found: {dir}"))),
    }

    let mut reader = tokio::fs::read_dir(&full)
        .await
        .map_err(|e| ToolError::Failed(format!("Failed to list directory: {e}")))?;
    let mut entries = Vec::new();
    while let Ok(Some(entry)) = reader.next_entry().await {
        // Unreadable entries are skipped.
        let Ok(meta) = tokio::fs::metadata(entry.path()).await else {
            continue;
        };
        entries.push((
            entry.file_name().to_string_lossy().into_owned(),
            ctx.workspace.relative(&entry.path()),
            meta.is_dir(),
            meta.is_file().then_some(meta.len()),
        ));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    ctx.session.record(
        OperationKind::Read,
        format!("Listed directory: {dir}"),
        json!({ "filePath": dir, "entryCount": entries.len() }),
    );

    let entries: Vec<Value> = entries
        .into_iter()
        .map(|(name, path, is_dir, size)| {
            let mut entry = json!({ "name": name, "path": path, "isDirectory": is_dir });
            if let Some(size) = size {
                entry["size"] = json!(size);
            }
            entry
        })
        .collect();
    Ok(json!({ "entries": entries }))
}

pub(super) async fn write_file(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["path", "filePath", "file_path"], "path")?;
    let content = str_arg(input, &["content"]).ok_or(ToolError::MissingArg("content"))?;

    let existed = tokio::fs::try_exists(ctx.workspace.resolve(path)?)
        .await
        .unwrap_or(false);
    let full = ctx.workspace.write(path, content).await?;
    let rel = ctx.workspace.relative(&full);
    ctx.session.mark_written(&rel);

    let (file_name, file_type) = file_meta(path);
    let verb = if existed { "Updated" } else { "Created" };
    ctx.session.record(
        if existed { OperationKind::Write } else { OperationKind::Create },
        format!("{verb} {file_name}"),
        json!({
            "filePath": rel,
            "fileName": file_name,
            "fileType": file_type,
            "linesAdded": content.lines().count(),
        }),
    );
    Ok(json!({ "success": true, "message": format!("Successfully wrote {rel}") }))
}

pub(super) async fn replace_string_in_file(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["filePath", "file_path"], "filePath")?;
    let old = str_arg(input, &["oldString", "old_string"])
        .filter(|s| !s.is_empty())
        .ok_or(ToolError::MissingArg("oldString"))?;
    let new = str_arg(input, &["newString", "new_string"]).ok_or(ToolError::MissingArg("newString"))?;

    let content = read_existing(ctx, path).await?;
    if !content.contains(old) {
        return Err(ToolError::Failed(format!("String not found in file: {old}")));
    }
    let updated = content.replacen(old, new, 1);
    let full = ctx.workspace.write(path, &updated).await?;
    let rel = ctx.workspace.relative(&full);
    ctx.session.mark_written(&rel);

    let old_lines = old.split('\n').count();
    let new_lines = new.split('\n').count();
    let (file_name, file_type) = file_meta(path);
    ctx.session.record(
        OperationKind::Write,
        format!("Edited {file_name}"),
        json!({
            "filePath": rel,
            "fileName": file_name,
            "fileType": file_type,
            "linesAdded": new_lines.saturating_sub(old_lines),
            "linesRemoved": old_lines.saturating_sub(new_lines),
            "content": format!("Replaced: \"{}\"\nWith: \"{}\"", preview(old), preview(new)),
        }),
    );
    Ok(json!({ "success": true, "message": format!("Successfully updated {path}") }))
}

pub(super) async fn insert_edit_into_file(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["filePath", "file_path"], "filePath")?;
    let content = str_arg(input, &["content"]).ok_or(ToolError::MissingArg("content"))?;
    let position = required_str(input, &["position"], "position")?;
    let target = str_arg(input, &["targetString", "target_string"]).filter(|s| !s.is_empty());

    let existing = read_existing(ctx, path).await?;
    let updated = match position {
        "start" => format!("{content}\n{existing}"),
        "end" => format!("{existing}\n{content}"),
        "replace" => content.to_string(),
        "before" | "after" => {
            let target = target.ok_or_else(|| {
                ToolError::InvalidArg(format!("targetString is required for \"{position}\" position"))
            })?;
            if !existing.contains(target) {
                return Err(ToolError::Failed(format!("Target string not found: {target}")));
            }
            let replacement = if position == "before" {
                format!("{content}\n{target}")
            } else {
                format!("{target}\n{content}")
            };
            existing.replacen(target, &replacement, 1)
        }
        other => return Err(ToolError::InvalidArg(format!("Invalid position: {other}"))),
    };

    let full = ctx.workspace.write(path, &updated).await?;
    let rel = ctx.workspace.relative(&full);
    ctx.session.mark_written(&rel);

    let (file_name, file_type) = file_meta(path);
    ctx.session.record(
        OperationKind::Write,
        format!("Inserted content into {file_name}"),
        json!({
            "filePath": rel,
            "fileName": file_name,
            "fileType": file_type,
            "position": position,
            "content": preview(content),
        }),
    );
    Ok(json!({ "success": true, "message": format!("Successfully inserted content into {path}") }))
}
