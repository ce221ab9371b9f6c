//! Search tools: content grep and file-name glob over the workspace.
//!
//! Both walk the tree on a blocking thread. Hidden directories (`.git`,
//! `.ide-server`, ...) are never descended into by grep.

use globset::{Glob, GlobMatcher};
use regex::Regex;
use serde_json::{Value, json};
use walkdir::WalkDir;

use super::{OperationKind, ToolContext, ToolError, bool_arg, required_str, str_arg, u64_arg};
use crate::services::workspace::Workspace;

const DEFAULT_INCLUDE: &str = "**/*";
const DEFAULT_EXCLUDE: &str = "node_modules/**";
const DEFAULT_MAX_RESULTS: u64 = 100;
const MAX_FILE_RESULTS: usize = 500;
const MAX_LINE_CHARS: usize = 200;

fn glob(pattern: &str) -> Result<GlobMatcher, ToolError> {
    Glob::new(pattern)
        .map(|g| g.compile_matcher())
        .map_err(|e| ToolError::InvalidArg(format!("Invalid glob pattern {pattern}: {e}")))
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

#[derive(Debug)]
struct GrepHit {
    file: String,
    line: usize,
    content: String,
}

fn grep_blocking(
    workspace: &Workspace,
    re: &Regex,
    include: &GlobMatcher,
    exclude: &GlobMatcher,
    max_results: usize,
) -> Vec<GrepHit> {
    let mut hits = Vec::new();
    let walker = WalkDir::new(workspace.root())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 {
                return true;
            }
            if e.file_type().is_dir() {
                let rel = workspace.relative(e.path());
                // Prune directories whose every child would be excluded (`dir/**`).
                return !is_hidden(e.file_name()) && !exclude.is_match(format!("{rel}/_"));
            }
            true
        });

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = workspace.relative(entry.path());
        if !include.is_match(&rel) || exclude.is_match(&rel) {
            continue;
        }
        // Binary and non-UTF-8 files are skipped.
        let Ok(text) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        for (idx, line) in text.lines().enumerate() {
            if re.is_match(line) {
                hits.push(GrepHit {
                    file: rel.clone(),
                    line: idx + 1,
                    content: line.trim().chars().take(MAX_LINE_CHARS).collect(),
                });
                if hits.len() >= max_results {
                    return hits;
                }
            }
        }
    }
    hits
}

pub(super) async fn grep_search(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let query = required_str(input, &["query"], "query")?;
    let include_pattern = str_arg(input, &["includePattern", "include_pattern"]).unwrap_or(DEFAULT_INCLUDE);
    let exclude_pattern = str_arg(input, &["excludePattern", "exclude_pattern"]).unwrap_or(DEFAULT_EXCLUDE);
    let max_results = u64_arg(input, &["maxResults", "max_results"]).unwrap_or(DEFAULT_MAX_RESULTS);
    let max_results = usize::try_from(max_results).unwrap_or(usize::MAX).max(1);

    // Queries that are not valid regexes are searched literally.
    let (re, match_type) = match Regex::new(query) {
        Ok(re) => (re, "regex"),
        Err(_) => (
            Regex::new(&regex::escape(query)).map_err(|e| ToolError::InvalidArg(e.to_string()))?,
            "literal",
        ),
    };
    let include = glob(include_pattern)?;
    let exclude = glob(exclude_pattern)?;

    ctx.session.record(
        OperationKind::Search,
        format!("Searching for: {query}"),
        json!({
            "query": query,
            "includePattern": include_pattern,
            "excludePattern": exclude_pattern,
            "maxResults": max_results,
        }),
    );

    let workspace = ctx.workspace.clone();
    let hits = tokio::task::spawn_blocking(move || grep_blocking(&workspace, &re, &include, &exclude, max_results))
        .await
        .map_err(|e| ToolError::Failed(format!("Search failed: {e}")))?;

    let results: Vec<Value> = hits
        .iter()
        .map(|h| json!({ "file": h.file, "line": h.line, "content": h.content, "matchType": match_type }))
        .collect();
    Ok(json!({ "results": results, "totalResults": results.len() }))
}

#[derive(Debug)]
struct FileHit {
    name: String,
    path: String,
    size: u64,
    kind: String,
}

fn file_search_blocking(workspace: &Workspace, pattern: &GlobMatcher, include_hidden: bool) -> Vec<FileHit> {
    let walker = WalkDir::new(workspace.root())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || include_hidden || !is_hidden(e.file_name()));

    let mut hits = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = workspace.relative(entry.path());
        if !pattern.is_match(&rel) {
            continue;
        }
        let kind = entry
            .path()
            .extension()
            .map_or_else(|| "file".to_string(), |e| format!(".{}", e.to_string_lossy()));
        hits.push(FileHit {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: rel,
            size: entry.metadata().map(|m| m.len()).unwrap_or(0),
            kind,
        });
        if hits.len() >= MAX_FILE_RESULTS {
            break;
        }
    }
    hits
}

pub(super) async fn file_search(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let pattern = required_str(input, &["pattern", "query"], "pattern")?;
    let include_hidden = bool_arg(input, "includeHidden").unwrap_or(false);
    let matcher = glob(pattern)?;

    ctx.session.record(
        OperationKind::Search,
        format!("Searching for files: {pattern}"),
        json!({ "pattern": pattern, "includeHidden": include_hidden }),
    );

    let workspace = ctx.workspace.clone();
    let hits = tokio::task::spawn_blocking(move || file_search_blocking(&workspace, &matcher, include_hidden))
        .await
        .map_err(|e| ToolError::Failed(format!("File search failed: {e}")))?;

    let files: Vec<Value> = hits
        .iter()
        .map(|h| json!({ "name": h.name, "path": h.path, "size": h.size, "type": h.kind }))
        .collect();
    Ok(json!({ "files": files, "totalFiles": files.len() }))
}
