//! Coding-agent tool definitions.
//!
//! Names are the model-facing contract; `services::tools::execute_tool`
//! dispatches on exactly these strings.

use super::types::Tool;

fn tool(name: &str, description: &str, input_schema: serde_json::Value) -> Tool {
    Tool { name: name.into(), description: description.into(), input_schema }
}

/// Build the set of tools available to the coding agent.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn agent_tools() -> Vec<Tool> {
    vec![
        tool(
            "read_file",
            "Read the contents of a file. You must specify the line range you're interested in, and if the \
             file is larger, you will be given an outline of the rest of the file.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "Path of the file relative to the workspace root" },
                    "startLineNumberBaseZero": { "type": "integer", "description": "First line to read, 0-based (default 0)" },
                    "endLineNumberBaseZero": { "type": "integer", "description": "Last line to read, 0-based inclusive (default 100)" }
                },
                "required": ["filePath"]
            }),
        ),
        tool(
            "list_dir",
            "List the contents of a directory. Each entry reports whether it is a directory.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "dirPath": { "type": "string", "description": "Directory relative to the workspace root" }
                },
                "required": ["dirPath"]
            }),
        ),
        tool(
            "write_file",
            "Create or overwrite a file with the given content. Parent directories are created.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File path relative to the workspace root" },
                    "content": { "type": "string", "description": "Full file content" }
                },
                "required": ["path", "content"]
            }),
        ),
        tool(
            "replace_string_in_file",
            "Replace a specific string in a file with new content. This is the preferred method for editing files.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "File path relative to the workspace root" },
                    "oldString": { "type": "string", "description": "Exact text to replace (first occurrence)" },
                    "newString": { "type": "string", "description": "Replacement text" }
                },
                "required": ["filePath", "oldString", "newString"]
            }),
        ),
        tool(
            "insert_edit_into_file",
            "Insert new content into a file at a specific location. Use this only if replace_string_in_file fails.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "File path relative to the workspace root" },
                    "content": { "type": "string", "description": "Content to insert" },
                    "position": {
                        "type": "string",
                        "enum": ["start", "end", "before", "after", "replace"],
                        "description": "Where to insert; \"replace\" overwrites the whole file"
                    },
                    "targetString": { "type": "string", "description": "Anchor text, required for before/after" }
                },
                "required": ["filePath", "content", "position"]
            }),
        ),
        tool(
            "grep_search",
            "Search for text patterns in files using regex or plain text. Returns matching lines with file \
             paths and line numbers.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "Regex or plain text" },
                    "includePattern": { "type": "string", "description": "Glob of files to search (e.g. \"**/*.ts\")" },
                    "excludePattern": { "type": "string", "description": "Glob of files to skip (default \"node_modules/**\")" },
                    "maxResults": { "type": "integer", "description": "Maximum matches to return (default 100)" }
                },
                "required": ["query"]
            }),
        ),
        tool(
            "file_search",
            "Search for files by name or glob pattern across the workspace.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": { "type": "string", "description": "Glob pattern, e.g. \"**/*.json\"" },
                    "includeHidden": { "type": "boolean", "description": "Include dot-files and dot-directories" }
                },
                "required": ["pattern"]
            }),
        ),
        tool(
            "run_in_terminal",
            "Execute a shell command in the workspace and return its output. Use this for builds, package \
             managers, tests, or starting dev servers.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "command": { "type": "string", "description": "Command line passed to sh -c" },
                    "cwd": { "type": "string", "description": "Working directory relative to the workspace root" },
                    "timeout": { "type": "integer", "description": "Timeout in milliseconds (default 30000)" }
                },
                "required": ["command"]
            }),
        ),
        tool(
            "get_terminal_output",
            "Return the output of the most recent run_in_terminal command.",
            serde_json::json!({ "type": "object", "properties": {} }),
        ),
        tool(
            "edit_notebook_file",
            "Edit a percent-format notebook (cells start with \"# %% [type]\") by replacing, inserting or \
             appending a cell.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "Notebook path relative to the workspace root" },
                    "cellIndex": { "type": "integer", "description": "0-based cell index for replace/insert" },
                    "cellType": { "type": "string", "enum": ["code", "markdown", "raw"], "description": "Cell type (default code)" },
                    "content": { "type": "string", "description": "Cell body" },
                    "action": { "type": "string", "enum": ["replace", "insert", "append"] }
                },
                "required": ["filePath", "content", "action"]
            }),
        ),
        tool(
            "get_notebook_summary",
            "Summarise a notebook: cell count and types, code metrics, and an overall complexity score.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "filePath": { "type": "string", "description": "Notebook path relative to the workspace root" }
                },
                "required": ["filePath"]
            }),
        ),
        tool(
            "fetch_webpage",
            "Fetch a web page over HTTP(S) and return its status, content type and (truncated) body.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Absolute http(s) URL" },
                    "timeout": { "type": "integer", "description": "Timeout in milliseconds (default 10000)" }
                },
                "required": ["url"]
            }),
        ),
        tool(
            "get_project_setup_info",
            "Describe the project: package manifest summary and which well-known config files are present.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "includeDependencies": { "type": "boolean", "description": "Include dependency lists (default true)" },
                    "includeConfig": { "type": "boolean", "description": "Include detected config files (default true)" }
                }
            }),
        ),
    ]
}

#[cfg(test)]
#[path = "tools_test.rs"]
mod tests;
