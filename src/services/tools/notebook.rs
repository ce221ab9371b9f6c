//! Percent-format notebooks: plain text files whose cells start with a
//! `# %% [type]` header line.

use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Value, json};

use super::{OperationKind, ToolContext, ToolError, file_meta, required_str, str_arg, u64_arg};
use crate::services::workspace::WorkspaceError;

fn cell_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#\s*%%\s*\[(.*?)\]\s*$").expect("cell header pattern is valid"))
}

/// Function, class and import patterns for code metrics.
fn metric_res() -> &'static [Regex; 3] {
    static RES: OnceLock<[Regex; 3]> = OnceLock::new();
    RES.get_or_init(|| {
        [
            r"(?:def|function)\s+\w+\s*\(",
            r"class\s+\w+",
            r"(?m)^\s*(?:import|from)\s+\w",
        ]
        .map(|p| Regex::new(p).expect("code metric pattern is valid"))
    })
}

const CELL_TYPES: [&str; 3] = ["code", "markdown", "raw"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct Cell {
    pub kind: String,
    pub body: String,
}

/// A parsed notebook. Text before the first header is kept as a preamble.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(super) struct Notebook {
    pub preamble: String,
    pub cells: Vec<Cell>,
}

impl Notebook {
    pub fn parse(text: &str) -> Self {
        let mut notebook = Self::default();
        let mut current: Option<(String, Vec<&str>)> = None;
        let mut preamble = Vec::new();

        for line in text.lines() {
            if let Some(caps) = cell_header().captures(line) {
                if let Some((kind, body)) = current.take() {
                    notebook.cells.push(Cell { kind, body: join_body(&body) });
                }
                current = Some((caps[1].trim().to_string(), Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            } else {
                preamble.push(line);
            }
        }
        if let Some((kind, body)) = current {
            notebook.cells.push(Cell { kind, body: join_body(&body) });
        }
        notebook.preamble = join_body(&preamble);
        notebook
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.preamble.is_empty() {
            out.push_str(&self.preamble);
            out.push_str("\n\n");
        }
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "# %% [{}]", cell.kind);
            if !cell.body.is_empty() {
                out.push_str(&cell.body);
                out.push('\n');
            }
        }
        out
    }

    fn code(&self) -> String {
        self.cells
            .iter()
            .filter(|c| c.kind == "code")
            .map(|c| c.body.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Cell bodies drop the blank separator lines around them.
fn join_body(lines: &[&str]) -> String {
    lines.join("\n").trim_matches('\n').to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CodeMetrics {
    pub lines_of_code: usize,
    pub functions: usize,
    pub classes: usize,
    pub imports: usize,
    pub complexity: usize,
}

pub(super) fn code_metrics(code: &str) -> CodeMetrics {
    let lines_of_code = code.lines().filter(|l| !l.trim().is_empty()).count();
    let [function, class, import] = metric_res();
    let functions = function.find_iter(code).count();
    let classes = class.find_iter(code).count();
    let imports = import.find_iter(code).count();
    CodeMetrics {
        lines_of_code,
        functions,
        classes,
        imports,
        complexity: ((functions + classes + imports) / 3).min(10),
    }
}

async fn load(ctx: &ToolContext<'_>, path: &str) -> Result<String, ToolError> {
    ctx.workspace.read(path).await.map_err(|e| match e {
        WorkspaceError::NotFound(_) => ToolError::NotFound(format!("Notebook file not found: {path}")),
        other => ToolError::Workspace(other),
    })
}

fn cell_index(input: &Value) -> Option<usize> {
    u64_arg(input, &["cellIndex", "cell_index"]).and_then(|i| usize::try_from(i).ok())
}

pub(super) async fn edit_notebook_file(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["filePath", "file_path"], "filePath")?;
    let content = str_arg(input, &["content"]).ok_or(ToolError::MissingArg("content"))?;
    let action = required_str(input, &["action"], "action")?;
    let cell_type = str_arg(input, &["cellType", "cell_type"]).unwrap_or("code");
    if !CELL_TYPES.contains(&cell_type) {
        return Err(ToolError::InvalidArg(format!("Invalid cell type: {cell_type}")));
    }

    let mut notebook = Notebook::parse(&load(ctx, path).await?);
    let cell = Cell { kind: cell_type.to_string(), body: content.trim_matches('\n').to_string() };
    let count = notebook.cells.len();
    let index = cell_index(input);

    let (verb, at) = match (action, index) {
        ("replace", Some(i)) => {
            if i >= count {
                return Err(ToolError::InvalidArg(format!(
                    "Cell index {i} out of range. Notebook has {count} cells."
                )));
            }
            notebook.cells[i] = cell;
            ("replaced", i)
        }
        ("insert", Some(i)) => {
            if i > count {
                return Err(ToolError::InvalidArg(format!(
                    "Cell index {i} out of range. Notebook has {count} cells."
                )));
            }
            notebook.cells.insert(i, cell);
            ("inserted", i)
        }
        ("append", _) => {
            notebook.cells.push(cell);
            ("appended", count)
        }
        _ => {
            return Err(ToolError::InvalidArg(
                "Invalid action or missing cellIndex for replace/insert actions".into(),
            ));
        }
    };

    let full = ctx.workspace.write(path, &notebook.render()).await?;
    let rel = ctx.workspace.relative(&full);
    ctx.session.mark_written(&rel);

    let (file_name, _) = file_meta(path);
    ctx.session.record(
        OperationKind::Write,
        format!("Edited notebook: {file_name}"),
        json!({
            "filePath": rel,
            "fileName": file_name,
            "fileType": "notebook",
            "action": action,
            "cellType": cell_type,
            "cellIndex": at,
        }),
    );
    Ok(json!({
        "success": true,
        "message": format!("Successfully {verb} {cell_type} cell in {path}"),
    }))
}

pub(super) async fn get_notebook_summary(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let path = required_str(input, &["filePath", "file_path"], "filePath")?;
    let notebook = Notebook::parse(&load(ctx, path).await?);
    let (file_name, _) = file_meta(path);

    ctx.session.record(
        OperationKind::Read,
        format!("Analyzing notebook: {file_name}"),
        json!({ "filePath": path, "fileName": file_name, "fileType": "notebook" }),
    );

    let cell_types: Vec<&str> = notebook.cells.iter().map(|c| c.kind.as_str()).collect();
    let has_code = cell_types.contains(&"code");
    let has_markdown = cell_types.contains(&"markdown");
    let metrics = code_metrics(&notebook.code());
    let yes_no = |b: bool| if b { "Yes" } else { "No" };

    let summary = format!(
        "Notebook Analysis for {file_name}:\n \
         - Total cells: {}\n \
         - Cell types: {}\n \
         - Code cells: {}\n \
         - Markdown cells: {}\n \
         - Lines of code: {}\n \
         - Functions: {}\n \
         - Classes: {}\n \
         - Imports: {}\n \
         - Overall complexity: {}/10",
        notebook.cells.len(),
        cell_types.join(", "),
        yes_no(has_code),
        yes_no(has_markdown),
        metrics.lines_of_code,
        metrics.functions,
        metrics.classes,
        metrics.imports,
        metrics.complexity,
    );

    Ok(json!({
        "summary": summary,
        "structure": {
            "totalCells": notebook.cells.len(),
            "cellTypes": cell_types,
            "hasCode": has_code,
            "hasMarkdown": has_markdown,
        },
        "complexity": {
            "linesOfCode": metrics.lines_of_code,
            "functions": metrics.functions,
            "classes": metrics.classes,
            "imports": metrics.imports,
            "overallComplexity": metrics.complexity,
        },
    }))
}
