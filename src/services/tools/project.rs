//! Project introspection: manifest summary and well-known config files.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value, json};
use tracing::warn;

use super::{OperationKind, ToolContext, ToolError, bool_arg};
use crate::services::workspace::FileKind;

const CONFIG_FILES: [&str; 12] = [
    "tsconfig.json",
    "jsconfig.json",
    "webpack.config.js",
    "vite.config.js",
    "next.config.js",
    "tailwind.config.js",
    "eslint.config.js",
    ".eslintrc.js",
    "prettier.config.js",
    ".prettierrc",
    "babel.config.js",
    "rollup.config.js",
];

fn cargo_key(key: &str) -> &'static Regex {
    static NAME: OnceLock<Regex> = OnceLock::new();
    static VERSION: OnceLock<Regex> = OnceLock::new();
    let (cell, pattern) = if key == "name" {
        (&NAME, r#"(?m)^\s*name\s*=\s*"([^"]+)""#)
    } else {
        (&VERSION, r#"(?m)^\s*version\s*=\s*"([^"]+)""#)
    };
    cell.get_or_init(|| Regex::new(pattern).expect("cargo key pattern is valid"))
}

fn node_info(manifest: &Value, include_dependencies: bool) -> Map<String, Value> {
    let mut info = Map::new();
    info.insert("type".into(), json!("node"));
    let mut fields = vec!["name", "version", "description", "main", "scripts"];
    if include_dependencies {
        fields.extend(["dependencies", "devDependencies", "engines"]);
    }
    for field in fields {
        if let Some(v) = manifest.get(field) {
            info.insert(field.into(), v.clone());
        }
    }
    info
}

/// `[package]` name and version; the first match of each key wins.
fn cargo_info(manifest: &str) -> Map<String, Value> {
    let package = manifest
        .split_once("[package]")
        .map_or(manifest, |(_, rest)| rest.split("\n[").next().unwrap_or(rest));
    let mut info = Map::new();
    info.insert("type".into(), json!("rust"));
    for key in ["name", "version"] {
        if let Some(c) = cargo_key(key).captures(package) {
            info.insert(key.into(), json!(&c[1]));
        }
    }
    info
}

pub(super) async fn get_project_setup_info(ctx: &mut ToolContext<'_>, input: &Value) -> Result<Value, ToolError> {
    let include_dependencies = bool_arg(input, "includeDependencies").unwrap_or(true);
    let include_config = bool_arg(input, "includeConfig").unwrap_or(true);

    ctx.session.record(
        OperationKind::Read,
        "Getting project setup information",
        json!({ "includeDependencies": include_dependencies, "includeConfig": include_config }),
    );

    let root = ctx.workspace.root();
    let mut project_info = Map::new();
    if let Ok(text) = tokio::fs::read_to_string(root.join("package.json")).await {
        match serde_json::from_str::<Value>(&text) {
            Ok(manifest) => project_info = node_info(&manifest, include_dependencies),
            Err(e) => warn!(error = %e, "project: package.json is not valid JSON"),
        }
    } else if let Ok(text) = tokio::fs::read_to_string(root.join("Cargo.toml")).await {
        project_info = cargo_info(&text);
    }

    let mut config_files = Vec::new();
    if include_config {
        for name in CONFIG_FILES {
            if tokio::fs::try_exists(root.join(name)).await.unwrap_or(false) {
                let kind = name.rsplit_once('.').map_or("", |(_, ext)| ext);
                config_files.push(json!({ "name": name, "path": name, "type": kind }));
            }
        }
    }

    let folders: Vec<String> = match ctx.workspace.list(".").await {
        Ok(items) => items
            .into_iter()
            .filter(|i| i.kind == FileKind::Directory)
            .map(|i| i.name)
            .collect(),
        Err(e) => {
            warn!(error = %e, "project: workspace listing failed");
            Vec::new()
        }
    };

    Ok(json!({
        "projectInfo": project_info,
        "configFiles": config_files,
        "workspaceInfo": {
            "root": root.display().to_string(),
            "folders": folders,
        },
    }))
}
