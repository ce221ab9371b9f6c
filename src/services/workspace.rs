//! Workspace file service: sandboxed file access under `WORKSPACE_PATH`.
//!
//! DESIGN
//! ======
//! Every path from a client or the agent goes through [`Workspace::resolve`],
//! which normalises `.`/`..` lexically and refuses anything that lands
//! outside the canonical root. The deepest part of the path that already
//! exists is then canonicalised too, so a symlink inside the workspace that
//! points outside it is refused as well. A link swapped in between the check
//! and the file operation is not caught.

use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Access denied: Path outside workspace")]
    AccessDenied,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl WorkspaceError {
    fn io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_string())
        } else {
            Self::Io { path: path.to_string(), source }
        }
    }
}

/// Entry returned by directory listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileItem {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Directory,
    File,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// `root` should already be canonical (see `ServerConfig`).
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a client path onto the workspace.
    ///
    /// Relative paths are joined onto the root; absolute paths are accepted
    /// only if they already point inside it.
    ///
    /// # Errors
    ///
    /// [`WorkspaceError::AccessDenied`] when the normalised path escapes the
    /// root, lexically or through a symlink.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let joined = self.root.join(path);
        let normalised = normalise(&joined);
        if !normalised.starts_with(&self.root) {
            return Err(WorkspaceError::AccessDenied);
        }
        match existing_prefix(&normalised) {
            Some(real) if !real.starts_with(&self.root) => Err(WorkspaceError::AccessDenied),
            _ => Ok(normalised),
        }
    }

    /// Path relative to the root, `/`-separated, for reporting back to clients.
    #[must_use]
    pub fn relative(&self, full: &Path) -> String {
        full.strip_prefix(&self.root)
            .unwrap_or(full)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Non-recursive listing of `dir`. Hidden entries are skipped;
    /// directories sort before files, then by name.
    ///
    /// # Errors
    ///
    /// Access denied, missing directory, or I/O failure.
    pub async fn list(&self, dir: &str) -> Result<Vec<FileItem>, WorkspaceError> {
        let full = self.resolve(dir)?;
        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| WorkspaceError::io(dir, e))?;

        let mut items = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| WorkspaceError::io(dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let Ok(meta) = tokio::fs::metadata(entry.path()).await else {
                continue;
            };
            let kind = if meta.is_dir() { FileKind::Directory } else { FileKind::File };
            let modified = meta
                .modified()
                .ok()
                .and_then(|t| OffsetDateTime::from(t).format(&Rfc3339).ok());
            items.push(FileItem {
                path: self.relative(&entry.path()),
                name,
                kind,
                size: Some(meta.len()),
                modified,
            });
        }

        items.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    /// # Errors
    ///
    /// Access denied, missing file, non-UTF-8 content, or I/O failure.
    pub async fn read(&self, path: &str) -> Result<String, WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| WorkspaceError::io(path, e))
    }

    /// Write `content`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Access denied or I/O failure.
    pub async fn write(&self, path: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WorkspaceError::io(path, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| WorkspaceError::io(path, e))?;
        Ok(full)
    }

    /// # Errors
    ///
    /// Access denied, missing file, or I/O failure.
    pub async fn delete(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(&full)
            .await
            .map_err(|e| WorkspaceError::io(path, e))
    }

    /// Recursive `mkdir -p`.
    ///
    /// # Errors
    ///
    /// Access denied or I/O failure.
    pub async fn create_dir(&self, path: &str) -> Result<(), WorkspaceError> {
        let full = self.resolve(path)?;
        tokio::fs::create_dir_all(&full)
            .await
            .map_err(|e| WorkspaceError::io(path, e))
    }
}

/// Lexical normalisation: drops `.`, pops on `..`. Never touches the filesystem.
/// Real location of the deepest ancestor of `path` that exists on disk. A
/// dangling symlink is judged by where it points.
fn existing_prefix(path: &Path) -> Option<PathBuf> {
    for ancestor in path.ancestors() {
        if let Ok(real) = std::fs::canonicalize(ancestor) {
            return Some(real);
        }
        if ancestor.symlink_metadata().is_ok_and(|m| m.file_type().is_symlink()) {
            let target = std::fs::read_link(ancestor).ok()?;
            let parent = ancestor.parent()?;
            let parent = std::fs::canonicalize(parent).unwrap_or_else(|_| parent.to_path_buf());
            return Some(normalise(&parent.join(target)));
        }
    }
    None
}

fn normalise(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
#[path = "workspace_test.rs"]
mod tests;
