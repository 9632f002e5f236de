//! File-backed workspace the file and self-modification tools are confined to.
//!
//! Every path handed to the workspace is relative to its root (absolute paths
//! are accepted only if they already live under it). Resolution is lexical
//! first, then checked against the canonical root, so a path through a
//! not-yet-existing directory cannot escape with `..`.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use walkdir::WalkDir;

use crate::error::ToolError;

/// Maximum directory listing entries.
const MAX_DIR_ENTRIES: usize = 500;

/// Maximum entries in a recursive listing.
const MAX_TREE_ENTRIES: usize = 5_000;

/// Directories skipped by recursive listings.
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// An entry in a directory listing.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    /// File size in bytes, `None` for directories.
    pub size: Option<u64>,
}

/// Direct children of a directory, capped at `MAX_DIR_ENTRIES`.
#[derive(Debug, Clone, Serialize)]
pub struct DirListing {
    pub entries: Vec<FileEntry>,
    /// True when entries past the cap were dropped.
    pub truncated: bool,
}

/// An entry in a recursive workspace listing.
#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    /// Path relative to the workspace root, `/`-separated.
    pub path: String,
    pub is_dir: bool,
}

/// Normalize a path by resolving `.` and `..` lexically (no filesystem access).
fn normalize_lexical(path: &Path) -> PathBuf {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                if components
                    .last()
                    .is_some_and(|c| matches!(c, Component::Normal(_)))
                {
                    components.pop();
                }
            }
            Component::CurDir => {}
            other => components.push(other),
        }
    }
    components.iter().collect()
}

/// Canonicalize the longest existing ancestor of `path` and re-append the rest.
fn canonicalize_existing_prefix(path: &Path) -> PathBuf {
    let mut ancestor = path;
    let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
    loop {
        if let Ok(canonical) = ancestor.canonicalize() {
            return tail
                .into_iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        if let Some(name) = ancestor.file_name() {
            tail.push(name);
        }
        match ancestor.parent() {
            Some(parent) if parent != ancestor => ancestor = parent,
            _ => return path.to_path_buf(),
        }
    }
}

/// A directory tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = root
            .canonicalize()
            .unwrap_or_else(|_| normalize_lexical(&root));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` inside the workspace, rejecting anything that escapes it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            normalize_lexical(requested)
        } else {
            normalize_lexical(&self.root.join(requested))
        };

        let checked = canonicalize_existing_prefix(&joined);
        if !checked.starts_with(&self.root) {
            return Err(ToolError::NotAuthorized(format!(
                "path outside workspace: {path}"
            )));
        }
        Ok(checked)
    }

    /// List the direct children of `path`, sorted by name.
    pub async fn list_dir(&self, path: &str) -> Result<DirListing, ToolError> {
        self.list_dir_limited(path, MAX_DIR_ENTRIES).await
    }

    async fn list_dir_limited(&self, path: &str, limit: usize) -> Result<DirListing, ToolError> {
        let dir = self.resolve(path)?;
        let mut reader = fs::read_dir(&dir)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Cannot list {path}: {e}")))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            entries.push(FileEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                size: meta.is_file().then(|| meta.len()),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let truncated = entries.len() > limit;
        entries.truncate(limit);
        Ok(DirListing { entries, truncated })
    }

    /// Recursive listing of the whole workspace, sorted by path.
    ///
    /// Build and VCS directories are skipped.
    pub async fn list_tree(&self) -> Result<Vec<TreeEntry>, ToolError> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .min_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| {
                    !(e.file_type().is_dir()
                        && e.file_name()
                            .to_str()
                            .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
                })
                .filter_map(Result::ok)
                .take(MAX_TREE_ENTRIES)
                .filter_map(|e| {
                    let relative = e.path().strip_prefix(&root).ok()?;
                    let path = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    Some(TreeEntry {
                        path,
                        is_dir: e.file_type().is_dir(),
                    })
                })
                .collect()
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("listing task failed: {e}")))
    }

    /// Read raw bytes of a workspace file no larger than `max_size` bytes.
    ///
    /// The size is checked before anything is read.
    pub async fn read_bytes(
        &self,
        path: &str,
        max_size: u64,
    ) -> Result<(PathBuf, Vec<u8>), ToolError> {
        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full)
            .await
            .map_err(|_| ToolError::ExecutionFailed(format!("not found: {path}")))?;
        if !metadata.is_file() {
            return Err(ToolError::ExecutionFailed(format!("not found: {path}")));
        }
        if metadata.len() > max_size {
            return Err(ToolError::ExecutionFailed(format!(
                "File too large ({} bytes). Maximum is {} bytes.",
                metadata.len(),
                max_size
            )));
        }
        let data = fs::read(&full)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read {path}: {e}")))?;
        Ok((full, data))
    }

    /// Write (overwrite) a workspace file, creating parent directories.
    pub async fn write(&self, path: &str, content: &str) -> Result<PathBuf, ToolError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                ToolError::ExecutionFailed(format!("Failed to create directories: {e}"))
            })?;
        }
        fs::write(&full, content)
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to write {path}: {e}")))?;
        Ok(full)
    }
}
