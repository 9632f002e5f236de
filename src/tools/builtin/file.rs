//! Workspace file tools: listing, reading, and writing.
//!
//! All paths are resolved through [`Workspace`], so nothing outside the
//! workspace root is reachable.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tools::tool::{Tool, require_str};
use crate::workspace::Workspace;

/// Maximum file size for reading (1MB).
const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Maximum file size for writing (5MB).
const MAX_WRITE_SIZE: usize = 5 * 1024 * 1024;

// ── ListFilesTool ───────────────────────────────────────────────────

/// List the direct children of a workspace directory.
pub struct ListFilesTool {
    workspace: Arc<Workspace>,
}

impl ListFilesTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories under a workspace path."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory relative to the workspace (default '.')"}
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let path = params.get("path").and_then(Value::as_str).unwrap_or(".");
        let dir = self.workspace.resolve(path)?;
        let listing = self.workspace.list_dir(path).await?;
        Ok(json!({
            "path": dir.display().to_string(),
            "entries": listing.entries,
            "truncated": listing.truncated,
        }))
    }
}

// ── ListWorkspaceFilesTool ──────────────────────────────────────────

/// Recursive listing of the whole workspace.
pub struct ListWorkspaceFilesTool {
    workspace: Arc<Workspace>,
}

impl ListWorkspaceFilesTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ListWorkspaceFilesTool {
    fn name(&self) -> &str {
        "list_workspace_files"
    }

    fn description(&self) -> &str {
        "List all files in the configured workspace (recursive)."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _params: Value) -> Result<Value, ToolError> {
        let files = self.workspace.list_tree().await?;
        Ok(json!({ "files": files }))
    }
}

// ── ReadFileTool ────────────────────────────────────────────────────

/// Read a workspace file as text, or base64 when it is not UTF-8.
pub struct ReadFileTool {
    workspace: Arc<Workspace>,
}

impl ReadFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file under the workspace and return its contents (text or base64)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "as_base64": {"type": "boolean"}
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let path = require_str(&params, "path")?;
        let as_base64 = params
            .get("as_base64")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let (full, data) = self.workspace.read_bytes(path, MAX_READ_SIZE).await?;

        let path = full.display().to_string();
        let data = if as_base64 {
            data
        } else {
            match String::from_utf8(data) {
                Ok(text) => return Ok(json!({ "content": text, "path": path })),
                Err(e) => e.into_bytes(),
            }
        };
        Ok(json!({ "content_base64": BASE64.encode(&data), "path": path }))
    }
}

// ── WriteFileTool ───────────────────────────────────────────────────

/// Write text to a workspace file.
pub struct WriteFileTool {
    workspace: Arc<Workspace>,
}

impl WriteFileTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text content to a file under the workspace. Overwrites by default."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string"},
                "content": {"type": "string"},
                "overwrite": {"type": "boolean"}
            },
            "required": ["path", "content"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let path = require_str(&params, "path")?;
        let content = require_str(&params, "content")?;
        let overwrite = params
            .get("overwrite")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        if content.len() > MAX_WRITE_SIZE {
            return Err(ToolError::InvalidParameters(format!(
                "Content too large ({} bytes). Maximum is {} bytes.",
                content.len(),
                MAX_WRITE_SIZE
            )));
        }

        let target = self.workspace.resolve(path)?;
        if !overwrite && target.exists() {
            return Ok(json!({ "error": "exists", "path": target.display().to_string() }));
        }

        let full = self.workspace.write(path, content).await?;
        Ok(json!({
            "status": "written",
            "path": full.display().to_string(),
            "size": content.len(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn workspace(dir: &TempDir) -> Arc<Workspace> {
        Arc::new(Workspace::new(dir.path()))
    }

    #[tokio::test]
    async fn test_read_text_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "line 1\nline 2\n").unwrap();
        let tool = ReadFileTool::new(workspace(&dir));

        let out = tool.execute(json!({"path": "notes.txt"})).await.unwrap();
        assert_eq!(out["content"], "line 1\nline 2\n");
        assert!(out.get("content_base64").is_none());
    }

    #[tokio::test]
    async fn test_read_binary_file_as_base64() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0xff, 0xfe, 0x00]).unwrap();
        let tool = ReadFileTool::new(workspace(&dir));

        let out = tool.execute(json!({"path": "blob.bin"})).await.unwrap();
        assert_eq!(out["content_base64"], BASE64.encode([0xff, 0xfe, 0x00]));

        std::fs::write(dir.path().join("t.txt"), "hi").unwrap();
        let out = tool
            .execute(json!({"path": "t.txt", "as_base64": true}))
            .await
            .unwrap();
        assert_eq!(out["content_base64"], "aGk=");
    }

    #[tokio::test]
    async fn test_read_outside_workspace_rejected() {
        let dir = TempDir::new().unwrap();
        let tool = ReadFileTool::new(workspace(&dir));

        let err = tool
            .execute(json!({"path": "../../etc/passwd"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn test_write_file_respects_overwrite() {
        let dir = TempDir::new().unwrap();
        let tool = WriteFileTool::new(workspace(&dir));

        let out = tool
            .execute(json!({"path": "out/a.txt", "content": "first"}))
            .await
            .unwrap();
        assert_eq!(out["status"], "written");

        let out = tool
            .execute(json!({"path": "out/a.txt", "content": "second", "overwrite": false}))
            .await
            .unwrap();
        assert_eq!(out["error"], "exists");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("out/a.txt")).unwrap(),
            "first"
        );
    }

    #[tokio::test]
    async fn test_list_files_and_tree() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        std::fs::write(dir.path().join("README.md"), "# hi").unwrap();
        let ws = workspace(&dir);

        let out = ListFilesTool::new(Arc::clone(&ws))
            .execute(json!({}))
            .await
            .unwrap();
        let names: Vec<&str> = out["entries"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["README.md", "src"]);
        assert_eq!(out["truncated"], false);

        let out = ListWorkspaceFilesTool::new(ws).execute(json!({})).await.unwrap();
        let paths: Vec<&str> = out["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["README.md", "src", "src/main.rs"]);
    }

    #[test]
    fn write_is_sensitive_read_is_not() {
        let dir = TempDir::new().unwrap();
        assert!(WriteFileTool::new(workspace(&dir)).sensitive());
        assert!(!ReadFileTool::new(workspace(&dir)).sensitive());
    }
}
