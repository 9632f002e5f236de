//! Self-modification tools.
//!
//! Both are sensitive (they always go through confirmation) and gated behind
//! `ALFRED_ALLOW_SELF_MODIFY`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolGate, require_str};
use crate::workspace::Workspace;

/// Front-end files `apply_upgrade` may overwrite. The server serves the
/// workspace `static/` dir, and prefers `static/index.html` over its built-in page.
pub const UPGRADE_ALLOWLIST: &[&str] = &["static/index.html", "static/app.js", "static/style.css"];

// ── ModifyCodeTool ──────────────────────────────────────────────────

/// Overwrite a Rust source file inside the workspace.
pub struct ModifyCodeTool {
    workspace: Arc<Workspace>,
}

impl ModifyCodeTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ModifyCodeTool {
    fn name(&self) -> &str {
        "modify_code"
    }

    fn description(&self) -> &str {
        "Overwrite a Rust source file in the workspace to modify Alfred's code. \
         Requires ALFRED_ALLOW_SELF_MODIFY=1."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string"},
                "new_content": {"type": "string"}
            },
            "required": ["filename", "new_content"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    fn gate(&self) -> ToolGate {
        ToolGate::SelfModify
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let filename = require_str(&params, "filename")?;
        let new_content = require_str(&params, "new_content")?;

        if Path::new(filename).extension().and_then(|e| e.to_str()) != Some("rs") {
            return Err(ToolError::InvalidParameters(
                "Only .rs files can be modified".into(),
            ));
        }

        let full = self.workspace.write(filename, new_content).await?;
        tracing::info!(path = %full.display(), "Source file rewritten");
        Ok(json!({ "status": "written", "path": full.display().to_string() }))
    }
}

// ── ApplyUpgradeTool ────────────────────────────────────────────────

/// Overwrite one of the allowlisted front-end files.
pub struct ApplyUpgradeTool {
    workspace: Arc<Workspace>,
}

impl ApplyUpgradeTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for ApplyUpgradeTool {
    fn name(&self) -> &str {
        "apply_upgrade"
    }

    fn description(&self) -> &str {
        "Apply an upgrade by overwriting an allowed front-end file. \
         Requires ALFRED_ALLOW_SELF_MODIFY=1."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_file": {"type": "string", "enum": UPGRADE_ALLOWLIST},
                "code_snippet": {"type": "string"}
            },
            "required": ["target_file", "code_snippet"]
        })
    }

    fn sensitive(&self) -> bool {
        true
    }

    fn gate(&self) -> ToolGate {
        ToolGate::SelfModify
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        let target = require_str(&params, "target_file")?;
        let snippet = require_str(&params, "code_snippet")?;

        if !UPGRADE_ALLOWLIST.contains(&target) {
            return Err(ToolError::NotAuthorized(format!(
                "target not allowed: {target} (allowed: {})",
                UPGRADE_ALLOWLIST.join(", ")
            )));
        }

        let full = self.workspace.write(target, snippet).await?;
        tracing::info!(path = %full.display(), "Upgrade applied");
        Ok(json!({ "status": "applied", "path": full.display().to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn modify_code_only_rust_files() {
        let dir = TempDir::new().unwrap();
        let tool = ModifyCodeTool::new(Arc::new(Workspace::new(dir.path())));

        let out = tool
            .execute(json!({"filename": "src/extra.rs", "new_content": "pub fn x() {}"}))
            .await
            .unwrap();
        assert_eq!(out["status"], "written");
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/extra.rs")).unwrap(),
            "pub fn x() {}"
        );

        let err = tool
            .execute(json!({"filename": "run.sh", "new_content": "rm -rf ~"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[tokio::test]
    async fn modify_code_cannot_escape_workspace() {
        let dir = TempDir::new().unwrap();
        let tool = ModifyCodeTool::new(Arc::new(Workspace::new(dir.path())));

        let err = tool
            .execute(json!({"filename": "../evil.rs", "new_content": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAuthorized(_)));
    }

    #[tokio::test]
    async fn apply_upgrade_enforces_allowlist() {
        let dir = TempDir::new().unwrap();
        let tool = ApplyUpgradeTool::new(Arc::new(Workspace::new(dir.path())));

        let out = tool
            .execute(json!({"target_file": "static/style.css", "code_snippet": "body{}"}))
            .await
            .unwrap();
        assert_eq!(out["status"], "applied");

        let err = tool
            .execute(json!({"target_file": "src/main.rs", "code_snippet": ""}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAuthorized(_)));
    }

    #[test]
    fn both_tools_are_sensitive_and_gated() {
        let dir = TempDir::new().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        let modify = ModifyCodeTool::new(Arc::clone(&ws));
        let upgrade = ApplyUpgradeTool::new(ws);
        assert!(modify.sensitive() && upgrade.sensitive());
        assert_eq!(modify.gate(), ToolGate::SelfModify);
        assert_eq!(upgrade.gate(), ToolGate::SelfModify);
    }
}
