//! UI style tool: writes `ui_style.json` in the workspace. The server exposes
//! it at `/ui_style.json` and the web page applies it on load.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::ToolError;
use crate::tools::tool::Tool;
use crate::workspace::Workspace;

pub const UI_STYLE_FILE: &str = "ui_style.json";

pub struct UpdateUiStyleTool {
    workspace: Arc<Workspace>,
}

impl UpdateUiStyleTool {
    pub fn new(workspace: Arc<Workspace>) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for UpdateUiStyleTool {
    fn name(&self) -> &str {
        "update_ui_style"
    }

    fn description(&self) -> &str {
        "Update the chat UI style (colors, sizes) by writing ui_style.json in the workspace."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "bar_color": {"type": "string"},
                "accent": {"type": "string"}
            },
            "required": []
        })
    }

    async fn execute(&self, params: Value) -> Result<Value, ToolError> {
        if !params.is_object() {
            return Err(ToolError::InvalidParameters(
                "style must be a JSON object".into(),
            ));
        }
        let content = serde_json::to_string_pretty(&params)
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        let full = self.workspace.write(UI_STYLE_FILE, &content).await?;
        Ok(json!({ "status": "written", "path": full.display().to_string() }))
    }
}
