//! Tool registry for managing available tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolCall, ToolPermissions, ToolSpec};

/// Registry of available tools, with the gates open for this process.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
    permissions: ToolPermissions,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn new(permissions: ToolPermissions) -> Self {
        Self {
            tools: BTreeMap::new(),
            permissions,
        }
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Replaced existing tool registration");
        } else {
            tracing::debug!("Registered tool: {}", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Tool names in sorted order.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    pub fn permissions(&self) -> ToolPermissions {
        self.permissions
    }

    /// Specs for every registered tool, sorted by name.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Execute a tool by name, enforcing its gate.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound {
            name: name.to_string(),
        })?;

        let gate = tool.gate();
        if !self.permissions.allows(gate) {
            return Err(ToolError::Disabled {
                name: name.to_string(),
                reason: format!("Set {}=1 to enable", gate.env_var().unwrap_or_default()),
            });
        }

        let args = if args.is_null() { serde_json::json!({}) } else { args };
        tool.execute(args).await
    }

    /// Run a tool call and always produce a JSON result.
    ///
    /// Failures become `{"error": <kind>, "message": <text>}`.
    pub async fn run(&self, call: &ToolCall) -> Value {
        match self.execute(&call.name, call.args.clone()).await {
            Ok(result) => {
                tracing::info!(tool = %call.name, "Tool completed");
                result
            }
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "Tool failed");
                serde_json::json!({
                    "error": e.kind(),
                    "message": e.to_string(),
                })
            }
        }
    }
}
