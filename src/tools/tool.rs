//! Tool trait and the data types exchanged with the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Configuration flag a tool is gated behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGate {
    /// Always available.
    None,
    /// Requires `ALFRED_ALLOW_AUTOMATION`.
    Automation,
    /// Requires `ALFRED_ALLOW_SELF_MODIFY`.
    SelfModify,
}

impl ToolGate {
    /// Environment variable that lifts this gate.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Automation => Some("ALFRED_ALLOW_AUTOMATION"),
            Self::SelfModify => Some("ALFRED_ALLOW_SELF_MODIFY"),
        }
    }
}

/// Which gates are open for this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToolPermissions {
    pub allow_automation: bool,
    pub allow_self_modify: bool,
}

impl ToolPermissions {
    pub fn allows(&self, gate: ToolGate) -> bool {
        match gate {
            ToolGate::None => true,
            ToolGate::Automation => self.allow_automation,
            ToolGate::SelfModify => self.allow_self_modify,
        }
    }
}

/// Description of a tool, as advertised to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
    /// Requires explicit user confirmation before it runs.
    pub sensitive: bool,
    pub gate: ToolGate,
}

/// A request to run a tool, as emitted by the model or typed by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default = "empty_args")]
    pub args: serde_json::Value,
    /// User text that led to this call; used for the follow-up prompt.
    #[serde(default)]
    pub origin: String,
}

fn empty_args() -> serde_json::Value {
    serde_json::json!({})
}

impl ToolCall {
    pub fn new(name: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            args,
            origin: String::new(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }
}

/// A capability the assistant can ask the host to run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON-schema-like description of the arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether the tool must be confirmed by the user before running.
    fn sensitive(&self) -> bool {
        false
    }

    fn gate(&self) -> ToolGate {
        ToolGate::None
    }

    /// Run the tool.
    async fn execute(&self, params: serde_json::Value) -> Result<serde_json::Value, ToolError>;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
            sensitive: self.sensitive(),
            gate: self.gate(),
        }
    }
}

/// Extract a required string parameter.
pub fn require_str<'a>(params: &'a serde_json::Value, name: &str) -> Result<&'a str, ToolError> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidParameters(format!("missing '{name}' parameter")))
}
