//! Error types for Alfred.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Remote inference errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network failure, non-2xx status, or timeout.
    #[error("Inference endpoint unavailable{}: {reason}", status_suffix(.status))]
    Unavailable { status: Option<u16>, reason: String },

    /// The endpoint answered, but without the expected text field.
    #[error("Malformed response from inference endpoint: {reason}")]
    MalformedResponse { reason: String },

    #[error("No API key configured; set GOOGLE_API_KEY")]
    MissingCredential,
}

impl ApiError {
    pub(crate) fn timeout(after: Duration) -> Self {
        Self::Unavailable {
            status: None,
            reason: format!("request timed out after {after:?}"),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// Pending-action state machine errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("An action is already awaiting confirmation: {description}")]
    ActionAlreadyPending { description: String },

    #[error("No pending action")]
    NoPendingAction,
}

/// Tool execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {name} not found")]
    NotFound { name: String },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Tool {name} is disabled: {reason}")]
    Disabled { name: String, reason: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

impl ToolError {
    /// Short machine-readable kind, used as the `error` field of tool results.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "unknown_tool",
            Self::InvalidParameters(_) => "bad_arguments",
            Self::NotAuthorized(_) => "not_authorized",
            Self::Disabled { .. } => "disabled",
            Self::ExecutionFailed(_) => "execution_failed",
        }
    }
}
