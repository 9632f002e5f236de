//! Tool abstraction for the assistant's external collaborators.

pub mod builtin;
pub mod registry;
pub mod tool;

pub use registry::ToolRegistry;
pub use tool::*;

use std::sync::Arc;

use crate::config::AssistantConfig;
use crate::workspace::Workspace;

/// Build a registry with every built-in tool, gated by `config`.
pub fn builtin_registry(config: &AssistantConfig, workspace: Arc<Workspace>) -> ToolRegistry {
    use builtin::{code, file, screen, style};

    let mut registry = ToolRegistry::new(ToolPermissions {
        allow_automation: config.allow_automation,
        allow_self_modify: config.allow_self_modify,
    });

    registry.register(Arc::new(file::ListFilesTool::new(Arc::clone(&workspace))));
    registry.register(Arc::new(file::ListWorkspaceFilesTool::new(Arc::clone(
        &workspace,
    ))));
    registry.register(Arc::new(file::ReadFileTool::new(Arc::clone(&workspace))));
    registry.register(Arc::new(file::WriteFileTool::new(Arc::clone(&workspace))));
    registry.register(Arc::new(screen::ScreenshotTool::new(
        config.screenshot_command.clone(),
    )));
    registry.register(Arc::new(code::ModifyCodeTool::new(Arc::clone(&workspace))));
    registry.register(Arc::new(code::ApplyUpgradeTool::new(Arc::clone(&workspace))));
    registry.register(Arc::new(style::UpdateUiStyleTool::new(workspace)));

    registry
}
