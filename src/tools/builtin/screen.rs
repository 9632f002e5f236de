//! Screenshot capture through an external command.
//!
//! The capture command writes a PNG to stdout. It comes from
//! `ALFRED_SCREENSHOT_CMD`, or a platform default (`screencapture` on macOS,
//! `grim` under Wayland, ImageMagick `import` under X11).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use tokio::process::Command;

use crate::error::ToolError;
use crate::tools::tool::{Tool, ToolGate};

/// Capture command timeout.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest screenshot accepted (32MB).
const MAX_CAPTURE_SIZE: usize = 32 * 1024 * 1024;

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Platform default capture command, if there is one.
fn default_command() -> Option<String> {
    if cfg!(target_os = "macos") {
        Some("screencapture -x -t png /dev/stdout".to_string())
    } else if cfg!(unix) {
        if std::env::var_os("WAYLAND_DISPLAY").is_some() {
            Some("grim -".to_string())
        } else {
            Some("import -window root png:-".to_string())
        }
    } else {
        None
    }
}

/// Capture the screen and return it base64-encoded.
pub struct ScreenshotTool {
    command: Option<String>,
}

impl ScreenshotTool {
    /// `command` overrides the platform default.
    pub fn new(command: Option<String>) -> Self {
        Self {
            command: command.or_else(default_command),
        }
    }

    async fn capture(&self) -> Result<Vec<u8>, ToolError> {
        let cmd = self.command.as_deref().ok_or_else(|| {
            ToolError::ExecutionFailed(
                "No screenshot command available on this platform; set ALFRED_SCREENSHOT_CMD"
                    .into(),
            )
        })?;

        tracing::debug!(command = %cmd, "Capturing screenshot");

        let child = Command::new("sh")
            .args(["-c", cmd])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("Failed to spawn capture: {e}")))?;

        let output = tokio::time::timeout(CAPTURE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| {
                ToolError::ExecutionFailed(format!(
                    "Screenshot command timed out after {CAPTURE_TIMEOUT:?}"
                ))
            })?
            .map_err(|e| ToolError::ExecutionFailed(format!("Capture failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::ExecutionFailed(format!(
                "Screenshot command exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        if !output.stdout.starts_with(PNG_SIGNATURE) {
            return Err(ToolError::ExecutionFailed(
                "Screenshot command did not produce a PNG".into(),
            ));
        }
        if output.stdout.len() > MAX_CAPTURE_SIZE {
            return Err(ToolError::ExecutionFailed(format!(
                "Screenshot too large ({} bytes)",
                output.stdout.len()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Tool for ScreenshotTool {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn description(&self) -> &str {
        "Capture the full screen and return it as a base64-encoded PNG for vision analysis."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    fn gate(&self) -> ToolGate {
        ToolGate::Automation
    }

    async fn execute(&self, _params: Value) -> Result<Value, ToolError> {
        let png = self.capture().await?;
        Ok(json!({
            "image_base64": BASE64.encode(&png),
            "size": png.len(),
        }))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_png_from_command() {
        let tool = ScreenshotTool::new(Some(r"printf '\211PNG\r\n\032\nDATA'".into()));
        let out = tool.execute(json!({})).await.unwrap();

        let decoded = BASE64
            .decode(out["image_base64"].as_str().unwrap())
            .unwrap();
        assert!(decoded.starts_with(PNG_SIGNATURE));
        assert!(decoded.ends_with(b"DATA"));
        assert_eq!(out["size"], 12);
    }

    #[tokio::test]
    async fn non_png_output_rejected() {
        let tool = ScreenshotTool::new(Some("echo hello".into()));
        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(err.to_string().contains("PNG"));
    }

    #[tokio::test]
    async fn failing_command_reports_status() {
        let tool = ScreenshotTool::new(Some("echo nope >&2; exit 3".into()));
        let err = tool.execute(json!({})).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("nope"), "{msg}");
    }

    #[test]
    fn gated_behind_automation() {
        assert_eq!(ScreenshotTool::new(None).gate(), ToolGate::Automation);
    }
}
