//! Explicit commands accepted by a chat session.
//!
//! Confirmation is always an explicit command; free text such as "yes" is an
//! ordinary message.

use crate::tools::ToolCall;

/// A tagged input to the chat session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// A normal chat message.
    OrdinaryMessage(String),
    /// Confirm the pending action.
    Confirm,
    /// Cancel the pending action.
    Cancel,
    /// Run a local tool directly (`/tool NAME {json}`).
    RunTool(ToolCall),
    /// Forget the conversation history.
    Reset,
    /// Leave the REPL.
    Quit,
}

impl Command {
    /// Parse a line typed at the REPL.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let lower = trimmed.to_lowercase();

        match lower.as_str() {
            "/confirm" => Self::Confirm,
            "/cancel" => Self::Cancel,
            "/reset" | "/clear" => Self::Reset,
            "/quit" | "/exit" | "exit" | "quit" => Self::Quit,
            _ => parse_tool_command(trimmed)
                .unwrap_or_else(|| Self::OrdinaryMessage(input.to_string())),
        }
    }
}

/// `/tool <name> [json-args]`. Unparseable args become `{}`.
fn parse_tool_command(trimmed: &str) -> Option<Command> {
    let rest = trimmed.strip_prefix("/tool ")?.trim();
    let (name, raw_args) = match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    let args = serde_json::from_str::<serde_json::Value>(raw_args)
        .ok()
        .filter(|v| v.is_object())
        .unwrap_or_else(|| serde_json::json!({}));
    Some(Command::RunTool(ToolCall::new(name, args).with_origin(trimmed)))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn control_commands() {
        assert_eq!(Command::parse("/confirm"), Command::Confirm);
        assert_eq!(Command::parse("  /CANCEL "), Command::Cancel);
        assert_eq!(Command::parse("/clear"), Command::Reset);
        assert_eq!(Command::parse("exit"), Command::Quit);
    }

    #[test]
    fn free_text_is_never_a_confirmation() {
        for text in ["yes", "ok", "confirm", "go ahead", "no"] {
            assert_eq!(
                Command::parse(text),
                Command::OrdinaryMessage(text.to_string())
            );
        }
    }

    #[test]
    fn tool_command_with_args() {
        let cmd = Command::parse(r#"/tool read_file {"path": "Cargo.toml"}"#);
        match cmd {
            Command::RunTool(call) => {
                assert_eq!(call.name, "read_file");
                assert_eq!(call.args, json!({"path": "Cargo.toml"}));
            }
            other => panic!("expected RunTool, got {other:?}"),
        }
    }

    #[test]
    fn tool_command_bad_args_default_to_empty() {
        match Command::parse("/tool list_files not-json") {
            Command::RunTool(call) => {
                assert_eq!(call.name, "list_files");
                assert_eq!(call.args, json!({}));
            }
            other => panic!("expected RunTool, got {other:?}"),
        }
        assert!(matches!(
            Command::parse("/tool list_workspace_files"),
            Command::RunTool(_)
        ));
    }

    #[test]
    fn bare_tool_prefix_is_a_message() {
        assert_eq!(
            Command::parse("/tool "),
            Command::OrdinaryMessage("/tool ".into())
        );
    }
}
