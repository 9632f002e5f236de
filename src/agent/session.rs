//! A chat session: the orchestrator plus the tools it may ask for.
//!
//! The session is the only place tools are executed. It drives a reply's
//! `NextStep` to completion and turns confirm/cancel commands into tool runs.

use std::sync::Arc;

use super::orchestrator::{NextStep, Orchestrator, Reply, ReplySource};
use super::submission::Command;
use crate::config::AssistantConfig;
use crate::error::ApiError;
use crate::llm::create_client;
use crate::tools::{ToolCall, ToolRegistry, builtin_registry};
use crate::workspace::Workspace;

/// Outcome of a submitted command.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Reply(Reply),
    Quit,
}

pub struct ChatSession {
    orchestrator: Orchestrator,
    tools: Arc<ToolRegistry>,
}

impl ChatSession {
    /// Build a session. The registry's tool specs are advertised to the model.
    pub fn new(orchestrator: Orchestrator, tools: Arc<ToolRegistry>) -> Self {
        let orchestrator = orchestrator.with_tools(tools.specs());
        Self {
            orchestrator,
            tools,
        }
    }

    /// Wire the remote client, workspace, and built-in tools from `config`.
    pub fn from_config(config: AssistantConfig) -> Result<(Self, Arc<Workspace>), ApiError> {
        let client = create_client(&config)?;
        let workspace = Arc::new(Workspace::new(&config.workspace_root));
        let tools = Arc::new(builtin_registry(&config, Arc::clone(&workspace)));
        tracing::info!(
            workspace = %workspace.root().display(),
            tools = tools.count(),
            "Chat session ready"
        );
        Ok((Self::new(Orchestrator::new(config, client), tools), workspace))
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator {
        &mut self.orchestrator
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Dispatch a parsed command.
    pub async fn submit(&mut self, command: Command) -> SessionOutcome {
        let reply = match command {
            Command::OrdinaryMessage(text) => self.message(&text).await,
            Command::Confirm => self.confirm().await,
            Command::Cancel => self.cancel(),
            Command::RunTool(call) => self.run_tool(call).await,
            Command::Reset => {
                self.orchestrator.reset_conversation();
                Reply::local("Conversation cleared.")
            }
            Command::Quit => return SessionOutcome::Quit,
        };
        SessionOutcome::Reply(reply)
    }

    /// Send an ordinary message. Non-sensitive tool calls run immediately.
    pub async fn message(&mut self, text: &str) -> Reply {
        let reply = self.orchestrator.handle_message(text).await;
        if let NextStep::RunTool(call) = reply.next {
            return self.execute_and_follow_up(call).await;
        }
        reply
    }

    /// Run the pending action, then let the model summarise the result.
    pub async fn confirm(&mut self) -> Reply {
        match self.orchestrator.confirm() {
            Ok(call) => self.execute_and_follow_up(call).await,
            Err(_) => Reply::local("No pending action to confirm."),
        }
    }

    pub fn cancel(&mut self) -> Reply {
        match self.orchestrator.cancel() {
            Ok(()) => Reply::local("Pending action cancelled."),
            Err(_) => Reply::local("No pending action to cancel."),
        }
    }

    /// Run a tool the user asked for directly. Sensitive tools still need confirmation.
    pub async fn run_tool(&mut self, call: ToolCall) -> Reply {
        let Some(tool) = self.tools.get(&call.name) else {
            return Reply::local(format!(
                "Unknown tool '{}'. Available: {}",
                call.name,
                self.tools.list().join(", ")
            ));
        };

        let gate = tool.gate();
        if !self.tools.permissions().allows(gate) {
            tracing::info!(tool = %call.name, "Refused gated tool command");
            return Reply::local(format!(
                "'{}' is disabled. Set {}=1 to enable it.",
                call.name,
                gate.env_var().unwrap_or_default()
            ));
        }

        if tool.sensitive() {
            let description = format!("run '{}' with args {}", call.name, call.args);
            return match self.orchestrator.propose_action(description.clone(), call) {
                Ok(()) => Reply {
                    text: format!(
                        "Alfred wants to {description}.\nConfirm to proceed or cancel to abort."
                    ),
                    source: ReplySource::Local,
                    next: NextStep::AwaitingConfirmation,
                },
                Err(e) => Reply::local(format!("{e}. Confirm or cancel it first.")),
            };
        }

        let result = self.tools.run(&call).await;
        let summary = self.orchestrator.record_tool_exchange(&call, &result);
        Reply::local(summary)
    }

    async fn execute_and_follow_up(&mut self, call: ToolCall) -> Reply {
        tracing::info!(tool = %call.name, "Running tool");
        let result = self.tools.run(&call).await;
        self.orchestrator.complete_tool(&call, &result).await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::agent::pending::TurnState;
    use crate::config::AssistantConfig;
    use crate::error::{ApiError, ToolError};
    use crate::llm::{InferenceClient, fallback};
    use crate::tools::{Tool, ToolPermissions};

    struct ScriptedClient {
        replies: Mutex<VecDeque<String>>,
    }

    impl ScriptedClient {
        fn with(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|s| s.to_string()).collect()),
            })
        }
    }

    #[async_trait]
    impl InferenceClient for ScriptedClient {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn ask(&self, _prompt: &str) -> Result<String, ApiError> {
            Ok(self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "done".into()))
        }
        async fn analyze_image(&self, _prompt: &str, _image: &str) -> Result<String, ApiError> {
            Ok("image".into())
        }
    }

    /// Records every invocation so tests can assert on execution.
    struct CountingTool {
        name: &'static str,
        sensitive: bool,
        runs: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "counts"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        fn sensitive(&self) -> bool {
            self.sensitive
        }
        async fn execute(&self, params: Value) -> Result<Value, ToolError> {
            self.runs.lock().unwrap().push(params);
            Ok(json!({"ok": true}))
        }
    }

    struct Harness {
        session: ChatSession,
        safe_runs: Arc<Mutex<Vec<Value>>>,
        risky_runs: Arc<Mutex<Vec<Value>>>,
    }

    fn harness(config: AssistantConfig, client: Arc<dyn InferenceClient>) -> Harness {
        let safe_runs = Arc::new(Mutex::new(Vec::new()));
        let risky_runs = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ToolRegistry::new(ToolPermissions::default());
        registry.register(Arc::new(CountingTool {
            name: "peek",
            sensitive: false,
            runs: Arc::clone(&safe_runs),
        }));
        registry.register(Arc::new(CountingTool {
            name: "erase",
            sensitive: true,
            runs: Arc::clone(&risky_runs),
        }));
        let orchestrator = Orchestrator::new(config, client);
        Harness {
            session: ChatSession::new(orchestrator, Arc::new(registry)),
            safe_runs,
            risky_runs,
        }
    }

    fn keyed() -> AssistantConfig {
        AssistantConfig {
            api_key: Some(SecretString::from("k")),
            ..AssistantConfig::default()
        }
    }

    fn reply_of(outcome: SessionOutcome) -> Reply {
        match outcome {
            SessionOutcome::Reply(r) => r,
            SessionOutcome::Quit => panic!("unexpected quit"),
        }
    }

    #[tokio::test]
    async fn non_sensitive_tool_runs_and_follows_up() {
        let client = ScriptedClient::with(&[
            r#"{"tool_call": {"name": "peek", "args": {"x": 1}}}"#,
            "Here is what I found.",
        ]);
        let mut h = harness(keyed(), client);

        let reply = h.session.message("look").await;

        assert_eq!(reply.text, "Here is what I found.");
        assert_eq!(h.safe_runs.lock().unwrap().as_slice(), &[json!({"x": 1})]);
    }

    #[tokio::test]
    async fn sensitive_tool_waits_for_confirm() {
        let client = ScriptedClient::with(&[
            r#"{"tool_call": {"name": "erase", "args": {"all": true}}}"#,
            "Noted.",
            "Erased.",
        ]);
        let mut h = harness(keyed(), client);

        let reply = h.session.message("erase everything").await;
        assert_eq!(reply.next, NextStep::AwaitingConfirmation);
        assert!(h.risky_runs.lock().unwrap().is_empty());

        // Free text is not a confirmation.
        let reply = reply_of(h.session.submit(Command::parse("yes")).await);
        assert_eq!(reply.text, "Noted.");
        assert!(h.risky_runs.lock().unwrap().is_empty());
        assert_eq!(
            h.session.orchestrator().state(),
            TurnState::AwaitingConfirmation
        );

        let reply = reply_of(h.session.submit(Command::Confirm).await);
        assert_eq!(h.risky_runs.lock().unwrap().len(), 1);
        assert_eq!(h.session.orchestrator().state(), TurnState::Idle);
        assert_eq!(reply.text, "Erased.");
        assert_eq!(reply.source, ReplySource::Remote);
    }

    #[tokio::test]
    async fn cancel_never_runs_tool() {
        let client = ScriptedClient::with(&[r#"{"tool_call": {"name": "erase", "args": {}}}"#]);
        let mut h = harness(keyed(), client);

        h.session.message("erase").await;
        let reply = h.session.cancel();

        assert_eq!(reply.text, "Pending action cancelled.");
        assert!(h.risky_runs.lock().unwrap().is_empty());
        assert_eq!(h.session.orchestrator().state(), TurnState::Idle);
    }

    #[tokio::test]
    async fn confirm_and_cancel_when_idle() {
        let mut h = harness(AssistantConfig::default(), ScriptedClient::with(&[]));
        assert_eq!(h.session.confirm().await.text, "No pending action to confirm.");
        assert_eq!(h.session.cancel().text, "No pending action to cancel.");
    }

    #[tokio::test]
    async fn fallback_session_never_runs_tools() {
        let mut h = harness(AssistantConfig::default(), ScriptedClient::with(&[]));
        let text = r#"{"tool_call": {"name": "peek", "args": {}}}"#;

        let reply = h.session.message(text).await;

        assert_eq!(reply.text, fallback(text));
        assert!(h.safe_runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn direct_tool_command() {
        let mut h = harness(AssistantConfig::default(), ScriptedClient::with(&[]));

        let reply = reply_of(h.session.submit(Command::parse("/tool peek {\"y\": 2}")).await);
        assert_eq!(reply.text, "{\"ok\":true}");
        assert_eq!(h.safe_runs.lock().unwrap().len(), 1);

        let reply = reply_of(h.session.submit(Command::parse("/tool erase")).await);
        assert_eq!(reply.next, NextStep::AwaitingConfirmation);
        assert!(h.risky_runs.lock().unwrap().is_empty());

        let reply = reply_of(h.session.submit(Command::parse("/tool nothing")).await);
        assert!(reply.text.contains("Unknown tool 'nothing'"));
    }

    #[tokio::test]
    async fn direct_gated_tool_is_refused_not_proposed() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AssistantConfig {
            workspace_root: dir.path().to_path_buf(),
            ..AssistantConfig::default()
        };
        let workspace = Arc::new(Workspace::new(dir.path()));
        let tools = Arc::new(builtin_registry(&config, workspace));
        let orchestrator = Orchestrator::new(config, ScriptedClient::with(&[]));
        let mut session = ChatSession::new(orchestrator, tools);

        let reply = reply_of(
            session
                .submit(Command::parse(
                    r#"/tool modify_code {"filename": "a.rs", "new_content": "x"}"#,
                ))
                .await,
        );
        assert_eq!(reply.next, NextStep::Done);
        assert!(reply.text.contains("ALFRED_ALLOW_SELF_MODIFY"));
        assert_eq!(session.orchestrator().state(), TurnState::Idle);
        assert!(!dir.path().join("a.rs").exists());

        let reply = reply_of(session.submit(Command::parse("/tool screenshot")).await);
        assert!(reply.text.contains("ALFRED_ALLOW_AUTOMATION"));
        assert_eq!(session.orchestrator().state(), TurnState::Idle);

        // The slot stays free for an ungated sensitive tool.
        let reply = reply_of(
            session
                .submit(Command::parse(
                    r#"/tool write_file {"path": "n.txt", "content": "x"}"#,
                ))
                .await,
        );
        assert_eq!(reply.next, NextStep::AwaitingConfirmation);
    }

    #[tokio::test]
    async fn reset_and_quit() {
        let mut h = harness(AssistantConfig::default(), ScriptedClient::with(&[]));
        h.session.message("hello").await;
        assert!(!h.session.orchestrator().history().is_empty());

        reply_of(h.session.submit(Command::Reset).await);
        assert!(h.session.orchestrator().history().is_empty());

        assert_eq!(h.session.submit(Command::Quit).await, SessionOutcome::Quit);
    }
}
