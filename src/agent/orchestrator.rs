//! Assistant orchestrator: conversation state, remote-vs-fallback selection,
//! tool-call detection, and the pending action slot.
//!
//! The orchestrator never runs tools. It either hands a non-sensitive
//! [`ToolCall`] back to the caller (`NextStep::RunTool`) or parks a sensitive
//! one as a pending action until the caller confirms or cancels it.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::conversation::{Conversation, Message};
use super::pending::{ActionSlot, PendingAction, TurnState};
use crate::config::AssistantConfig;
use crate::error::{ApiError, OrchestratorError};
use crate::llm::{InferenceClient, fallback};
use crate::tools::{ToolCall, ToolPermissions, ToolSpec};

/// Tool results longer than this are truncated before they enter a prompt.
const MAX_TOOL_RESULT_CHARS: usize = 4_000;

/// Matches a reply wrapped in a fenced code block.
static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").expect("valid fenced block regex")
});

/// Where a reply's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    /// The remote inference endpoint.
    Remote,
    /// The local fallback, because no API key is configured.
    Fallback,
    /// The local fallback after the remote call failed.
    Degraded,
    /// Generated locally without any model (confirm/cancel notices, tool output).
    Local,
}

/// What the caller should do after a reply.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Done,
    /// Run this non-sensitive tool, then call [`Orchestrator::complete_tool`].
    RunTool(ToolCall),
    /// A pending action awaits confirm or cancel.
    AwaitingConfirmation,
}

/// An assistant reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
    pub next: NextStep,
}

impl Reply {
    pub fn local(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: ReplySource::Local,
            next: NextStep::Done,
        }
    }

    /// True when the reply is a fallback produced after a failed remote call.
    pub fn is_degraded(&self) -> bool {
        self.source == ReplySource::Degraded
    }

    fn done(text: String, source: ReplySource) -> Self {
        Self {
            text,
            source,
            next: NextStep::Done,
        }
    }
}

#[derive(Deserialize)]
struct ToolCallEnvelope {
    tool_call: RawToolCall,
}

#[derive(Deserialize)]
struct RawToolCall {
    name: String,
    #[serde(default)]
    args: Value,
}

/// Detect `{"tool_call": {"name": ..., "args": {...}}}`, bare or fenced.
pub fn parse_tool_call(reply: &str) -> Option<ToolCall> {
    let trimmed = reply.trim();
    let body = FENCED_BLOCK
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .map_or(trimmed, |m| m.as_str());
    if !body.starts_with('{') {
        return None;
    }
    let envelope: ToolCallEnvelope = serde_json::from_str(body).ok()?;
    let args = if envelope.tool_call.args.is_object() {
        envelope.tool_call.args
    } else {
        serde_json::json!({})
    };
    Some(ToolCall::new(envelope.tool_call.name, args))
}

/// Conversation orchestrator for a single session.
pub struct Orchestrator {
    config: AssistantConfig,
    client: Arc<dyn InferenceClient>,
    tools: Vec<ToolSpec>,
    system_prompt: Option<String>,
    conversation: Conversation,
    pending: ActionSlot<ToolCall>,
}

impl Orchestrator {
    pub fn new(config: AssistantConfig, client: Arc<dyn InferenceClient>) -> Self {
        let system_prompt = config.system_prompt.clone();
        Self {
            config,
            client,
            tools: Vec::new(),
            system_prompt,
            conversation: Conversation::new(),
            pending: ActionSlot::new(),
        }
    }

    /// Advertise these tools to the model.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.tools = tools;
        self
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn state(&self) -> TurnState {
        self.pending.state()
    }

    pub fn pending(&self) -> Option<&PendingAction<ToolCall>> {
        self.pending.current()
    }

    pub fn history(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn reset_conversation(&mut self) {
        self.conversation.clear();
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = Some(prompt.into());
    }

    fn permissions(&self) -> ToolPermissions {
        ToolPermissions {
            allow_automation: self.config.allow_automation,
            allow_self_modify: self.config.allow_self_modify,
        }
    }

    fn build_prompt(&self, user_text: &str) -> String {
        self.conversation.build_prompt(self.system_prompt.as_deref(), user_text)
    }

    fn tool_instruction(&self) -> Option<String> {
        let permissions = self.permissions();
        let available: serde_json::Map<String, Value> = self
            .tools
            .iter()
            .filter(|t| permissions.allows(t.gate))
            .map(|t| {
                (
                    t.name.clone(),
                    serde_json::json!({
                        "description": t.description,
                        "sensitive": t.sensitive,
                        "parameters": t.parameters,
                    }),
                )
            })
            .collect();
        if available.is_empty() {
            return None;
        }
        let schemas = serde_json::to_string_pretty(&available).unwrap_or_default();
        Some(format!(
            "\n\nAvailable tools (name -> schema):\n{schemas}\n\n\
             If you want to call a tool, respond with ONLY a JSON object exactly like:\n\
             {{\"tool_call\": {{\"name\": \"<tool_name>\", \"args\": {{ ... }}}}}}\n\
             Do not add other commentary when returning a tool_call. \
             If no tool is needed, respond with a normal assistant text reply."
        ))
    }

    /// Call the remote client if a key is configured, otherwise fall back.
    ///
    /// `fallback_input` is what the fallback echoes. The call is bounded by
    /// the configured request timeout.
    async fn generate(&self, prompt: &str, fallback_input: &str) -> (String, ReplySource) {
        if !self.config.has_api_key() {
            return (fallback(fallback_input), ReplySource::Fallback);
        }

        let timeout = self.config.request_timeout;
        let result = match tokio::time::timeout(timeout, self.client.ask(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(timeout)),
        };

        match result {
            Ok(text) => (text, ReplySource::Remote),
            Err(e) => {
                tracing::warn!(
                    model = %self.client.model_name(),
                    error = %e,
                    "Remote inference failed, using degraded fallback"
                );
                (fallback(fallback_input), ReplySource::Degraded)
            }
        }
    }

    /// Handle an ordinary chat message.
    ///
    /// A pending action is left as is; free text never confirms or cancels it.
    pub async fn handle_message(&mut self, text: &str) -> Reply {
        let mut prompt = self.build_prompt(text);
        if let Some(instruction) = self.tool_instruction() {
            prompt.push_str(&instruction);
        }
        self.conversation.push(Message::user(text));

        let (reply, source) = self.generate(&prompt, text).await;
        tracing::debug!(source = ?source, chars = reply.len(), "Generated reply");

        if source == ReplySource::Remote
            && let Some(call) = parse_tool_call(&reply)
        {
            return self.route_tool_call(call.with_origin(text));
        }

        self.conversation.push(Message::assistant(&reply));
        Reply::done(reply, source)
    }

    /// Decide what happens with a model-requested tool call.
    fn route_tool_call(&mut self, call: ToolCall) -> Reply {
        let Some(spec) = self.tools.iter().find(|t| t.name == call.name) else {
            let text = format!("I tried to use a tool I don't have ('{}').", call.name);
            self.conversation.push(Message::assistant(&text));
            return Reply::done(text, ReplySource::Remote);
        };

        if !self.permissions().allows(spec.gate) {
            let text = format!(
                "I would use '{}', but it is disabled. Set {}=1 to enable it.",
                call.name,
                spec.gate.env_var().unwrap_or_default()
            );
            tracing::info!(tool = %call.name, "Refused gated tool call");
            self.conversation.push(Message::assistant(&text));
            return Reply::done(text, ReplySource::Remote);
        }

        let call_json = serde_json::json!({"name": call.name, "args": call.args});
        self.conversation
            .push(Message::assistant(format!("[tool_call] {call_json}")));

        if !spec.sensitive {
            return Reply {
                text: format!("Running {}...", call.name),
                source: ReplySource::Remote,
                next: NextStep::RunTool(call),
            };
        }

        let description = format!("run '{}' with args {}", call.name, call.args);
        let text = match self.propose_action(description.clone(), call) {
            Ok(()) => format!(
                "Alfred wants to {description}.\nConfirm to proceed or cancel to abort."
            ),
            Err(e) => format!("{e}. Confirm or cancel it before I {description}."),
        };
        Reply {
            text,
            source: ReplySource::Remote,
            next: NextStep::AwaitingConfirmation,
        }
    }

    /// Park an action for confirmation.
    pub fn propose_action(
        &mut self,
        description: impl Into<String>,
        payload: ToolCall,
    ) -> Result<(), OrchestratorError> {
        self.pending.propose(description, payload).map(|_| ())
    }

    /// Resolve the pending action and return its payload for the caller to run.
    pub fn confirm(&mut self) -> Result<ToolCall, OrchestratorError> {
        let action = self.pending.take()?;
        tracing::info!(action_id = %action.id, "Action confirmed");
        Ok(action.payload)
    }

    /// Drop the pending action.
    pub fn cancel(&mut self) -> Result<(), OrchestratorError> {
        let action = self.pending.take()?;
        tracing::info!(action_id = %action.id, "Action cancelled");
        Ok(())
    }

    /// Record a tool result and ask for a final answer that uses it.
    pub async fn complete_tool(&mut self, call: &ToolCall, result: &Value) -> Reply {
        let result_text = truncate_chars(
            &serde_json::to_string(result).unwrap_or_default(),
            MAX_TOOL_RESULT_CHARS,
        );
        self.conversation.push(Message::tool(&result_text));

        let prompt = format!(
            "{}\n\nTool result:\n{}",
            self.build_prompt(&call.origin),
            result_text
        );
        let (reply, source) = self.generate(&prompt, &result_text).await;
        self.conversation.push(Message::assistant(&reply));
        Reply::done(reply, source)
    }

    /// Record a tool the user ran directly, without asking the model.
    pub fn record_tool_exchange(&mut self, call: &ToolCall, result: &Value) -> String {
        let summary = truncate_chars(
            &serde_json::to_string(result).unwrap_or_default(),
            MAX_TOOL_RESULT_CHARS,
        );
        self.conversation.push(Message::user(format!(
            "[tool-call] {} {}",
            call.name, call.args
        )));
        self.conversation.push(Message::assistant(&summary));
        summary
    }

    /// Ask the model about an image. Requires an API key; no fallback.
    pub async fn analyze_image(
        &self,
        image_base64: &str,
        instruction: &str,
    ) -> Result<String, ApiError> {
        if !self.config.has_api_key() {
            return Err(ApiError::MissingCredential);
        }
        let prompt = format!(
            "{}\n\n[IMAGE_BASE64] (base64 PNG)\nImage size (base64 chars): {}\n\
             Respond with an analysis of the image per the instruction.",
            self.build_prompt(instruction),
            image_base64.len()
        );

        let timeout = self.config.request_timeout * 2;
        match tokio::time::timeout(timeout, self.client.analyze_image(&prompt, image_base64)).await
        {
            Ok(result) => result,
            Err(_) => Err(ApiError::timeout(timeout)),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...[truncated]", &s[..idx]),
        None => s.to_string(),
    }
}
