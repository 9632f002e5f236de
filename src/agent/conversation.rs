//! In-memory conversation buffer and prompt assembly.

use serde::Serialize;

/// Most recent messages included in a prompt.
const MAX_PROMPT_MESSAGES: usize = 20;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Label used in the flattened prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Assistant => "Assistant",
            Self::Tool => "Tool",
        }
    }
}

/// A single conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }

    pub fn tool(text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            text: text.into(),
        }
    }
}

/// Ordered, never-persisted message history.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Flatten history into a prompt:
    ///
    /// ```text
    /// System: <system prompt>
    /// User: ...
    /// Assistant: ...
    /// User: <user_text>
    /// ```
    pub fn build_prompt(&self, system_prompt: Option<&str>, user_text: &str) -> String {
        let mut parts = Vec::with_capacity(MAX_PROMPT_MESSAGES + 2);
        if let Some(system) = system_prompt.filter(|s| !s.is_empty()) {
            parts.push(format!("System: {system}"));
        }
        let skip = self.messages.len().saturating_sub(MAX_PROMPT_MESSAGES);
        parts.extend(
            self.messages[skip..]
                .iter()
                .map(|m| format!("{}: {}", m.role.label(), m.text)),
        );
        parts.push(format!("User: {user_text}"));
        parts.join("\n")
    }
}
