use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the trace log. Only assistant entries can carry an agent name;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<String>,
    content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            agent: None,
            content: content.into(),
        }
    }

    pub fn assistant(agent: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            agent: Some(agent.into()),
            content: content.into(),
        }
    }

    /// Assistant-side entry not attributed to any node, e.g. a surfaced error.
    pub fn assistant_notice(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            agent: None,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn agent(&self) -> Option<&str> {
        self.agent.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// Append-only, arrival-ordered log. The only removal is a full `reset`.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends and returns the index of the new entry.
    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.entries.push(message);
        self.entries.len() - 1
    }

    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}
