//! Minimal chat message shape shared by the `Agent`/`ChatClient` interfaces.
//!
//! The runtime never inspects these beyond passing them through
//! [`crate::agent::AgentExecutorRequest`]/[`crate::agent::AgentExecutorResponse`];
//! the shape exists so that `Agent`/`ChatClient` implementations (which live
//! outside this crate) have a common vocabulary to exchange.

use serde::{Deserialize, Serialize};

/// Who produced a [`ChatMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a conversation passed to or returned from an `Agent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    /// Display name of the author, e.g. the agent's name — used by
    /// multi-agent workflows to label fan-in aggregates.
    pub author_name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            author_name: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }

    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }
}
