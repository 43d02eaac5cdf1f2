//! `ChatClient` and `ContextProvider`: collaborator interfaces consumed by
//! `Agent` implementations, never by the runtime itself (`spec.md` §6.2).
//!
//! Neither trait is used by `workflow-core`'s scheduler — they are declared
//! here so `workflow-prebuilt` agent helpers and downstream `Agent`
//! implementations share a common vocabulary, the same role `ChatModel`
//! plays for the teacher's node closures.

use crate::messages::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tools: Option<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub raw: Option<Json>,
}

/// A streamed delta from `ChatClient::get_streaming_response`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatDelta(pub String);

/// A chat-completion backend, opaque to the runtime. Implementations talk
/// to whatever model provider an `Agent` wants.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn get_response(
        &self,
        messages: &[ChatMessage],
        options: Option<ChatOptions>,
    ) -> Result<ChatResponse, String>;

    async fn get_streaming_response(
        &self,
        messages: &[ChatMessage],
        options: Option<ChatOptions>,
        on_delta: &(dyn Fn(ChatDelta) + Send + Sync),
    ) -> Result<ChatResponse, String>;
}

/// Context injected before/after each agent turn — instructions, thread
/// lifecycle hooks, and message-list mutation, mirroring the original
/// system's `ContextProvider` (`spec.md` §6.2).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentContext {
    pub instructions: Option<String>,
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn invoking(&self, messages: &[ChatMessage]) -> AgentContext;
    async fn invoked(&self, _response: &ChatResponse) {}
    async fn thread_created(&self, _thread_id: &str) {}
    async fn messages_adding(&self, messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
        messages
    }
}
