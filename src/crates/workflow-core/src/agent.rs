//! The `Agent` collaborator interface and the `AgentExecutor` adapter that
//! wraps it into the typed handler contract (`spec.md` §4.4, §6.2).
//!
//! The runtime never inspects an `Agent`'s internals — it is implemented
//! entirely outside this crate (an LLM call, a tool-using loop, anything).
//! `AgentExecutor` only knows how to call `run`/`run_stream` and forward
//! results through the handler outbox.

use crate::executor::{Executor, HandlerContext};
use crate::messages::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::sync::Arc;

/// An opaque conversational thread handle. The runtime never inspects its
/// contents; an `Agent` implementation is free to define its own.
pub type ThreadHandle = Json;

/// The final response produced by an `Agent::run` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub messages: Vec<ChatMessage>,
    pub raw: Option<Json>,
}

/// An intermediate update forwarded while an `Agent` streams, surfaced as an
/// [`crate::event::Event::AgentRun`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentUpdate(pub Json);

/// An opaque agent collaborator. Implementations typically wrap a
/// `ChatClient` plus a tool-execution loop; none of that is visible here.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn run(
        &self,
        messages: Vec<ChatMessage>,
        thread: Option<ThreadHandle>,
    ) -> Result<AgentResponse, String>;

    /// Stream intermediate updates, calling `on_update` for each, then
    /// return the final response.
    async fn run_stream(
        &self,
        messages: Vec<ChatMessage>,
        thread: Option<ThreadHandle>,
        on_update: &(dyn Fn(AgentUpdate) + Send + Sync),
    ) -> Result<AgentResponse, String>;

    fn get_new_thread(&self) -> ThreadHandle {
        Json::Null
    }
}

/// Handler input for an `AgentExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutorRequest {
    pub messages: Vec<ChatMessage>,
    pub should_respond: bool,
    pub options: Option<Json>,
}

/// Handler output from an `AgentExecutor`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecutorResponse {
    pub executor_id: String,
    pub agent_response: AgentResponse,
}

/// Build an [`Executor`] that adapts an [`Agent`] to the handler contract:
/// input `AgentExecutorRequest`, output `AgentExecutorResponse`.
///
/// When `should_respond` is false the agent still runs (e.g. to update its
/// own thread/context) but no output is emitted downstream — it only
/// records an [`crate::event::Event::AgentRun`].
pub fn agent_executor(id: impl Into<String>, agent: Arc<dyn Agent>) -> Executor {
    let id = id.into();
    Executor::new(id.clone()).with_handler::<AgentExecutorRequest, _, _>(
        move |request, ctx: HandlerContext| {
            let agent = agent.clone();
            let executor_id = ctx.executor_id.clone();
            async move {
                let thread = Some(agent.get_new_thread());
                let response = agent
                    .run(request.messages, thread)
                    .await
                    .map_err(|e| crate::error::WorkflowError::handler(&executor_id, e))?;

                ctx.add_event(crate::event::Event::AgentRun {
                    executor_id: executor_id.clone(),
                    update: serde_json::to_value(&response)
                        .map_err(crate::error::WorkflowError::from_json)?,
                });

                if request.should_respond {
                    let output = AgentExecutorResponse {
                        executor_id: executor_id.clone(),
                        agent_response: response,
                    };
                    ctx.send_message(&output, None)?;
                }
                Ok(())
            }
        },
    )
}
