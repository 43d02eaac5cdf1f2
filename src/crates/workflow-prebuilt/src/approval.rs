//! An approval-gated agent: wraps an [`Agent`] with a `request_info` hop so
//! a human can review its response before it leaves the sub-workflow,
//! optionally feeding back additional messages for another turn.
//!
//! Grounded on the original runtime's `AgentRequestInfoExecutor` /
//! `AgentApprovalExecutor` pair: a two-node sub-workflow (agent, then a
//! request-info gate) embedded as a single executor in the caller's graph.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use workflow_core::agent::{agent_executor, Agent, AgentExecutorRequest, AgentExecutorResponse};
use workflow_core::builder::WorkflowBuilder;
use workflow_core::executor::Executor;
use workflow_core::messages::ChatMessage;
use workflow_core::request_info::request_info_executor;
use workflow_core::workflow_executor::workflow_executor;
use workflow_core::Workflow;

/// A reviewer's verdict on an agent's draft response. An empty `messages`
/// list approves the draft as-is; a non-empty list is fed back to the
/// agent as another turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequestInfoResponse {
    pub messages: Vec<ChatMessage>,
}

/// Build the two-node sub-workflow: `agent` runs, then `agent_request_info`
/// suspends for a reviewer's [`AgentRequestInfoResponse`]. Approving yields
/// the agent's response as output; revising re-enters the agent with the
/// reviewer's messages appended.
pub fn build_agent_approval_workflow(agent: Arc<dyn Agent>) -> Workflow {
    let agent_node = agent_executor("agent", agent);

    let gate = request_info_executor::<AgentExecutorResponse, AgentRequestInfoResponse, _, _>(
        "agent_request_info",
        |original_response, review, ctx| async move {
            if review.messages.is_empty() {
                ctx.yield_output(&original_response)?;
            } else {
                let next = AgentExecutorRequest {
                    messages: review.messages,
                    should_respond: true,
                    options: None,
                };
                ctx.send_message(&next, Some("agent"))?;
            }
            Ok(())
        },
    );

    WorkflowBuilder::new()
        .set_start_executor(agent_node)
        .register_executor(gate)
        .add_edge("agent", "agent_request_info")
        .add_edge("agent_request_info", "agent")
        .build()
        .expect("approval sub-workflow is statically well-formed")
}

/// Build a single [`Executor`], embeddable in a larger workflow, that hosts
/// [`build_agent_approval_workflow`] for `agent`. Input is an
/// `AgentExecutorRequest`; its output is the approved `AgentExecutorResponse`.
pub fn agent_approval_executor(id: impl Into<String>, agent: Arc<dyn Agent>) -> Executor {
    let inner = Arc::new(build_agent_approval_workflow(agent));
    workflow_executor::<AgentExecutorRequest>(id, inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use workflow_core::agent::{AgentResponse, AgentUpdate, ThreadHandle};
    use workflow_core::event::WorkflowStatus;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        async fn run(
            &self,
            messages: Vec<ChatMessage>,
            _thread: Option<ThreadHandle>,
        ) -> Result<AgentResponse, String> {
            Ok(AgentResponse {
                messages: vec![ChatMessage::assistant(
                    messages.last().map(|m| m.text.clone()).unwrap_or_default(),
                )],
                raw: None,
            })
        }

        async fn run_stream(
            &self,
            messages: Vec<ChatMessage>,
            thread: Option<ThreadHandle>,
            _on_update: &(dyn Fn(AgentUpdate) + Send + Sync),
        ) -> Result<AgentResponse, String> {
            self.run(messages, thread).await
        }
    }

    #[tokio::test]
    async fn suspends_for_review_after_the_agent_responds() {
        let workflow = build_agent_approval_workflow(Arc::new(EchoAgent));
        let request = AgentExecutorRequest {
            messages: vec![ChatMessage::user("draft a release note")],
            should_respond: true,
            options: None,
        };
        let result = workflow.run(&request).await.unwrap();
        assert_eq!(result.get_final_state(), WorkflowStatus::SuspendedForRequest);
        assert_eq!(result.request_info_events().len(), 1);
    }

    #[tokio::test]
    async fn approving_with_no_messages_yields_the_draft() {
        use workflow_core::context::Response;
        use workflow_core::event::Event;
        use std::collections::HashMap;

        let workflow = build_agent_approval_workflow(Arc::new(EchoAgent));
        let request = AgentExecutorRequest {
            messages: vec![ChatMessage::user("draft a release note")],
            should_respond: true,
            options: None,
        };
        let suspended = workflow.run(&request).await.unwrap();
        let request_id = suspended
            .events
            .iter()
            .find_map(|e| match e {
                Event::RequestInfo { request_id, .. } => Some(request_id.clone()),
                _ => None,
            })
            .unwrap();
        let checkpoint_id = suspended
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::SuperstepCompleted {
                    checkpoint_id: Some(id),
                    ..
                } => Some(id.clone()),
                _ => None,
            })
            .unwrap();

        let approval = AgentRequestInfoResponse { messages: Vec::new() };
        let mut responses = HashMap::new();
        responses.insert(request_id, Response::new(&approval).unwrap());
        let resumed = workflow.send_responses(&checkpoint_id, responses).await.unwrap();
        assert_eq!(resumed.get_final_state(), WorkflowStatus::Completed);
        assert_eq!(resumed.get_outputs().len(), 1);
    }

    /// `agent_approval_executor` embeds the approval sub-workflow as a
    /// single node in a larger graph — the suspension has to surface on the
    /// *outer* workflow, not just the standalone sub-workflow exercised by
    /// the two tests above.
    #[tokio::test]
    async fn agent_approval_executor_suspends_the_outer_workflow_too() {
        use std::collections::HashMap;
        use workflow_core::context::Response;
        use workflow_core::event::Event;

        let node = agent_approval_executor("approval", Arc::new(EchoAgent));
        let outer = WorkflowBuilder::new().set_start_executor(node).build().unwrap();

        let request = AgentExecutorRequest {
            messages: vec![ChatMessage::user("draft a release note")],
            should_respond: true,
            options: None,
        };
        let suspended = outer.run(&request).await.unwrap();
        assert_eq!(suspended.get_final_state(), WorkflowStatus::SuspendedForRequest);
        let request_id = suspended
            .request_info_events()
            .into_iter()
            .find_map(|e| match e {
                Event::RequestInfo {
                    request_id,
                    source_executor_id,
                    ..
                } => {
                    assert_eq!(source_executor_id, "approval");
                    Some(request_id.clone())
                }
                _ => None,
            })
            .unwrap();
        let checkpoint_id = suspended
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::SuperstepCompleted {
                    checkpoint_id: Some(id),
                    ..
                } => Some(id.clone()),
                _ => None,
            })
            .unwrap();

        let approval = AgentRequestInfoResponse { messages: Vec::new() };
        let mut responses = HashMap::new();
        responses.insert(request_id, Response::new(&approval).unwrap());
        let resumed = outer.send_responses(&checkpoint_id, responses).await.unwrap();
        assert_eq!(resumed.get_final_state(), WorkflowStatus::Completed);
        assert_eq!(resumed.get_outputs().len(), 1);
    }
}
