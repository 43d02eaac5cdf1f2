//! `WorkflowExecutor`: embeds another [`Workflow`] as a single node
//! (`spec.md` §4.4, "Sub-workflow checkpointing" in §9).
//!
//! On input, starts an inner run; inner `WorkflowOutputEvent` payloads
//! become this executor's outputs, and every other inner lifecycle event is
//! re-emitted with a `<this_executor_id>/<inner_id>` path prefix. When the
//! inner run suspends on a `request_info` call, this executor registers a
//! matching request on the *outer* context — via `ctx.request_info` in the
//! same invocation — so `Workflow::send_responses` on the parent can reach
//! it; nothing about the inner suspension is visible to the parent except
//! through that outer request. Answering it runs this executor's
//! `response_handler`, which re-enters the inner workflow from its last
//! checkpoint via `inner.send_responses`, and may itself suspend again for
//! another round.
//!
//! The inner workflow's last checkpoint id and the pending inner request id
//! are the only state that needs to survive a parent checkpoint/restore
//! cycle; `with_checkpoint_hooks` stashes them under this executor's id in
//! the parent's checkpoint, so restoring the parent carries enough state to
//! resume the child.

use crate::context::Response;
use crate::error::{Result, WorkflowError};
use crate::event::{Event, WorkflowStatus};
use crate::executor::{Executor, HandlerContext, RestoreHook, SaveHook};
use crate::workflow::{Workflow, WorkflowRunResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Bookkeeping needed to resume the inner workflow after the outer caller
/// answers a request that originated inside it.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct InnerSuspension {
    inner_checkpoint_id: String,
    inner_request_id: String,
    response_type: String,
}

type SuspensionSlot = Arc<Mutex<Option<InnerSuspension>>>;

/// Build an executor that hosts `inner` and forwards its outputs as its own.
pub fn workflow_executor<T>(id: impl Into<String>, inner: Arc<Workflow>) -> Executor
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let id = id.into();
    let slot: SuspensionSlot = Arc::new(Mutex::new(None));

    let handler_inner = inner.clone();
    let handler_prefix = id.clone();
    let handler_slot = slot.clone();
    let executor = Executor::new(id.clone()).with_handler::<T, _, _>(move |payload, ctx: HandlerContext| {
        let inner = handler_inner.clone();
        let prefix = handler_prefix.clone();
        let slot = handler_slot.clone();
        async move {
            let result = inner
                .run(&payload)
                .await
                .map_err(|e| WorkflowError::handler(&prefix, e))?;
            forward_result(&prefix, &ctx, &slot, result)
        }
    });

    let response_inner = inner.clone();
    let response_prefix = id.clone();
    let response_slot = slot.clone();
    let executor = executor.with_response_handler(Arc::new(move |_trigger: Json, response: Json, ctx| {
        let inner = response_inner.clone();
        let prefix = response_prefix.clone();
        let slot = response_slot.clone();
        Box::pin(async move {
            let suspension = slot.lock().unwrap().clone().ok_or_else(|| {
                WorkflowError::validation(format!(
                    "{prefix}: received a response but no inner request is suspended"
                ))
            })?;
            let mut responses = HashMap::new();
            responses.insert(
                suspension.inner_request_id,
                Response {
                    value: response,
                    type_tag: suspension.response_type,
                },
            );
            let result = inner
                .send_responses(&suspension.inner_checkpoint_id, responses)
                .await
                .map_err(|e| WorkflowError::handler(&prefix, e))?;
            forward_result(&prefix, &ctx, &slot, result)
        })
    }));

    let save_slot = slot.clone();
    let save: SaveHook = Arc::new(move || {
        serde_json::to_value(&*save_slot.lock().unwrap()).unwrap_or(Json::Null)
    });
    let restore_slot = slot.clone();
    let restore: RestoreHook = Arc::new(move |value: Json| {
        let parsed: Option<InnerSuspension> = serde_json::from_value(value).unwrap_or(None);
        *restore_slot.lock().unwrap() = parsed;
    });
    executor.with_checkpoint_hooks(save, restore)
}

/// Forward `result`'s outputs and lifecycle events to the outer invocation,
/// and — if the inner run suspended — register the outer-level request
/// that proxies it and remember what's needed to resume the child.
fn forward_result(
    prefix: &str,
    ctx: &HandlerContext,
    slot: &SuspensionSlot,
    result: WorkflowRunResult,
) -> Result<()> {
    let status = result.status;
    let mut inner_checkpoint_id = None;
    let mut inner_request = None;
    for event in &result.events {
        if let Event::SuperstepCompleted {
            checkpoint_id: Some(cp),
            ..
        } = event
        {
            inner_checkpoint_id = Some(cp.clone());
        }
        if inner_request.is_none() {
            if let Event::RequestInfo {
                request_id,
                request_type,
                response_type,
                data,
                ..
            } = event
            {
                inner_request = Some((
                    request_id.clone(),
                    request_type.clone(),
                    response_type.clone(),
                    data.clone(),
                ));
            }
        }
    }

    for event in result.events {
        if let Event::WorkflowOutput { value, .. } = &event {
            ctx.yield_output_json(value.clone());
        }
        ctx.add_event(event.with_path_prefix(prefix));
    }

    if status == WorkflowStatus::SuspendedForRequest {
        let (inner_request_id, request_type, response_type, data) = inner_request.ok_or_else(|| {
            WorkflowError::validation(format!(
                "{prefix}: inner workflow suspended without a request_info event"
            ))
        })?;
        let inner_checkpoint_id = inner_checkpoint_id.ok_or_else(|| {
            WorkflowError::validation(format!("{prefix}: inner workflow suspended without a checkpoint"))
        })?;
        *slot.lock().unwrap() = Some(InnerSuspension {
            inner_checkpoint_id,
            inner_request_id,
            response_type: response_type.clone(),
        });
        ctx.request_info(&data, request_type, response_type)?;
    } else {
        *slot.lock().unwrap() = None;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::WorkflowBuilder;
    use crate::cancellation::CancellationToken;
    use crate::request_info::request_info_executor;
    use crate::shared_state::SharedState;

    fn inner_workflow() -> Arc<Workflow> {
        let uppercase = Executor::new("uppercase").with_handler::<String, _, _>(|s, ctx| async move {
            ctx.yield_output(&s.to_uppercase())?;
            Ok(())
        });
        Arc::new(
            WorkflowBuilder::new()
                .set_start_executor(uppercase)
                .build()
                .unwrap(),
        )
    }

    fn inner_gated_workflow() -> Arc<Workflow> {
        let draft = Executor::new("draft").with_handler::<String, _, _>(|s, ctx| async move {
            ctx.send_message(&s.to_uppercase(), None)?;
            Ok(())
        });
        let gate = request_info_executor::<String, bool, _, _>("gate", |trigger, approved, ctx| async move {
            if approved {
                ctx.yield_output(&trigger)?;
            }
            Ok(())
        });
        Arc::new(
            WorkflowBuilder::new()
                .set_start_executor(draft)
                .register_executor(gate)
                .add_edge("draft", "gate")
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn forwards_inner_output_as_its_own() {
        let outer = workflow_executor::<String>("outer", inner_workflow());
        let entry = outer
            .handler_for(&crate::message::type_tag_of::<String>())
            .unwrap();
        let ctx = HandlerContext::new("outer", 0, SharedState::new(), CancellationToken::new());
        (entry.invoke)(serde_json::json!("hi"), ctx.clone())
            .await
            .unwrap();
        let outbox = ctx.take_outbox();
        assert_eq!(outbox.outputs, vec![serde_json::json!("HI")]);
        assert!(outbox
            .events
            .iter()
            .any(|e| e.actor_id() == Some("outer/uppercase")));
    }

    /// The embedded path Comment 2 in the review called out as untested:
    /// a `WorkflowExecutor` wrapping a workflow that itself suspends for a
    /// request must surface that suspension on the *outer* workflow, and
    /// answering it must re-enter the inner workflow.
    #[tokio::test]
    async fn embedded_suspension_propagates_to_the_outer_workflow() {
        let outer_node = workflow_executor::<String>("approval", inner_gated_workflow());
        let outer = WorkflowBuilder::new()
            .set_start_executor(outer_node)
            .build()
            .unwrap();

        let suspended = outer.run(&"draft text".to_string()).await.unwrap();
        assert_eq!(suspended.get_final_state(), WorkflowStatus::SuspendedForRequest);
        let request_id = suspended
            .request_info_events()
            .into_iter()
            .find_map(|e| match e {
                Event::RequestInfo { request_id, source_executor_id, .. } => {
                    assert_eq!(source_executor_id, "approval");
                    Some(request_id.clone())
                }
                _ => None,
            })
            .expect("outer run should surface a proxied request_info event");
        let checkpoint_id = suspended
            .events
            .iter()
            .rev()
            .find_map(|e| match e {
                Event::SuperstepCompleted { checkpoint_id: Some(id), .. } => Some(id.clone()),
                _ => None,
            })
            .unwrap();

        let mut responses = HashMap::new();
        responses.insert(request_id, Response::new(&true).unwrap());
        let resumed = outer.send_responses(&checkpoint_id, responses).await.unwrap();
        assert_eq!(resumed.get_final_state(), WorkflowStatus::Completed);
        assert_eq!(resumed.get_outputs(), vec![&serde_json::json!("DRAFT TEXT")]);
    }

    /// Restoring the outer workflow from a checkpoint taken while suspended
    /// must still be able to resolve the proxied request afterwards — this
    /// is exactly what `with_checkpoint_hooks` is for.
    #[tokio::test]
    async fn resuming_the_outer_workflow_from_checkpoint_still_resolves_the_inner_request() {
        let outer_node = workflow_executor::<String>("approval", inner_gated_workflow());
        let outer = WorkflowBuilder::new()
            .set_start_executor(outer_node)
            .build()
            .unwrap();

        let suspended = outer.run(&"draft text".to_string()).await.unwrap();
        let request_id = suspended
            .request_info_events()
            .into_iter()
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
                Event::SuperstepCompleted { checkpoint_id: Some(id), .. } => Some(id.clone()),
                _ => None,
            })
            .unwrap();

        let restored = outer.run_from_checkpoint(&checkpoint_id).await.unwrap();
        assert_eq!(restored.get_final_state(), WorkflowStatus::SuspendedForRequest);

        let mut responses = HashMap::new();
        responses.insert(request_id, Response::new(&true).unwrap());
        let resumed = outer.send_responses(&checkpoint_id, responses).await.unwrap();
        assert_eq!(resumed.get_final_state(), WorkflowStatus::Completed);
        assert_eq!(resumed.get_outputs(), vec![&serde_json::json!("DRAFT TEXT")]);
    }
}
