//! The superstep scheduler: drains ready messages, dispatches handlers
//! concurrently, applies edge routing to their effects, and decides when a
//! run converges, suspends, or fails (`spec.md` §4.5).

use crate::context::RunnerContext;
use crate::edge::EdgeKind;
use crate::error::{Result, WorkflowError};
use crate::event::{Event, WorkflowStatus};
use crate::executor::{HandlerContext, OutboundMessage};
use crate::message::Envelope;
use crate::workflow::Workflow;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Outcome of running a workflow to convergence or suspension.
pub struct RunOutcome {
    pub status: WorkflowStatus,
    pub events: Vec<Event>,
}

/// Drive supersteps until the run converges, suspends on a pending request,
/// is cancelled, hits `max_iterations`, or a fatal error occurs.
pub async fn run_to_convergence(
    workflow: &Workflow,
    ctx: &Arc<RunnerContext>,
) -> Result<RunOutcome> {
    run_to_convergence_from(workflow, ctx, false).await
}

/// Like [`run_to_convergence`], but seeded with whether the caller already
/// yielded an output before this call (e.g. a `response_handler` invoked
/// directly by `Workflow::send_responses` before re-entering the
/// scheduler loop) — needed so a run that only yields output through a
/// response handler still reports `Completed` rather than `Idle`.
pub async fn run_to_convergence_from(
    workflow: &Workflow,
    ctx: &Arc<RunnerContext>,
    already_yielded_output: bool,
) -> Result<RunOutcome> {
    let mut events = Vec::new();
    let mut yielded_any_output = already_yielded_output;
    events.push(Event::WorkflowStatusChanged {
        status: WorkflowStatus::Running,
    });

    loop {
        if ctx.cancellation.is_cancelled() {
            events.push(Event::WorkflowStatusChanged {
                status: WorkflowStatus::Cancelled,
            });
            return Ok(RunOutcome {
                status: WorkflowStatus::Cancelled,
                events,
            });
        }

        let grouped = ctx.drain_ready().await;
        if grouped.is_empty() {
            let status = if ctx.has_pending_requests().await {
                WorkflowStatus::SuspendedForRequest
            } else if yielded_any_output {
                WorkflowStatus::Completed
            } else {
                WorkflowStatus::Idle
            };
            events.push(Event::WorkflowStatusChanged { status });
            return Ok(RunOutcome { status, events });
        }

        let superstep_seq = {
            let mut iter = ctx.iteration_count.lock().await;
            *iter += 1;
            *iter
        };

        let mut join_set = tokio::task::JoinSet::new();
        for (target_id, envelopes) in grouped {
            let executor = match workflow.executors.get(&target_id) {
                Some(e) => e.clone(),
                None => {
                    return Err(WorkflowError::routing(target_id, "unknown-target"));
                }
            };
            for envelope in envelopes {
                let shared_state = ctx.shared_state.clone();
                let cancellation = ctx.cancellation.clone();
                let handler = executor
                    .handler_for(&envelope.type_tag)
                    .ok_or_else(|| {
                        WorkflowError::routing(target_id.clone(), envelope.type_tag.clone())
                    })?
                    .invoke
                    .clone();
                let executor_id = target_id.clone();
                join_set.spawn(async move {
                    let hctx = HandlerContext::new(
                        executor_id.clone(),
                        superstep_seq,
                        shared_state,
                        cancellation,
                    );
                    let started = Instant::now();
                    let result = (handler)(envelope.payload.clone(), hctx.clone()).await;
                    (executor_id, envelope, result, hctx.take_outbox(), started.elapsed())
                });
            }
        }

        while let Some(joined) = join_set.join_next().await {
            let (executor_id, trigger, result, outbox, _duration) =
                joined.map_err(|e| WorkflowError::handler("join", e))?;

            events.push(Event::ExecutorInvoked {
                executor_id: executor_id.clone(),
                superstep_seq,
            });

            match result {
                Ok(()) => {
                    events.push(Event::ExecutorCompleted {
                        executor_id: executor_id.clone(),
                        superstep_seq,
                    });
                }
                Err(err) => {
                    events.push(Event::ExecutorFailed {
                        executor_id: executor_id.clone(),
                        superstep_seq,
                        error: err.to_string(),
                    });
                    if !workflow.isolated_errors.contains(&executor_id) {
                        events.push(Event::WorkflowStatusChanged {
                            status: WorkflowStatus::Failed,
                        });
                        return Err(err);
                    }
                    continue;
                }
            }

            events.extend(outbox.events);

            for output in outbox.outputs {
                yielded_any_output = true;
                events.push(Event::WorkflowOutput {
                    source_id: executor_id.clone(),
                    value: output,
                });
            }

            if let Some(request) = outbox.request {
                let request_id = ctx
                    .add_request_info_event(
                        executor_id.clone(),
                        request.data.clone(),
                        request.request_type.clone(),
                        request.response_type.clone(),
                        trigger.clone(),
                    )
                    .await;
                events.push(Event::RequestInfo {
                    request_id,
                    source_executor_id: executor_id.clone(),
                    request_type: request.request_type,
                    response_type: request.response_type,
                    data: request.data,
                });
            }

            for message in outbox.messages {
                route_message(workflow, ctx, &executor_id, message, superstep_seq).await?;
            }
        }

        if superstep_seq >= workflow.max_iterations {
            events.push(Event::WorkflowStatusChanged {
                status: WorkflowStatus::MaxIterationsExceeded,
            });
            return Ok(RunOutcome {
                status: WorkflowStatus::MaxIterationsExceeded,
                events,
            });
        }

        for (exec_id, executor) in &workflow.executors {
            if let Some(save) = &executor.on_checkpoint_save {
                ctx.set_executor_state(exec_id.clone(), (save)()).await;
            }
        }
        let checkpoint_id = ctx.create_checkpoint().await.ok();
        events.push(Event::SuperstepCompleted {
            superstep_seq,
            checkpoint_id,
        });
    }
}

/// Apply edge-model routing (`spec.md` §4.3) for a single message emitted by
/// `source_id`.
pub(crate) async fn route_message(
    workflow: &Workflow,
    ctx: &Arc<RunnerContext>,
    source_id: &str,
    message: OutboundMessage,
    superstep_seq: u64,
) -> Result<()> {
    if let Some(target) = &message.explicit_target {
        let exists = workflow
            .edges
            .iter()
            .any(|e| e.source_id == source_id && &e.target_id == target);
        if !exists {
            return Err(WorkflowError::routing(target.clone(), message.type_tag));
        }
        return enqueue_checked(
            workflow,
            ctx,
            source_id,
            target,
            message.payload,
            message.type_tag,
            superstep_seq,
        )
        .await;
    }

    let edges: Vec<&crate::edge::Edge> = workflow
        .edges
        .iter()
        .filter(|e| e.source_id == source_id)
        .collect();

    let mut handled_switch_groups: HashSet<&str> = HashSet::new();
    let mut handled_multi_groups: HashSet<&str> = HashSet::new();

    for edge in &edges {
        match &edge.kind {
            EdgeKind::Direct | EdgeKind::Loop | EdgeKind::FanOut => {
                enqueue_checked(
                    workflow,
                    ctx,
                    source_id,
                    &edge.target_id,
                    message.payload.clone(),
                    message.type_tag.clone(),
                    superstep_seq,
                )
                .await?;
            }
            EdgeKind::Conditional(predicate) => {
                if predicate(&message.payload) {
                    enqueue_checked(
                        workflow,
                        ctx,
                        source_id,
                        &edge.target_id,
                        message.payload.clone(),
                        message.type_tag.clone(),
                        superstep_seq,
                    )
                    .await?;
                }
            }
            EdgeKind::SwitchCase { group_id, .. } => {
                if !handled_switch_groups.insert(group_id.as_str()) {
                    continue;
                }
                let group_edges: Vec<&crate::edge::Edge> = edges
                    .iter()
                    .filter(|e| matches!(&e.kind, EdgeKind::SwitchCase { group_id: g, .. } if g == group_id))
                    .copied()
                    .collect();
                let winner = group_edges.iter().find(|e| {
                    matches!(&e.kind, EdgeKind::SwitchCase { predicate, is_default, .. } if !is_default && predicate(&message.payload))
                }).or_else(|| group_edges.iter().find(|e| matches!(&e.kind, EdgeKind::SwitchCase { is_default, .. } if *is_default)));
                if let Some(winner) = winner {
                    enqueue_checked(
                        workflow,
                        ctx,
                        source_id,
                        &winner.target_id,
                        message.payload.clone(),
                        message.type_tag.clone(),
                        superstep_seq,
                    )
                    .await?;
                }
            }
            EdgeKind::MultiSelection { selector, group_id } => {
                if !handled_multi_groups.insert(group_id.as_str()) {
                    continue;
                }
                let group_edges: Vec<&crate::edge::Edge> = edges
                    .iter()
                    .filter(|e| matches!(&e.kind, EdgeKind::MultiSelection { group_id: g, .. } if g == group_id))
                    .copied()
                    .collect();
                let target_ids: Vec<String> =
                    group_edges.iter().map(|e| e.target_id.clone()).collect();
                let chosen = selector(&message.payload, &target_ids);
                for target in chosen {
                    enqueue_checked(
                        workflow,
                        ctx,
                        source_id,
                        &target,
                        message.payload.clone(),
                        message.type_tag.clone(),
                        superstep_seq,
                    )
                    .await?;
                }
            }
            EdgeKind::FanIn { group_id } => {
                let all_sources: Vec<String> = workflow
                    .edges
                    .iter()
                    .filter(|e| e.fan_in_group() == Some(group_id.as_str()) && e.target_id == edge.target_id)
                    .map(|e| e.source_id.clone())
                    .collect();
                if let Some(list) = ctx
                    .record_fan_in_arrival(group_id, source_id, message.payload.clone(), &all_sources)
                    .await
                {
                    enqueue_list(workflow, ctx, source_id, &edge.target_id, list, superstep_seq).await?;
                }
            }
        }
    }

    Ok(())
}

async fn enqueue_checked(
    workflow: &Workflow,
    ctx: &Arc<RunnerContext>,
    source_id: &str,
    target_id: &str,
    payload: serde_json::Value,
    type_tag: String,
    superstep_seq: u64,
) -> Result<()> {
    let target = workflow
        .executors
        .get(target_id)
        .ok_or_else(|| WorkflowError::routing(target_id, type_tag.clone()))?;
    if target.handler_for(&type_tag).is_none() {
        return Err(WorkflowError::routing(target_id, type_tag));
    }
    ctx.enqueue(Envelope {
        payload,
        type_tag,
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        superstep_seq,
    })
    .await;
    Ok(())
}

/// Deliver a fan-in barrier's gathered list to its target, matching the
/// first handler declared over a `Vec<_>` input.
async fn enqueue_list(
    workflow: &Workflow,
    ctx: &Arc<RunnerContext>,
    source_id: &str,
    target_id: &str,
    list: Vec<serde_json::Value>,
    superstep_seq: u64,
) -> Result<()> {
    let target = workflow
        .executors
        .get(target_id)
        .ok_or_else(|| WorkflowError::routing(target_id, "fan-in-list"))?;
    let type_tag = target
        .handlers
        .iter()
        .map(|h| &h.input_type_tag)
        .find(|tag| tag.starts_with("alloc::vec::Vec<"))
        .cloned()
        .ok_or_else(|| WorkflowError::routing(target_id, "fan-in-list"))?;
    ctx.enqueue(Envelope {
        payload: serde_json::Value::Array(list),
        type_tag,
        source_id: source_id.to_string(),
        target_id: target_id.to_string(),
        superstep_seq,
    })
    .await;
    Ok(())
}
