//! The `Workflow` facade: `run`, `run_stream`, `run_from_checkpoint`,
//! `send_responses_streaming` (`spec.md` §4.8), plus the non-streaming
//! `send_responses` convenience used by every caller in this codebase and
//! named in `spec.md` §4.6's answering contract.

use crate::context::{RequestRecord, Response, RunnerContext};
use crate::edge::Edge;
use crate::error::{Result, WorkflowError};
use crate::event::{Event, WorkflowStatus};
use crate::executor::{Executor, HandlerContext};
use crate::message::Envelope;
use crate::scheduler::{self, RunOutcome};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use workflow_checkpoint::CheckpointStorage;

/// The aggregated result of `Workflow::run`: every event produced, plus
/// convenience accessors over them (`spec.md` §4.8).
pub struct WorkflowRunResult {
    pub events: Vec<Event>,
    pub status: WorkflowStatus,
}

impl WorkflowRunResult {
    pub fn get_outputs(&self) -> Vec<&Json> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::WorkflowOutput { value, .. } => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn get_final_state(&self) -> WorkflowStatus {
        self.status
    }

    pub fn get_completed_event(&self) -> Option<&Event> {
        self.events.iter().rev().find(|e| {
            matches!(
                e,
                Event::WorkflowStatusChanged {
                    status: WorkflowStatus::Completed
                }
            )
        })
    }

    pub fn request_info_events(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e, Event::RequestInfo { .. }))
            .collect()
    }
}

/// A compiled, runnable workflow graph. Built exclusively via
/// [`crate::builder::WorkflowBuilder::build`].
pub struct Workflow {
    pub(crate) start_id: String,
    pub(crate) executors: HashMap<String, Executor>,
    pub(crate) edges: Vec<Edge>,
    workflow_hash: String,
    pub(crate) max_iterations: u64,
    storage: Arc<dyn CheckpointStorage>,
    pub(crate) isolated_errors: HashSet<String>,
    workflow_id: String,
}

impl Workflow {
    pub(crate) fn new(
        start_id: String,
        executors: HashMap<String, Executor>,
        edges: Vec<Edge>,
        workflow_hash: String,
        max_iterations: u64,
        storage: Arc<dyn CheckpointStorage>,
        isolated_errors: HashSet<String>,
    ) -> Self {
        Self {
            start_id,
            executors,
            edges,
            workflow_hash,
            max_iterations,
            storage,
            isolated_errors,
            workflow_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn workflow_hash(&self) -> &str {
        &self.workflow_hash
    }

    fn new_context(&self) -> Arc<RunnerContext> {
        Arc::new(RunnerContext::new(
            self.workflow_id.clone(),
            self.workflow_hash.clone(),
            self.storage.clone(),
        ))
    }

    async fn seed_start_message<T: Serialize>(&self, ctx: &Arc<RunnerContext>, message: &T) -> Result<()> {
        let type_tag = crate::message::type_tag_of::<T>();
        if self.executors.get(&self.start_id).and_then(|e| e.handler_for(&type_tag)).is_none() {
            return Err(WorkflowError::routing(self.start_id.clone(), type_tag));
        }
        let envelope = Envelope::new(message, "__caller__", self.start_id.clone(), 0)
            .map_err(WorkflowError::from_json)?;
        ctx.enqueue(envelope).await;
        Ok(())
    }

    /// Run the workflow to convergence or suspension, starting with
    /// `initial_message` delivered to the start executor.
    pub async fn run<T: Serialize>(&self, initial_message: &T) -> Result<WorkflowRunResult> {
        let ctx = self.new_context();
        self.seed_start_message(&ctx, initial_message).await?;
        let RunOutcome { status, events } = scheduler::run_to_convergence(self, &ctx).await?;
        Ok(WorkflowRunResult { events, status })
    }

    /// Like [`Workflow::run`], but yields events as they occur rather than
    /// aggregating them into a single result.
    pub fn run_stream<T: Serialize + Send + 'static>(
        self: Arc<Self>,
        initial_message: T,
    ) -> UnboundedReceiverStream<Event> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let ctx = self.new_context();
            if let Err(err) = self.seed_start_message(&ctx, &initial_message).await {
                let _ = tx.send(Event::WorkflowError {
                    error: err.to_string(),
                });
                return;
            }
            match scheduler::run_to_convergence(self.as_ref(), &ctx).await {
                Ok(outcome) => {
                    for event in outcome.events {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError {
                        error: err.to_string(),
                    });
                }
            }
        });
        UnboundedReceiverStream::new(rx)
    }

    /// Restore a checkpoint and continue running to convergence or
    /// suspension.
    pub async fn run_from_checkpoint(&self, checkpoint_id: &str) -> Result<WorkflowRunResult> {
        let checkpoint = self.storage.load(&checkpoint_id.to_string()).await?;
        let ctx = self.new_context();
        ctx.apply_checkpoint(checkpoint).await?;
        self.restore_executor_checkpoint_state(&ctx).await;
        let RunOutcome { status, events } = scheduler::run_to_convergence(self, &ctx).await?;
        Ok(WorkflowRunResult { events, status })
    }

    /// Like [`Workflow::run_from_checkpoint`], but streams events as they
    /// occur rather than aggregating them (`spec.md` §4.8's `stream?`
    /// variant).
    pub fn run_from_checkpoint_stream(
        self: Arc<Self>,
        checkpoint_id: String,
    ) -> UnboundedReceiverStream<Event> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let checkpoint = match self.storage.load(&checkpoint_id).await {
                Ok(cp) => cp,
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                    return;
                }
            };
            let ctx = self.new_context();
            if let Err(err) = ctx.apply_checkpoint(checkpoint).await {
                let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                return;
            }
            self.restore_executor_checkpoint_state(&ctx).await;
            match scheduler::run_to_convergence(self.as_ref(), &ctx).await {
                Ok(outcome) => {
                    for event in outcome.events {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                }
            }
        });
        UnboundedReceiverStream::new(rx)
    }

    /// Apply caller-supplied responses to pending `request_info` calls, then
    /// continue running. This is the counterpart to a `RequestInfoEvent`
    /// surfaced from a prior `run`/`run_stream`/`run_from_checkpoint`
    /// call against the same (still-in-memory) context; cross-restart
    /// resumption goes through `run_from_checkpoint` plus this method.
    pub async fn send_responses(
        &self,
        checkpoint_id: &str,
        responses: HashMap<String, Response>,
    ) -> Result<WorkflowRunResult> {
        let checkpoint = self.storage.load(&checkpoint_id.to_string()).await?;
        let ctx = self.new_context();
        ctx.apply_checkpoint(checkpoint).await?;
        self.restore_executor_checkpoint_state(&ctx).await;
        let mut events = self.apply_responses(&ctx, responses).await?;
        let already_yielded_output = events
            .iter()
            .any(|e| matches!(e, Event::WorkflowOutput { .. }));
        let outcome =
            scheduler::run_to_convergence_from(self, &ctx, already_yielded_output).await?;
        events.extend(outcome.events);
        Ok(WorkflowRunResult {
            events,
            status: outcome.status,
        })
    }

    /// Like [`Workflow::send_responses`], but streams events as they occur
    /// (`spec.md` §4.8).
    pub fn send_responses_streaming(
        self: Arc<Self>,
        checkpoint_id: String,
        responses: HashMap<String, Response>,
    ) -> UnboundedReceiverStream<Event> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tokio::spawn(async move {
            let checkpoint = match self.storage.load(&checkpoint_id).await {
                Ok(cp) => cp,
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                    return;
                }
            };
            let ctx = self.new_context();
            if let Err(err) = ctx.apply_checkpoint(checkpoint).await {
                let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                return;
            }
            self.restore_executor_checkpoint_state(&ctx).await;
            let events = match self.apply_responses(&ctx, responses).await {
                Ok(events) => events,
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                    return;
                }
            };
            let already_yielded_output = events
                .iter()
                .any(|e| matches!(e, Event::WorkflowOutput { .. }));
            for event in events {
                if tx.send(event).is_err() {
                    return;
                }
            }
            match scheduler::run_to_convergence_from(self.as_ref(), &ctx, already_yielded_output).await {
                Ok(outcome) => {
                    for event in outcome.events {
                        if tx.send(event).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => {
                    let _ = tx.send(Event::WorkflowError { error: err.to_string() });
                }
            }
        });
        UnboundedReceiverStream::new(rx)
    }

    /// Re-run each executor's `on_checkpoint_restore` hook against the state
    /// `apply_checkpoint` just loaded into `ctx.executor_states` (`spec.md`
    /// §4.4). Plain-function executors have no hook and are skipped.
    async fn restore_executor_checkpoint_state(&self, ctx: &Arc<RunnerContext>) {
        for (exec_id, executor) in &self.executors {
            if let Some(restore) = &executor.on_checkpoint_restore {
                let value = ctx.get_executor_state(exec_id).await.unwrap_or(Json::Null);
                (restore)(value);
            }
        }
    }

    async fn apply_responses(
        &self,
        ctx: &Arc<RunnerContext>,
        responses: HashMap<String, Response>,
    ) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        for (request_id, response) in responses {
            let (record, response_value) = ctx.apply_response(&request_id, response).await?;
            events.extend(self.invoke_response_handler(ctx, record, response_value).await?);
        }
        Ok(events)
    }

    async fn invoke_response_handler(
        &self,
        ctx: &Arc<RunnerContext>,
        record: RequestRecord,
        response_value: Json,
    ) -> Result<Vec<Event>> {
        let executor = self
            .executors
            .get(&record.source_executor_id)
            .ok_or_else(|| WorkflowError::UnknownRequest(record.request_id.clone()))?;
        let Some(handler) = executor.response_handler.clone() else {
            return Ok(Vec::new());
        };
        let hctx = HandlerContext::new(
            record.source_executor_id.clone(),
            0,
            ctx.shared_state.clone(),
            ctx.cancellation.clone(),
        );
        handler(record.trigger_message.payload.clone(), response_value, hctx.clone())
            .await?;
        let outbox = hctx.take_outbox();
        let mut events: Vec<Event> = outbox
            .outputs
            .into_iter()
            .map(|value| Event::WorkflowOutput {
                source_id: record.source_executor_id.clone(),
                value,
            })
            .collect();
        events.extend(outbox.events);
        for message in outbox.messages {
            crate::scheduler::route_message(self, ctx, &record.source_executor_id, message, 0).await?;
        }
        Ok(events)
    }
}
