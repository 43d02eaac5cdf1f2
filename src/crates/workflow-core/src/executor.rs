//! The executor contract: `handlers() -> [{input_type, invoke(payload, ctx)}]`
//! plus optional checkpoint save/restore hooks (`spec.md` §4.4).
//!
//! A handler does not write directly into the shared pending-message queue.
//! Instead it records its effects — outbound messages, yielded outputs,
//! custom events, and at most one `request_info` call — into a private
//! [`Outbox`] attached to its [`HandlerContext`]. The scheduler collects
//! every handler's outbox after a superstep's concurrent invocations all
//! complete, then applies edge routing (`spec.md` §4.5 step 4). This keeps
//! concurrent handlers within one superstep from needing to serialize
//! against a shared queue, matching the "no ordering guarantee across
//! different source/target pairs" rule in §5.

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::event::Event;
use crate::message::type_tag_of;
use crate::shared_state::SharedState;
use serde::Serialize;
use serde_json::Value as Json;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type HandlerFn =
    Arc<dyn Fn(Json, HandlerContext) -> HandlerFuture + Send + Sync>;

/// An outbound message a handler produced, pending edge routing.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub payload: Json,
    pub type_tag: String,
    /// `Some` when the handler used an explicit `target_id`, bypassing
    /// predicate evaluation (still requires an existing edge, `spec.md` §4.3
    /// rule 4).
    pub explicit_target: Option<String>,
}

/// A `request_info` call recorded by a handler during its invocation.
#[derive(Debug, Clone)]
pub struct RequestInfoCall {
    pub data: Json,
    pub request_type: String,
    pub response_type: String,
}

/// Effects accumulated by a single handler invocation, collected by the
/// scheduler once the invocation's future resolves.
#[derive(Debug, Default)]
pub struct Outbox {
    pub messages: Vec<OutboundMessage>,
    pub events: Vec<Event>,
    pub outputs: Vec<Json>,
    pub request: Option<RequestInfoCall>,
}

/// The per-invocation context passed to a handler. Cheap to clone; every
/// clone shares the same outbox, shared-state handle, and cancellation
/// token.
#[derive(Clone)]
pub struct HandlerContext {
    pub executor_id: String,
    pub superstep_seq: u64,
    pub shared_state: SharedState,
    pub cancellation: CancellationToken,
    outbox: Arc<Mutex<Outbox>>,
}

impl HandlerContext {
    pub fn new(
        executor_id: impl Into<String>,
        superstep_seq: u64,
        shared_state: SharedState,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            executor_id: executor_id.into(),
            superstep_seq,
            shared_state,
            cancellation,
            outbox: Arc::new(Mutex::new(Outbox::default())),
        }
    }

    /// Enqueue a routed message. `target_id` bypasses edge predicates but
    /// still requires an existing edge from this executor to the target.
    pub fn send_message<T: Serialize>(&self, payload: &T, target_id: Option<&str>) -> Result<()> {
        let encoded = serde_json::to_value(payload).map_err(crate::error::WorkflowError::from_json)?;
        self.outbox.lock().unwrap().messages.push(OutboundMessage {
            payload: encoded,
            type_tag: type_tag_of::<T>(),
            explicit_target: target_id.map(String::from),
        });
        Ok(())
    }

    pub fn yield_output<T: Serialize>(&self, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value).map_err(crate::error::WorkflowError::from_json)?;
        self.outbox.lock().unwrap().outputs.push(encoded);
        Ok(())
    }

    /// Like [`HandlerContext::yield_output`] but for a value already
    /// JSON-encoded, e.g. an inner workflow's output forwarded verbatim by
    /// a `WorkflowExecutor`.
    pub fn yield_output_json(&self, value: Json) {
        self.outbox.lock().unwrap().outputs.push(value);
    }

    pub fn add_event(&self, event: Event) {
        self.outbox.lock().unwrap().events.push(event);
    }

    /// Record a `request_info` call. Does not enqueue any downstream
    /// message for this emission (`spec.md` §4.6 step 4); the workflow
    /// suspends once the current superstep drains.
    pub fn request_info<T: Serialize>(
        &self,
        payload: &T,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Result<()> {
        let encoded = serde_json::to_value(payload).map_err(crate::error::WorkflowError::from_json)?;
        self.outbox.lock().unwrap().request = Some(RequestInfoCall {
            data: encoded,
            request_type: request_type.into(),
            response_type: response_type.into(),
        });
        Ok(())
    }

    /// Drain this invocation's accumulated outbox. Called by the scheduler
    /// after the handler's future resolves.
    pub fn take_outbox(&self) -> Outbox {
        std::mem::take(&mut self.outbox.lock().unwrap())
    }
}

/// A single registered handler: the input type it accepts and the function
/// invoked for matching payloads.
#[derive(Clone)]
pub struct HandlerEntry {
    pub input_type_tag: String,
    pub invoke: HandlerFn,
}

/// An executor state save/restore hook pair, used for checkpointing
/// (`spec.md` §4.4: "may implement `on_checkpoint_save()` / `on_checkpoint_restore()`").
pub type SaveHook = Arc<dyn Fn() -> Json + Send + Sync>;
pub type RestoreHook = Arc<dyn Fn(Json) + Send + Sync>;

/// Invoked when a caller supplies a response to one of this executor's
/// `request_info` calls: `(original_trigger_payload, response_value, ctx)`
/// (`spec.md` §4.6). Only `RequestInfoExecutor`-style executors set this.
pub type ResponseHandlerFn =
    Arc<dyn Fn(Json, Json, HandlerContext) -> HandlerFuture + Send + Sync>;

/// A node in the workflow graph: a stable ID plus a set of typed handlers.
#[derive(Clone)]
pub struct Executor {
    pub id: String,
    pub handlers: Vec<HandlerEntry>,
    pub on_checkpoint_save: Option<SaveHook>,
    pub on_checkpoint_restore: Option<RestoreHook>,
    pub response_handler: Option<ResponseHandlerFn>,
}

impl Executor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            on_checkpoint_save: None,
            on_checkpoint_restore: None,
            response_handler: None,
        }
    }

    pub fn with_response_handler(mut self, handler: ResponseHandlerFn) -> Self {
        self.response_handler = Some(handler);
        self
    }

    /// Register a typed handler. `T` becomes this handler's declared input
    /// type; the router matches payload type tags against it.
    pub fn with_handler<T, F, Fut>(mut self, handler: F) -> Self
    where
        T: for<'de> serde::Deserialize<'de> + Send + 'static,
        F: Fn(T, HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let invoke: HandlerFn = Arc::new(move |payload: Json, ctx: HandlerContext| {
            let handler = handler.clone();
            Box::pin(async move {
                let decoded: T = serde_json::from_value(payload)
                    .map_err(crate::error::WorkflowError::from_json)?;
                handler(decoded, ctx).await
            })
        });
        self.handlers.push(HandlerEntry {
            input_type_tag: type_tag_of::<T>(),
            invoke,
        });
        self
    }

    pub fn with_checkpoint_hooks(mut self, save: SaveHook, restore: RestoreHook) -> Self {
        self.on_checkpoint_save = Some(save);
        self.on_checkpoint_restore = Some(restore);
        self
    }

    /// Find the handler whose declared input type matches `type_tag`, if any.
    pub fn handler_for(&self, type_tag: &str) -> Option<&HandlerEntry> {
        self.handlers.iter().find(|h| h.input_type_tag == type_tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_state::SharedState;

    #[tokio::test]
    async fn handler_decodes_typed_payload_and_records_output() {
        let executor = Executor::new("doubler").with_handler::<i32, _, _>(|n, ctx| async move {
            ctx.yield_output(&(n * 2))?;
            Ok(())
        });

        let entry = executor.handler_for(&type_tag_of::<i32>()).unwrap();
        let ctx = HandlerContext::new(
            "doubler",
            0,
            SharedState::new(),
            CancellationToken::new(),
        );
        (entry.invoke)(serde_json::json!(21), ctx.clone())
            .await
            .unwrap();
        let outbox = ctx.take_outbox();
        assert_eq!(outbox.outputs, vec![serde_json::json!(42)]);
    }

    #[test]
    fn handler_for_unknown_type_returns_none() {
        let executor = Executor::new("e").with_handler::<i32, _, _>(|_n: i32, _ctx| async move { Ok(()) });
        assert!(executor.handler_for(&type_tag_of::<String>()).is_none());
    }
}
