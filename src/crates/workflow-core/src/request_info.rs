//! `RequestInfoExecutor`: calls `ctx.request_info(..)` and suspends; resumes
//! via its `response_handler` once a caller applies a response (`spec.md`
//! §4.4, §4.6).
//!
//! Unlike a plain function executor, a request-info executor's "resume"
//! logic lives in a second callback (`on_response`) rather than inline
//! `await` on the registered handler — the workflow itself suspends at
//! `request_info`, so there is no in-flight task left to resume.

use crate::executor::{Executor, HandlerContext, ResponseHandlerFn};
use crate::message::type_tag_of;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value as Json;
use std::future::Future;
use std::sync::Arc;

/// Build an executor whose single handler issues a `request_info` call for
/// every incoming message of type `T`, and whose `response_handler`
/// decodes the caller's response as `R` before running `on_response`.
///
/// `request_type`/`response_type` are the fully-qualified names surfaced on
/// [`crate::event::Event::RequestInfo`]; they default to the Rust type
/// names of `T`/`R` unless overridden.
pub fn request_info_executor<T, R, F, Fut>(
    id: impl Into<String>,
    on_response: F,
) -> Executor
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
    R: Serialize + DeserializeOwned + Send + Sync + 'static,
    F: Fn(T, R, HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = crate::error::Result<()>> + Send + 'static,
{
    let id = id.into();
    let request_type = type_tag_of::<T>();
    let response_type = type_tag_of::<R>();

    let executor = Executor::new(id).with_handler::<T, _, _>(move |payload, ctx: HandlerContext| {
        let request_type = request_type.clone();
        let response_type = response_type.clone();
        async move {
            ctx.request_info(&payload, request_type, response_type)?;
            Ok(())
        }
    });

    let on_response = Arc::new(on_response);
    let response_handler: ResponseHandlerFn = Arc::new(move |trigger: Json, response: Json, ctx| {
        let on_response = on_response.clone();
        Box::pin(async move {
            let trigger: T =
                serde_json::from_value(trigger).map_err(crate::error::WorkflowError::from_json)?;
            let response: R =
                serde_json::from_value(response).map_err(crate::error::WorkflowError::from_json)?;
            on_response(trigger, response, ctx).await
        })
    });

    executor.with_response_handler(response_handler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancellation::CancellationToken;
    use crate::shared_state::SharedState;

    #[tokio::test]
    async fn handler_records_a_request_info_call() {
        let executor = request_info_executor::<String, bool, _, _>("gate", |_trigger, approved, ctx| async move {
            ctx.yield_output(&approved)?;
            Ok(())
        });
        let entry = executor.handler_for(&type_tag_of::<String>()).unwrap();
        let ctx = HandlerContext::new("gate", 0, SharedState::new(), CancellationToken::new());
        (entry.invoke)(serde_json::json!("approve this"), ctx.clone())
            .await
            .unwrap();
        let outbox = ctx.take_outbox();
        assert!(outbox.request.is_some());
        assert!(outbox.messages.is_empty());
    }

    #[tokio::test]
    async fn response_handler_decodes_trigger_and_response() {
        let executor = request_info_executor::<String, bool, _, _>("gate", |trigger, approved, ctx| async move {
            ctx.yield_output(&format!("{trigger}:{approved}"))?;
            Ok(())
        });
        let handler = executor.response_handler.clone().unwrap();
        let ctx = HandlerContext::new("gate", 0, SharedState::new(), CancellationToken::new());
        handler(serde_json::json!("req"), serde_json::json!(true), ctx.clone())
            .await
            .unwrap();
        let outbox = ctx.take_outbox();
        assert_eq!(outbox.outputs, vec![serde_json::json!("req:true")]);
    }
}
