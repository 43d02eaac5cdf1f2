//! Request/response human-in-the-loop: a gate executor suspends the
//! workflow via `request_info`, the caller answers out-of-band, and
//! `send_responses` resumes the run through the gate's `response_handler`.

use workflow_core::builder::WorkflowBuilder;
use workflow_core::context::Response;
use workflow_core::event::{Event, WorkflowStatus};
use workflow_core::executor::Executor;
use workflow_core::request_info::request_info_executor;
use std::collections::HashMap;

fn gate() -> Executor {
    request_info_executor::<String, bool, _, _>("gate", |draft, approved, ctx| async move {
        if approved {
            ctx.yield_output(&format!("approved: {draft}"))?;
        } else {
            ctx.yield_output(&format!("rejected: {draft}"))?;
        }
        Ok(())
    })
}

#[tokio::test]
async fn approval_gate_suspends_then_resumes_on_response() {
    let workflow = WorkflowBuilder::new().set_start_executor(gate()).build().unwrap();

    let suspended = workflow.run(&"ship v2".to_string()).await.unwrap();
    assert_eq!(suspended.get_final_state(), WorkflowStatus::SuspendedForRequest);

    let request_id = suspended
        .events
        .iter()
        .find_map(|e| match e {
            Event::RequestInfo { request_id, .. } => Some(request_id.clone()),
            _ => None,
        })
        .expect("a RequestInfoEvent should have been emitted");

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
        .expect("a checkpoint should have been taken at the suspension boundary");

    let mut responses = HashMap::new();
    responses.insert(request_id, Response::new(&true).unwrap());
    let resumed = workflow
        .send_responses(&checkpoint_id, responses)
        .await
        .unwrap();

    assert_eq!(resumed.get_final_state(), WorkflowStatus::Completed);
    assert_eq!(
        resumed.get_outputs(),
        vec![&serde_json::json!("approved: ship v2")]
    );
}

#[tokio::test]
async fn answering_an_unknown_request_id_is_an_error() {
    let workflow = WorkflowBuilder::new().set_start_executor(gate()).build().unwrap();
    let suspended = workflow.run(&"ship v2".to_string()).await.unwrap();
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

    let mut responses = HashMap::new();
    responses.insert("not-a-real-request".to_string(), Response::new(&true).unwrap());
    let err = workflow
        .send_responses(&checkpoint_id, responses)
        .await
        .unwrap_err();
    assert!(matches!(err, workflow_core::WorkflowError::UnknownRequest(_)));
}
