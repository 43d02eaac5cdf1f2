//! Sequential pipeline: uppercase -> reverse, producing a single output.

use workflow_core::builder::WorkflowBuilder;
use workflow_core::executor::Executor;
use workflow_core::event::WorkflowStatus;

#[tokio::test]
async fn uppercase_then_reverse_yields_expected_output() {
    let uppercase = Executor::new("uppercase").with_handler::<String, _, _>(|s, ctx| async move {
        ctx.send_message(&s.to_uppercase(), None)?;
        Ok(())
    });
    let reverse = Executor::new("reverse").with_handler::<String, _, _>(|s, ctx| async move {
        ctx.yield_output(&s.chars().rev().collect::<String>())?;
        Ok(())
    });

    let workflow = WorkflowBuilder::new()
        .set_start_executor(uppercase)
        .register_executor(reverse)
        .add_edge("uppercase", "reverse")
        .build()
        .unwrap();

    let result = workflow.run(&"hello".to_string()).await.unwrap();
    assert_eq!(result.get_final_state(), WorkflowStatus::Completed);
    assert_eq!(result.get_outputs(), vec![&serde_json::json!("OLLEH")]);
}
