//! Convergence bound: an acyclic pipeline converges in at most
//! `|executors|` supersteps, and an unbounded self-loop is terminated by
//! `max_iterations` rather than running forever.

use workflow_core::builder::WorkflowBuilder;
use workflow_core::event::{Event, WorkflowStatus};
use workflow_core::executor::Executor;

#[tokio::test]
async fn acyclic_chain_converges_within_executor_count_supersteps() {
    let a = Executor::new("a").with_handler::<i32, _, _>(|n, ctx| async move {
        ctx.send_message(&(n + 1), None)?;
        Ok(())
    });
    let b = Executor::new("b").with_handler::<i32, _, _>(|n, ctx| async move {
        ctx.send_message(&(n + 1), None)?;
        Ok(())
    });
    let c = Executor::new("c").with_handler::<i32, _, _>(|n, ctx| async move {
        ctx.yield_output(&n)?;
        Ok(())
    });

    let workflow = WorkflowBuilder::new()
        .set_start_executor(a)
        .register_executor(b)
        .register_executor(c)
        .add_edge("a", "b")
        .add_edge("b", "c")
        .build()
        .unwrap();

    let result = workflow.run(&0i32).await.unwrap();
    assert_eq!(result.get_final_state(), WorkflowStatus::Completed);

    let superstep_count = result
        .events
        .iter()
        .filter(|e| matches!(e, Event::SuperstepCompleted { .. }))
        .count();
    assert!(superstep_count <= 3, "got {superstep_count} supersteps for 3 executors");
}

#[tokio::test]
async fn unconditional_self_loop_is_bounded_by_max_iterations() {
    let looper = Executor::new("looper").with_handler::<i32, _, _>(|n, ctx| async move {
        ctx.send_message(&(n + 1), None)?;
        Ok(())
    });

    let workflow = WorkflowBuilder::new()
        .set_start_executor(looper)
        .add_loop("looper", "looper")
        .max_iterations(5)
        .build()
        .unwrap();

    let result = workflow.run(&0i32).await.unwrap();
    assert_eq!(result.get_final_state(), WorkflowStatus::MaxIterationsExceeded);

    let superstep_count = result
        .events
        .iter()
        .filter(|e| matches!(e, Event::SuperstepCompleted { .. }))
        .count();
    assert!(
        superstep_count < 5,
        "bound should trip before a 5th SuperstepCompleted is recorded, got {superstep_count}"
    );
}
