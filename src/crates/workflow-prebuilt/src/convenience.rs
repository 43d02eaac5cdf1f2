//! Convenience builders for the two most common graph shapes: a straight
//! chain, and a dispatcher fanning out to a worker pool that fans back into
//! a single aggregator.

use crate::error::{PrebuiltError, Result};
use workflow_core::builder::WorkflowBuilder;
use workflow_core::executor::Executor;

/// Chain `executors` in registration order, wiring a direct edge between
/// each consecutive pair and starting at the first.
pub fn sequential(executors: Vec<Executor>) -> Result<WorkflowBuilder> {
    let mut iter = executors.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| PrebuiltError::Configuration("sequential() needs at least one executor".into()))?;

    let first_id = first.id.clone();
    let mut builder = WorkflowBuilder::new().set_start_executor(first);
    let mut previous_id = first_id;

    for executor in iter {
        let id = executor.id.clone();
        builder = builder.register_executor(executor).add_edge(previous_id, id.clone());
        previous_id = id;
    }

    Ok(builder)
}

/// Fan `dispatcher`'s output out to every worker, then fan every worker's
/// output back in to `aggregator` as a single list (`spec.md` §4.3 fan-out /
/// fan-in edges).
pub fn fan_out_fan_in(
    dispatcher: Executor,
    workers: Vec<Executor>,
    aggregator: Executor,
) -> Result<WorkflowBuilder> {
    if workers.is_empty() {
        return Err(PrebuiltError::Configuration(
            "fan_out_fan_in() needs at least one worker".into(),
        ));
    }

    let dispatcher_id = dispatcher.id.clone();
    let aggregator_id = aggregator.id.clone();
    let worker_ids: Vec<String> = workers.iter().map(|w| w.id.clone()).collect();

    let mut builder = WorkflowBuilder::new()
        .set_start_executor(dispatcher)
        .register_executor(aggregator);
    for worker in workers {
        builder = builder.register_executor(worker);
    }

    builder = builder
        .add_fan_out_edges(dispatcher_id, worker_ids.clone())
        .add_fan_in_edges(worker_ids, aggregator_id);

    Ok(builder)
}
