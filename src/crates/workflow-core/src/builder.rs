//! `WorkflowBuilder`: fluent construction of an executor graph.
//!
//! Mirrors the teacher's `StateGraph` builder — register nodes, wire edges,
//! validate, compile — but over named [`Executor`]s connected by typed
//! [`Edge`]s rather than a single reducer-backed state channel (`spec.md`
//! §4.7).
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  WorkflowBuilder                                      │
//! │                                                        │
//! │  ┌──────────┐   direct    ┌──────────┐  fan-out  ┌───┐│
//! │  │  start   │ ───────────▶│  router  │ ─────────▶│ A ││
//! │  └──────────┘             └──────────┘            └─┬─┘│
//! │                                 │  switch/case       │ │
//! │                                 ▼                    ▼ │
//! │                            ┌──────────┐   fan-in  ┌───┐│
//! │                            │ fallback │◀──────────│ B ││
//! │                            └──────────┘           └───┘│
//! └──────────────────────────────────────────────────────┘
//!                       │ build()
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │  Workflow                                             │
//! │  • superstep scheduler  • checkpoint/resume           │
//! │  • request/response     • event stream                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use workflow_core::builder::WorkflowBuilder;
//! use workflow_core::executor::Executor;
//!
//! let uppercase = Executor::new("uppercase").with_handler::<String, _, _>(|s, ctx| async move {
//!     ctx.send_message(&s.to_uppercase(), None)?;
//!     Ok(())
//! });
//! let reverse = Executor::new("reverse").with_handler::<String, _, _>(|s, ctx| async move {
//!     ctx.yield_output(&s.chars().rev().collect::<String>())?;
//!     Ok(())
//! });
//!
//! let workflow = WorkflowBuilder::new()
//!     .set_start_executor(uppercase)
//!     .register_executor(reverse)
//!     .add_edge("uppercase", "reverse")
//!     .build()
//!     .unwrap();
//! ```

use crate::edge::{Edge, EdgeKind, Predicate, Selector};
use crate::error::{Result, WorkflowError};
use crate::executor::Executor;
use crate::hash::compute_workflow_hash;
use crate::workflow::Workflow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use workflow_checkpoint::{CheckpointStorage, InMemoryCheckpointStorage};

/// A `(predicate, target)` case in a switch/case group, or the group's
/// default target.
pub enum SwitchCase {
    Case(Predicate, String),
    Default(String),
}

pub struct WorkflowBuilder {
    start_id: Option<String>,
    executors: HashMap<String, Executor>,
    edges: Vec<Edge>,
    max_iterations: u64,
    storage: Option<Arc<dyn CheckpointStorage>>,
    isolated_errors: HashSet<String>,
    next_group_id: u64,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self {
            start_id: None,
            executors: HashMap::new(),
            edges: Vec::new(),
            max_iterations: 100,
            storage: None,
            isolated_errors: HashSet::new(),
            next_group_id: 0,
        }
    }

    fn fresh_group_id(&mut self, prefix: &str) -> String {
        self.next_group_id += 1;
        format!("{prefix}-{}", self.next_group_id)
    }

    /// Register `executor` and mark it as the workflow's entry point.
    pub fn set_start_executor(mut self, executor: Executor) -> Self {
        self.start_id = Some(executor.id.clone());
        self.executors.insert(executor.id.clone(), executor);
        self
    }

    pub fn register_executor(mut self, executor: Executor) -> Self {
        self.executors.insert(executor.id.clone(), executor);
        self
    }

    pub fn add_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::direct(source, target));
        self
    }

    pub fn add_conditional_edge(
        mut self,
        source: impl Into<String>,
        target: impl Into<String>,
        predicate: Predicate,
    ) -> Self {
        self.edges.push(Edge::conditional(source, target, predicate));
        self
    }

    /// Register an ordered switch/case group: the first matching case wins,
    /// falling back to `SwitchCase::Default` if present (`spec.md` §4.3).
    pub fn add_switch_case_edge_group(
        mut self,
        source: impl Into<String>,
        cases: Vec<SwitchCase>,
    ) -> Self {
        let source = source.into();
        let group_id = self.fresh_group_id("switch");
        for case in cases {
            let (predicate, target, is_default) = match case {
                SwitchCase::Case(p, t) => (p, t, false),
                SwitchCase::Default(t) => (Arc::new(|_: &serde_json::Value| true) as Predicate, t, true),
            };
            self.edges.push(Edge {
                source_id: source.clone(),
                target_id: target,
                kind: EdgeKind::SwitchCase {
                    predicate,
                    group_id: group_id.clone(),
                    is_default,
                },
                labels: Vec::new(),
            });
        }
        self
    }

    pub fn add_fan_out_edges(
        mut self,
        source: impl Into<String>,
        targets: Vec<String>,
    ) -> Self {
        let source = source.into();
        for target in targets {
            self.edges.push(Edge::fan_out(source.clone(), target));
        }
        self
    }

    /// Register a fan-in group: `target` is invoked with a list once every
    /// executor in `sources` has delivered since the group's last fire.
    pub fn add_fan_in_edges(mut self, sources: Vec<String>, target: impl Into<String>) -> Self {
        let target = target.into();
        let group_id = self.fresh_group_id("fanin");
        for source in sources {
            self.edges.push(Edge::fan_in(source, target.clone(), group_id.clone()));
        }
        self
    }

    pub fn add_multi_selection_edge_group(
        mut self,
        source: impl Into<String>,
        targets: Vec<String>,
        selector: Selector,
    ) -> Self {
        let source = source.into();
        let group_id = self.fresh_group_id("multi");
        for target in targets {
            self.edges.push(Edge {
                source_id: source.clone(),
                target_id: target,
                kind: EdgeKind::MultiSelection {
                    selector: selector.clone(),
                    group_id: group_id.clone(),
                },
                labels: Vec::new(),
            });
        }
        self
    }

    pub fn add_loop(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(Edge::loop_back(source, target));
        self
    }

    pub fn max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn checkpoint_storage(mut self, storage: Arc<dyn CheckpointStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Downgrade handler errors from `executor_id` to per-executor
    /// isolation: the failing message is dropped and the run continues
    /// (`spec.md` §4.5 "Errors").
    pub fn isolate_errors_from(mut self, executor_id: impl Into<String>) -> Self {
        self.isolated_errors.insert(executor_id.into());
        self
    }

    /// Validate graph structure and compute the stable `workflow_hash`
    /// gating checkpoint reuse (`spec.md` §4.7).
    pub fn build(self) -> Result<Workflow> {
        let start_id = self
            .start_id
            .ok_or_else(|| WorkflowError::validation("no start executor set"))?;

        for edge in &self.edges {
            if !self.executors.contains_key(&edge.source_id) {
                return Err(WorkflowError::validation(format!(
                    "edge source '{}' is not a registered executor",
                    edge.source_id
                )));
            }
            if !self.executors.contains_key(&edge.target_id) {
                return Err(WorkflowError::validation(format!(
                    "edge target '{}' is not a registered executor",
                    edge.target_id
                )));
            }
        }

        // Fan-in targets must have a handler whose input type is a list
        // (represented as `Vec<_>`'s type tag containing "Vec<").
        for edge in &self.edges {
            if edge.fan_in_group().is_some() {
                let target = &self.executors[&edge.target_id];
                let accepts_list = target
                    .handlers
                    .iter()
                    .any(|h| h.input_type_tag.starts_with("alloc::vec::Vec<"));
                if !accepts_list {
                    return Err(WorkflowError::validation(format!(
                        "fan-in target '{}' has no handler accepting a list input",
                        edge.target_id
                    )));
                }
            }
        }

        let reachable = reachable_from(&start_id, &self.edges);
        for id in self.executors.keys() {
            if !reachable.contains(id) {
                tracing::warn!(executor_id = %id, "executor is unreachable from the start executor");
            }
        }

        let executor_ids: Vec<String> = self.executors.keys().cloned().collect();
        let workflow_hash = compute_workflow_hash(&executor_ids, &self.edges);
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(InMemoryCheckpointStorage::new()));

        Ok(Workflow::new(
            start_id,
            self.executors,
            self.edges,
            workflow_hash,
            self.max_iterations,
            storage,
            self.isolated_errors,
        ))
    }
}

fn reachable_from(start: &str, edges: &[Edge]) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut stack = vec![start.to_string()];
    seen.insert(start.to_string());
    while let Some(id) = stack.pop() {
        for edge in edges.iter().filter(|e| e.source_id == id) {
            if seen.insert(edge.target_id.clone()) {
                stack.push(edge.target_id.clone());
            }
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough(id: &str) -> Executor {
        Executor::new(id).with_handler::<i32, _, _>(|n, ctx| async move {
            ctx.send_message(&n, None)?;
            Ok(())
        })
    }

    #[test]
    fn build_fails_without_start_executor() {
        let err = WorkflowBuilder::new().build().unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn build_fails_on_dangling_edge() {
        let err = WorkflowBuilder::new()
            .set_start_executor(passthrough("a"))
            .add_edge("a", "missing")
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn build_rejects_fan_in_target_without_list_handler() {
        let err = WorkflowBuilder::new()
            .set_start_executor(passthrough("a"))
            .register_executor(passthrough("b"))
            .register_executor(passthrough("agg"))
            .add_fan_in_edges(vec!["a".into(), "b".into()], "agg")
            .build()
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[test]
    fn build_succeeds_for_a_simple_chain() {
        let workflow = WorkflowBuilder::new()
            .set_start_executor(passthrough("a"))
            .register_executor(passthrough("b"))
            .add_edge("a", "b")
            .build()
            .unwrap();
        assert!(!workflow.workflow_hash().is_empty());
    }
}
