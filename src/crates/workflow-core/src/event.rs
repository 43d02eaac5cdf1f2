//! The event stream vocabulary emitted by a running workflow.
//!
//! Event ordering follows causal order of emission (`spec.md` §5): an
//! `ExecutorInvoked` for X precedes its matching `ExecutorCompleted`/
//! `ExecutorFailed`; a `SuperstepCompleted` follows every event of that
//! superstep.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Run-level status, mirroring the state machine in `spec.md` §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Idle,
    Running,
    SuspendedForRequest,
    Completed,
    Failed,
    Cancelled,
    MaxIterationsExceeded,
}

/// A single occurrence in a workflow run's event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ExecutorInvoked {
        executor_id: String,
        superstep_seq: u64,
    },
    ExecutorCompleted {
        executor_id: String,
        superstep_seq: u64,
    },
    ExecutorFailed {
        executor_id: String,
        superstep_seq: u64,
        error: String,
    },
    /// An intermediate update forwarded from an `AgentExecutor`'s wrapped
    /// `Agent` while it streams.
    AgentRun {
        executor_id: String,
        update: Json,
    },
    WorkflowOutput {
        source_id: String,
        value: Json,
    },
    RequestInfo {
        request_id: String,
        source_executor_id: String,
        request_type: String,
        response_type: String,
        data: Json,
    },
    SuperstepCompleted {
        superstep_seq: u64,
        checkpoint_id: Option<String>,
    },
    WorkflowStatusChanged {
        status: WorkflowStatus,
    },
    /// A caller- or executor-defined event added via `ctx.add_event(..)`,
    /// not otherwise covered by the vocabulary above.
    Custom {
        source_id: String,
        kind: String,
        data: Json,
    },
    WorkflowError {
        error: String,
    },
}

impl Event {
    /// `executor_id`/`source_id` this event is attributed to, where
    /// applicable. Used by `WorkflowExecutor` to build the path-prefixed
    /// re-emission of inner lifecycle events (`spec.md` §4.4).
    pub fn actor_id(&self) -> Option<&str> {
        match self {
            Event::ExecutorInvoked { executor_id, .. }
            | Event::ExecutorCompleted { executor_id, .. }
            | Event::ExecutorFailed { executor_id, .. }
            | Event::AgentRun { executor_id, .. } => Some(executor_id),
            Event::WorkflowOutput { source_id, .. } | Event::Custom { source_id, .. } => {
                Some(source_id)
            }
            Event::RequestInfo {
                source_executor_id, ..
            } => Some(source_executor_id),
            _ => None,
        }
    }

    /// Re-emit an inner sub-workflow's event prefixed with the hosting
    /// `WorkflowExecutor`'s ID, joined by `/` (`spec.md` §4.4:
    /// "inner lifecycle events are re-emitted with a path prefix").
    pub fn with_path_prefix(self, prefix: &str) -> Event {
        let prefixed = |id: &str| format!("{prefix}/{id}");
        match self {
            Event::ExecutorInvoked {
                executor_id,
                superstep_seq,
            } => Event::ExecutorInvoked {
                executor_id: prefixed(&executor_id),
                superstep_seq,
            },
            Event::ExecutorCompleted {
                executor_id,
                superstep_seq,
            } => Event::ExecutorCompleted {
                executor_id: prefixed(&executor_id),
                superstep_seq,
            },
            Event::ExecutorFailed {
                executor_id,
                superstep_seq,
                error,
            } => Event::ExecutorFailed {
                executor_id: prefixed(&executor_id),
                superstep_seq,
                error,
            },
            Event::AgentRun { executor_id, update } => Event::AgentRun {
                executor_id: prefixed(&executor_id),
                update,
            },
            Event::WorkflowOutput { source_id, value } => Event::WorkflowOutput {
                source_id: prefixed(&source_id),
                value,
            },
            Event::Custom {
                source_id,
                kind,
                data,
            } => Event::Custom {
                source_id: prefixed(&source_id),
                kind,
                data,
            },
            other => other,
        }
    }
}
