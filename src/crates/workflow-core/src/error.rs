//! Error types for workflow construction, routing, and execution.
//!
//! # Error Hierarchy
//!
//! ```text
//! WorkflowError
//! ├── Validation     - build-time graph structure errors
//! ├── Routing        - dispatch-time type mismatch / missing edge
//! ├── Handler        - an executor's handler raised
//! ├── Request        - request/response subsystem errors
//! ├── Checkpoint      - encode/decode/storage/hash-mismatch errors
//! └── MaxIterations  - convergence bound breached
//! ```
//!
//! Validation and routing errors are always fatal (`spec.md` §7). Handler
//! errors follow the builder's configured policy: `fatal` (default) fails
//! the run, `isolate` drops the message and the run continues.

use thiserror::Error;
use workflow_checkpoint::CheckpointError;

/// Result type used throughout the workflow runtime.
pub type Result<T> = std::result::Result<T, WorkflowError>;

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Raised at `WorkflowBuilder::build()` time: duplicate executor IDs,
    /// dangling edge endpoints, missing start executor, or a fan-in target
    /// whose handler does not accept a list input.
    #[error("workflow validation failed: {0}")]
    Validation(String),

    /// The router could not find a handler on the target executor whose
    /// declared input type matches the payload, or `send_message` targeted
    /// an executor with no corresponding edge.
    #[error("routing error: no compatible handler on '{target}' for message of type '{type_tag}'")]
    Routing { target: String, type_tag: String },

    /// A handler raised while processing a message.
    #[error("executor '{executor_id}' failed: {error}")]
    Handler { executor_id: String, error: String },

    /// `apply_response` was called with a `request_id` that has no pending
    /// record (already resolved, or never issued).
    #[error("unknown request id: {0}")]
    UnknownRequest(String),

    /// The response value's type did not match the `response_type` recorded
    /// when `request_info` was issued.
    #[error("response type mismatch for request '{request_id}': expected '{expected}', got '{actual}'")]
    ResponseType {
        request_id: String,
        expected: String,
        actual: String,
    },

    /// A response was applied to a request that had already been answered.
    #[error("request '{0}' has already received a response")]
    DuplicateResponse(String),

    /// Propagated from the checkpoint codec/storage layer.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// A checkpoint's `workflow_hash` does not match the workflow it is
    /// being restored against.
    #[error("checkpoint is incompatible: expected workflow hash '{expected}', found '{found}'")]
    CheckpointIncompatible { expected: String, found: String },

    /// The superstep loop reached `max_iterations` without converging.
    #[error("workflow exceeded max iterations ({0}) without converging")]
    MaxIterationsExceeded(u64),

    /// The run was cancelled by the caller. Not treated as a failure by
    /// callers that check for it explicitly, but still surfaced as an
    /// error variant so `?` propagation composes.
    #[error("workflow run was cancelled")]
    Cancelled,

    /// A handler payload or output value failed to encode/decode as JSON.
    #[error("message encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl WorkflowError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn from_json(err: serde_json::Error) -> Self {
        Self::Encoding(err)
    }

    pub fn routing(target: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self::Routing {
            target: target.into(),
            type_tag: type_tag.into(),
        }
    }

    pub fn handler(executor_id: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::Handler {
            executor_id: executor_id.into(),
            error: error.to_string(),
        }
    }
}
