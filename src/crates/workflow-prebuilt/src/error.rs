//! Error types for the prebuilt constructors. Most failures are just the
//! underlying `workflow_core::WorkflowError` surfacing through `?`; this
//! type adds the handful of cases specific to assembling a prebuilt
//! pattern before it reaches `WorkflowBuilder::build`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PrebuiltError>;

#[derive(Error, Debug)]
pub enum PrebuiltError {
    /// A convenience builder was given an input that can't form a valid
    /// graph (e.g. an empty executor list for `sequential`).
    #[error("invalid prebuilt configuration: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Workflow(#[from] workflow_core::WorkflowError),
}
