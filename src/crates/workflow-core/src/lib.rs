//! # workflow-core — a deterministic, checkpointable agent workflow runtime
//!
//! A Pregel-style superstep scheduler over named [`Executor`](executor::Executor)s
//! connected by typed [`Edge`](edge::Edge)s. It supports fan-out/fan-in,
//! loops, conditional and switch/case routing, nested sub-workflows, and
//! request/response human-in-the-loop suspension across crash-recoverable
//! checkpoints.
//!
//! ## Core concepts
//!
//! - **Executor** — a stable string ID plus a set of typed handlers
//!   (`input_type -> invoke(payload, ctx)`). Variants built on top of the
//!   same handler contract: a plain function executor
//!   ([`Executor::with_handler`](executor::Executor::with_handler)), an
//!   [`agent::agent_executor`] wrapping an opaque `Agent`, a
//!   [`workflow_executor::workflow_executor`] hosting a nested sub-workflow,
//!   and a [`request_info::request_info_executor`] that suspends the run
//!   for external input.
//! - **Edge** — an immutable `{source_id, target_id, kind}` record; kinds
//!   cover direct, conditional, switch/case, fan-out, multi-selection,
//!   fan-in, and loop routing ([`edge`]).
//! - **Superstep scheduler** — within one superstep every ready handler runs
//!   concurrently; the superstep completes once all finish, then edge
//!   routing enqueues the next superstep's messages ([`scheduler`]).
//! - **Checkpointing** — taken only at superstep boundaries, gated by a
//!   structural `workflow_hash` so a checkpoint can't be restored against an
//!   incompatible graph ([`context`], building on `workflow_checkpoint`).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use workflow_core::builder::WorkflowBuilder;
//! use workflow_core::executor::Executor;
//!
//! # async fn example() -> workflow_core::error::Result<()> {
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
//!     .build()?;
//!
//! let result = workflow.run(&"hello".to_string()).await?;
//! assert_eq!(result.get_outputs(), vec![&serde_json::json!("OLLEH")]);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod builder;
pub mod cancellation;
pub mod chat;
pub mod context;
pub mod edge;
pub mod error;
pub mod event;
pub mod executor;
pub mod hash;
pub mod message;
pub mod messages;
pub mod request_info;
pub mod scheduler;
pub mod shared_state;
pub mod workflow;
pub mod workflow_executor;

pub use builder::{SwitchCase, WorkflowBuilder};
pub use cancellation::CancellationToken;
pub use context::{Response, RunnerContext};
pub use edge::{Edge, EdgeKind, Predicate, Selector};
pub use error::{Result, WorkflowError};
pub use event::{Event, WorkflowStatus};
pub use executor::{Executor, HandlerContext};
pub use message::Envelope;
pub use workflow::{Workflow, WorkflowRunResult};
