//! # workflow-checkpoint
//!
//! The Checkpoint Codec and storage abstractions used by `workflow-core` to
//! make a workflow run crash-recoverable.
//!
//! A [`Checkpoint`] is a complete, quiescent snapshot of runner state —
//! shared state, per-executor state, still-pending messages, and
//! outstanding `request_info` records — taken only at superstep
//! boundaries. [`codec`] encodes/decodes the arbitrary handler payloads and
//! executor state values nested inside a checkpoint to and from a
//! JSON-safe representation with enough type tagging to reconstruct the
//! original shape. [`CheckpointStorage`] is the pluggable persistence
//! backend; [`InMemoryCheckpointStorage`] and [`FileCheckpointStorage`] are
//! provided as reference implementations, matching the reference
//! implementations a downstream database/object-store backend would swap
//! in.
//!
//! This crate has no knowledge of executors, edges, or the scheduler — it
//! only knows how to shape and persist the state those components produce.
//! `workflow-core` depends on it; it does not depend back.

pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod serializer;
pub mod storage;

pub use checkpoint::{
    Checkpoint, CheckpointId, CheckpointMetadata, PendingMessage, PendingRequestInfoEvent,
};
pub use codec::{
    decode, decode_datetime, decode_opaque, encode, encode_dataclass, encode_datetime,
    encode_opaque, encode_tagged, resolve, DecodeFn, TypeRegistry,
};
pub use error::{CheckpointError, Result};
pub use serializer::{BincodeSerializer, JsonSerializer, SerializerProtocol};
pub use storage::{CheckpointStorage, FileCheckpointStorage, InMemoryCheckpointStorage};
