//! The [`Checkpoint`] data structure: a snapshot of runner state taken at a
//! superstep boundary, plus the small value types nested inside it.
//!
//! The field layout below matches the persisted JSON shape verbatim so a
//! checkpoint written by one process can be inspected, diffed, or migrated
//! by tooling that only speaks JSON:
//!
//! ```text
//! {
//!   "workflow_id": "...",
//!   "workflow_hash": "...",
//!   "iteration_count": N,
//!   "created_at": "ISO8601",
//!   "shared_state": { ...encoded... },
//!   "executor_states": { "<id>": ...encoded... },
//!   "pending_messages": [ {"source": "...", "target": "...", "type_tag": "...", "payload": ...encoded... } ],
//!   "pending_request_info_events": { "<request_id>": { "source_executor_id": "...", "request_type": "fqname", "response_type": "fqname", "data": ...encoded... } },
//!   "answered_request_ids": ["..."]
//! }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Opaque checkpoint identifier, unique within the storage backend.
pub type CheckpointId = String;

/// A single still-pending message captured at the moment the checkpoint was
/// taken, so it can be re-enqueued verbatim on restore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingMessage {
    pub source: String,
    pub target: String,
    /// The envelope's declared input type, needed to re-resolve the
    /// target's handler on restore (`scheduler.rs` matches handlers by this
    /// tag, not by payload shape).
    pub type_tag: String,
    pub payload: Json,
}

/// A still-outstanding `request_info` call captured at checkpoint time.
/// Mirrors `RequestRecord` but also carries the original trigger message
/// (encoded) so `response_handler` can be replayed after a restore.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingRequestInfoEvent {
    pub source_executor_id: String,
    pub request_type: String,
    pub response_type: String,
    pub data: Json,
    pub trigger_message: Json,
}

/// A complete snapshot of runner state, quiescent between supersteps —
/// checkpoints are never taken mid-superstep (`spec.md` §5).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    pub workflow_id: String,
    pub workflow_hash: String,
    pub iteration_count: u64,
    pub created_at: DateTime<Utc>,
    pub shared_state: HashMap<String, Json>,
    pub executor_states: HashMap<String, Json>,
    pub pending_messages: Vec<PendingMessage>,
    pub pending_request_info_events: HashMap<String, PendingRequestInfoEvent>,
    /// Request ids this run has already answered, kept so a second response
    /// to the same id is distinguishable from one that never existed
    /// (`spec.md` §7).
    pub answered_request_ids: HashSet<String>,
}

impl Checkpoint {
    pub fn new(workflow_id: impl Into<String>, workflow_hash: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            workflow_hash: workflow_hash.into(),
            iteration_count: 0,
            created_at: Utc::now(),
            shared_state: HashMap::new(),
            executor_states: HashMap::new(),
            pending_messages: Vec::new(),
            pending_request_info_events: HashMap::new(),
            answered_request_ids: HashSet::new(),
        }
    }

    /// Generate a fresh checkpoint identifier. Storage backends are free to
    /// assign their own IDs (e.g. a database sequence) instead.
    pub fn generate_id() -> CheckpointId {
        Uuid::new_v4().to_string()
    }
}

/// Lightweight listing entry returned by `CheckpointStorage::list`, cheap
/// enough to enumerate without deserializing the full checkpoint body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMetadata {
    pub checkpoint_id: CheckpointId,
    pub workflow_id: String,
    pub iteration_count: u64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut cp = Checkpoint::new("wf-1", "hash-abc");
        cp.shared_state.insert("count".into(), serde_json::json!(3));
        cp.pending_messages.push(PendingMessage {
            source: "a".into(),
            target: "b".into(),
            type_tag: "alloc::string::String".into(),
            payload: serde_json::json!("hello"),
        });
        let json = serde_json::to_string(&cp).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(cp, restored);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(Checkpoint::generate_id(), Checkpoint::generate_id());
    }
}
