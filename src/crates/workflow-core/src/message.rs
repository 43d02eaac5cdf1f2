//! The message envelope passed between executors during a superstep.
//!
//! Every value an executor emits is wrapped in an [`Envelope`] before it
//! enters the pending-message queue: the payload itself, tagged with its
//! Rust type name so the router and the checkpoint codec can both reason
//! about it, plus provenance (`source_id`/`target_id`) and the superstep it
//! was produced in.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::any::type_name;

/// A typed value in transit between two executors.
///
/// `payload` is kept JSON-encoded rather than `Box<dyn Any>` so that
/// envelopes can be captured verbatim into a [`workflow_checkpoint::Checkpoint`]
/// and re-enqueued unchanged after a restore, without the codec needing to
/// know about this crate's types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub payload: Json,
    /// Rust type name of the value that was encoded, used by the router to
    /// match against a handler's declared input type. Not a stable ABI
    /// across crate versions — two processes exchanging checkpoints must
    /// agree on the executor graph's type set (`workflow_hash` enforces this).
    pub type_tag: String,
    pub source_id: String,
    pub target_id: String,
    pub superstep_seq: u64,
}

impl Envelope {
    pub fn new<T: Serialize>(
        payload: &T,
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        superstep_seq: u64,
    ) -> serde_json::Result<Self> {
        Ok(Self {
            payload: serde_json::to_value(payload)?,
            type_tag: type_tag_of::<T>(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            superstep_seq,
        })
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> serde_json::Result<T> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Type tag used to match a payload against a handler's declared input type.
/// `std::any::type_name` is not guaranteed stable across compiler versions,
/// but is stable within a single build, which is all routing within one
/// running workflow needs.
pub fn type_tag_of<T>() -> String {
    type_name::<T>().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_typed_payload() {
        let env = Envelope::new(&42i32, "a", "b", 0).unwrap();
        assert_eq!(env.decode::<i32>().unwrap(), 42);
        assert_eq!(env.type_tag, type_tag_of::<i32>());
    }

    #[test]
    fn type_tag_distinguishes_types() {
        assert_ne!(type_tag_of::<i32>(), type_tag_of::<String>());
    }
}
