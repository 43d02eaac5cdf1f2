//! `SharedState`: the single mutable map visible to every executor in a run.
//!
//! Writes within a superstep are serialized by the scheduler driving a
//! single `RwLock` acquisition per read/write (`spec.md` §5) — handlers
//! racing within the same superstep do not observe each other's writes
//! until the next superstep's handlers run, since the scheduler only
//! merges an invocation's shared-state writes back after that invocation
//! completes.

use serde::Serialize;
use serde_json::Value as Json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct SharedState {
    inner: Arc<RwLock<HashMap<String, Json>>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<Json> {
        self.inner.read().await.get(key).cloned()
    }

    pub async fn set<T: Serialize>(&self, key: impl Into<String>, value: &T) -> serde_json::Result<()> {
        let encoded = serde_json::to_value(value)?;
        self.inner.write().await.insert(key.into(), encoded);
        Ok(())
    }

    pub async fn snapshot(&self) -> HashMap<String, Json> {
        self.inner.read().await.clone()
    }

    pub async fn restore(&self, state: HashMap<String, Json>) {
        *self.inner.write().await = state;
    }
}
