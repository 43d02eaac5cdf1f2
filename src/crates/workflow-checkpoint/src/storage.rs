//! `CheckpointStorage`: the pluggable persistence backend for checkpoints.
//!
//! Mirrors the teacher's `CheckpointSaver` trait — `save`/`load`/`list`/
//! `delete` — but scoped to the flat [`Checkpoint`] shape this runtime uses
//! rather than per-channel versioning, since `SharedState`/`ExecutorState`
//! here are plain maps rather than reducer-backed channels.

use crate::checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata};
use crate::error::{CheckpointError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Pluggable checkpoint persistence. Implementations: in-memory (below),
/// filesystem (below), or a caller-supplied blob/database-backed store.
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Persist `checkpoint`, returning the id it was stored under.
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId>;

    /// Load a previously saved checkpoint by id.
    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint>;

    /// List metadata for all checkpoints belonging to `workflow_id`, most
    /// recent first.
    async fn list(&self, workflow_id: &str) -> Result<Vec<CheckpointMetadata>>;

    /// Delete a checkpoint. Deleting an unknown id is not an error.
    async fn delete(&self, id: &CheckpointId) -> Result<()>;

    /// Convenience: load the most recently saved checkpoint for a workflow.
    async fn load_latest(&self, workflow_id: &str) -> Result<Option<Checkpoint>> {
        let mut entries = self.list(workflow_id).await?;
        entries.sort_by_key(|m| m.created_at);
        match entries.pop() {
            Some(meta) => Ok(Some(self.load(&meta.checkpoint_id).await?)),
            None => Ok(None),
        }
    }
}

/// In-memory checkpoint storage. Ephemeral, thread-safe, ideal for tests and
/// single-process runs that don't need to survive a restart.
#[derive(Clone, Default)]
pub struct InMemoryCheckpointStorage {
    entries: Arc<RwLock<HashMap<CheckpointId, Checkpoint>>>,
}

impl InMemoryCheckpointStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every stored checkpoint. Handy for test isolation between
    /// cases that share a single storage instance.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStorage for InMemoryCheckpointStorage {
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId> {
        let id = Checkpoint::generate_id();
        self.entries.write().await.insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound(id.clone()))
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<CheckpointMetadata>> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(_, cp)| cp.workflow_id == workflow_id)
            .map(|(id, cp)| CheckpointMetadata {
                checkpoint_id: id.clone(),
                workflow_id: cp.workflow_id.clone(),
                iteration_count: cp.iteration_count,
                created_at: cp.created_at,
            })
            .collect())
    }

    async fn delete(&self, id: &CheckpointId) -> Result<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }
}

/// Filesystem checkpoint storage: one JSON file per checkpoint under
/// `root_dir`, named `<checkpoint_id>.json`.
///
/// Checkpoint writes here are best-effort from the runtime's point of view
/// (see `spec.md` §4.2): an I/O failure surfaces as `CheckpointError::Io`
/// and callers decide whether to treat it as fatal.
pub struct FileCheckpointStorage {
    root_dir: PathBuf,
}

impl FileCheckpointStorage {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    fn path_for(&self, id: &CheckpointId) -> PathBuf {
        self.root_dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl CheckpointStorage for FileCheckpointStorage {
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId> {
        tokio::fs::create_dir_all(&self.root_dir).await?;
        let id = Checkpoint::generate_id();
        let bytes = serde_json::to_vec_pretty(&checkpoint)?;
        tokio::fs::write(self.path_for(&id), bytes).await?;
        Ok(id)
    }

    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| CheckpointError::NotFound(id.clone()))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn list(&self, workflow_id: &str) -> Result<Vec<CheckpointMetadata>> {
        let mut out = Vec::new();
        let mut dir = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(dir) => dir,
            Err(_) => return Ok(out),
        };
        while let Some(entry) = dir.next_entry().await? {
            let bytes = tokio::fs::read(entry.path()).await?;
            let cp: Checkpoint = match serde_json::from_slice(&bytes) {
                Ok(cp) => cp,
                Err(_) => continue,
            };
            if cp.workflow_id == workflow_id {
                let id = entry
                    .path()
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
                out.push(CheckpointMetadata {
                    checkpoint_id: id,
                    workflow_id: cp.workflow_id,
                    iteration_count: cp.iteration_count,
                    created_at: cp.created_at,
                });
            }
        }
        Ok(out)
    }

    async fn delete(&self, id: &CheckpointId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CheckpointError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_save_load_round_trip() {
        let storage = InMemoryCheckpointStorage::new();
        let cp = Checkpoint::new("wf-1", "hash-a");
        let id = storage.save(cp.clone()).await.unwrap();
        let loaded = storage.load(&id).await.unwrap();
        assert_eq!(cp.workflow_id, loaded.workflow_id);
    }

    #[tokio::test]
    async fn load_unknown_id_is_not_found() {
        let storage = InMemoryCheckpointStorage::new();
        let err = storage.load(&"missing".to_string()).await.unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_workflow_and_load_latest_picks_newest() {
        let storage = InMemoryCheckpointStorage::new();
        let mut first = Checkpoint::new("wf-1", "hash-a");
        first.iteration_count = 1;
        let mut second = Checkpoint::new("wf-1", "hash-a");
        second.iteration_count = 2;
        second.created_at = first.created_at + chrono::Duration::seconds(1);
        storage.save(first).await.unwrap();
        storage.save(second).await.unwrap();
        storage.save(Checkpoint::new("wf-2", "hash-b")).await.unwrap();

        let listed = storage.list("wf-1").await.unwrap();
        assert_eq!(listed.len(), 2);

        let latest = storage.load_latest("wf-1").await.unwrap().unwrap();
        assert_eq!(latest.iteration_count, 2);
    }

    #[tokio::test]
    async fn file_storage_round_trips_via_tempdir() {
        let dir = std::env::temp_dir().join(format!("wf-checkpoint-test-{}", uuid::Uuid::new_v4()));
        let storage = FileCheckpointStorage::new(&dir);
        let cp = Checkpoint::new("wf-1", "hash-a");
        let id = storage.save(cp.clone()).await.unwrap();
        let loaded = storage.load(&id).await.unwrap();
        assert_eq!(cp.workflow_hash, loaded.workflow_hash);
        storage.delete(&id).await.unwrap();
        assert!(storage.load(&id).await.is_err());
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
