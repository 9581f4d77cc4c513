//! Execution checkpoints for crash recovery.
//!
//! The engine snapshots a top-level execution's `ExecutionState` after every
//! wave and when the execution ends. A snapshot is enough to resume: completed
//! nodes keep their outputs and only pending nodes run again. Storage is an
//! injected `CheckpointStore`; `InMemoryCheckpointStore` covers tests and
//! embedding.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use flowsmith_types::execution::{ExecutionState, ExecutionTrace};
use flowsmith_types::workflow::Params;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::invoker::BoxFuture;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A resumable snapshot of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: Uuid,
    pub workflow_name: String,
    /// Runtime parameters the execution was started with.
    pub params: Params,
    pub state: ExecutionState,
    #[serde(default)]
    pub trace: ExecutionTrace,
    pub status: CheckpointStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("no checkpoint for session {0}")]
    NotFound(Uuid),

    #[error("checkpoint belongs to workflow '{found}', not '{expected}'")]
    WorkflowMismatch { expected: String, found: String },

    #[error("checkpoint storage error: {0}")]
    Storage(String),
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistence backend for checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Insert or replace the checkpoint for its session.
    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<(), CheckpointError>>;

    fn load(&self, session_id: Uuid) -> BoxFuture<'_, Result<Option<Checkpoint>, CheckpointError>>;

    /// Returns whether a checkpoint was removed.
    fn delete(&self, session_id: Uuid) -> BoxFuture<'_, Result<bool, CheckpointError>>;
}

/// Process-local checkpoint store.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    entries: DashMap<Uuid, Checkpoint>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<(), CheckpointError>> {
        Box::pin(async move {
            tracing::debug!(
                session_id = %checkpoint.session_id,
                workflow = checkpoint.workflow_name.as_str(),
                status = ?checkpoint.status,
                completed = checkpoint.state.completion_order.len(),
                "checkpoint saved"
            );
            self.entries.insert(checkpoint.session_id, checkpoint);
            Ok(())
        })
    }

    fn load(&self, session_id: Uuid) -> BoxFuture<'_, Result<Option<Checkpoint>, CheckpointError>> {
        Box::pin(async move { Ok(self.entries.get(&session_id).map(|e| e.value().clone())) })
    }

    fn delete(&self, session_id: Uuid) -> BoxFuture<'_, Result<bool, CheckpointError>> {
        Box::pin(async move { Ok(self.entries.remove(&session_id).is_some()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn checkpoint(session_id: Uuid) -> Checkpoint {
        let mut state = ExecutionState::root("research");
        state.record_output("research", json!("facts")).unwrap();
        Checkpoint {
            session_id,
            workflow_name: "research".into(),
            params: Params::new(),
            state,
            trace: ExecutionTrace::new("research", 0),
            status: CheckpointStatus::Running,
            error: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let store = InMemoryCheckpointStore::new();
        let id = Uuid::now_v7();
        store.save(checkpoint(id)).await.unwrap();
        assert_eq!(store.len(), 1);

        let loaded = store.load(id).await.unwrap().unwrap();
        assert!(loaded.state.is_completed("research"));

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert!(store.load(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces() {
        let store = InMemoryCheckpointStore::new();
        let id = Uuid::now_v7();
        store.save(checkpoint(id)).await.unwrap();
        let mut updated = checkpoint(id);
        updated.status = CheckpointStatus::Completed;
        store.save(updated).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.load(id).await.unwrap().unwrap().status, CheckpointStatus::Completed);
    }

    #[test]
    fn test_checkpoint_json_roundtrip() {
        let cp = checkpoint(Uuid::now_v7());
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cp);
    }
}
