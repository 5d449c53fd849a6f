//! Generic task store that delegates storage to a [`StorageBackend`].
//!
//! [`GenericTaskStore<B>`] owns the task-level concerns the backends know
//! nothing about: JSON serialization at the storage boundary, the status and
//! result consistency check on the way back out, the configured task TTL, and
//! mapping of raw [`StorageError`]s to [`TaskError`]s.
//!
//! # Examples
//!
//! ```
//! use faceapi_tasks::store::generic::GenericTaskStore;
//! use faceapi_tasks::store::memory::InMemoryBackend;
//! use faceapi_tasks::{Task, TaskId, TaskStatus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = GenericTaskStore::new(InMemoryBackend::new());
//! let id = TaskId::new();
//! store.put(&id, &Task::queued()).await.unwrap();
//! let task = store.get(&id).await.unwrap().unwrap();
//! assert_eq!(task.status(), TaskStatus::Queued);
//! # }
//! ```

use crate::error::TaskError;
use crate::store::backend::{StorageBackend, StorageError};
use crate::store::StoreConfig;
use crate::types::id::TaskId;
use crate::types::task::Task;

/// Typed task store over any [`StorageBackend`].
///
/// # Type Parameters
///
/// * `B` - A [`StorageBackend`] implementation (in-memory, Redis).
#[derive(Debug)]
pub struct GenericTaskStore<B: StorageBackend> {
    backend: B,
    config: StoreConfig,
}

impl<B: StorageBackend> GenericTaskStore<B> {
    /// Creates a store over `backend` with [`StoreConfig::default()`]
    /// (a 500 second task TTL).
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            config: StoreConfig::default(),
        }
    }

    /// Sets the store configuration.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---- Serialization helpers (private) ----

    fn serialize_task(task: &Task) -> Result<Vec<u8>, TaskError> {
        serde_json::to_vec(task)
            .map_err(|e| TaskError::Serialization(format!("failed to serialize task: {e}")))
    }

    fn deserialize_task(data: &[u8]) -> Result<Task, TaskError> {
        serde_json::from_slice(data)
            .map_err(|e| TaskError::Serialization(format!("failed to deserialize task: {e}")))
    }

    fn map_storage_error(&self, err: StorageError, task_id: &TaskId) -> TaskError {
        match err {
            StorageError::InvalidTtl { .. } => TaskError::StoreError(format!(
                "task {task_id}: configured ttl {:?} is not usable",
                self.config.task_ttl
            )),
            StorageError::Backend { message, .. } => TaskError::StoreError(message),
        }
    }

    /// Writes `task` under `task_id`, overwriting any previous record and
    /// restarting the task TTL.
    ///
    /// # Errors
    ///
    /// [`TaskError::StoreError`] if the backend rejects the write.
    pub async fn put(&self, task_id: &TaskId, task: &Task) -> Result<(), TaskError> {
        let data = Self::serialize_task(task)?;
        self.backend
            .put(&task_id.to_string(), &data, self.config.task_ttl)
            .await
            .map_err(|e| self.map_storage_error(e, task_id))?;
        tracing::debug!(task_id = %task_id, status = %task.status(), "task record written");
        Ok(())
    }

    /// Reads the record stored under `task_id`.
    ///
    /// Returns `Ok(None)` for unknown and expired tasks alike.
    ///
    /// # Errors
    ///
    /// - [`TaskError::StoreError`] if the backend fails.
    /// - [`TaskError::Serialization`] if the stored bytes are not a valid
    ///   task record.
    pub async fn get(&self, task_id: &TaskId) -> Result<Option<Task>, TaskError> {
        let data = self
            .backend
            .get(&task_id.to_string())
            .await
            .map_err(|e| self.map_storage_error(e, task_id))?;
        data.as_deref().map(Self::deserialize_task).transpose()
    }

    /// Physically removes expired records from the backend.
    ///
    /// # Errors
    ///
    /// [`TaskError::StoreError`] if the backend fails.
    pub async fn cleanup_expired(&self) -> Result<usize, TaskError> {
        let removed = self
            .backend
            .cleanup_expired()
            .await
            .map_err(|e| TaskError::StoreError(e.to_string()))?;
        if removed > 0 {
            tracing::debug!(removed, "expired task records removed");
        }
        Ok(removed)
    }
}
