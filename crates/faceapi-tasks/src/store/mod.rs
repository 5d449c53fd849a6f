//! Task store trait, generic implementation, and supporting types.
//!
//! # Architecture
//!
//! The result store has three layers:
//!
//! 1. **[`TaskStore`]** - A type-erasure interface for use as
//!    `Arc<dyn TaskStore>` by the orchestrator and the dispatching service.
//!
//! 2. **[`GenericTaskStore<B>`](generic::GenericTaskStore)** - Task-level
//!    logic (serialization, status/result consistency, TTL). Has a blanket
//!    `TaskStore` impl.
//!
//! 3. **[`StorageBackend`]** - Dumb KV trait with per-key expiry that
//!    backends implement. No domain logic.
//!
//! # Backends
//!
//! - [`InMemoryBackend`](crate::store::memory::InMemoryBackend) - `DashMap`
//!   backed, single process. Used by
//!   [`InMemoryTaskStore`](crate::store::memory::InMemoryTaskStore).
//! - [`RedisBackend`](crate::store::redis::RedisBackend) - Redis backed, for
//!   deployments where pollers and workers live in different processes.
//!   Available behind the `redis` feature flag.

pub mod backend;
pub mod generic;
pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;

pub use backend::{StorageBackend, StorageError};

use crate::constants::DEFAULT_TASK_TTL_SECS;
use crate::error::TaskError;
use crate::types::id::TaskId;
use crate::types::task::Task;

/// Store configuration.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use faceapi_tasks::store::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert_eq!(config.task_ttl, Duration::from_secs(500));
///
/// let short = StoreConfig::default().with_task_ttl(Duration::from_secs(5));
/// assert_eq!(short.task_ttl.as_secs(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Time-to-live applied to every write. Each write restarts it, so a
    /// record stays visible for this long after its last transition.
    pub task_ttl: Duration,
}

impl StoreConfig {
    /// Sets the task time-to-live.
    pub fn with_task_ttl(mut self, ttl: Duration) -> Self {
        self.task_ttl = ttl;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            task_ttl: Duration::from_secs(DEFAULT_TASK_TTL_SECS),
        }
    }
}

/// Object-safe task store used as `Arc<dyn TaskStore>`.
///
/// Every [`GenericTaskStore`](generic::GenericTaskStore) implements it. Each
/// write fully replaces the record under its key and restarts its expiry;
/// once expired, a task is indistinguishable from one that never existed.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Writes `task` under `task_id`.
    async fn put(&self, task_id: &TaskId, task: &Task) -> Result<(), TaskError>;

    /// Reads the live record under `task_id`, if any.
    async fn get(&self, task_id: &TaskId) -> Result<Option<Task>, TaskError>;

    /// Physically removes expired records, returning how many were removed.
    async fn cleanup_expired(&self) -> Result<usize, TaskError>;

    /// Returns the store configuration.
    fn config(&self) -> &StoreConfig;
}

#[async_trait]
impl<B: StorageBackend + 'static> TaskStore for generic::GenericTaskStore<B> {
    async fn put(&self, task_id: &TaskId, task: &Task) -> Result<(), TaskError> {
        self.put(task_id, task).await
    }

    async fn get(&self, task_id: &TaskId) -> Result<Option<Task>, TaskError> {
        self.get(task_id).await
    }

    async fn cleanup_expired(&self) -> Result<usize, TaskError> {
        self.cleanup_expired().await
    }

    fn config(&self) -> &StoreConfig {
        self.config()
    }
}
