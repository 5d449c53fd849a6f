//! In-memory storage backend and task store.
//!
//! [`InMemoryBackend`] is a thread-safe [`StorageBackend`] over
//! `DashMap<String, (Vec<u8>, Instant)>`, where the instant is the entry's
//! deadline. Expired entries are invisible to [`get`](StorageBackend::get)
//! immediately. They are reclaimed on read, by a sweep that `put` runs at
//! most once per sweep interval, or in bulk by
//! [`cleanup_expired`](StorageBackend::cleanup_expired).
//!
//! [`InMemoryTaskStore`] is [`GenericTaskStore`] over this backend.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use faceapi_tasks::store::memory::InMemoryTaskStore;
//! use faceapi_tasks::store::StoreConfig;
//!
//! let store = InMemoryTaskStore::default()
//!     .with_config(StoreConfig::default().with_task_ttl(Duration::from_secs(60)));
//! ```

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::constants::DEFAULT_SWEEP_INTERVAL_SECS;
use crate::store::backend::{StorageBackend, StorageError};
use crate::store::generic::GenericTaskStore;

/// Thread-safe in-memory storage backend using [`DashMap`].
///
/// Contains no domain logic: it stores opaque bytes with a deadline.
///
/// ```
/// use faceapi_tasks::store::memory::InMemoryBackend;
///
/// let backend = InMemoryBackend::new();
/// assert!(backend.is_empty());
/// ```
#[derive(Debug)]
pub struct InMemoryBackend {
    data: DashMap<String, (Vec<u8>, Instant)>,
    sweep_interval: Duration,
    last_sweep: Mutex<Instant>,
}

impl InMemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    /// Sets the minimum time between sweeps triggered by `put`.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Returns the number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Drops expired entries if the last sweep is older than the sweep
    /// interval. Returns the number of entries removed.
    fn maybe_sweep(&self, now: Instant) -> usize {
        {
            let mut last = self.last_sweep.lock();
            if now.saturating_duration_since(*last) < self.sweep_interval {
                return 0;
            }
            *last = now;
        }
        self.sweep(now)
    }

    fn sweep(&self, now: Instant) -> usize {
        let before = self.data.len();
        self.data.retain(|_, (_, deadline)| *deadline > now);
        before.saturating_sub(self.data.len())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let now = Instant::now();
        self.data.remove_if(key, |_, (_, deadline)| *deadline <= now);
        Ok(self.data.get(key).map(|entry| entry.value().0.clone()))
    }

    async fn put(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), StorageError> {
        let deadline = if ttl.is_zero() {
            None
        } else {
            Instant::now().checked_add(ttl)
        };
        let deadline = deadline.ok_or_else(|| StorageError::InvalidTtl {
            key: key.to_string(),
        })?;
        self.data.insert(key.to_string(), (data.to_vec(), deadline));

        let swept = self.maybe_sweep(Instant::now());
        if swept > 0 {
            tracing::debug!(swept, "dropped expired task records");
        }
        Ok(())
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        Ok(self.sweep(Instant::now()))
    }
}

/// Task store kept entirely in process memory.
///
/// Suitable for a single node and for tests. Records do not survive a
/// restart.
pub type InMemoryTaskStore = GenericTaskStore<InMemoryBackend>;

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        GenericTaskStore::new(InMemoryBackend::new())
    }
}
