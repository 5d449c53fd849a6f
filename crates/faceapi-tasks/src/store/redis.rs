//! Redis storage backend for task records.
//!
//! [`RedisBackend`] implements [`StorageBackend`] with plain string keys:
//! `PSETEX` for writes (value and millisecond expiry in one atomic command)
//! and `GET` for reads. Redis expires keys on its own, so
//! [`cleanup_expired`](StorageBackend::cleanup_expired) is a no-op.
//!
//! # Key Schema
//!
//! | Key Pattern | Type | Purpose |
//! |-------------|------|---------|
//! | `{prefix}:tasks:{task_id}` | String | Serialized task record (JSON) |
//!
//! # Usage
//!
//! ```rust,no_run
//! use faceapi_tasks::store::generic::GenericTaskStore;
//! use faceapi_tasks::store::redis::RedisBackend;
//!
//! # async fn example() {
//! let backend = RedisBackend::new("redis://127.0.0.1:6379").await.unwrap();
//! let store = GenericTaskStore::new(backend);
//! # }
//! ```

use std::time::Duration;

use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;

use crate::constants::DEFAULT_KEY_PREFIX;
use crate::store::backend::{StorageBackend, StorageError};

/// Redis storage backend for task records.
///
/// # Connection Model
///
/// `RedisBackend` holds a [`MultiplexedConnection`], which is cheap to
/// clone: all clones share one TCP connection. Each method clones it.
///
/// # Examples
///
/// ```rust,no_run
/// use faceapi_tasks::store::redis::RedisBackend;
///
/// # async fn example() {
/// let backend = RedisBackend::new("redis://127.0.0.1:6379")
///     .await
///     .unwrap()
///     .with_prefix("faceapi-staging");
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisBackend {
    /// Connects to Redis at `url` (`redis://[:<password>@]<host>:<port>[/<db>]`)
    /// with the default key prefix. Fails fast if the connection cannot be
    /// established.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Backend`] if the client cannot be created or
    /// the connection fails.
    pub async fn new(url: &str) -> Result<Self, StorageError> {
        let client = ::redis::Client::open(url).map_err(|e| StorageError::Backend {
            message: format!("failed to create Redis client: {e}"),
            source: Some(Box::new(e)),
        })?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StorageError::Backend {
                message: format!("failed to connect to Redis: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self::with_connection(conn))
    }

    /// Wraps a pre-built multiplexed connection, using the default key
    /// prefix.
    pub fn with_connection(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    /// Sets a custom key prefix (builder pattern).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn task_key(&self, key: &str) -> String {
        format!("{}:tasks:{}", self.key_prefix, key)
    }
}

/// Maps a Redis error to a [`StorageError::Backend`].
fn map_redis_error(err: ::redis::RedisError, key: &str) -> StorageError {
    StorageError::Backend {
        message: format!("Redis error for key {key}: {err}"),
        source: Some(Box::new(err)),
    }
}

/// Converts a TTL to whole milliseconds, rejecting values Redis would
/// treat as "no expiry" or cannot represent.
fn ttl_millis(key: &str, ttl: Duration) -> Result<u64, StorageError> {
    u64::try_from(ttl.as_millis())
        .ok()
        .filter(|ms| *ms > 0 && *ms <= i64::MAX as u64)
        .ok_or_else(|| StorageError::InvalidTtl {
            key: key.to_string(),
        })
}

#[async_trait]
impl StorageBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let mut conn = self.conn.clone();
        conn.get(self.task_key(key))
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn put(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), StorageError> {
        let millis = ttl_millis(key, ttl)?;
        let mut conn = self.conn.clone();
        conn.pset_ex::<_, _, ()>(self.task_key(key), data, millis)
            .await
            .map_err(|e| map_redis_error(e, key))
    }

    async fn cleanup_expired(&self) -> Result<usize, StorageError> {
        Ok(0)
    }
}
