//! Low-level key-value storage backend trait and supporting types.
//!
//! The [`StorageBackend`] trait is the contract every storage engine
//! implements: [`get`](StorageBackend::get), [`put`](StorageBackend::put)
//! with a per-key time-to-live, and [`cleanup_expired`](StorageBackend::cleanup_expired).
//!
//! Backends are dumb stores of opaque bytes. Serialization, status/result
//! consistency and the default TTL live in
//! [`GenericTaskStore`](crate::store::generic::GenericTaskStore).
//!
//! # Keys
//!
//! Keys are task identifiers (hyphenated UUIDs). Backends store and return
//! them verbatim; shared backends may namespace them with a prefix.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

/// Errors that can occur during raw storage operations.
///
/// `GenericTaskStore` maps these to [`TaskError::StoreError`](crate::error::TaskError::StoreError)
/// before surfacing them to callers.
///
/// # Examples
///
/// ```
/// use faceapi_tasks::store::backend::StorageError;
///
/// let err = StorageError::InvalidTtl { key: "task-1".to_string() };
/// assert!(err.to_string().contains("task-1"));
/// ```
#[derive(Debug)]
pub enum StorageError {
    /// A write was attempted with a zero or unrepresentable time-to-live.
    InvalidTtl {
        /// The key of the rejected write.
        key: String,
    },

    /// An I/O or backend-specific error occurred (network failure,
    /// connection refused, protocol error).
    Backend {
        /// Human-readable description of the error.
        message: String,
        /// The underlying error, if available. Accessible via
        /// [`std::error::Error::source()`].
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTtl { key } => write!(f, "invalid ttl for key {key}"),
            Self::Backend { message, .. } => write!(f, "backend error: {message}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend {
                source: Some(src), ..
            } => Some(src.as_ref()),
            _ => None,
        }
    }
}

/// Key-value storage backend for task records.
///
/// # Expiry
///
/// Every write carries a time-to-live. Once it elapses, [`get`](Self::get)
/// must return `Ok(None)`, exactly as for a key that was never written.
/// How the entry is physically reclaimed is up to the backend.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the dispatching service and any
/// number of background orchestrator runs share one backend.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves the bytes stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent or expired.
    ///
    /// # Errors
    ///
    /// [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `data` under `key`, fully overwriting any previous value and
    /// restarting its expiry at `ttl`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::InvalidTtl`] if `ttl` is zero or too large.
    /// - [`StorageError::Backend`] on I/O or backend-specific failures.
    async fn put(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), StorageError>;

    /// Physically removes expired entries, returning how many were removed.
    ///
    /// Backends with native expiry (Redis) return `Ok(0)`.
    async fn cleanup_expired(&self) -> Result<usize, StorageError>;
}
