//! Fixed messages and defaults shared by the store and the orchestrator.

/// Message written to a task that failed for a reason the provider did not
/// report itself (panic, identity store failure, provider/identity desync).
///
/// The underlying error is logged, never stored in the task record.
pub const INTERNAL_PROVIDER_ERROR: &str = "internal provider error";

/// Default time-to-live of a task record, in seconds.
pub const DEFAULT_TASK_TTL_SECS: u64 = 500;

/// Default key prefix used by shared backends such as Redis.
pub const DEFAULT_KEY_PREFIX: &str = "faceapi";

/// Minimum time between two sweeps of expired entries in the in-memory
/// backend, in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;
