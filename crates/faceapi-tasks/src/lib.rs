//! Task model and result store for the Face API.
//!
//! Face-recognition engines can take seconds per call, so every operation
//! is submitted as a task and polled. This crate provides the pieces that
//! carry a task from submission to its terminal record:
//!
//! - [`types`] - [`Task`], [`TaskStatus`] (the `queued -> started ->
//!   finished | failed` state machine), the tagged [`TaskResult`] union and
//!   the per-operation result shapes returned by providers.
//! - [`store`] - [`TaskStore`](store::TaskStore), a typed task store with a
//!   per-key time-to-live over a dumb [`StorageBackend`](store::StorageBackend)
//!   (in-memory, or Redis behind the `redis` feature).
//! - [`error`] - [`TaskError`] with context fields.
//! - [`constants`] - fixed messages and defaults shared with the orchestrator.

pub mod constants;
pub mod error;
pub mod store;
pub mod types;

pub use constants::*;
pub use error::TaskError;
pub use types::*;
