//! Error types for task operations.
//!
//! Provides [`TaskError`], an error enum with context fields covering state
//! machine violations, malformed task records and store failures.

use std::fmt;

use crate::types::task::TaskStatus;

/// Errors that can occur while building, transitioning or storing tasks.
///
/// # Examples
///
/// ```
/// use faceapi_tasks::{TaskError, TaskStatus};
///
/// let err = TaskError::InvalidTransition {
///     task_id: "t-1".to_string(),
///     from: TaskStatus::Finished,
///     to: TaskStatus::Started,
///     suggested_action: None,
/// };
/// assert!(err.to_string().contains("t-1"));
/// assert!(!err.is_caller_error());
/// ```
#[derive(Debug)]
pub enum TaskError {
    /// Attempted an invalid state machine transition.
    InvalidTransition {
        /// The task that was being transitioned.
        task_id: String,
        /// The current status of the task.
        from: TaskStatus,
        /// The target status that was rejected.
        to: TaskStatus,
        /// Optional suggestion for the caller.
        suggested_action: Option<String>,
    },

    /// A status was paired with a result of the wrong shape
    /// (e.g. `finished` carrying a failure message).
    InconsistentResult {
        /// The status of the rejected record.
        status: TaskStatus,
        /// What was wrong with the result.
        reason: String,
    },

    /// A task identifier could not be parsed.
    InvalidTaskId {
        /// The rejected input.
        value: String,
    },

    /// A task record could not be serialized or deserialized.
    Serialization(String),

    /// Backend storage error.
    StoreError(String),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTransition {
                task_id, from, to, ..
            } => write!(
                f,
                "invalid transition from {from} to {to} for task {task_id}"
            ),
            Self::InconsistentResult { status, reason } => {
                write!(f, "inconsistent result for {status} task: {reason}")
            },
            Self::InvalidTaskId { value } => write!(f, "invalid task id: {value:?}"),
            Self::Serialization(msg) => write!(f, "task serialization error: {msg}"),
            Self::StoreError(msg) => write!(f, "store error: {msg}"),
        }
    }
}

impl std::error::Error for TaskError {}

impl TaskError {
    /// Returns `true` when the error was caused by caller input rather than
    /// by the system (only malformed task identifiers today).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidTaskId { .. })
    }
}
