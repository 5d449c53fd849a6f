//! Opaque task identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

/// Identifier issued when a task is submitted.
///
/// Serializes as the hyphenated UUID string, which is also the key of the
/// task record in the result store.
///
/// # Examples
///
/// ```
/// use faceapi_tasks::TaskId;
///
/// let id = TaskId::new();
/// let parsed = TaskId::parse(&id.to_string()).unwrap();
/// assert_eq!(id, parsed);
///
/// assert!(TaskId::parse("not-a-task").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh random (`UUIDv4`) identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a caller-supplied identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTaskId`] if `value` is not a UUID.
    pub fn parse(value: &str) -> Result<Self, TaskError> {
        Uuid::parse_str(value)
            .map(Self)
            .map_err(|_| TaskError::InvalidTaskId {
                value: value.to_string(),
            })
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
