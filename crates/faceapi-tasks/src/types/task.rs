//! The task record and its lifecycle.
//!
//! A task is written `queued` by the dispatching service, overwritten
//! `started` when the orchestrator picks it up, and overwritten once more
//! with exactly one terminal record.
//!
//! # Serialization
//!
//! [`Task`] serializes as `{"status": ..., "result": ...}` where `result` is
//! `null` for non-terminal tasks. Deserialization re-checks that status and
//! result agree, so a corrupted record is an error rather than a `finished`
//! task holding a failure.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::types::result::{FailedResult, Outcome, TaskOutput, TaskResult};
use crate::INTERNAL_PROVIDER_ERROR;

/// Task lifecycle status.
///
/// # State Machine
///
/// ```text
/// Queued   -> Started
/// Started  -> Finished, Failed
/// Finished -> (terminal, no transitions)
/// Failed   -> (terminal, no transitions)
/// ```
///
/// # Examples
///
/// ```
/// use faceapi_tasks::TaskStatus;
///
/// let status = TaskStatus::Queued;
/// assert!(!status.is_terminal());
/// assert!(status.can_transition_to(&TaskStatus::Started));
/// assert!(!status.can_transition_to(&TaskStatus::Finished)); // must start first
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, not yet picked up.
    Queued,
    /// Provider operation in progress.
    Started,
    /// Completed with a success-shaped result (terminal).
    Finished,
    /// Completed with a failure message (terminal).
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl TaskStatus {
    /// Returns `true` for `Finished` and `Failed`.
    ///
    /// ```
    /// use faceapi_tasks::TaskStatus;
    ///
    /// assert!(!TaskStatus::Queued.is_terminal());
    /// assert!(!TaskStatus::Started.is_terminal());
    /// assert!(TaskStatus::Finished.is_terminal());
    /// assert!(TaskStatus::Failed.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// Self-transitions are rejected.
    pub fn can_transition_to(&self, next: &Self) -> bool {
        match self {
            Self::Queued => matches!(next, Self::Started),
            Self::Started => matches!(next, Self::Finished | Self::Failed),
            Self::Finished | Self::Failed => false,
        }
    }

    /// Validates a transition from this status to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InvalidTransition`] carrying the task id and a
    /// suggestion when the transition is not allowed.
    ///
    /// ```
    /// use faceapi_tasks::TaskStatus;
    ///
    /// assert!(TaskStatus::Started
    ///     .validate_transition("t-1", &TaskStatus::Failed)
    ///     .is_ok());
    ///
    /// let err = TaskStatus::Failed
    ///     .validate_transition("t-1", &TaskStatus::Started)
    ///     .unwrap_err();
    /// assert!(err.to_string().contains("t-1"));
    /// ```
    pub fn validate_transition(&self, task_id: &str, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            return Ok(());
        }

        let suggested_action = if self.is_terminal() {
            Some("task is in a terminal state and cannot be transitioned".to_string())
        } else if self == next {
            Some(format!("task is already in {self} state"))
        } else if *self == Self::Queued {
            Some("task must be started before it can finish".to_string())
        } else {
            None
        };

        Err(TaskError::InvalidTransition {
            task_id: task_id.to_string(),
            from: *self,
            to: *next,
            suggested_action,
        })
    }
}

/// A task record as stored and returned to pollers.
///
/// Fields are private: every constructor keeps `status` and `result`
/// consistent (`queued`/`started` carry nothing, `finished` carries a
/// success result, `failed` carries a failure message).
///
/// # Examples
///
/// ```
/// use faceapi_tasks::{FaceQualityResult, Task, TaskStatus};
///
/// let task = Task::finished(FaceQualityResult::new(0.8));
/// assert_eq!(task.status(), TaskStatus::Finished);
/// assert!(task.is_terminal());
///
/// let failed = Task::failed("no faces in db");
/// assert_eq!(failed.failure_message(), Some("no faces in db"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TaskRepr")]
pub struct Task {
    status: TaskStatus,
    result: Option<TaskResult>,
}

#[derive(Deserialize)]
struct TaskRepr {
    status: TaskStatus,
    #[serde(default)]
    result: Option<TaskResult>,
}

impl TryFrom<TaskRepr> for Task {
    type Error = TaskError;

    fn try_from(repr: TaskRepr) -> Result<Self, Self::Error> {
        Self::new(repr.status, repr.result)
    }
}

impl Task {
    /// Builds a task from raw parts, checking that they agree.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::InconsistentResult`] when the result does not
    /// fit the status.
    pub fn new(status: TaskStatus, result: Option<TaskResult>) -> Result<Self, TaskError> {
        let reason = match (status, &result) {
            (TaskStatus::Queued | TaskStatus::Started, None) => None,
            (TaskStatus::Queued | TaskStatus::Started, Some(_)) => {
                Some("non-terminal tasks carry no result")
            },
            (TaskStatus::Finished, Some(r)) if r.score().is_some_and(|s| !s.is_finite()) => {
                Some("score is not a finite number")
            },
            (TaskStatus::Finished, Some(r)) if !r.is_failure() => None,
            (TaskStatus::Finished, Some(_)) => Some("finished task carries a failure"),
            (TaskStatus::Failed, Some(TaskResult::Failed(_))) => None,
            (TaskStatus::Failed, Some(_)) => Some("failed task carries a success result"),
            (TaskStatus::Finished | TaskStatus::Failed, None) => Some("missing result"),
        };

        match reason {
            None => Ok(Self { status, result }),
            Some(reason) => Err(TaskError::InconsistentResult {
                status,
                reason: reason.to_string(),
            }),
        }
    }

    /// A freshly accepted task.
    pub fn queued() -> Self {
        Self {
            status: TaskStatus::Queued,
            result: None,
        }
    }

    /// A task whose provider operation is in progress.
    pub fn started() -> Self {
        Self {
            status: TaskStatus::Started,
            result: None,
        }
    }

    /// A successful terminal task.
    pub fn finished<T: TaskOutput>(output: T) -> Self {
        Self {
            status: TaskStatus::Finished,
            result: Some(output.into_result()),
        }
    }

    /// A failed terminal task.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            result: Some(TaskResult::Failed(FailedResult::new(message))),
        }
    }

    /// The generic failure written when an operation errors or panics.
    pub fn internal_error() -> Self {
        Self::failed(INTERNAL_PROVIDER_ERROR)
    }

    /// Maps a provider outcome onto its terminal record.
    pub fn from_outcome<T: TaskOutput>(outcome: Outcome<T>) -> Self {
        match outcome {
            Ok(output) => Self::finished(output),
            Err(failure) => Self {
                status: TaskStatus::Failed,
                result: Some(TaskResult::Failed(failure)),
            },
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&TaskResult> {
        self.result.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The failure message of a `failed` task.
    pub fn failure_message(&self) -> Option<&str> {
        match &self.result {
            Some(TaskResult::Failed(failure)) => Some(&failure.message),
            _ => None,
        }
    }
}
