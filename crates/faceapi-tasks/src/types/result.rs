//! Result shapes produced by provider operations.
//!
//! Every provider operation returns an [`Outcome`]: either its own success
//! type (one of the `Face*Result` structs below) or a [`FailedResult`]
//! carrying a human-readable message. A stored task wraps the same values in
//! the tagged [`TaskResult`] union.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Return value of a single provider operation.
pub type Outcome<T> = Result<T, FailedResult>;

/// Failure reported by a provider, or written by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedResult {
    /// Human-readable reason.
    pub message: String,
}

impl FailedResult {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FailedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FailedResult {}

/// Face enrolled. `face_id` is the provider's internal identifier when
/// returned by a provider, and the durable face identifier once the
/// orchestrator has exchanged it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRegisterResult {
    pub face_id: String,
}

/// Image/video quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceQualityResult {
    pub score: f64,
}

/// Anti-spoofing (liveness) score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceAntiSpoofResult {
    pub score: f64,
}

/// Similarity score against one specific face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceMatchResult {
    pub score: f64,
}

/// Closest known face and its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceBestMatchResult {
    pub face_id: String,
    pub score: f64,
}

impl FaceRegisterResult {
    pub fn new(face_id: impl Into<String>) -> Self {
        Self {
            face_id: face_id.into(),
        }
    }
}

impl FaceQualityResult {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl FaceAntiSpoofResult {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl FaceMatchResult {
    pub fn new(score: f64) -> Self {
        Self { score }
    }
}

impl FaceBestMatchResult {
    pub fn new(face_id: impl Into<String>, score: f64) -> Self {
        Self {
            face_id: face_id.into(),
            score,
        }
    }
}

/// Tagged union of everything a task record can carry.
///
/// Serializes with a `type` discriminant next to the payload fields:
///
/// ```
/// use faceapi_tasks::{FaceQualityResult, TaskResult};
///
/// let json = serde_json::to_value(TaskResult::FaceQuality(FaceQualityResult::new(0.5))).unwrap();
/// assert_eq!(json["type"], "face_quality");
/// assert_eq!(json["score"], 0.5);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskResult {
    FaceRegister(FaceRegisterResult),
    FaceQuality(FaceQualityResult),
    FaceAntiSpoof(FaceAntiSpoofResult),
    FaceMatch(FaceMatchResult),
    FaceBestMatch(FaceBestMatchResult),
    Failed(FailedResult),
}

impl TaskResult {
    /// Returns `true` for the [`TaskResult::Failed`] variant.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The score carried by the result, if its shape has one.
    pub fn score(&self) -> Option<f64> {
        match self {
            Self::FaceQuality(r) => Some(r.score),
            Self::FaceAntiSpoof(r) => Some(r.score),
            Self::FaceMatch(r) => Some(r.score),
            Self::FaceBestMatch(r) => Some(r.score),
            Self::FaceRegister(_) | Self::Failed(_) => None,
        }
    }
}

mod sealed {
    pub trait Sealed {}

    impl Sealed for super::FaceRegisterResult {}
    impl Sealed for super::FaceQualityResult {}
    impl Sealed for super::FaceAntiSpoofResult {}
    impl Sealed for super::FaceMatchResult {}
    impl Sealed for super::FaceBestMatchResult {}
}

/// Success payload of a provider operation.
///
/// Implemented only for the five success shapes, so a task built from a
/// `TaskOutput` can never end up `finished` with a failure inside.
pub trait TaskOutput: sealed::Sealed {
    /// Wraps the payload in its [`TaskResult`] variant.
    fn into_result(self) -> TaskResult;

    /// The payload's score, if it has one.
    fn score(&self) -> Option<f64> {
        None
    }
}

impl TaskOutput for FaceRegisterResult {
    fn into_result(self) -> TaskResult {
        TaskResult::FaceRegister(self)
    }
}

impl TaskOutput for FaceQualityResult {
    fn into_result(self) -> TaskResult {
        TaskResult::FaceQuality(self)
    }

    fn score(&self) -> Option<f64> {
        Some(self.score)
    }
}

impl TaskOutput for FaceAntiSpoofResult {
    fn into_result(self) -> TaskResult {
        TaskResult::FaceAntiSpoof(self)
    }

    fn score(&self) -> Option<f64> {
        Some(self.score)
    }
}

impl TaskOutput for FaceMatchResult {
    fn into_result(self) -> TaskResult {
        TaskResult::FaceMatch(self)
    }

    fn score(&self) -> Option<f64> {
        Some(self.score)
    }
}

impl TaskOutput for FaceBestMatchResult {
    fn into_result(self) -> TaskResult {
        TaskResult::FaceBestMatch(self)
    }

    fn score(&self) -> Option<f64> {
        Some(self.score)
    }
}
