//! Reduction of per-descriptor match outcomes into one task outcome.

use faceapi_tasks::{FaceMatchResult, Outcome};

/// Picks the successful outcome with the highest score. If none succeeded,
/// returns the first outcome unchanged. Returns `None` only for an empty
/// input.
///
/// Ties keep the earliest outcome.
///
/// ```
/// use faceapi::aggregate::aggregate_matches;
/// use faceapi_tasks::{FaceMatchResult, FailedResult};
///
/// let best = aggregate_matches(vec![
///     Ok(FaceMatchResult::new(0.2)),
///     Ok(FaceMatchResult::new(0.9)),
///     Err(FailedResult::new("engine down")),
/// ]);
/// assert_eq!(best, Some(Ok(FaceMatchResult::new(0.9))));
/// ```
pub fn aggregate_matches(outcomes: Vec<Outcome<FaceMatchResult>>) -> Option<Outcome<FaceMatchResult>> {
    let best = outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().ok())
        .fold(None::<&FaceMatchResult>, |best, candidate| match best {
            Some(current) if current.score.total_cmp(&candidate.score).is_ge() => Some(current),
            _ => Some(candidate),
        })
        .copied();

    match best {
        Some(result) => Some(Ok(result)),
        None => outcomes.into_iter().next(),
    }
}
