//! Background execution of provider operations.
//!
//! Each operation moves its task record from `queued` to `started`, calls
//! the provider inside the provider's span, and writes exactly one terminal
//! record. Identity-bearing operations exchange provider-internal ids for
//! durable face ids on the way out.
//!
//! Nothing that goes wrong inside a run escapes it. Provider failures are
//! recorded as they are reported; any other error, and any panic, is logged
//! with context and recorded as the fixed
//! [`INTERNAL_PROVIDER_ERROR`](faceapi_tasks::INTERNAL_PROVIDER_ERROR)
//! failure.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use faceapi_tasks::store::TaskStore;
use faceapi_tasks::{
    FaceBestMatchResult, FaceMatchResult, FaceRegisterResult, FailedResult, Outcome, Task,
    TaskId, TaskOutput, TaskStatus,
};
use futures::future::join_all;
use futures::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::aggregate::aggregate_matches;
use crate::error::OrchestratorError;
use crate::identity::IdentityStore;
use crate::provider::{descriptor_id, internal_id, Provider, FOREIGN_DESCRIPTOR};

/// Failure recorded for a per-descriptor match with an unusable score.
const INVALID_SCORE: &str = "engine returned an invalid score";

/// Runs provider operations against the task store and the identity store.
#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn TaskStore>,
    identity: Arc<dyn IdentityStore>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("task_ttl", &self.store.config().task_ttl)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(store: Arc<dyn TaskStore>, identity: Arc<dyn IdentityStore>) -> Self {
        Self { store, identity }
    }

    /// Enrolls a face and records it under `engine_id`. The finished record
    /// carries the durable face id.
    pub async fn register_face(
        &self,
        task_id: &TaskId,
        engine_id: Uuid,
        provider: Arc<dyn Provider>,
        data: &[u8],
    ) -> Task {
        let work = self.exchange_registered(engine_id, provider.as_ref(), data);
        self.run(task_id, provider.as_ref(), "register_face", work)
            .await
    }

    pub async fn face_quality(
        &self,
        task_id: &TaskId,
        provider: Arc<dyn Provider>,
        data: &[u8],
    ) -> Task {
        self.run(task_id, provider.as_ref(), "face_quality", async {
            Ok(provider.quality(data).await)
        })
        .await
    }

    pub async fn face_liveness(
        &self,
        task_id: &TaskId,
        provider: Arc<dyn Provider>,
        data: &[u8],
    ) -> Task {
        self.run(task_id, provider.as_ref(), "face_liveness", async {
            Ok(provider.liveness(data).await)
        })
        .await
    }

    /// Finds the closest enrolled face. Fails the task if the engine answers
    /// with an id that has no durable face.
    pub async fn best_match(
        &self,
        task_id: &TaskId,
        provider: Arc<dyn Provider>,
        data: &[u8],
    ) -> Task {
        let work = self.resolve_best_match(provider.as_ref(), data);
        self.run(task_id, provider.as_ref(), "best_match", work).await
    }

    /// Scores `data` against every descriptor of `face_id` and keeps the
    /// best finished score.
    ///
    /// The per-descriptor calls run concurrently. A face with no
    /// descriptors fails the task before the provider is called.
    pub async fn match_with_face(
        &self,
        task_id: &TaskId,
        provider: Arc<dyn Provider>,
        face_id: Uuid,
        data: &[u8],
    ) -> Task {
        let work = self.match_descriptors(provider.as_ref(), face_id, data);
        self.run(task_id, provider.as_ref(), "match_with_face", work)
            .await
    }

    async fn exchange_registered(
        &self,
        engine_id: Uuid,
        provider: &dyn Provider,
        data: &[u8],
    ) -> Result<Outcome<FaceRegisterResult>, OrchestratorError> {
        let registered = match provider.register(data).await {
            Ok(registered) => registered,
            Err(failure) => return Ok(Err(failure)),
        };
        let descriptor = descriptor_id(provider.name(), &registered.face_id);
        let face_id = self.identity.create_face(engine_id, &descriptor).await?;
        Ok(Ok(FaceRegisterResult::new(face_id.to_string())))
    }

    async fn resolve_best_match(
        &self,
        provider: &dyn Provider,
        data: &[u8],
    ) -> Result<Outcome<FaceBestMatchResult>, OrchestratorError> {
        let found = match provider.best_match(data).await {
            Ok(found) => found,
            Err(failure) => return Ok(Err(failure)),
        };
        let descriptor = descriptor_id(provider.name(), &found.face_id);
        let face_id = self
            .identity
            .get_face_by_descriptor(&descriptor)
            .await?
            .ok_or(OrchestratorError::UnknownInternalId {
                internal_id: found.face_id,
            })?;
        Ok(Ok(FaceBestMatchResult::new(face_id.to_string(), found.score)))
    }

    async fn match_descriptors(
        &self,
        provider: &dyn Provider,
        face_id: Uuid,
        data: &[u8],
    ) -> Result<Outcome<FaceMatchResult>, OrchestratorError> {
        let descriptors = self
            .identity
            .list_descriptors(face_id)
            .await?
            .ok_or(OrchestratorError::UnknownFace(face_id))?;
        if descriptors.is_empty() {
            return Err(OrchestratorError::NoDescriptors(face_id));
        }

        let outcomes: Vec<Outcome<FaceMatchResult>> =
            join_all(descriptors.iter().map(|descriptor| async move {
                let Some(internal) = internal_id(provider.name(), descriptor) else {
                    tracing::error!(%face_id, %descriptor, "descriptor belongs to another engine");
                    return Err(FailedResult::new(FOREIGN_DESCRIPTOR));
                };
                match provider.match_with_face(data, internal).await {
                    Ok(matched) if !matched.score.is_finite() => {
                        tracing::error!(%face_id, %descriptor, score = matched.score, "invalid match score");
                        Err(FailedResult::new(INVALID_SCORE))
                    },
                    outcome => outcome,
                }
            }))
            .await;

        aggregate_matches(outcomes).ok_or(OrchestratorError::NoDescriptors(face_id))
    }

    /// Drives one task through `started` to its terminal record.
    async fn run<T, F>(
        &self,
        task_id: &TaskId,
        provider: &dyn Provider,
        operation: &'static str,
        work: F,
    ) -> Task
    where
        T: TaskOutput,
        F: Future<Output = Result<Outcome<T>, OrchestratorError>>,
    {
        let span = provider.info().span().clone();

        if let Err(current) = self.begin(task_id, operation).await {
            return current;
        }

        let outcome = AssertUnwindSafe(work.instrument(span.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(OrchestratorError::Panic(panic_message(&*payload))))
            .and_then(|outcome| match outcome.as_ref().ok().and_then(|output| output.score()) {
                Some(score) if !score.is_finite() => Err(OrchestratorError::NonFiniteScore(score)),
                _ => Ok(outcome),
            });

        let terminal = match outcome {
            Ok(outcome) => Task::from_outcome(outcome),
            Err(err) => {
                span.in_scope(|| {
                    tracing::error!(
                        task_id = %task_id,
                        operation,
                        error = %err,
                        "operation failed internally"
                    )
                });
                Task::internal_error()
            },
        };

        match self.store.put(task_id, &terminal).await {
            Ok(()) => span.in_scope(|| {
                tracing::info!(
                    task_id = %task_id,
                    operation,
                    status = %terminal.status(),
                    "task completed"
                )
            }),
            Err(err) => span.in_scope(|| {
                tracing::error!(
                    task_id = %task_id,
                    operation,
                    error = %err,
                    "failed to write terminal task record"
                )
            }),
        }
        terminal
    }

    /// Checks the current record and writes `started`. On refusal returns
    /// the record the caller should report instead.
    async fn begin(&self, task_id: &TaskId, operation: &'static str) -> Result<(), Task> {
        match self.store.get(task_id).await {
            Ok(Some(current)) => {
                if let Err(err) = current
                    .status()
                    .validate_transition(&task_id.to_string(), &TaskStatus::Started)
                {
                    tracing::warn!(task_id = %task_id, operation, error = %err, "task not started");
                    return Err(current);
                }
            },
            Ok(None) => {},
            Err(err) => {
                tracing::warn!(task_id = %task_id, operation, error = %err, "cannot read task record");
            },
        }

        if let Err(err) = self.store.put(task_id, &Task::started()).await {
            tracing::error!(task_id = %task_id, operation, error = %err, "failed to mark task started");
            return Err(Task::internal_error());
        }
        tracing::debug!(task_id = %task_id, operation, "task started");
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::InMemoryIdentityStore;
    use crate::provider::fake::FakeProvider;
    use crate::provider::test_support::base_config;
    use crate::provider::EngineType;
    use faceapi_tasks::store::memory::InMemoryTaskStore;
    use faceapi_tasks::INTERNAL_PROVIDER_ERROR;
    use pretty_assertions::assert_eq;

    fn setup() -> (Orchestrator, Arc<InMemoryTaskStore>, Arc<InMemoryIdentityStore>) {
        let store = Arc::new(InMemoryTaskStore::default());
        let identity = Arc::new(InMemoryIdentityStore::new());
        let orchestrator = Orchestrator::new(store.clone(), identity.clone());
        (orchestrator, store, identity)
    }

    #[test]
    fn panic_message_reads_both_payload_kinds() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&"boom".to_string()), "boom");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }

    #[tokio::test]
    async fn terminal_tasks_are_not_restarted() {
        let (orchestrator, store, _) = setup();
        let provider: Arc<dyn Provider> =
            Arc::new(FakeProvider::from_base(base_config(EngineType::Facenet, 0)));
        let task_id = TaskId::new();
        let done = Task::failed("already done");
        store.put(&task_id, &done).await.unwrap();

        let task = orchestrator.face_quality(&task_id, provider, b"img").await;

        assert_eq!(task, done);
        assert_eq!(store.get(&task_id).await.unwrap(), Some(done));
    }

    #[tokio::test]
    async fn missing_record_is_started_anyway() {
        let (orchestrator, store, _) = setup();
        let provider: Arc<dyn Provider> =
            Arc::new(FakeProvider::from_base(base_config(EngineType::Facenet, 0)));
        let task_id = TaskId::new();

        let task = orchestrator.face_liveness(&task_id, provider, b"img").await;

        assert_eq!(task.status(), TaskStatus::Finished);
        assert_eq!(store.get(&task_id).await.unwrap(), Some(task));
    }

    #[tokio::test]
    async fn unknown_face_is_internal_error() {
        let (orchestrator, store, _) = setup();
        let provider: Arc<dyn Provider> =
            Arc::new(FakeProvider::from_base(base_config(EngineType::Facenet, 0)));
        let task_id = TaskId::new();
        store.put(&task_id, &Task::queued()).await.unwrap();

        let task = orchestrator
            .match_with_face(&task_id, provider, Uuid::new_v4(), b"img")
            .await;

        assert_eq!(task.failure_message(), Some(INTERNAL_PROVIDER_ERROR));
    }
}
