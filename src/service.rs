//! Task dispatch.
//!
//! [`TaskService`] is the entry point used by an outer surface (HTTP, CLI).
//! Every submitting method validates its input synchronously, writes a
//! `queued` record, hands the work to an [`Orchestrator`] on a spawned tokio
//! task and returns the new [`TaskId`] immediately. Callers then poll
//! [`TaskService::get_task_result`].

use std::sync::Arc;

use faceapi_tasks::store::TaskStore;
use faceapi_tasks::{FailedResult, Task, TaskId};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::identity::IdentityStore;
use crate::orchestrator::Orchestrator;
use crate::provider::{internal_id, Provider, ProviderRegistry, FOREIGN_DESCRIPTOR};

/// Validates requests, creates tasks and spawns their execution.
#[derive(Clone)]
pub struct TaskService {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn TaskStore>,
    identity: Arc<dyn IdentityStore>,
    orchestrator: Orchestrator,
}

impl std::fmt::Debug for TaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskService")
            .field("registry", &self.registry)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

impl TaskService {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn TaskStore>,
        identity: Arc<dyn IdentityStore>,
    ) -> Self {
        let orchestrator = Orchestrator::new(Arc::clone(&store), Arc::clone(&identity));
        Self {
            registry,
            store,
            identity,
            orchestrator,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Submits face enrollment on the engine's provider.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownEngine`] or [`ServiceError::UnknownProvider`]
    /// if the engine cannot be served; store errors if the task cannot be
    /// created.
    pub async fn register_face(&self, engine_id: Uuid, data: Vec<u8>) -> ServiceResult<TaskId> {
        let provider = self.resolve_engine(engine_id).await?;
        let task_id = self.enqueue().await?;
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .register_face(&task_id, engine_id, provider, &data)
                .await;
        });
        Ok(task_id)
    }

    /// Submits an image/video quality check.
    pub async fn check_face_quality(&self, engine_id: Uuid, data: Vec<u8>) -> ServiceResult<TaskId> {
        let provider = self.resolve_engine(engine_id).await?;
        let task_id = self.enqueue().await?;
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.face_quality(&task_id, provider, &data).await;
        });
        Ok(task_id)
    }

    /// Submits a liveness (anti-spoofing) check.
    pub async fn check_face_anti_spoofing(
        &self,
        engine_id: Uuid,
        data: Vec<u8>,
    ) -> ServiceResult<TaskId> {
        let provider = self.resolve_engine(engine_id).await?;
        let task_id = self.enqueue().await?;
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.face_liveness(&task_id, provider, &data).await;
        });
        Ok(task_id)
    }

    /// Submits a search for the closest enrolled face.
    pub async fn best_match(&self, engine_id: Uuid, data: Vec<u8>) -> ServiceResult<TaskId> {
        let provider = self.resolve_engine(engine_id).await?;
        let task_id = self.enqueue().await?;
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator.best_match(&task_id, provider, &data).await;
        });
        Ok(task_id)
    }

    /// Submits a comparison against one durable face.
    ///
    /// # Errors
    ///
    /// As [`register_face`](Self::register_face), plus
    /// [`ServiceError::UnknownFace`] if `face_id` does not exist.
    pub async fn match_with_face(
        &self,
        engine_id: Uuid,
        face_id: Uuid,
        data: Vec<u8>,
    ) -> ServiceResult<TaskId> {
        let provider = self.resolve_engine(engine_id).await?;
        if self.identity.get_face(face_id).await?.is_none() {
            return Err(ServiceError::UnknownFace(face_id));
        }
        let task_id = self.enqueue().await?;
        let orchestrator = self.orchestrator.clone();
        tokio::spawn(async move {
            orchestrator
                .match_with_face(&task_id, provider, face_id, &data)
                .await;
        });
        Ok(task_id)
    }

    /// Reads the current record of a task.
    ///
    /// # Errors
    ///
    /// [`ServiceError::InvalidTaskId`] if `task_id` is not a UUID, and
    /// [`ServiceError::UnknownTask`] if no live record exists (never
    /// created, or expired).
    pub async fn get_task_result(&self, task_id: &str) -> ServiceResult<Task> {
        let id = TaskId::parse(task_id)?;
        self.store
            .get(&id)
            .await?
            .ok_or_else(|| ServiceError::UnknownTask(task_id.to_string()))
    }

    /// Removes a durable face and all of its descriptors from the engine.
    ///
    /// Runs synchronously. The face is kept if any provider removal fails.
    ///
    /// # Errors
    ///
    /// [`ServiceError::UnknownFace`] if the face does not exist,
    /// [`ServiceError::RemovalFailed`] with the first failure message if the
    /// engine refuses a removal.
    pub async fn remove_face(&self, face_id: Uuid) -> ServiceResult<()> {
        let face = self
            .identity
            .get_face(face_id)
            .await?
            .ok_or(ServiceError::UnknownFace(face_id))?;
        let provider = self.resolve_engine(face.engine_id).await?;

        let mut first_failure = None;
        for descriptor in &face.descriptors {
            let outcome = match internal_id(provider.name(), descriptor) {
                Some(internal) => provider.remove_face(internal).await,
                None => Err(FailedResult::new(FOREIGN_DESCRIPTOR)),
            };
            if let Err(failure) = outcome {
                tracing::error!(%face_id, descriptor = %descriptor, error = %failure, "descriptor removal failed");
                first_failure.get_or_insert(failure.message);
            }
        }
        if let Some(message) = first_failure {
            return Err(ServiceError::RemovalFailed { face_id, message });
        }

        self.identity.delete_face(face_id).await?;
        tracing::info!(%face_id, "face removed");
        Ok(())
    }

    /// Resolves a durable engine id to a loaded provider.
    async fn resolve_engine(&self, engine_id: Uuid) -> ServiceResult<Arc<dyn Provider>> {
        let engine = self
            .identity
            .get_engine(engine_id)
            .await?
            .ok_or(ServiceError::UnknownEngine(engine_id))?;
        if !self.registry.contains(&engine.provider) {
            return Err(ServiceError::UnknownProvider(engine.provider));
        }
        self.registry
            .get_provider(&engine.provider)
            .map_err(|err| ServiceError::Internal(err.to_string()))
    }

    async fn enqueue(&self) -> ServiceResult<TaskId> {
        let task_id = TaskId::new();
        self.store.put(&task_id, &Task::queued()).await?;
        tracing::debug!(task_id = %task_id, "task queued");
        Ok(task_id)
    }
}
