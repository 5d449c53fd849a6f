//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use faceapi::error::IdentityError;
use faceapi::identity::{EngineRecord, FaceRecord, IdentityStore, InMemoryIdentityStore};
use faceapi::provider::{
    BackendKind, EngineType, EngineVersion, ExecutionBackend, Provider, ProviderConfig,
    ProviderInfo,
};
use faceapi::service::TaskService;
use faceapi::tasks::{
    FaceAntiSpoofResult, FaceBestMatchResult, FaceMatchResult, FaceQualityResult,
    FaceRegisterResult, FailedResult, Outcome, Task, TaskId,
};
use uuid::Uuid;

pub fn config(engine_type: EngineType, major: u32) -> ProviderConfig {
    ProviderConfig {
        engine_type,
        version: EngineVersion {
            major,
            minor: 0,
            patch: 0,
        },
        description: "scripted engine".to_string(),
        quality_threshold: 0.5,
        anti_spoofing_threshold: 0.5,
        build: "test".to_string(),
        orchestrator: ExecutionBackend {
            orchestrator_type: BackendKind::Thread,
            params: BTreeMap::new(),
        },
    }
}

/// Provider whose answers are fixed up front.
pub struct ScriptedProvider {
    info: ProviderInfo,
    pub register: Outcome<FaceRegisterResult>,
    pub quality: Outcome<FaceQualityResult>,
    pub best: Outcome<FaceBestMatchResult>,
    /// Match outcomes keyed by internal id. Unknown ids fail.
    pub matches: HashMap<String, Outcome<FaceMatchResult>>,
    /// Removal outcomes keyed by internal id. Unknown ids succeed.
    pub removals: HashMap<String, Outcome<()>>,
    pub panics: bool,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(engine_type: EngineType) -> Self {
        Self {
            info: ProviderInfo::new(config(engine_type, 1)),
            register: Ok(FaceRegisterResult::new("p-42")),
            quality: Ok(FaceQualityResult::new(0.75)),
            best: Err(FailedResult::new("no faces in db")),
            matches: HashMap::new(),
            removals: HashMap::new(),
            panics: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("engine exploded");
        }
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn register(&self, _data: &[u8]) -> Outcome<FaceRegisterResult> {
        self.enter();
        self.register.clone()
    }

    async fn quality(&self, _data: &[u8]) -> Outcome<FaceQualityResult> {
        self.enter();
        self.quality.clone()
    }

    async fn liveness(&self, _data: &[u8]) -> Outcome<FaceAntiSpoofResult> {
        self.enter();
        Ok(FaceAntiSpoofResult::new(0.6))
    }

    async fn best_match(&self, _data: &[u8]) -> Outcome<FaceBestMatchResult> {
        self.enter();
        self.best.clone()
    }

    async fn match_with_face(&self, _data: &[u8], internal_id: &str) -> Outcome<FaceMatchResult> {
        self.enter();
        self.matches
            .get(internal_id)
            .cloned()
            .unwrap_or_else(|| Err(FailedResult::new(format!("unknown {internal_id}"))))
    }

    async fn remove_face(&self, internal_id: &str) -> Outcome<()> {
        self.enter();
        self.removals.get(internal_id).cloned().unwrap_or(Ok(()))
    }
}

/// In-memory identity store that counts `create_face` calls.
#[derive(Default)]
pub struct CountingIdentity {
    pub inner: InMemoryIdentityStore,
    created: AtomicUsize,
}

impl CountingIdentity {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for CountingIdentity {
    async fn get_engine(&self, engine_id: Uuid) -> Result<Option<EngineRecord>, IdentityError> {
        self.inner.get_engine(engine_id).await
    }

    async fn create_face(
        &self,
        engine_id: Uuid,
        descriptor_id: &str,
    ) -> Result<Uuid, IdentityError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.inner.create_face(engine_id, descriptor_id).await
    }

    async fn get_face_by_descriptor(
        &self,
        descriptor_id: &str,
    ) -> Result<Option<Uuid>, IdentityError> {
        self.inner.get_face_by_descriptor(descriptor_id).await
    }

    async fn get_face(&self, face_id: Uuid) -> Result<Option<FaceRecord>, IdentityError> {
        self.inner.get_face(face_id).await
    }

    async fn list_descriptors(&self, face_id: Uuid) -> Result<Option<Vec<String>>, IdentityError> {
        self.inner.list_descriptors(face_id).await
    }

    async fn delete_face(&self, face_id: Uuid) -> Result<bool, IdentityError> {
        self.inner.delete_face(face_id).await
    }
}

/// Polls until the task is terminal, for at most two seconds.
pub async fn wait_terminal(service: &TaskService, task_id: &TaskId) -> Task {
    for _ in 0..400 {
        let task = service
            .get_task_result(&task_id.to_string())
            .await
            .unwrap();
        if task.is_terminal() {
            return task;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} did not finish");
}
