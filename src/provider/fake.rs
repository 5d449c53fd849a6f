//! Simulated engine.
//!
//! Keeps enrolled faces in memory and answers every scoring call with a
//! fixed score after a fixed delay. Useful for local runs and for exercising
//! the task pipeline without an engine.
//!
//! ```yaml
//! # providers/fake_provider/.config.yaml
//! engine_type: facenet
//! version: { major: 0, minor: 0, patch: 1 }
//! description: Simulated engine
//! quality_threshold: 0.5
//! anti_spoofing_threshold: 0.5
//! build: dev
//! orchestrator: { orchestrator_type: thread }
//! latency_ms: 2000
//! score: 0.9
//! ```

use std::time::Duration;

use async_trait::async_trait;
use faceapi_tasks::{
    FaceAntiSpoofResult, FaceBestMatchResult, FaceMatchResult, FaceQualityResult,
    FaceRegisterResult, FailedResult, Outcome,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use super::{Provider, ProviderConfig, ProviderInfo, ProviderSettings};

/// Configuration of the simulated engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeConfig {
    #[serde(flatten)]
    pub base: ProviderConfig,

    /// Delay applied to every operation.
    #[serde(default = "default_latency_ms")]
    pub latency_ms: u64,

    /// Score returned by every scoring operation.
    #[serde(default = "default_score")]
    pub score: f64,
}

fn default_latency_ms() -> u64 {
    2000
}

fn default_score() -> f64 {
    0.9
}

impl ProviderSettings for FakeConfig {
    fn base(&self) -> &ProviderConfig {
        &self.base
    }
}

/// Simulated engine with an in-memory enrollment list.
#[derive(Debug)]
pub struct FakeProvider {
    info: ProviderInfo,
    latency: Duration,
    score: f64,
    enrolled: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new(config: FakeConfig) -> Self {
        Self {
            info: ProviderInfo::new(config.base),
            latency: Duration::from_millis(config.latency_ms),
            score: config.score,
            enrolled: Mutex::new(Vec::new()),
        }
    }

    /// A provider with no delay and the default score.
    pub fn from_base(base: ProviderConfig) -> Self {
        Self::new(FakeConfig {
            base,
            latency_ms: 0,
            score: default_score(),
        })
    }

    /// Internal ids of enrolled faces, oldest first.
    pub fn enrolled(&self) -> Vec<String> {
        self.enrolled.lock().clone()
    }

    async fn simulate(&self, operation: &'static str) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency)
                .instrument(self.info.span().clone())
                .await;
        }
        self.info.span().in_scope(|| tracing::info!(operation, "simulated call"));
    }

    fn is_enrolled(&self, internal_id: &str) -> bool {
        self.enrolled.lock().iter().any(|id| id == internal_id)
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn register(&self, _data: &[u8]) -> Outcome<FaceRegisterResult> {
        self.simulate("register").await;
        let id = Uuid::new_v4().to_string();
        self.enrolled.lock().push(id.clone());
        Ok(FaceRegisterResult::new(id))
    }

    async fn quality(&self, _data: &[u8]) -> Outcome<FaceQualityResult> {
        self.simulate("quality").await;
        Ok(FaceQualityResult::new(self.score))
    }

    async fn liveness(&self, _data: &[u8]) -> Outcome<FaceAntiSpoofResult> {
        self.simulate("liveness").await;
        Ok(FaceAntiSpoofResult::new(self.score))
    }

    async fn best_match(&self, _data: &[u8]) -> Outcome<FaceBestMatchResult> {
        self.simulate("best_match").await;
        let last = self.enrolled.lock().last().cloned();
        match last {
            Some(id) => Ok(FaceBestMatchResult::new(id, self.score)),
            None => Err(FailedResult::new("no faces in db")),
        }
    }

    async fn match_with_face(&self, _data: &[u8], internal_id: &str) -> Outcome<FaceMatchResult> {
        self.simulate("match_with_face").await;
        if self.is_enrolled(internal_id) {
            Ok(FaceMatchResult::new(self.score))
        } else {
            Err(FailedResult::new(format!("no face {internal_id} in db")))
        }
    }

    async fn remove_face(&self, internal_id: &str) -> Outcome<()> {
        self.simulate("remove_face").await;
        let mut enrolled = self.enrolled.lock();
        match enrolled.iter().position(|id| id == internal_id) {
            Some(index) => {
                enrolled.remove(index);
                Ok(())
            },
            None => Err(FailedResult::new(format!("no face {internal_id} in db"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::base_config;
    use crate::provider::EngineType;
    use pretty_assertions::assert_eq;

    fn provider() -> FakeProvider {
        FakeProvider::from_base(base_config(EngineType::Facenet, 0))
    }

    #[tokio::test]
    async fn best_match_fails_on_empty_db() {
        let err = provider().best_match(b"img").await.unwrap_err();
        assert_eq!(err.message, "no faces in db");
    }

    #[tokio::test]
    async fn register_then_best_match_returns_latest() {
        let provider = provider();
        let first = provider.register(b"a").await.unwrap().face_id;
        let second = provider.register(b"b").await.unwrap().face_id;
        assert_ne!(first, second);

        let best = provider.best_match(b"c").await.unwrap();
        assert_eq!(best.face_id, second);
        assert_eq!(best.score, 0.9);
    }

    #[tokio::test]
    async fn match_requires_enrolled_face() {
        let provider = provider();
        let id = provider.register(b"a").await.unwrap().face_id;
        assert_eq!(provider.match_with_face(b"x", &id).await.unwrap().score, 0.9);
        assert!(provider.match_with_face(b"x", "ghost").await.is_err());
    }

    #[tokio::test]
    async fn remove_face_forgets_it() {
        let provider = provider();
        let id = provider.register(b"a").await.unwrap().face_id;
        provider.remove_face(&id).await.unwrap();
        assert!(provider.enrolled().is_empty());
        assert!(provider.remove_face(&id).await.is_err());
    }

    #[test]
    fn config_defaults_apply() {
        let mut json = serde_json::to_value(base_config(EngineType::Facenet, 0)).unwrap();
        json["score"] = serde_json::json!(0.42);
        let config: FakeConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.latency_ms, 2000);
        assert_eq!(config.score, 0.42);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_applied() {
        let provider = FakeProvider::new(FakeConfig {
            base: base_config(EngineType::Facenet, 0),
            latency_ms: 2000,
            score: 0.5,
        });
        let started = tokio::time::Instant::now();
        provider.quality(b"img").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2000));
    }
}
