//! Provider contract: the capability surface every face-recognition engine
//! implements, and the configuration shape every engine accepts.
//!
//! A provider is built once at startup by the
//! [`ProviderRegistry`](registry::ProviderRegistry) and shared as
//! `Arc<dyn Provider>` afterwards. Its identity string
//! (`"{engine_type}-{major}-{minor}-{patch}"`) is both the registry key and
//! the prefix of every descriptor id it produces.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use faceapi_tasks::{
    FaceAntiSpoofResult, FaceBestMatchResult, FaceMatchResult, FaceQualityResult,
    FaceRegisterResult, Outcome,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub mod fake;
#[cfg(feature = "http-client")]
pub mod http;
pub mod registry;

pub use registry::{LoadReport, ProviderCatalog, ProviderRegistry};

/// Separator between the provider identity and the provider-internal id in
/// a descriptor id.
pub const DESCRIPTOR_SEPARATOR: char = ':';

/// Supported engine families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineType {
    VisionLabs,
    Ntech,
    Tevian,
    Facenet,
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VisionLabs => write!(f, "vision_labs"),
            Self::Ntech => write!(f, "ntech"),
            Self::Tevian => write!(f, "tevian"),
            Self::Facenet => write!(f, "facenet"),
        }
    }
}

/// Engine version. `patch` is also accepted as `path` in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineVersion {
    pub major: u32,
    pub minor: u32,
    #[serde(alias = "path")]
    pub patch: u32,
}

/// Where a provider's work is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "thread")]
    Thread,
    #[serde(rename = "docker")]
    Docker,
    #[serde(rename = "docker-gpu", alias = "docker_gpu")]
    DockerGpu,
}

/// Execution backend descriptor: a kind plus opaque parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionBackend {
    pub orchestrator_type: BackendKind,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

/// Configuration fields common to every provider.
///
/// Engine-specific configs embed it with `#[serde(flatten)]` and expose it
/// through [`ProviderSettings::base`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub engine_type: EngineType,
    pub version: EngineVersion,
    pub description: String,
    pub quality_threshold: f64,
    pub anti_spoofing_threshold: f64,
    pub build: String,
    pub orchestrator: ExecutionBackend,
}

/// A provider configuration value that failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {reason}")]
pub struct InvalidProviderConfig {
    pub field: &'static str,
    pub reason: String,
}

impl ProviderConfig {
    /// Derived identity: `"{engine_type}-{major}-{minor}-{patch}"`.
    ///
    /// ```
    /// use faceapi::provider::{
    ///     BackendKind, EngineType, EngineVersion, ExecutionBackend, ProviderConfig,
    /// };
    ///
    /// let config = ProviderConfig {
    ///     engine_type: EngineType::VisionLabs,
    ///     version: EngineVersion { major: 4, minor: 2, patch: 0 },
    ///     description: "LUNA".to_string(),
    ///     quality_threshold: 0.5,
    ///     anti_spoofing_threshold: 0.5,
    ///     build: "b1".to_string(),
    ///     orchestrator: ExecutionBackend {
    ///         orchestrator_type: BackendKind::Thread,
    ///         params: Default::default(),
    ///     },
    /// };
    /// assert_eq!(config.identity(), "vision_labs-4-2-0");
    /// ```
    pub fn identity(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.engine_type, self.version.major, self.version.minor, self.version.patch
        )
    }

    /// Checks that both thresholds are finite and within `[0, 1]`.
    pub fn validate(&self) -> Result<(), InvalidProviderConfig> {
        for (field, value) in [
            ("quality_threshold", self.quality_threshold),
            ("anti_spoofing_threshold", self.anti_spoofing_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(InvalidProviderConfig {
                    field,
                    reason: format!("must be within [0, 1], got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// A typed provider configuration: the common fields plus whatever the
/// engine needs.
pub trait ProviderSettings: DeserializeOwned {
    fn base(&self) -> &ProviderConfig;
}

impl ProviderSettings for ProviderConfig {
    fn base(&self) -> &ProviderConfig {
        self
    }
}

/// Immutable descriptive state shared by every provider, built from its
/// [`ProviderConfig`].
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    name: String,
    config: ProviderConfig,
    span: tracing::Span,
}

impl ProviderInfo {
    pub fn new(config: ProviderConfig) -> Self {
        let name = config.identity();
        let span = tracing::info_span!("provider", provider = %name);
        Self { name, config, span }
    }

    /// The provider identity.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine_type(&self) -> EngineType {
        self.config.engine_type
    }

    pub fn version(&self) -> EngineVersion {
        self.config.version
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn quality_threshold(&self) -> f64 {
        self.config.quality_threshold
    }

    pub fn anti_spoofing_threshold(&self) -> f64 {
        self.config.anti_spoofing_threshold
    }

    pub fn build(&self) -> &str {
        &self.config.build
    }

    pub fn backend(&self) -> &ExecutionBackend {
        &self.config.orchestrator
    }

    /// Log scope named after the identity. Provider code logs inside it and
    /// the orchestrator instruments every call with it.
    pub fn span(&self) -> &tracing::Span {
        &self.span
    }
}

/// Capability contract of a face-recognition engine.
///
/// Every operation reports failure as an `Err(FailedResult)` with a
/// human-readable message and must not panic. The orchestrator still
/// catches panics and records them as the generic internal error.
///
/// Implementations must be safe for concurrent use: the same instance
/// serves every task routed to it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Identity, thresholds and log scope.
    fn info(&self) -> &ProviderInfo;

    /// Provider identity (`"{engine_type}-{major}-{minor}-{patch}"`).
    fn name(&self) -> &str {
        self.info().name()
    }

    /// Enrolls the face in `data`, returning the engine-internal id.
    async fn register(&self, data: &[u8]) -> Outcome<FaceRegisterResult>;

    /// Scores image or video quality.
    async fn quality(&self, data: &[u8]) -> Outcome<FaceQualityResult>;

    /// Scores liveness (anti-spoofing).
    async fn liveness(&self, data: &[u8]) -> Outcome<FaceAntiSpoofResult>;

    /// Finds the closest enrolled face, returning its engine-internal id.
    async fn best_match(&self, data: &[u8]) -> Outcome<FaceBestMatchResult>;

    /// Scores `data` against one enrolled face.
    async fn match_with_face(&self, data: &[u8], internal_id: &str) -> Outcome<FaceMatchResult>;

    /// Removes an enrolled face from the engine.
    async fn remove_face(&self, internal_id: &str) -> Outcome<()>;
}

/// Builds the namespaced descriptor id for a provider-internal id.
///
/// ```
/// use faceapi::provider::{descriptor_id, internal_id};
///
/// let descriptor = descriptor_id("facenet-1-0-0", "p-42");
/// assert_eq!(descriptor, "facenet-1-0-0:p-42");
/// assert_eq!(internal_id("facenet-1-0-0", &descriptor), Some("p-42"));
/// assert_eq!(internal_id("ntech-1-0-0", &descriptor), None);
/// ```
pub fn descriptor_id(provider_name: &str, internal_id: &str) -> String {
    format!("{provider_name}{DESCRIPTOR_SEPARATOR}{internal_id}")
}

/// Failure recorded for a descriptor that belongs to another provider.
pub(crate) const FOREIGN_DESCRIPTOR: &str = "descriptor belongs to another engine";

/// Strips the provider prefix from a descriptor id. Returns `None` if the
/// descriptor belongs to another provider.
pub fn internal_id<'a>(provider_name: &str, descriptor_id: &'a str) -> Option<&'a str> {
    descriptor_id
        .strip_prefix(provider_name)?
        .strip_prefix(DESCRIPTOR_SEPARATOR)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A valid base configuration for tests.
    pub fn base_config(engine_type: EngineType, major: u32) -> ProviderConfig {
        ProviderConfig {
            engine_type,
            version: EngineVersion {
                major,
                minor: 0,
                patch: 0,
            },
            description: "test engine".to_string(),
            quality_threshold: 0.5,
            anti_spoofing_threshold: 0.5,
            build: "test".to_string(),
            orchestrator: ExecutionBackend {
                orchestrator_type: BackendKind::Thread,
                params: BTreeMap::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::base_config;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identity_uses_snake_case_engine() {
        assert_eq!(base_config(EngineType::VisionLabs, 3).identity(), "vision_labs-3-0-0");
        assert_eq!(base_config(EngineType::Facenet, 1).identity(), "facenet-1-0-0");
    }

    #[test]
    fn version_accepts_path_alias() {
        let version: EngineVersion =
            serde_json::from_value(serde_json::json!({ "major": 1, "minor": 2, "path": 3 }))
                .unwrap();
        assert_eq!(version.patch, 3);
    }

    #[test]
    fn backend_kind_accepts_both_spellings() {
        for text in ["docker-gpu", "docker_gpu"] {
            let kind: BackendKind = serde_json::from_value(Value::from(text)).unwrap();
            assert_eq!(kind, BackendKind::DockerGpu);
        }
        assert!(serde_json::from_value::<BackendKind>(Value::from("k8s")).is_err());
    }

    #[test]
    fn thresholds_must_be_unit_interval() {
        let mut config = base_config(EngineType::Ntech, 1);
        assert!(config.validate().is_ok());

        config.quality_threshold = 1.5;
        assert_eq!(config.validate().unwrap_err().field, "quality_threshold");

        config.quality_threshold = 0.0;
        config.anti_spoofing_threshold = f64::NAN;
        assert_eq!(config.validate().unwrap_err().field, "anti_spoofing_threshold");
    }

    #[test]
    fn unknown_engine_type_is_rejected() {
        let mut json = serde_json::to_value(base_config(EngineType::Tevian, 1)).unwrap();
        json["engine_type"] = Value::from("acme");
        assert!(serde_json::from_value::<ProviderConfig>(json).is_err());
    }

    #[test]
    fn internal_id_requires_separator() {
        assert_eq!(internal_id("fake-1-0-0", "fake-1-0-0x"), None);
        assert_eq!(internal_id("fake-1-0-0", "fake-1-0-0:"), Some(""));
    }

    #[test]
    fn info_exposes_config() {
        let info = ProviderInfo::new(base_config(EngineType::Tevian, 2));
        assert_eq!(info.name(), "tevian-2-0-0");
        assert_eq!(info.engine_type(), EngineType::Tevian);
        assert_eq!(info.backend().orchestrator_type, BackendKind::Thread);
        assert_eq!(info.quality_threshold(), 0.5);
    }
}
