//! Error types for configuration, provider loading and task dispatch.
//!
//! Provider operations never surface here: an engine failure always ends up
//! as a `failed` task record. These errors cover what is reported
//! synchronously to the caller or the operator.

use std::path::PathBuf;

use faceapi_tasks::TaskError;
use thiserror::Error;
use uuid::Uuid;

/// Errors loading the application configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`AppConfig`](crate::config::AppConfig).
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is out of range.
    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// The configured result store could not be opened.
    #[error("result store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading providers or looking them up.
///
/// Per-provider load errors are collected in a
/// [`LoadReport`](crate::provider::registry::LoadReport); only
/// [`RegistryError::NamespaceUnreadable`] aborts a load.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The provider namespace directory itself could not be listed.
    #[error("cannot read provider namespace '{}': {source}", path.display())]
    NamespaceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sub-namespace has no `.config.yaml`.
    #[error("provider '{namespace}' has no .config.yaml")]
    ConfigMissing { namespace: String },

    /// The sub-namespace does not resolve to exactly one implementation.
    #[error("provider '{namespace}' must have exactly one implementation, found {found}")]
    ImplementationCount { namespace: String, found: usize },

    /// `.config.yaml` exists but could not be read.
    #[error("cannot read config of provider '{namespace}': {source}")]
    ConfigRead {
        namespace: String,
        #[source]
        source: std::io::Error,
    },

    /// `.config.yaml` is not valid YAML.
    #[error("cannot parse config of provider '{namespace}': {source}")]
    ConfigParse {
        namespace: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The merged configuration does not fit the provider's typed config,
    /// or the provider rejected it at construction.
    #[error("invalid config for provider '{namespace}': {message}")]
    InvalidConfig { namespace: String, message: String },

    /// Two sub-namespaces resolved to the same provider identity.
    #[error("provider '{namespace}' resolves to identity '{name}' which is already loaded from '{existing}'")]
    DuplicateIdentity {
        namespace: String,
        name: String,
        existing: String,
    },

    /// Lookup of a provider name that is not loaded.
    #[error("no such provider '{name}'")]
    UnknownProvider { name: String },
}

impl RegistryError {
    /// The sub-namespace the error belongs to, if any.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::ConfigMissing { namespace }
            | Self::ImplementationCount { namespace, .. }
            | Self::ConfigRead { namespace, .. }
            | Self::ConfigParse { namespace, .. }
            | Self::InvalidConfig { namespace, .. }
            | Self::DuplicateIdentity { namespace, .. } => Some(namespace),
            Self::NamespaceUnreadable { .. } | Self::UnknownProvider { .. } => None,
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Errors from the durable identity store.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A face was created for an engine the store does not know.
    #[error("no such engine {0}")]
    UnknownEngine(Uuid),

    /// The backing store failed.
    #[error("identity store error: {0}")]
    Backend(String),
}

/// Errors returned synchronously by [`TaskService`](crate::service::TaskService).
///
/// Every variant except [`ServiceError::Internal`] and
/// [`ServiceError::Store`] is caused by caller input; no task is created
/// when one is returned.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no such engine {0}")]
    UnknownEngine(Uuid),

    #[error("no such provider '{0}'")]
    UnknownProvider(String),

    #[error("no such face {0}")]
    UnknownFace(Uuid),

    #[error("invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("no such task {0}")]
    UnknownTask(String),

    /// A provider refused to remove one of the face's descriptors.
    #[error("cannot delete face {face_id}: {message}")]
    RemovalFailed { face_id: Uuid, message: String },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("result store error: {0}")]
    Store(#[source] TaskError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns `true` when the caller should fix its request rather than
    /// retry it.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownEngine(_)
                | Self::UnknownProvider(_)
                | Self::UnknownFace(_)
                | Self::InvalidTaskId(_)
                | Self::UnknownTask(_)
        )
    }
}

impl From<TaskError> for ServiceError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::InvalidTaskId { value } => Self::InvalidTaskId(value),
            other => Self::Store(other),
        }
    }
}

/// Result type for dispatch operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failures inside an orchestrator run. Never stored: each one is logged
/// and replaced by the generic internal error record.
#[derive(Debug, Error)]
pub(crate) enum OrchestratorError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("no durable face for internal id '{internal_id}'")]
    UnknownInternalId { internal_id: String },

    #[error("no such face {0}")]
    UnknownFace(Uuid),

    #[error("face {0} has no descriptors")]
    NoDescriptors(Uuid),

    #[error("provider returned a non-finite score: {0}")]
    NonFiniteScore(f64),

    #[error("provider panicked: {0}")]
    Panic(String),
}
