//! Application configuration.
//!
//! Loaded once at startup from a TOML file and passed down explicitly:
//!
//! ```toml
//! provider_namespace = "providers"
//!
//! [store]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379/1"
//! task_ttl_secs = 500
//!
//! [logging]
//! filter = "info,faceapi=debug"
//!
//! [provider_overrides.facenet_provider]
//! base_url = "http://facenet.internal:8080"
//! ```
//!
//! Every section is optional; missing values fall back to their defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use faceapi_tasks::store::memory::InMemoryTaskStore;
use faceapi_tasks::store::{StoreConfig, TaskStore};
use faceapi_tasks::{DEFAULT_KEY_PREFIX, DEFAULT_TASK_TTL_SECS};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Directory holding one sub-directory per provider.
    #[serde(default = "default_provider_namespace")]
    pub provider_namespace: PathBuf,

    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-provider key/value pairs merged over the provider's
    /// `.config.yaml`, keyed by sub-namespace. Override keys win.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub provider_overrides: BTreeMap<String, Map<String, Value>>,
}

fn default_provider_namespace() -> PathBuf {
    PathBuf::from("providers")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider_namespace: default_provider_namespace(),
            store: StoreSettings::default(),
            logging: LoggingConfig::default(),
            provider_overrides: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, is not valid
    /// TOML, or holds out-of-range values.
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.task_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "store.task_ttl_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.store.backend == StoreBackendKind::Redis && self.store.redis_url.is_none() {
            return Err(ConfigError::Invalid {
                field: "store.redis_url".to_string(),
                reason: "required when store.backend is \"redis\"".to_string(),
            });
        }
        Ok(())
    }

    /// Overrides registered for a provider sub-namespace.
    pub fn overrides_for(&self, namespace: &str) -> Option<&Map<String, Value>> {
        self.provider_overrides.get(namespace)
    }
}

/// Which result store backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    /// In-process `DashMap` store.
    #[default]
    Memory,
    /// Redis (requires the `redis` feature).
    Redis,
}

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackendKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Lifetime of a task record after its last write.
    #[serde(default = "default_task_ttl_secs")]
    pub task_ttl_secs: u64,
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_task_ttl_secs() -> u64 {
    DEFAULT_TASK_TTL_SECS
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            redis_url: None,
            key_prefix: default_key_prefix(),
            task_ttl_secs: default_task_ttl_secs(),
        }
    }
}

impl StoreSettings {
    pub fn task_ttl(&self) -> Duration {
        Duration::from_secs(self.task_ttl_secs)
    }

    /// The task-store view of these settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default().with_task_ttl(self.task_ttl())
    }

    /// Builds the configured result store.
    ///
    /// # Errors
    ///
    /// [`ConfigError::StoreUnavailable`] if Redis is selected but cannot be
    /// reached, or the crate was built without the `redis` feature.
    pub async fn open_task_store(&self) -> ConfigResult<Arc<dyn TaskStore>> {
        match self.backend {
            StoreBackendKind::Memory => Ok(Arc::new(
                InMemoryTaskStore::default().with_config(self.store_config()),
            )),
            StoreBackendKind::Redis => self.open_redis().await,
        }
    }

    #[cfg(feature = "redis")]
    async fn open_redis(&self) -> ConfigResult<Arc<dyn TaskStore>> {
        use faceapi_tasks::store::generic::GenericTaskStore;
        use faceapi_tasks::store::redis::RedisBackend;

        let url = self.redis_url.as_deref().ok_or_else(|| ConfigError::Invalid {
            field: "store.redis_url".to_string(),
            reason: "required when store.backend is \"redis\"".to_string(),
        })?;
        let backend = RedisBackend::new(url)
            .await
            .map_err(|e| ConfigError::StoreUnavailable(e.to_string()))?
            .with_prefix(self.key_prefix.clone());
        tracing::info!(prefix = %self.key_prefix, "using redis result store");
        Ok(Arc::new(
            GenericTaskStore::new(backend).with_config(self.store_config()),
        ))
    }

    #[cfg(not(feature = "redis"))]
    async fn open_redis(&self) -> ConfigResult<Arc<dyn TaskStore>> {
        Err(ConfigError::StoreUnavailable(
            "built without the `redis` feature".to_string(),
        ))
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}
