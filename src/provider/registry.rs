//! Provider registry: discovery, validation and instantiation of providers.
//!
//! Implementations are compiled in and listed in a [`ProviderCatalog`] under
//! their sub-namespace name. The provider namespace directory selects which
//! of them run: each sub-directory names a catalog entry and carries the
//! entry's `.config.yaml`.
//!
//! ```text
//! providers/
//! ├── fake_provider/
//! │   └── .config.yaml
//! └── facenet_provider/
//!     └── .config.yaml
//! ```
//!
//! A sub-namespace that fails any check is logged, recorded in the
//! [`LoadReport`] and skipped; loading continues with the next one.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::{Provider, ProviderSettings};
use crate::config::AppConfig;
use crate::error::{RegistryError, RegistryResult};

/// File name of the per-provider configuration.
pub const CONFIG_FILE_NAME: &str = ".config.yaml";

type Factory = Box<dyn Fn(Value) -> Result<Arc<dyn Provider>, String> + Send + Sync>;

struct CatalogEntry {
    namespace: String,
    factory: Factory,
}

/// Static list of provider implementations, each pairing one typed
/// configuration with one constructor.
#[derive(Default)]
pub struct ProviderCatalog {
    entries: Vec<CatalogEntry>,
}

impl std::fmt::Debug for ProviderCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.namespace))
            .finish()
    }
}

impl ProviderCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The providers bundled with this crate: `fake_provider` always, and
    /// `facenet_provider` with the `http-client` feature.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("fake_provider", |config: super::fake::FakeConfig| {
            Ok(super::fake::FakeProvider::new(config))
        });
        #[cfg(feature = "http-client")]
        catalog.register("facenet_provider", super::http::HttpProvider::new);
        catalog
    }

    /// Adds an implementation for `namespace`.
    ///
    /// The merged key/value payload is deserialized into `C`, its common
    /// fields validated, then handed to `build`.
    pub fn register<C, P, F>(&mut self, namespace: impl Into<String>, build: F) -> &mut Self
    where
        C: ProviderSettings + 'static,
        P: Provider + 'static,
        F: Fn(C) -> Result<P, String> + Send + Sync + 'static,
    {
        let factory: Factory = Box::new(move |value| {
            let config: C = serde_json::from_value(value).map_err(|e| e.to_string())?;
            config.base().validate().map_err(|e| e.to_string())?;
            let provider = build(config)?;
            Ok(Arc::new(provider) as Arc<dyn Provider>)
        });
        self.entries.push(CatalogEntry {
            namespace: namespace.into(),
            factory,
        });
        self
    }

    /// Names of all catalog entries, in registration order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.namespace.as_str())
    }

    fn entries_for<'a>(&'a self, namespace: &'a str) -> impl Iterator<Item = &'a CatalogEntry> {
        self.entries.iter().filter(move |e| e.namespace == namespace)
    }
}

/// Outcome of a registry load: what was loaded and what was skipped.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// `(namespace, provider name)` for each loaded provider.
    pub loaded: Vec<(String, String)>,
    /// One error per skipped sub-namespace.
    pub errors: Vec<RegistryError>,
}

impl LoadReport {
    /// Returns `true` if no sub-namespace was skipped.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Loaded providers indexed by identity. Read-only after construction.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.provider_names())
            .finish()
    }
}

impl ProviderRegistry {
    /// Loads every provider under `config.provider_namespace`, applying
    /// `config.provider_overrides`.
    pub fn from_config(
        config: &AppConfig,
        catalog: &ProviderCatalog,
    ) -> RegistryResult<(Self, LoadReport)> {
        Self::load(
            &config.provider_namespace,
            catalog,
            &config.provider_overrides,
        )
    }

    /// Loads every provider sub-namespace under `dir`.
    ///
    /// Sub-namespaces are visited in name order, so when two resolve to the
    /// same identity the first one wins and the second is reported as
    /// [`RegistryError::DuplicateIdentity`].
    ///
    /// # Errors
    ///
    /// Only [`RegistryError::NamespaceUnreadable`]: per-provider problems are
    /// returned in the [`LoadReport`].
    pub fn load(
        dir: &Path,
        catalog: &ProviderCatalog,
        overrides: &BTreeMap<String, Map<String, Value>>,
    ) -> RegistryResult<(Self, LoadReport)> {
        let unreadable = |source| RegistryError::NamespaceUnreadable {
            path: dir.to_path_buf(),
            source,
        };
        let mut subdirs: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(unreadable)? {
            let entry = entry.map_err(unreadable)?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => subdirs.push((name, entry.path())),
                Err(name) => tracing::warn!(?name, "skipping non UTF-8 provider directory"),
            }
        }
        subdirs.sort();

        let mut registry = Self::default();
        let mut owners: HashMap<String, String> = HashMap::new();
        let mut report = LoadReport::default();

        for (namespace, path) in subdirs {
            let result = load_one(&namespace, &path, catalog, overrides.get(&namespace))
                .and_then(|provider| {
                    let name = provider.name().to_string();
                    match owners.get(&name) {
                        Some(existing) => Err(RegistryError::DuplicateIdentity {
                            namespace: namespace.clone(),
                            name,
                            existing: existing.clone(),
                        }),
                        None => Ok((name, provider)),
                    }
                });

            match result {
                Ok((name, provider)) => {
                    tracing::info!(namespace = %namespace, provider = %name, "provider loaded");
                    owners.insert(name.clone(), namespace.clone());
                    registry.providers.insert(name.clone(), provider);
                    report.loaded.push((namespace, name));
                },
                Err(err) => {
                    tracing::error!(namespace = %namespace, error = %err, "provider skipped");
                    report.errors.push(err);
                },
            }
        }

        Ok((registry, report))
    }

    /// Builds a registry from already constructed providers.
    ///
    /// # Errors
    ///
    /// [`RegistryError::DuplicateIdentity`] if two providers share a name.
    pub fn from_providers(
        providers: impl IntoIterator<Item = Arc<dyn Provider>>,
    ) -> RegistryResult<Self> {
        let mut registry = Self::default();
        for provider in providers {
            let name = provider.name().to_string();
            if registry.providers.contains_key(&name) {
                return Err(RegistryError::DuplicateIdentity {
                    namespace: name.clone(),
                    name: name.clone(),
                    existing: name,
                });
            }
            registry.providers.insert(name, provider);
        }
        Ok(registry)
    }

    /// All loaded providers, sorted by name.
    pub fn providers(&self) -> Vec<Arc<dyn Provider>> {
        let mut providers: Vec<_> = self.providers.values().cloned().collect();
        providers.sort_by(|a, b| a.name().cmp(b.name()));
        providers
    }

    /// Names of all loaded providers, sorted.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Exact lookup by identity.
    ///
    /// Callers are expected to check [`contains`](Self::contains) or
    /// [`provider_names`](Self::provider_names) first, so a miss is logged
    /// as an error.
    pub fn get_provider(&self, name: &str) -> RegistryResult<Arc<dyn Provider>> {
        self.providers.get(name).cloned().ok_or_else(|| {
            tracing::error!(provider = %name, "lookup of unknown provider");
            RegistryError::UnknownProvider {
                name: name.to_string(),
            }
        })
    }
}

/// Loads one sub-namespace: config file, catalog entry, merge, build.
fn load_one(
    namespace: &str,
    path: &Path,
    catalog: &ProviderCatalog,
    overrides: Option<&Map<String, Value>>,
) -> RegistryResult<Arc<dyn Provider>> {
    let config_path = path.join(CONFIG_FILE_NAME);
    if !config_path.is_file() {
        return Err(RegistryError::ConfigMissing {
            namespace: namespace.to_string(),
        });
    }

    let entries: Vec<&CatalogEntry> = catalog.entries_for(namespace).collect();
    let [entry] = entries.as_slice() else {
        return Err(RegistryError::ImplementationCount {
            namespace: namespace.to_string(),
            found: entries.len(),
        });
    };

    let text =
        std::fs::read_to_string(&config_path).map_err(|source| RegistryError::ConfigRead {
            namespace: namespace.to_string(),
            source,
        })?;
    let payload = merge_config(namespace, &text, overrides)?;

    (entry.factory)(payload).map_err(|message| RegistryError::InvalidConfig {
        namespace: namespace.to_string(),
        message,
    })
}

/// Parses the YAML mapping and overlays `overrides` on it key by key.
fn merge_config(
    namespace: &str,
    text: &str,
    overrides: Option<&Map<String, Value>>,
) -> RegistryResult<Value> {
    let parsed: Value = serde_yaml::from_str(text).map_err(|source| RegistryError::ConfigParse {
        namespace: namespace.to_string(),
        source,
    })?;
    let mut map = match parsed {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(RegistryError::InvalidConfig {
                namespace: namespace.to_string(),
                message: format!("expected a mapping at the top level, found {other}"),
            })
        },
    };
    if let Some(overrides) = overrides {
        for (key, value) in overrides {
            map.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(map))
}
