//! Loading providers from a namespace directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use faceapi::error::RegistryError;
use faceapi::provider::fake::{FakeConfig, FakeProvider};
use faceapi::provider::{ProviderCatalog, ProviderRegistry};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn fake_yaml(engine_type: &str, major: u32) -> String {
    format!(
        "\
engine_type: {engine_type}
version:
  major: {major}
  minor: 2
  path: 3
description: simulated engine
quality_threshold: 0.4
anti_spoofing_threshold: 0.6
build: b17
orchestrator:
  orchestrator_type: docker
  params:
    image: facenet:latest
latency_ms: 0
"
    )
}

fn write_provider(root: &Path, namespace: &str, config: Option<&str>) {
    let dir = root.join(namespace);
    fs::create_dir_all(&dir).unwrap();
    if let Some(config) = config {
        fs::write(dir.join(".config.yaml"), config).unwrap();
    }
}

fn fake_catalog(namespaces: &[&str]) -> ProviderCatalog {
    let mut catalog = ProviderCatalog::new();
    for ns in namespaces {
        catalog.register(*ns, |config: FakeConfig| Ok(FakeProvider::new(config)));
    }
    catalog
}

fn no_overrides() -> BTreeMap<String, Map<String, Value>> {
    BTreeMap::new()
}

#[test]
fn loads_provider_with_merged_config() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "fake_provider", Some(&fake_yaml("facenet", 1)));

    let (registry, report) =
        ProviderRegistry::load(root.path(), &ProviderCatalog::builtin(), &no_overrides()).unwrap();

    assert!(report.is_clean());
    assert_eq!(registry.provider_names(), vec!["facenet-1-2-3".to_string()]);
    assert_eq!(
        report.loaded,
        vec![("fake_provider".to_string(), "facenet-1-2-3".to_string())]
    );

    let provider = registry.get_provider("facenet-1-2-3").unwrap();
    let info = provider.info();
    assert_eq!(info.build(), "b17");
    assert_eq!(info.quality_threshold(), 0.4);
    assert_eq!(info.backend().params["image"], json!("facenet:latest"));
}

#[test]
fn missing_config_file_skips_only_that_provider() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "alpha", Some(&fake_yaml("ntech", 1)));
    write_provider(root.path(), "beta", None);

    let (registry, report) =
        ProviderRegistry::load(root.path(), &fake_catalog(&["alpha", "beta"]), &no_overrides())
            .unwrap();

    assert_eq!(registry.len(), 1);
    assert!(matches!(
        report.errors.as_slice(),
        [RegistryError::ConfigMissing { namespace }] if namespace == "beta"
    ));
}

#[test]
fn namespace_needs_exactly_one_implementation() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "none", Some(&fake_yaml("ntech", 1)));
    write_provider(root.path(), "twice", Some(&fake_yaml("ntech", 2)));

    let (registry, report) =
        ProviderRegistry::load(root.path(), &fake_catalog(&["twice", "twice"]), &no_overrides())
            .unwrap();

    assert!(registry.is_empty());
    let found: Vec<(Option<&str>, usize)> = report
        .errors
        .iter()
        .map(|e| match e {
            RegistryError::ImplementationCount { found, .. } => (e.namespace(), *found),
            other => panic!("unexpected error {other}"),
        })
        .collect();
    assert_eq!(found, vec![(Some("none"), 0), (Some("twice"), 2)]);
}

#[test]
fn invalid_config_is_reported() {
    let root = tempfile::tempdir().unwrap();
    write_provider(
        root.path(),
        "bad_threshold",
        Some(&fake_yaml("ntech", 1).replace("quality_threshold: 0.4", "quality_threshold: 4")),
    );
    write_provider(root.path(), "missing_fields", Some("engine_type: ntech\n"));
    write_provider(root.path(), "not_yaml", Some("engine_type: [ntech\n"));

    let (registry, report) = ProviderRegistry::load(
        root.path(),
        &fake_catalog(&["bad_threshold", "missing_fields", "not_yaml"]),
        &no_overrides(),
    )
    .unwrap();

    assert!(registry.is_empty());
    assert!(matches!(
        &report.errors[..],
        [
            RegistryError::InvalidConfig { .. },
            RegistryError::InvalidConfig { .. },
            RegistryError::ConfigParse { .. },
        ]
    ));
    assert!(report.errors[0].to_string().contains("quality_threshold"));
}

#[test]
fn duplicate_identity_keeps_first_namespace() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "a_first", Some(&fake_yaml("tevian", 1)));
    write_provider(root.path(), "b_second", Some(&fake_yaml("tevian", 1)));

    let (registry, report) = ProviderRegistry::load(
        root.path(),
        &fake_catalog(&["a_first", "b_second"]),
        &no_overrides(),
    )
    .unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(report.loaded[0].0, "a_first");
    assert!(matches!(
        report.errors.as_slice(),
        [RegistryError::DuplicateIdentity { namespace, existing, .. }]
            if namespace == "b_second" && existing == "a_first"
    ));
}

#[test]
fn overrides_apply_only_to_their_namespace() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "one", Some(&fake_yaml("ntech", 1)));
    write_provider(root.path(), "two", Some(&fake_yaml("ntech", 2)));

    let mut overrides = BTreeMap::new();
    let mut one = Map::new();
    one.insert("build".to_string(), json!("patched"));
    overrides.insert("one".to_string(), one);

    let (registry, report) =
        ProviderRegistry::load(root.path(), &fake_catalog(&["one", "two"]), &overrides).unwrap();

    assert!(report.is_clean());
    assert_eq!(registry.get_provider("ntech-1-2-3").unwrap().info().build(), "patched");
    assert_eq!(registry.get_provider("ntech-2-2-3").unwrap().info().build(), "b17");
}

#[test]
fn files_at_the_top_level_are_ignored() {
    let root = tempfile::tempdir().unwrap();
    fs::write(root.path().join("README"), "not a provider").unwrap();

    let (registry, report) =
        ProviderRegistry::load(root.path(), &ProviderCatalog::builtin(), &no_overrides()).unwrap();

    assert!(registry.is_empty());
    assert!(report.is_clean());
}

#[test]
fn unreadable_namespace_aborts() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("nope");
    assert!(matches!(
        ProviderRegistry::load(&missing, &ProviderCatalog::builtin(), &no_overrides()),
        Err(RegistryError::NamespaceUnreadable { .. })
    ));
}

#[test]
fn every_name_resolves_to_matching_provider() {
    let root = tempfile::tempdir().unwrap();
    write_provider(root.path(), "a", Some(&fake_yaml("ntech", 1)));
    write_provider(root.path(), "b", Some(&fake_yaml("tevian", 4)));
    write_provider(root.path(), "c", Some(&fake_yaml("vision_labs", 2)));

    let (registry, _) =
        ProviderRegistry::load(root.path(), &fake_catalog(&["a", "b", "c"]), &no_overrides())
            .unwrap();

    assert_eq!(registry.len(), 3);
    for name in registry.provider_names() {
        assert_eq!(registry.get_provider(&name).unwrap().name(), name);
    }
}

#[test]
fn bundled_provider_namespace_loads_cleanly() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("providers");
    let (registry, report) =
        ProviderRegistry::load(&dir, &ProviderCatalog::builtin(), &no_overrides()).unwrap();

    assert!(registry.contains("facenet-0-0-1"));
    if cfg!(feature = "http-client") {
        assert!(report.is_clean());
        assert!(registry.contains("facenet-1-0-0"));
    }
}
