use std::{collections::BTreeMap, path::Path};

use crate::{
  pkg::{DEP_DIR, INDEX_FILE, LOCK_FILE, METADATA_CACHE_FILE, Package, RAMLX_DIR},
  registry::{Entity, Registry},
};

fn tree_snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
  let mut snapshot = BTreeMap::new();
  for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
    if entry.file_type().is_file() {
      let relative = entry
        .path()
        .strip_prefix(root)
        .expect("walked path is under root")
        .to_string_lossy()
        .to_string();
      snapshot.insert(relative, std::fs::read(entry.path()).expect("file is readable"));
    }
  }
  snapshot
}

#[test]
fn test_initialize_writes_layout() {
  let dir = tempfile::tempdir().expect("tempdir");
  let package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");

  assert!(dir.path().join(INDEX_FILE).exists());
  assert!(dir.path().join(LOCK_FILE).exists());
  assert!(dir.path().join(RAMLX_DIR).join("cti.raml").exists());
  assert_eq!(package.index.package_id, "xyz.mock");
}

#[test]
fn test_initialize_rejects_bad_package_id() {
  let dir = tempfile::tempdir().expect("tempdir");
  assert!(Package::initialize(dir.path(), "Not.Valid").is_err());
}

#[test]
fn test_sync_is_idempotent() {
  let dir = tempfile::tempdir().expect("tempdir");
  let package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");

  let first = tree_snapshot(&package.ramlx_dir());
  package.sync().expect("second sync succeeds");
  let second = tree_snapshot(&package.ramlx_dir());
  assert_eq!(first, second, "re-extracted spec tree must be byte-identical");
}

#[test]
fn test_sync_replaces_stale_spec_files() {
  let dir = tempfile::tempdir().expect("tempdir");
  let package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");

  std::fs::write(package.ramlx_dir().join("stale.raml"), "#%RAML 1.0 Library\n").expect("write succeeds");
  package.sync().expect("sync succeeds");
  assert!(!package.ramlx_dir().join("stale.raml").exists(), "prior copy is removed");
}

#[test]
fn test_open_round_trips_index() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");
  package.index.entities.push("types/message.raml".to_string());
  package.save().expect("save succeeds");

  let reopened = Package::open(dir.path()).expect("open succeeds");
  assert_eq!(reopened.index, package.index);
  assert_eq!(reopened.lock, package.lock);
}

#[test]
fn test_index_library_generation() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");
  package.index.entities = vec!["types/a.raml".to_string(), "types/b.raml".to_string()];
  package.index.examples = vec!["examples/a.raml".to_string()];

  let library = package.index_library(false);
  assert_eq!(
    library,
    "#%RAML 1.0 Library\nuses:\n  e1: types/a.raml\n  e2: types/b.raml\n"
  );

  let with_examples = package.index_library(true);
  assert!(with_examples.contains("  x1: examples/a.raml\n"));
}

#[test]
fn test_cache_round_trip() {
  let dir = tempfile::tempdir().expect("tempdir");
  let package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");

  let mut registry = Registry::new();
  registry
    .add(Entity::Type(crate::registry::tests::registry_tests::type_entity(
      "cti.a.p.message.v1.0",
    )))
    .expect("add succeeds");

  package.write_cache(&registry).expect("cache written");
  let rehydrated = package.parse_cached().expect("cache read");
  assert!(rehydrated.get_type("cti.a.p.message.v1.0").is_some());
}

#[test]
fn test_enriched_registry_reads_dependency_caches() {
  let dir = tempfile::tempdir().expect("tempdir");
  let mut package = Package::initialize(dir.path(), "xyz.mock").expect("initialize succeeds");

  let dep_root = dir.path().join(DEP_DIR).join("mock.dep");
  std::fs::create_dir_all(&dep_root).expect("dep dir created");
  let mut dep_registry = Registry::new();
  dep_registry
    .add(Entity::Type(crate::registry::tests::registry_tests::type_entity(
      "cti.m.d.shared.v1.0",
    )))
    .expect("add succeeds");
  let serialized = serde_json::to_string(&dep_registry.to_entities()).expect("serializes");
  std::fs::write(dep_root.join(METADATA_CACHE_FILE), serialized).expect("cache written");

  package
    .lock
    .depends
    .insert("mock.dep".to_string(), "registry.example.com/mock".to_string());

  let own = Registry::new();
  let enriched = package.enriched_registry(&own).expect("enrichment succeeds");
  assert!(enriched.get_type("cti.m.d.shared.v1.0").is_some());
}
