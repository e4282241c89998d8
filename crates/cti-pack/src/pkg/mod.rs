//! On-disk package layout: `index.json`, `index-lock.json`, the embedded
//! RAMLx spec under `.ramlx/`, dependencies under `.dep/`, and the
//! serialized metadata cache.

mod embed;
mod index;

use std::{
  fmt::Write as _,
  path::{Path, PathBuf},
};

use anyhow::Context;

pub use index::{
  DependencyInfo, DependencySpec, Index, IndexError, IndexLock, INDEX_FILE, LOCK_FILE, LOCK_VERSION, PACKAGE_TYPE,
  validate_package_id,
};
pub(crate) use index::write_json_atomic;

use crate::{
  compiler::{CompileStats, Validator, compile},
  registry::{Entity, Registry},
  typegraph::TypeGraphProducer,
};

pub const RAMLX_DIR: &str = ".ramlx";
pub const DEP_DIR: &str = ".dep";
pub const METADATA_CACHE_FILE: &str = ".cache.json";

/// A package rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct Package {
  root: PathBuf,
  pub index: Index,
  pub lock: IndexLock,
}

impl Package {
  /// Creates a new package: writes both index files and extracts the
  /// embedded spec, replacing any prior `.ramlx/` copy.
  pub fn initialize(root: &Path, package_id: &str) -> anyhow::Result<Self> {
    std::fs::create_dir_all(root).with_context(|| format!("creating package root {}", root.display()))?;

    let package = Self {
      root: root.to_path_buf(),
      index: Index::new(package_id)?,
      lock: IndexLock::default(),
    };
    package.sync()?;
    package.save()?;
    Ok(package)
  }

  /// Opens an existing package. A missing lock file is an empty lock, not
  /// an error.
  pub fn open(root: &Path) -> anyhow::Result<Self> {
    let index = Index::load(&root.join(INDEX_FILE)).with_context(|| format!("opening package at {}", root.display()))?;
    let lock_path = root.join(LOCK_FILE);
    let lock = if lock_path.exists() {
      IndexLock::load(&lock_path)?
    } else {
      IndexLock::default()
    };

    Ok(Self {
      root: root.to_path_buf(),
      index,
      lock,
    })
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn ramlx_dir(&self) -> PathBuf {
    self.root.join(RAMLX_DIR)
  }

  pub fn dep_dir(&self) -> PathBuf {
    self.root.join(DEP_DIR)
  }

  pub fn cache_path(&self) -> PathBuf {
    self.root.join(METADATA_CACHE_FILE)
  }

  /// Re-extracts the embedded spec without touching the index files.
  pub fn sync(&self) -> anyhow::Result<()> {
    embed::extract_spec(&self.ramlx_dir())
      .with_context(|| format!("extracting embedded spec into {}", self.ramlx_dir().display()))
  }

  /// Saves both index files atomically.
  pub fn save(&self) -> anyhow::Result<()> {
    self.save_index()?;
    self.save_lock()?;
    Ok(())
  }

  pub fn save_index(&self) -> Result<(), IndexError> {
    self.index.save(&self.root.join(INDEX_FILE))
  }

  pub fn save_lock(&self) -> Result<(), IndexError> {
    self.lock.save(&self.root.join(LOCK_FILE))
  }

  /// The in-memory `#%RAML 1.0 Library` that pulls every declared entity
  /// (and, when requested, example) into one parse. Never written to disk.
  pub fn index_library(&self, include_examples: bool) -> String {
    let mut library = String::from("#%RAML 1.0 Library\nuses:\n");
    for (i, entity) in self.index.entities.iter().enumerate() {
      let _ = writeln!(library, "  e{}: {entity}", i + 1);
    }
    if include_examples {
      for (i, example) in self.index.examples.iter().enumerate() {
        let _ = writeln!(library, "  x{}: {example}", i + 1);
      }
    }
    library
  }

  /// Runs the full pipeline over this package's sources: produce the type
  /// graph, collect + transform, and write the serialized metadata cache.
  pub fn parse(&mut self, producer: &dyn TypeGraphProducer) -> anyhow::Result<(Registry, CompileStats)> {
    let library = self.index_library(false);
    let graph = producer
      .produce(&library, &self.root)
      .with_context(|| format!("parsing package {}", self.index.package_id))?;

    let (registry, stats) = compile(&graph).with_context(|| format!("compiling package {}", self.index.package_id))?;

    self.write_cache(&registry)?;
    Ok((registry, stats))
  }

  /// Parses through the frontend, falling back to the metadata cache the
  /// package ships when the frontend cannot produce a graph. Either path
  /// leaves a loadable cache behind, so installed dependencies are always
  /// ready for validation.
  pub fn prepare(&mut self, producer: &dyn TypeGraphProducer) -> anyhow::Result<Registry> {
    match self.parse(producer) {
      Ok((registry, _)) => Ok(registry),
      Err(parse_error) => {
        let Ok(registry) = self.parse_cached() else {
          return Err(parse_error);
        };
        tracing::debug!(
          package = %self.index.package_id,
          "frontend parse failed, keeping the shipped metadata cache"
        );
        Ok(registry)
      }
    }
  }

  /// Rehydrates the registry from the serialized metadata cache.
  pub fn parse_cached(&self) -> anyhow::Result<Registry> {
    let path = self.cache_path();
    let raw = std::fs::read_to_string(&path)
      .with_context(|| format!("reading metadata cache {}", path.display()))?;
    let entities: Vec<Entity> =
      serde_json::from_str(&raw).with_context(|| format!("decoding metadata cache {}", path.display()))?;
    Ok(Registry::from_entities(entities)?)
  }

  /// Writes the serialized metadata cache atomically.
  pub fn write_cache(&self, registry: &Registry) -> anyhow::Result<()> {
    write_json_atomic(&self.cache_path(), &registry.to_entities())
      .with_context(|| format!("writing metadata cache for {}", self.index.package_id))
  }

  /// Combines this package's registry with the cached registries of every
  /// installed dependency.
  pub fn enriched_registry(&self, registry: &Registry) -> anyhow::Result<Registry> {
    let mut combined = registry.clone();
    for package_id in self.lock.depends.keys() {
      let cache = self.dep_dir().join(package_id).join(METADATA_CACHE_FILE);
      if !cache.exists() {
        continue;
      }
      let raw = std::fs::read_to_string(&cache)
        .with_context(|| format!("reading dependency cache {}", cache.display()))?;
      let entities: Vec<Entity> =
        serde_json::from_str(&raw).with_context(|| format!("decoding dependency cache {}", cache.display()))?;
      combined = combined.merged_with(&Registry::from_entities(entities)?)?;
    }
    Ok(combined)
  }

  /// Validates the cached registry and returns the findings.
  pub fn validate_cached(&self) -> anyhow::Result<Vec<crate::compiler::ValidationIssue>> {
    let registry = self.parse_cached()?;
    let enriched = self.enriched_registry(&registry)?;
    Ok(Validator::new(&enriched).validate())
  }
}

#[cfg(test)]
mod tests;
