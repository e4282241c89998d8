//! Dependency discovery, integrity-checked download cache, and
//! installation into the local package tree.
//!
//! Cache layout under `packages_dir`:
//!
//! ```text
//! .cache/source/<source>/@v/<version>.info
//! .cache/package/<packageId>/@v/<version>.info
//! <packageId>/@<version>/...
//! ```
//!
//! `.info` records are immutable once written; a conflicting re-resolution
//! is an integrity failure, never a silent overwrite.

mod integrity;
mod links;
mod storage;


use std::{
  cmp::Ordering,
  collections::VecDeque,
  path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;

pub use integrity::{IntegrityError, PackageInfo, SourceInfo, directory_hash};
pub use links::{patch_links, patch_tree};
pub use storage::{GitStorage, Origin, Storage, StorageError};

use crate::{
  pkg::{DependencyInfo, DependencySpec, INDEX_FILE, Index, IndexError, Package, write_json_atomic},
  typegraph::TypeGraphProducer,
};

pub const CACHE_DIR: &str = ".cache";

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
  #[error(transparent)]
  Storage(#[from] StorageError),

  #[error("origin of {src}@{version} does not match the cached record")]
  IntegrityMismatch { src: String, version: String },

  #[error("directory hash of {package_id}@{version} does not match the cached record")]
  HashMismatch { package_id: String, version: String },

  #[error("package {package_id} is bound to '{existing}' but '{requested}' was requested")]
  SourceConflict {
    package_id: String,
    existing: String,
    requested: String,
  },

  #[error("cannot compare versions '{left}' and '{right}' of {src}")]
  VersionIncompatible { src: String, left: String, right: String },

  #[error("preparing dependency {package_id}: {reason}")]
  Prepare { package_id: String, reason: String },

  #[error(transparent)]
  Integrity(#[from] IntegrityError),

  #[error(transparent)]
  Index(#[from] IndexError),

  #[error("{context}")]
  Io {
    context: String,
    #[source]
    source: std::io::Error,
  },
}

/// One downloaded and cached dependency.
#[derive(Debug, Clone)]
pub struct ResolvedDependency {
  pub path: PathBuf,
  pub source: String,
  pub version: String,
  pub integrity: String,
  pub index: Index,
}

/// Resolves dependency sets against an on-disk cache. Single-threaded per
/// package directory; two processes sharing one must serialise externally.
pub struct Resolver<S> {
  packages_dir: PathBuf,
  storage: S,
}

impl<S: Storage> Resolver<S> {
  pub fn new(packages_dir: impl Into<PathBuf>, storage: S) -> Self {
    Self {
      packages_dir: packages_dir.into(),
      storage,
    }
  }

  /// Downloads every `(source, version)` pair plus its transitive
  /// dependencies. An already-resolved source is upgraded when a newer
  /// version is requested, kept otherwise.
  pub async fn download(&self, deps: &IndexMap<String, String>) -> Result<Vec<ResolvedDependency>, ResolveError> {
    let mut pending: VecDeque<(String, String)> = deps
      .iter()
      .map(|(source, version)| (source.clone(), version.clone()))
      .collect();
    let mut resolved: IndexMap<String, ResolvedDependency> = IndexMap::new();

    while let Some((source, version)) = pending.pop_front() {
      if let Some(existing) = resolved.get(&source) {
        let ordering = compare_versions(&source, &existing.version, &version)?;
        if ordering != Ordering::Less {
          continue;
        }
        tracing::debug!(source, from = existing.version, to = version, "upgrading dependency");
      }

      let dependency = self.fetch(&source, &version).await?;
      for (sub_source, sub_version) in &dependency.index.depends {
        pending.push_back((sub_source.clone(), sub_version.clone()));
      }
      resolved.insert(source, dependency);
    }

    Ok(resolved.into_values().collect())
  }

  /// Installs the package's declared dependencies into `.dep/` and
  /// records them in the lock file. Every copied dependency is parsed
  /// through `producer` so its validation and cache files are in place
  /// before the integrity hash is taken.
  pub async fn install(
    &self,
    package: &mut Package,
    producer: &dyn TypeGraphProducer,
  ) -> Result<Vec<ResolvedDependency>, ResolveError> {
    let resolved = self.download(&package.index.depends).await?;

    for dependency in &resolved {
      let package_id = dependency.index.package_id.clone();
      if let Some(existing) = package.lock.depends.get(&package_id)
        && existing != &dependency.source
      {
        return Err(ResolveError::SourceConflict {
          package_id,
          existing: existing.clone(),
          requested: dependency.source.clone(),
        });
      }

      let dest = package.dep_dir().join(&package_id);
      copy_replace(&dependency.path, &dest)?;

      let mut dep_package = Package::open(&dest).map_err(|err| prepare_error(&package_id, &err))?;
      dep_package
        .prepare(producer)
        .map_err(|err| prepare_error(&package_id, &err))?;

      let integrity = directory_hash(&dest)?;
      package.lock.depends.insert(package_id.clone(), dependency.source.clone());
      package.lock.depends_info.insert(
        dependency.source.clone(),
        DependencyInfo {
          package_id,
          version: dependency.version.clone(),
          integrity,
          source: dependency.source.clone(),
          depends: dependency.index.depends.keys().cloned().collect(),
        },
      );
    }

    package.save_lock()?;
    Ok(resolved)
  }

  /// `install` plus pinning the requested versions in `index.json`.
  pub async fn add(
    &self,
    package: &mut Package,
    specs: &[DependencySpec],
    producer: &dyn TypeGraphProducer,
  ) -> Result<Vec<ResolvedDependency>, ResolveError> {
    for spec in specs {
      package.index.depends.insert(spec.source.clone(), spec.version.clone());
    }
    let resolved = self.install(package, producer).await?;
    package.save_index()?;
    Ok(resolved)
  }

  async fn fetch(&self, source: &str, version: &str) -> Result<ResolvedDependency, ResolveError> {
    tracing::debug!(source, version, "resolving dependency");
    let origin = self.storage.discover(source, version).await?;

    let source_info_path = self.source_info_path(source, version);
    if source_info_path.exists() {
      let prior: SourceInfo = read_json(&source_info_path)?;
      if prior.origin != origin {
        return Err(ResolveError::IntegrityMismatch {
          src: source.to_string(),
          version: version.to_string(),
        });
      }
    }

    let download_root = self.packages_dir.join(CACHE_DIR).join("source");
    std::fs::create_dir_all(&download_root).map_err(|source| io_error("creating download cache", source))?;
    let tmp = tempfile::Builder::new()
      .prefix(".cti-")
      .tempdir_in(&download_root)
      .map_err(|source| io_error("creating download temp dir", source))?;

    self.storage.download(&origin, tmp.path()).await?;

    let index = Index::load(&tmp.path().join(INDEX_FILE))?;
    let package_id = index.package_id.clone();

    let final_dir = self.packages_dir.join(&package_id).join(format!("@{version}"));
    if final_dir.exists() {
      std::fs::remove_dir_all(&final_dir).map_err(|source| io_error("replacing cached package", source))?;
    }
    if let Some(parent) = final_dir.parent() {
      std::fs::create_dir_all(parent).map_err(|source| io_error("creating package cache dir", source))?;
    }

    let downloaded = tmp.keep();
    if let Err(source) = std::fs::rename(&downloaded, &final_dir) {
      let _ = std::fs::remove_dir_all(&downloaded);
      return Err(io_error("moving downloaded package into the cache", source));
    }

    patch_tree(&final_dir).map_err(|source| io_error("patching relative links", source))?;
    let integrity = directory_hash(&final_dir)?;

    let package_info_path = self.package_info_path(&package_id, version);
    if package_info_path.exists() {
      let prior: PackageInfo = read_json(&package_info_path)?;
      if prior.hash != integrity {
        return Err(ResolveError::HashMismatch {
          package_id,
          version: version.to_string(),
        });
      }
    } else {
      write_info(
        &package_info_path,
        &PackageInfo {
          source: source.to_string(),
          version: version.to_string(),
          hash: integrity.clone(),
        },
      )?;
    }

    if !source_info_path.exists() {
      write_info(
        &source_info_path,
        &SourceInfo {
          version: version.to_string(),
          time: chrono::Utc::now().to_rfc3339(),
          origin,
        },
      )?;
    }

    let index = Index::load(&final_dir.join(INDEX_FILE))?;
    Ok(ResolvedDependency {
      path: final_dir,
      source: source.to_string(),
      version: version.to_string(),
      integrity,
      index,
    })
  }

  fn source_info_path(&self, source: &str, version: &str) -> PathBuf {
    self
      .packages_dir
      .join(CACHE_DIR)
      .join("source")
      .join(source)
      .join("@v")
      .join(format!("{version}.info"))
  }

  fn package_info_path(&self, package_id: &str, version: &str) -> PathBuf {
    self
      .packages_dir
      .join(CACHE_DIR)
      .join("package")
      .join(package_id)
      .join("@v")
      .join(format!("{version}.info"))
  }
}

/// Lenient semver comparison: a leading `v` is tolerated; two equal
/// non-semver strings compare equal, anything else is incompatible.
fn compare_versions(source: &str, left: &str, right: &str) -> Result<Ordering, ResolveError> {
  let parse = |raw: &str| semver::Version::parse(raw.strip_prefix('v').unwrap_or(raw)).ok();
  match (parse(left), parse(right)) {
    (Some(left), Some(right)) => Ok(left.cmp(&right)),
    _ if left == right => Ok(Ordering::Equal),
    _ => Err(ResolveError::VersionIncompatible {
      src: source.to_string(),
      left: left.to_string(),
      right: right.to_string(),
    }),
  }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ResolveError> {
  let raw = std::fs::read_to_string(path).map_err(|source| io_error("reading cache record", source))?;
  serde_json::from_str(&raw).map_err(|source| {
    ResolveError::Index(IndexError::Decode {
      path: path.display().to_string(),
      source,
    })
  })
}

fn write_info<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ResolveError> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|source| io_error("creating cache record dir", source))?;
  }
  Ok(write_json_atomic(path, value)?)
}

fn copy_replace(from: &Path, to: &Path) -> Result<(), ResolveError> {
  if to.exists() {
    std::fs::remove_dir_all(to).map_err(|source| io_error("replacing installed dependency", source))?;
  }
  copy_dir(from, to).map_err(|source| io_error("copying dependency tree", source))
}

fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
  for entry in walkdir::WalkDir::new(from) {
    let entry = entry?;
    let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
    let dest = to.join(relative);
    if entry.file_type().is_dir() {
      std::fs::create_dir_all(&dest)?;
    } else {
      std::fs::copy(entry.path(), &dest)?;
    }
  }
  Ok(())
}

fn prepare_error(package_id: &str, err: &anyhow::Error) -> ResolveError {
  ResolveError::Prepare {
    package_id: package_id.to_string(),
    reason: format!("{err:#}"),
  }
}

fn io_error(context: &str, source: std::io::Error) -> ResolveError {
  ResolveError::Io {
    context: context.to_string(),
    source,
  }
}
