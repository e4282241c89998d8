//! Reproducible package archives (`.cti` files as gzipped tar or zip).

mod writer;

#[cfg(test)]
mod tests;

use std::{
  fs::File,
  io::Read,
  path::{Path, PathBuf},
};

use same_file::Handle;
use serde_json::Value;

use crate::{
  pkg::{DEP_DIR, INDEX_FILE, METADATA_CACHE_FILE, Package, RAMLX_DIR},
  registry::Registry,
};

use self::writer::ArchiveWriter;

/// Per-entry extraction cap.
pub const MAX_ENTRY_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ArchiveFormat {
  Tgz,
  Zip,
}

/// Walk-hook verdicts for source collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkDecision {
  Continue,
  SkipFile,
  SkipDir,
  /// Include the entry and bypass the built-in exclusion rules.
  SkipChecks,
}

pub type WalkHook<'a> = Box<dyn Fn(&Path) -> WalkDecision + 'a>;

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
  #[error("reading {path}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("writing archive entry {entry}")]
  Write {
    entry: String,
    #[source]
    source: std::io::Error,
  },

  #[error("writing zip entry {entry}")]
  Zip {
    entry: String,
    #[source]
    source: zip::result::ZipError,
  },

  #[error("creating archive at {path}")]
  Create {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("archive entry {entry} escapes the target directory")]
  PathEscape { entry: String },

  #[error("archive entry {entry} exceeds {MAX_ENTRY_SIZE} bytes")]
  FileTooLarge { entry: String },

  #[error("corrupt archive: {0}")]
  Corrupt(String),

  #[error("encoding index.json")]
  Encode(#[source] serde_json::Error),
}

/// Writes a parsed package and its compiled registry into an archive.
pub struct Archiver<'a> {
  package: &'a Package,
  registry: &'a Registry,
  format: ArchiveFormat,
  include_sources: bool,
  prefix: String,
  exclude: Option<WalkHook<'a>>,
  whitelist: Option<WalkHook<'a>>,
}

impl<'a> Archiver<'a> {
  pub fn new(package: &'a Package, registry: &'a Registry, format: ArchiveFormat) -> Self {
    Self {
      package,
      registry,
      format,
      include_sources: false,
      prefix: String::new(),
      exclude: None,
      whitelist: None,
    }
  }

  pub fn include_sources(mut self, include: bool) -> Self {
    self.include_sources = include;
    self
  }

  /// A path prefix applied to every entry inside the archive.
  pub fn prefix(mut self, prefix: &str) -> Self {
    self.prefix = prefix.trim_matches('/').to_string();
    self
  }

  pub fn exclude_hook(mut self, hook: WalkHook<'a>) -> Self {
    self.exclude = Some(hook);
    self
  }

  pub fn whitelist_hook(mut self, hook: WalkHook<'a>) -> Self {
    self.whitelist = Some(hook);
    self
  }

  /// Writes the archive to `output` via a temp file so a failed run never
  /// leaves a partial archive behind.
  pub fn write_to(&self, output: &Path) -> Result<(), ArchiveError> {
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let create_error = |source: std::io::Error| ArchiveError::Create {
      path: output.display().to_string(),
      source,
    };

    let tmp = tempfile::Builder::new()
      .prefix(".cti-archive-")
      .tempfile_in(parent)
      .map_err(create_error)?;
    let output_handle = Handle::from_path(tmp.path()).ok();

    let file = tmp.reopen().map_err(create_error)?;
    let mut writer = match self.format {
      ArchiveFormat::Tgz => ArchiveWriter::tgz(file),
      ArchiveFormat::Zip => ArchiveWriter::zip(file),
    };

    self.write_index(&mut writer)?;
    self.write_serialized(&mut writer)?;
    if self.include_sources {
      self.write_sources(&mut writer, output_handle.as_ref())?;
    }
    self.write_assets(&mut writer)?;

    writer.finish()?;
    tmp.persist(output).map_err(|err| create_error(err.error))?;
    Ok(())
  }

  fn entry_path(&self, relative: &str) -> String {
    let normalized = relative.replace('\\', "/");
    if self.prefix.is_empty() {
      normalized
    } else {
      format!("{}/{normalized}", self.prefix)
    }
  }

  /// The cloned index with the metadata cache appended to `serialized[]`.
  fn write_index(&self, writer: &mut ArchiveWriter) -> Result<(), ArchiveError> {
    let mut index = self.package.index.clone();
    if !index.serialized.iter().any(|entry| entry == METADATA_CACHE_FILE) {
      index.serialized.push(METADATA_CACHE_FILE.to_string());
    }
    let body = serde_json::to_string_pretty(&index).map_err(ArchiveError::Encode)?;
    writer.add_bytes(&self.entry_path(INDEX_FILE), body.as_bytes())
  }

  fn write_serialized(&self, writer: &mut ArchiveWriter) -> Result<(), ArchiveError> {
    let mut files = self.package.index.serialized.clone();
    if !files.iter().any(|entry| entry == METADATA_CACHE_FILE) {
      files.push(METADATA_CACHE_FILE.to_string());
    }
    for relative in files {
      writer.add_file(&self.entry_path(&relative), &self.package.root().join(&relative))?;
    }
    Ok(())
  }

  fn write_sources(&self, writer: &mut ArchiveWriter, output: Option<&Handle>) -> Result<(), ArchiveError> {
    let root = self.package.root();
    let mut walker = walkdir::WalkDir::new(root).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
      let Ok(entry) = entry else { continue };
      let path = entry.path();
      if path == root {
        continue;
      }

      let relative = path.strip_prefix(root).unwrap_or(path);
      let relative_str = relative.to_string_lossy().replace('\\', "/");

      if let Some(whitelist) = &self.whitelist {
        match whitelist(relative) {
          WalkDecision::SkipDir => {
            if entry.file_type().is_dir() {
              walker.skip_current_dir();
            }
            continue;
          }
          WalkDecision::SkipFile => continue,
          WalkDecision::SkipChecks => {
            if entry.file_type().is_file() {
              writer.add_file(&self.entry_path(&relative_str), path)?;
            }
            continue;
          }
          WalkDecision::Continue => {}
        }
      }

      if entry.file_type().is_dir() {
        if is_excluded_dir(&relative_str) {
          walker.skip_current_dir();
        }
        continue;
      }

      if is_excluded_file(&relative_str) {
        continue;
      }
      if let Some(hook) = &self.exclude {
        match hook(relative) {
          WalkDecision::SkipFile | WalkDecision::SkipDir => continue,
          WalkDecision::Continue | WalkDecision::SkipChecks => {}
        }
      }

      // Never archive the archive itself.
      if let (Some(output), Ok(current)) = (output, Handle::from_path(path)) {
        if output == &current {
          continue;
        }
      }

      writer.add_file(&self.entry_path(&relative_str), path)?;
    }

    Ok(())
  }

  /// Asset files referenced from instance values through `cti.asset`
  /// annotations on the parent type.
  fn write_assets(&self, writer: &mut ArchiveWriter) -> Result<(), ArchiveError> {
    for instance in self.registry.instances() {
      let parent_key = instance.cti.parent().to_string();
      let Some(parent) = self.registry.get_type(&parent_key) else {
        continue;
      };

      for (path, annotations) in &parent.annotations {
        if annotations.asset != Some(true) {
          continue;
        }
        for value in path.lookup(&instance.values) {
          let Value::String(asset_path) = value else { continue };
          if asset_path.is_empty() {
            tracing::warn!(instance = %instance.cti, path = %path, "empty asset path, skipping");
            continue;
          }
          writer.add_file(&self.entry_path(asset_path), &self.package.root().join(asset_path))?;
        }
      }
    }
    Ok(())
  }
}

fn is_excluded_dir(relative: &str) -> bool {
  let name = relative.rsplit('/').next().unwrap_or(relative);
  relative == DEP_DIR || relative == RAMLX_DIR || name.starts_with('.')
}

fn is_excluded_file(relative: &str) -> bool {
  if relative == INDEX_FILE {
    return true;
  }
  relative.split('/').any(|component| component.starts_with('.'))
}

/// Extracts an archive into `dest`, refusing entries that escape it or
/// exceed [`MAX_ENTRY_SIZE`].
pub fn unpack(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<(), ArchiveError> {
  std::fs::create_dir_all(dest).map_err(|source| ArchiveError::Create {
    path: dest.display().to_string(),
    source,
  })?;

  match format {
    ArchiveFormat::Tgz => unpack_tgz(archive, dest),
    ArchiveFormat::Zip => unpack_zip(archive, dest),
  }
}

fn unpack_tgz(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let file = File::open(archive).map_err(|source| ArchiveError::Read {
    path: archive.display().to_string(),
    source,
  })?;
  let mut reader = tar::Archive::new(flate2::read::GzDecoder::new(file));

  let entries = reader.entries().map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
  for entry in entries {
    let mut entry = entry.map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
    let entry_path = entry
      .path()
      .map_err(|err| ArchiveError::Corrupt(err.to_string()))?
      .into_owned();
    let name = entry_path.to_string_lossy().to_string();

    if entry.size() > MAX_ENTRY_SIZE {
      return Err(ArchiveError::FileTooLarge { entry: name });
    }
    let target = safe_join(dest, &entry_path).ok_or(ArchiveError::PathEscape { entry: name.clone() })?;

    if entry.header().entry_type().is_dir() {
      std::fs::create_dir_all(&target).map_err(|source| ArchiveError::Create {
        path: target.display().to_string(),
        source,
      })?;
      continue;
    }
    write_entry(&target, &name, &mut entry)?;
  }
  Ok(())
}

fn unpack_zip(archive: &Path, dest: &Path) -> Result<(), ArchiveError> {
  let file = File::open(archive).map_err(|source| ArchiveError::Read {
    path: archive.display().to_string(),
    source,
  })?;
  let mut reader = zip::ZipArchive::new(file).map_err(|err| ArchiveError::Corrupt(err.to_string()))?;

  for i in 0..reader.len() {
    let mut entry = reader.by_index(i).map_err(|err| ArchiveError::Corrupt(err.to_string()))?;
    let name = entry.name().to_string();

    if entry.size() > MAX_ENTRY_SIZE {
      return Err(ArchiveError::FileTooLarge { entry: name });
    }
    let Some(relative) = entry.enclosed_name() else {
      return Err(ArchiveError::PathEscape { entry: name });
    };
    let target = dest.join(relative);

    if entry.is_dir() {
      std::fs::create_dir_all(&target).map_err(|source| ArchiveError::Create {
        path: target.display().to_string(),
        source,
      })?;
      continue;
    }
    write_entry(&target, &name, &mut entry)?;
  }
  Ok(())
}

fn write_entry(target: &Path, name: &str, reader: &mut impl Read) -> Result<(), ArchiveError> {
  if let Some(parent) = target.parent() {
    std::fs::create_dir_all(parent).map_err(|source| ArchiveError::Create {
      path: parent.display().to_string(),
      source,
    })?;
  }
  let mut file = File::create(target).map_err(|source| ArchiveError::Create {
    path: target.display().to_string(),
    source,
  })?;
  std::io::copy(&mut reader.take(MAX_ENTRY_SIZE + 1), &mut file).map_err(|source| ArchiveError::Write {
    entry: name.to_string(),
    source,
  })?;
  let written = file.metadata().map(|m| m.len()).unwrap_or(0);
  if written > MAX_ENTRY_SIZE {
    let _ = std::fs::remove_file(target);
    return Err(ArchiveError::FileTooLarge { entry: name.to_string() });
  }
  Ok(())
}

fn safe_join(dest: &Path, relative: &Path) -> Option<PathBuf> {
  let mut target = dest.to_path_buf();
  for component in relative.components() {
    match component {
      std::path::Component::Normal(part) => target.push(part),
      std::path::Component::CurDir => {}
      _ => return None,
    }
  }
  Some(target)
}
