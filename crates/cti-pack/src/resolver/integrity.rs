use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use super::storage::Origin;

#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
  #[error("file name '{0}' contains a newline")]
  NewlineInFileName(String),

  #[error("hashing {path}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
}

/// Hashes a directory tree: one `"%x  %s\n"` line per file (lowercase hex
/// XXH3 of the content, two spaces, forward-slash relative path), sorted
/// by path, XXH3 over the concatenation, base64, `xxh3:` prefix.
pub fn directory_hash(root: &Path) -> Result<String, IntegrityError> {
  let mut lines = Vec::new();

  for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok) {
    if !entry.file_type().is_file() {
      continue;
    }
    let relative = entry
      .path()
      .strip_prefix(root)
      .unwrap_or(entry.path())
      .components()
      .map(|c| c.as_os_str().to_string_lossy())
      .collect::<Vec<_>>()
      .join("/");
    if relative.contains('\n') {
      return Err(IntegrityError::NewlineInFileName(relative));
    }

    let content = std::fs::read(entry.path()).map_err(|source| IntegrityError::Io {
      path: entry.path().display().to_string(),
      source,
    })?;
    lines.push(format!("{:x}  {relative}\n", xxh3_64(&content)));
  }

  let body: String = lines.into_iter().sorted().collect();
  let digest = xxh3_64(body.as_bytes());
  Ok(format!("xxh3:{}", BASE64.encode(digest.to_be_bytes())))
}

/// `<cache>/.cache/source/<name>/@v/<version>.info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
  #[serde(rename = "Version")]
  pub version: String,
  #[serde(rename = "Time")]
  pub time: String,
  #[serde(rename = "Origin")]
  pub origin: Origin,
}

/// `<cache>/.cache/package/<id>/@v/<version>.info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
  #[serde(rename = "Source")]
  pub source: String,
  #[serde(rename = "Version")]
  pub version: String,
  #[serde(rename = "Hash")]
  pub hash: String,
}
