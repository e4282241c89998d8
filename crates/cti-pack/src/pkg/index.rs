use std::{io::Write, path::Path, sync::LazyLock};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The constant `type` tag every package index carries.
pub const PACKAGE_TYPE: &str = "cti-package";
/// Lock format version literal.
pub const LOCK_VERSION: &str = "v1";

pub const INDEX_FILE: &str = "index.json";
pub const LOCK_FILE: &str = "index-lock.json";

static PACKAGE_ID_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]{0,49}\.[a-z][a-z0-9_]{0,49}$").expect("static regex compiles"));

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
  #[error("invalid package id '{0}'")]
  InvalidPackageId(String),

  #[error("invalid index: {0}")]
  InvalidIndex(String),

  #[error("reading {path}")]
  Read {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("writing {path}")]
  Write {
    path: String,
    #[source]
    source: std::io::Error,
  },

  #[error("decoding {path}")]
  Decode {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

/// `index.json`: the package's declared surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
  #[serde(rename = "type")]
  pub package_type: String,

  pub package_id: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ramlx_version: Option<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub apis: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub entities: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub assets: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dictionaries: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub examples: Vec<String>,

  /// Declared dependencies: source -> version.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub depends: IndexMap<String, String>,

  /// Metadata cache files written by the compiler.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub serialized: Vec<String>,

  #[serde(flatten)]
  pub additional_properties: IndexMap<String, Value>,
}

impl Index {
  pub fn new(package_id: &str) -> Result<Self, IndexError> {
    validate_package_id(package_id)?;
    Ok(Self {
      package_type: PACKAGE_TYPE.to_string(),
      package_id: package_id.to_string(),
      ramlx_version: Some("1.0".to_string()),
      apis: Vec::new(),
      entities: Vec::new(),
      assets: Vec::new(),
      dictionaries: Vec::new(),
      examples: Vec::new(),
      depends: IndexMap::new(),
      serialized: Vec::new(),
      additional_properties: IndexMap::new(),
    })
  }

  pub fn load(path: &Path) -> Result<Self, IndexError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IndexError::Read {
      path: path.display().to_string(),
      source,
    })?;
    let index: Self = serde_json::from_str(&raw).map_err(|source| IndexError::Decode {
      path: path.display().to_string(),
      source,
    })?;
    index.validate()?;
    Ok(index)
  }

  pub fn save(&self, path: &Path) -> Result<(), IndexError> {
    self.validate()?;
    write_json_atomic(path, self)
  }

  /// Structural checks: id shape, `.raml` suffixes on declared documents.
  pub fn validate(&self) -> Result<(), IndexError> {
    validate_package_id(&self.package_id)?;
    for (field, paths) in [
      ("entities", &self.entities),
      ("apis", &self.apis),
      ("examples", &self.examples),
    ] {
      for path in paths {
        if !path.ends_with(".raml") {
          return Err(IndexError::InvalidIndex(format!(
            "{field} entry '{path}' must have a .raml extension"
          )));
        }
      }
    }
    Ok(())
  }
}

/// One resolved dependency inside `index-lock.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyInfo {
  pub package_id: String,
  pub version: String,
  pub integrity: String,
  pub source: String,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub depends: Vec<String>,
}

/// `index-lock.json`: resolved versions with integrity hashes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexLock {
  pub version: String,

  /// Reverse lookup: packageId -> source.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub depends: IndexMap<String, String>,

  /// source -> resolved info.
  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub depends_info: IndexMap<String, DependencyInfo>,
}

impl Default for IndexLock {
  fn default() -> Self {
    Self {
      version: LOCK_VERSION.to_string(),
      depends: IndexMap::new(),
      depends_info: IndexMap::new(),
    }
  }
}

impl IndexLock {
  pub fn load(path: &Path) -> Result<Self, IndexError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IndexError::Read {
      path: path.display().to_string(),
      source,
    })?;
    serde_json::from_str(&raw).map_err(|source| IndexError::Decode {
      path: path.display().to_string(),
      source,
    })
  }

  pub fn save(&self, path: &Path) -> Result<(), IndexError> {
    write_json_atomic(path, self)
  }
}

/// A `<source>@<version>` dependency argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
  pub source: String,
  pub version: String,
}

impl DependencySpec {
  pub fn parse(raw: &str) -> Result<Self, IndexError> {
    let Some((source, version)) = raw.rsplit_once('@') else {
      return Err(IndexError::InvalidIndex(format!(
        "dependency '{raw}' must have the form <source>@<version>"
      )));
    };
    if source.is_empty() || version.is_empty() {
      return Err(IndexError::InvalidIndex(format!(
        "dependency '{raw}' must have the form <source>@<version>"
      )));
    }
    Ok(Self {
      source: source.to_string(),
      version: version.to_string(),
    })
  }

  /// Parses a batch of specs, rejecting duplicate sources.
  pub fn parse_all(raw: &[String]) -> Result<Vec<Self>, IndexError> {
    let mut specs: Vec<Self> = Vec::new();
    for entry in raw {
      let spec = Self::parse(entry)?;
      if specs.iter().any(|existing| existing.source == spec.source) {
        return Err(IndexError::InvalidIndex(format!("duplicate dependency '{}'", spec.source)));
      }
      specs.push(spec);
    }
    Ok(specs)
  }
}

pub fn validate_package_id(package_id: &str) -> Result<(), IndexError> {
  if PACKAGE_ID_RE.is_match(package_id) {
    Ok(())
  } else {
    Err(IndexError::InvalidPackageId(package_id.to_string()))
  }
}

/// Serializes `value` as two-space-indented JSON next to `path`, then moves
/// it into place so a failed write never leaves a torn file behind.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), IndexError> {
  let parent = path.parent().unwrap_or_else(|| Path::new("."));
  let to_write_error = |source: std::io::Error| IndexError::Write {
    path: path.display().to_string(),
    source,
  };

  let mut file = tempfile::NamedTempFile::new_in(parent).map_err(to_write_error)?;
  let body = serde_json::to_string_pretty(value).map_err(|source| IndexError::Decode {
    path: path.display().to_string(),
    source,
  })?;
  file.write_all(body.as_bytes()).map_err(to_write_error)?;
  file.write_all(b"\n").map_err(to_write_error)?;
  file.persist(path).map_err(|err| to_write_error(err.error))?;
  Ok(())
}
