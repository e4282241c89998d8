use cti_id::Identifier;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{AccessModifier, Annotations, GJsonPath, JsonSchema};

/// Where an entity came from: the original RAML fragment, the resolved
/// source path, and the line within it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMap {
  #[serde(skip_serializing_if = "String::is_empty")]
  pub original_path: String,
  #[serde(skip_serializing_if = "String::is_empty")]
  pub source_path: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub line: Option<usize>,
}

/// A CTI type: a schema plus optional traits, with harvested annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeEntity {
  pub cti: Identifier,

  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub final_: bool,

  #[serde(default)]
  pub access: AccessModifier,

  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub resilient: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  pub schema: JsonSchema,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub traits_schema: Option<JsonSchema>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub traits: Option<Value>,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub annotations: IndexMap<GJsonPath, Annotations>,

  #[serde(default, skip_serializing_if = "SourceMap::is_empty")]
  pub source_map: SourceMap,

  /// Resolved parent CTI, attached by the transformer's link stage.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<Identifier>,

  /// Cached inheritance-merged schema. Transformer-internal; reset before
  /// downstream consumers observe the registry.
  #[serde(skip)]
  pub merged: Option<JsonSchema>,
}

/// A CTI instance: a values document typed by the parent type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceEntity {
  pub cti: Identifier,

  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub final_: bool,

  #[serde(default)]
  pub access: AccessModifier,

  #[serde(default, skip_serializing_if = "std::ops::Not::not")]
  pub resilient: bool,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  pub values: Value,

  #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
  pub annotations: IndexMap<GJsonPath, Annotations>,

  #[serde(default, skip_serializing_if = "SourceMap::is_empty")]
  pub source_map: SourceMap,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<Identifier>,
}

impl SourceMap {
  pub fn is_empty(&self) -> bool {
    self.original_path.is_empty() && self.source_path.is_empty() && self.line.is_none()
  }
}

/// A registry entry. Types carry a schema; instances carry values. The
/// untagged wire form disambiguates on exactly that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
  Type(TypeEntity),
  Instance(InstanceEntity),
}

impl Entity {
  pub fn cti(&self) -> &Identifier {
    match self {
      Self::Type(t) => &t.cti,
      Self::Instance(i) => &i.cti,
    }
  }

  pub fn is_final(&self) -> bool {
    match self {
      Self::Type(t) => t.final_,
      Self::Instance(i) => i.final_,
    }
  }

  pub fn access(&self) -> AccessModifier {
    match self {
      Self::Type(t) => t.access,
      Self::Instance(i) => i.access,
    }
  }

  pub fn source_map(&self) -> &SourceMap {
    match self {
      Self::Type(t) => &t.source_map,
      Self::Instance(i) => &i.source_map,
    }
  }

  pub fn parent(&self) -> Option<&Identifier> {
    match self {
      Self::Type(t) => t.parent.as_ref(),
      Self::Instance(i) => i.parent.as_ref(),
    }
  }

  pub fn set_parent(&mut self, parent: Identifier) {
    match self {
      Self::Type(t) => t.parent = Some(parent),
      Self::Instance(i) => i.parent = Some(parent),
    }
  }

  pub fn annotations(&self) -> &IndexMap<GJsonPath, Annotations> {
    match self {
      Self::Type(t) => &t.annotations,
      Self::Instance(i) => &i.annotations,
    }
  }

  pub fn as_type(&self) -> Option<&TypeEntity> {
    match self {
      Self::Type(t) => Some(t),
      Self::Instance(_) => None,
    }
  }

  pub fn as_instance(&self) -> Option<&InstanceEntity> {
    match self {
      Self::Instance(i) => Some(i),
      Self::Type(_) => None,
    }
  }
}
