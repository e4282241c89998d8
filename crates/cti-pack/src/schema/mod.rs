//! Typed JSON-Schema subset carried by CTI entities.
//!
//! Property maps are insertion-order preserving ([`IndexMap`]); the
//! annotated `x-cti.*` keys are flattened into every node so the model
//! round-trips the serialized metadata cache byte-for-byte.

mod annotations;
mod merger;
mod path;
mod refs;

use cti_id::AttributeSelector;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

pub use annotations::{AccessModifier, Annotations, CtiNames, ReferenceValue, SchemaRefValue};
pub use merger::{MergeError, merge};
pub use path::GJsonPath;
pub use refs::{escape_definition_key, fix_self_references};

/// Derived structural kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SchemaKind {
  Any,
  Object,
  Array,
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Union,
  Reference,
}

/// `additionalProperties`: either a blanket switch or a constraining schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
  Allowed(bool),
  Schema(Box<JsonSchema>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSchema {
  #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
  pub reference: Option<String>,

  #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
  pub schema_type: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,

  #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
  pub enum_values: Option<Vec<Value>>,

  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub properties: IndexMap<String, JsonSchema>,

  #[serde(rename = "patternProperties", skip_serializing_if = "IndexMap::is_empty")]
  pub pattern_properties: IndexMap<String, JsonSchema>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub items: Option<Box<JsonSchema>>,

  #[serde(rename = "anyOf", skip_serializing_if = "Vec::is_empty")]
  pub any_of: Vec<JsonSchema>,

  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub required: Vec<String>,

  #[serde(skip_serializing_if = "IndexMap::is_empty")]
  pub definitions: IndexMap<String, JsonSchema>,

  // String facets.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub format: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub pattern: Option<String>,
  #[serde(rename = "contentMediaType", skip_serializing_if = "Option::is_none")]
  pub content_media_type: Option<String>,
  #[serde(rename = "contentEncoding", skip_serializing_if = "Option::is_none")]
  pub content_encoding: Option<String>,
  #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
  pub min_length: Option<u64>,
  #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
  pub max_length: Option<u64>,

  // Numeric facets.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub minimum: Option<Number>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub maximum: Option<Number>,
  #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
  pub exclusive_minimum: Option<Number>,
  #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
  pub exclusive_maximum: Option<Number>,
  #[serde(rename = "multipleOf", skip_serializing_if = "Option::is_none")]
  pub multiple_of: Option<Number>,

  // Array facets.
  #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
  pub min_items: Option<u64>,
  #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
  pub max_items: Option<u64>,
  #[serde(rename = "uniqueItems", skip_serializing_if = "Option::is_none")]
  pub unique_items: Option<bool>,

  // Object facets.
  #[serde(rename = "minProperties", skip_serializing_if = "Option::is_none")]
  pub min_properties: Option<u64>,
  #[serde(rename = "maxProperties", skip_serializing_if = "Option::is_none")]
  pub max_properties: Option<u64>,
  #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
  pub additional_properties: Option<AdditionalProperties>,

  #[serde(flatten)]
  pub annotations: Annotations,
}

impl JsonSchema {
  /// A schema constraining nothing.
  pub fn any() -> Self {
    Self::default()
  }

  pub fn of_type(schema_type: &str) -> Self {
    Self {
      schema_type: Some(schema_type.to_string()),
      ..Self::default()
    }
  }

  /// The structural kind this node constrains. `$ref` and `anyOf` win over
  /// a `type` key; a node with neither constrains nothing.
  pub fn kind(&self) -> SchemaKind {
    if self.reference.is_some() {
      return SchemaKind::Reference;
    }
    if !self.any_of.is_empty() {
      return SchemaKind::Union;
    }
    match self.schema_type.as_deref() {
      Some("object") => SchemaKind::Object,
      Some("array") => SchemaKind::Array,
      Some("string") => SchemaKind::String,
      Some("number") => SchemaKind::Number,
      Some("integer") => SchemaKind::Integer,
      Some("boolean") => SchemaKind::Boolean,
      Some("null") => SchemaKind::Null,
      _ => SchemaKind::Any,
    }
  }

  pub fn is_any(&self) -> bool {
    self.kind() == SchemaKind::Any
  }

  /// Walks the schema along a dotted annotation path. `#` descends into
  /// array items, any other token into `properties`.
  pub fn walk_path(&self, path: &GJsonPath) -> Option<&JsonSchema> {
    let mut node = self;
    for token in path.tokens() {
      node = if token == "#" {
        node.items.as_deref()?
      } else {
        node.properties.get(token)?
      };
    }
    Some(node)
  }

  /// Descends `properties` one attribute-selector token at a time,
  /// reporting the token that failed.
  pub fn walk_selector(&self, selector: &AttributeSelector) -> Result<&JsonSchema, SelectorWalkError> {
    let mut node = self;
    for token in selector.tokens() {
      if node.kind() != SchemaKind::Object {
        return Err(SelectorWalkError::NotAnObject {
          token: token.clone(),
          kind: node.kind(),
        });
      }
      node = node
        .properties
        .get(token)
        .ok_or_else(|| SelectorWalkError::KeyNotFound { token: token.clone() })?;
    }
    Ok(node)
  }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorWalkError {
  #[error("key \"{token}\" not found")]
  KeyNotFound { token: String },

  #[error("cannot descend into {kind}")]
  NotAnObject { token: String, kind: SchemaKind },
}

#[cfg(test)]
mod tests;
