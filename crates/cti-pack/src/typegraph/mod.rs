//! The type graph handed over by the RAML frontend.
//!
//! The frontend itself is outside this crate; the collector only sees this
//! shape-tree model. Shapes carry the raw `cti.*` annotation values in
//! `custom_domain_properties`, keyed exactly as they appear in the source
//! dialect.

mod graph;
mod producer;

use indexmap::IndexMap;
use serde_json::Value;

pub use graph::recursive_declarations;
pub use producer::{TypeGraphProducer, UnconfiguredFrontend};

/// RAML annotation names the collector reacts to.
pub mod annotation {
  pub const CTI: &str = "cti.cti";
  pub const ID: &str = "cti.id";
  pub const REFERENCE: &str = "cti.reference";
  pub const SCHEMA: &str = "cti.schema";
  pub const ACCESS: &str = "cti.access";
  pub const FINAL: &str = "cti.final";
  pub const RESILIENT: &str = "cti.resilient";
  pub const ASSET: &str = "cti.asset";
  pub const L10N: &str = "cti.l10n";
  pub const OVERRIDABLE: &str = "cti.overridable";
  pub const DISPLAY_NAME: &str = "cti.display_name";
  pub const DESCRIPTION: &str = "cti.description";
  pub const META: &str = "cti.meta";
  pub const PROPERTY_NAMES: &str = "cti.propertyNames";
  pub const TRAITS: &str = "cti.traits";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ShapeKind {
  #[default]
  Any,
  Object,
  Array,
  Union,
  String,
  Number,
  Integer,
  Boolean,
  Nil,
}

/// Source position of a shape inside its fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceLocation {
  pub fragment: String,
  pub line: Option<usize>,
}

/// Value facets carried over from the source dialect, converted as-is into
/// the JSON-Schema model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeFacets {
  pub enum_values: Vec<Value>,
  pub format: Option<String>,
  pub pattern: Option<String>,
  pub min_length: Option<u64>,
  pub max_length: Option<u64>,
  pub minimum: Option<serde_json::Number>,
  pub maximum: Option<serde_json::Number>,
  pub multiple_of: Option<serde_json::Number>,
  pub min_items: Option<u64>,
  pub max_items: Option<u64>,
  pub unique_items: Option<bool>,
  pub min_properties: Option<u64>,
  pub max_properties: Option<u64>,
  pub additional_properties: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyShape {
  pub shape: Shape,
  pub required: bool,
}

/// One node of the frontend's shape tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
  /// Declaration name when this shape is a named top-level type.
  pub name: Option<String>,
  pub kind: ShapeKind,
  pub display_name: Option<String>,
  pub description: Option<String>,
  /// A link to another named declaration instead of an inline body.
  pub reference: Option<String>,
  /// Named parent declarations this shape inherits from.
  pub inherits: Vec<String>,
  /// `cti.*` annotation values, insertion-ordered.
  pub custom_domain_properties: IndexMap<String, Value>,
  pub properties: IndexMap<String, PropertyShape>,
  pub pattern_properties: IndexMap<String, Shape>,
  pub items: Option<Box<Shape>>,
  pub any_of: Vec<Shape>,
  /// Secondary traits schema declared alongside the type, if any.
  pub traits_schema: Option<Box<Shape>>,
  /// Traits values the type carries for its base type's traits schema.
  pub traits: Option<Value>,
  pub facets: ShapeFacets,
  pub source: SourceLocation,
}

impl Shape {
  pub fn annotation(&self, name: &str) -> Option<&Value> {
    self.custom_domain_properties.get(name)
  }

  pub fn has_annotation(&self, name: &str) -> bool {
    self.custom_domain_properties.contains_key(name)
  }
}

/// A domain extension: an annotation applied at library level whose payload
/// declares instances of a CTI type.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainExtension {
  /// Name of the annotation type declaration that defines the extension.
  pub defined_by: String,
  pub values: Value,
  pub source: SourceLocation,
}

/// Everything the frontend produced for one library: named declarations in
/// declaration order, plus domain extensions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeGraph {
  pub declarations: IndexMap<String, Shape>,
  pub extensions: Vec<DomainExtension>,
}

impl TypeGraph {
  pub fn declaration(&self, name: &str) -> Option<&Shape> {
    self.declarations.get(name)
  }
}
