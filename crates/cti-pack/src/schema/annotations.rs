use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Entity visibility across package boundaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AccessModifier {
  #[default]
  Public,
  Protected,
  Private,
}

/// `cti.cti` values: a single identifier or a list of aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CtiNames {
  One(String),
  Many(Vec<String>),
}

impl CtiNames {
  pub fn iter(&self) -> impl Iterator<Item = &str> {
    match self {
      Self::One(name) => std::slice::from_ref(name).iter().map(String::as_str),
      Self::Many(names) => names[..].iter().map(String::as_str),
    }
  }
}

/// `cti.reference` values: a blanket switch, one CTI pattern, or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceValue {
  Enabled(bool),
  Pattern(String),
  Patterns(Vec<String>),
}

impl ReferenceValue {
  /// The concrete patterns this reference constrains values to, if any.
  pub fn patterns(&self) -> &[String] {
    match self {
      Self::Enabled(_) => &[],
      Self::Pattern(pattern) => std::slice::from_ref(pattern),
      Self::Patterns(patterns) => patterns,
    }
  }

  pub fn is_blanket(&self) -> bool {
    matches!(self, Self::Enabled(true))
  }
}

/// `cti.schema` values: one referenced CTI, or a list where `null` entries
/// stand for the null schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaRefValue {
  One(String),
  Many(Vec<Option<String>>),
}

/// The `x-cti.*` annotation set attached to schema nodes and harvested
/// per-path onto entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
  #[serde(rename = "x-cti.cti", skip_serializing_if = "Option::is_none")]
  pub cti: Option<CtiNames>,

  #[serde(rename = "x-cti.id", skip_serializing_if = "Option::is_none")]
  pub id: Option<bool>,

  #[serde(rename = "x-cti.reference", skip_serializing_if = "Option::is_none")]
  pub reference: Option<ReferenceValue>,

  #[serde(rename = "x-cti.schema", skip_serializing_if = "Option::is_none")]
  pub schema: Option<SchemaRefValue>,

  #[serde(rename = "x-cti.access", skip_serializing_if = "Option::is_none")]
  pub access: Option<AccessModifier>,

  #[serde(rename = "x-cti.final", skip_serializing_if = "Option::is_none")]
  pub final_: Option<bool>,

  #[serde(rename = "x-cti.resilient", skip_serializing_if = "Option::is_none")]
  pub resilient: Option<bool>,

  #[serde(rename = "x-cti.asset", skip_serializing_if = "Option::is_none")]
  pub asset: Option<bool>,

  #[serde(rename = "x-cti.l10n", skip_serializing_if = "Option::is_none")]
  pub l10n: Option<bool>,

  #[serde(rename = "x-cti.overridable", skip_serializing_if = "Option::is_none")]
  pub overridable: Option<bool>,

  #[serde(rename = "x-cti.display_name", skip_serializing_if = "Option::is_none")]
  pub display_name: Option<bool>,

  #[serde(rename = "x-cti.description", skip_serializing_if = "Option::is_none")]
  pub description: Option<bool>,

  #[serde(rename = "x-cti.meta", skip_serializing_if = "Option::is_none")]
  pub meta: Option<String>,

  #[serde(rename = "x-cti.propertyNames", skip_serializing_if = "Option::is_none")]
  pub property_names: Option<Value>,
}

impl Annotations {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Overlays `other` onto `self`, keeping existing values where `other`
  /// has none. Used when an array container's propagating annotations move
  /// onto its item shape.
  pub fn merge_missing_from(&mut self, other: &Annotations) {
    macro_rules! fill {
      ($($field:ident),*) => {
        $(if self.$field.is_none() {
          self.$field = other.$field.clone();
        })*
      };
    }
    fill!(
      cti,
      id,
      reference,
      schema,
      access,
      final_,
      resilient,
      asset,
      l10n,
      overridable,
      display_name,
      description,
      meta,
      property_names
    );
  }
}
