use cti_id::{Identifier, match_pattern, match_refinement};
use regex::Regex;
use serde_json::Value;

use crate::{
  registry::{Entity, InstanceEntity, Registry, TypeEntity},
  schema::{AdditionalProperties, GJsonPath, JsonSchema, ReferenceValue, SchemaKind, merge},
};

/// One validation finding. Validation never stops at the first problem;
/// every finding carries the entity it was raised for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
  pub cti: String,
  pub message: String,
}

impl std::fmt::Display for ValidationIssue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}: {}", self.cti, self.message)
  }
}

/// Validates schema, values, and reference conformance over a transformed
/// registry.
pub struct Validator<'a> {
  registry: &'a Registry,
}

impl<'a> Validator<'a> {
  pub fn new(registry: &'a Registry) -> Self {
    Self { registry }
  }

  /// Checks every entity in collection order and returns all findings.
  pub fn validate(&self) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for entity in self.registry.entities() {
      match entity {
        Entity::Type(entity) => self.validate_type(entity, &mut issues),
        Entity::Instance(entity) => self.validate_instance(entity, &mut issues),
      }
    }
    issues
  }

  fn validate_type(&self, entity: &TypeEntity, issues: &mut Vec<ValidationIssue>) {
    let cti = entity.cti.to_string();
    let report = |issues: &mut Vec<ValidationIssue>, message: String| {
      issues.push(ValidationIssue { cti: cti.clone(), message });
    };

    for message in check_schema_syntax(&entity.schema) {
      report(issues, message);
    }
    if let Some(traits_schema) = &entity.traits_schema {
      for message in check_schema_syntax(traits_schema) {
        report(issues, format!("traits schema: {message}"));
      }
    }

    if entity.cti.is_root() {
      return;
    }

    let Some(parent) = self.lookup_parent(&entity.cti, issues, &cti) else {
      return;
    };

    // Structural inheritance: the child chain must match its parent.
    if let Err(reason) = match_pattern(&parent.cti, &entity.cti) {
      report(issues, format!("does not structurally match parent {}: {reason}", parent.cti));
    }

    if let Some(traits) = &entity.traits {
      self.validate_traits(&entity.cti, traits, issues);
    }

    self.check_reference_compatibility(entity, issues);
  }

  fn validate_instance(&self, entity: &InstanceEntity, issues: &mut Vec<ValidationIssue>) {
    let cti = entity.cti.to_string();
    let report = |issues: &mut Vec<ValidationIssue>, message: String| {
      issues.push(ValidationIssue { cti: cti.clone(), message });
    };

    let Some(parent) = self.lookup_parent(&entity.cti, issues, &cti) else {
      return;
    };

    if let Err(reason) = match_pattern(&parent.cti, &entity.cti) {
      report(issues, format!("does not structurally match parent {}: {reason}", parent.cti));
    }

    // Values validate against the parent's schema merged up to the root.
    match self.merged_parent_schema(parent) {
      Ok(schema) => {
        let mut value_issues = Vec::new();
        validate_value(&schema, &schema, &entity.values, &GJsonPath::root(), &mut value_issues);
        for message in value_issues {
          report(issues, message);
        }
      }
      Err(message) => report(issues, message),
    }

    // Inherited cti.reference annotations constrain values at their path.
    for (path, annotations) in &parent.annotations {
      let Some(reference) = &annotations.reference else {
        continue;
      };
      let patterns = reference.patterns();
      if patterns.is_empty() {
        continue;
      }
      self.check_reference_values(&entity.values, path, patterns, issues, &cti);
    }
  }

  fn lookup_parent<'b>(
    &'b self,
    cti: &Identifier,
    issues: &mut Vec<ValidationIssue>,
    key: &str,
  ) -> Option<&'b TypeEntity> {
    let parent_key = cti.parent().to_string();
    match self.registry.get(&parent_key) {
      Some(Entity::Type(parent)) => {
        if parent.final_ {
          issues.push(ValidationIssue {
            cti: key.to_string(),
            message: format!("parent {parent_key} is final and cannot be extended"),
          });
          return None;
        }
        Some(parent)
      }
      Some(Entity::Instance(_)) => {
        issues.push(ValidationIssue {
          cti: key.to_string(),
          message: format!("parent {parent_key} is an instance, not a type"),
        });
        None
      }
      None => {
        issues.push(ValidationIssue {
          cti: key.to_string(),
          message: format!("parent type {parent_key} not found"),
        });
        None
      }
    }
  }

  /// Folds the parent's schema up to the root through the merger.
  fn merged_parent_schema(&self, parent: &TypeEntity) -> Result<JsonSchema, String> {
    let mut chain = vec![parent];
    let mut current = parent;
    while let Some(parent_cti) = &current.parent {
      match self.registry.get_type(&parent_cti.to_string()) {
        Some(ancestor) => {
          chain.push(ancestor);
          current = ancestor;
        }
        None => return Err(format!("ancestor type {parent_cti} not found")),
      }
    }

    let mut merged = chain.pop().expect("chain starts non-empty").schema.clone();
    for entity in chain.into_iter().rev() {
      merged = merge(&merged, &entity.schema).map_err(|err| format!("merging schema of {}: {err}", entity.cti))?;
    }
    Ok(merged)
  }

  fn validate_traits(&self, cti: &Identifier, traits: &Value, issues: &mut Vec<ValidationIssue>) {
    let base_key = cti.base().to_string();
    let Some(base) = self.registry.get_type(&base_key) else {
      issues.push(ValidationIssue {
        cti: cti.to_string(),
        message: format!("base type {base_key} not found for traits validation"),
      });
      return;
    };
    let Some(traits_schema) = &base.traits_schema else {
      issues.push(ValidationIssue {
        cti: cti.to_string(),
        message: format!("base type {base_key} does not support traits"),
      });
      return;
    };

    let mut value_issues = Vec::new();
    validate_value(traits_schema, traits_schema, traits, &GJsonPath::root(), &mut value_issues);
    for message in value_issues {
      issues.push(ValidationIssue {
        cti: cti.to_string(),
        message: format!("traits: {message}"),
      });
    }
  }

  fn check_reference_values(
    &self,
    values: &Value,
    path: &GJsonPath,
    patterns: &[String],
    issues: &mut Vec<ValidationIssue>,
    cti: &str,
  ) {
    let parsed: Vec<Identifier> = patterns.iter().filter_map(|raw| raw.parse().ok()).collect();
    if parsed.is_empty() {
      return;
    }

    for target in path.lookup(values) {
      let elements: Vec<&Value> = match target {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
      };
      for element in elements {
        let Some(raw) = element.as_str() else {
          issues.push(ValidationIssue {
            cti: cti.to_string(),
            message: format!("reference at {path} must be a CTI string"),
          });
          continue;
        };
        match raw.parse::<Identifier>() {
          Ok(reference) => {
            if !parsed.iter().any(|pattern| match_pattern(pattern, &reference).is_ok()) {
              issues.push(ValidationIssue {
                cti: cti.to_string(),
                message: format!("reference {raw} at {path} does not match {}", patterns.join(" | ")),
              });
            }
          }
          Err(err) => issues.push(ValidationIssue {
            cti: cti.to_string(),
            message: format!("reference at {path} is not a valid CTI: {err}"),
          }),
        }
      }
    }
  }

  /// A redeclared `cti.reference` must refine the nearest inherited one.
  fn check_reference_compatibility(&self, entity: &TypeEntity, issues: &mut Vec<ValidationIssue>) {
    for (path, annotations) in &entity.annotations {
      let Some(own) = &annotations.reference else {
        continue;
      };
      let Some(inherited) = self.inherited_reference(entity, path) else {
        continue;
      };

      let inherited_patterns = inherited.patterns();
      if inherited_patterns.is_empty() {
        continue;
      }

      if own.is_blanket() {
        issues.push(ValidationIssue {
          cti: entity.cti.to_string(),
          message: format!(
            "reference at {path} cannot widen inherited constraint {} to true",
            inherited_patterns.join(" | ")
          ),
        });
        continue;
      }

      for own_pattern in own.patterns() {
        let Ok(own_id) = own_pattern.parse::<Identifier>() else {
          continue;
        };
        let refines = inherited_patterns
          .iter()
          .filter_map(|raw| raw.parse::<Identifier>().ok())
          .any(|outer| match_refinement(&outer, &own_id).is_ok());
        if !refines {
          issues.push(ValidationIssue {
            cti: entity.cti.to_string(),
            message: format!(
              "reference {own_pattern} at {path} does not refine inherited {}",
              inherited_patterns.join(" | ")
            ),
          });
        }
      }
    }
  }

  fn inherited_reference(&self, entity: &TypeEntity, path: &GJsonPath) -> Option<&ReferenceValue> {
    let mut current = entity.parent.as_ref()?;
    loop {
      let ancestor = self.registry.get_type(&current.to_string())?;
      if let Some(annotations) = ancestor.annotations.get(path)
        && let Some(reference) = &annotations.reference
      {
        return Some(reference);
      }
      current = ancestor.parent.as_ref()?;
    }
  }
}

/// Syntactic checks over a schema tree: known type names, compilable
/// patterns, resolvable local `$ref` pointers.
pub(crate) fn check_schema_syntax(schema: &JsonSchema) -> Vec<String> {
  let mut messages = Vec::new();
  check_syntax_node(schema, schema, &GJsonPath::root(), &mut messages);
  messages
}

fn check_syntax_node(root: &JsonSchema, node: &JsonSchema, path: &GJsonPath, messages: &mut Vec<String>) {
  const KNOWN_TYPES: [&str; 7] = ["object", "array", "string", "number", "integer", "boolean", "null"];

  if let Some(schema_type) = &node.schema_type
    && !KNOWN_TYPES.contains(&schema_type.as_str())
  {
    messages.push(format!("unknown type '{schema_type}' at {path}"));
  }

  if let Some(pattern) = &node.pattern
    && Regex::new(pattern).is_err()
  {
    messages.push(format!("invalid pattern '{pattern}' at {path}"));
  }
  for key in node.pattern_properties.keys() {
    if Regex::new(key).is_err() {
      messages.push(format!("invalid patternProperties key '{key}' at {path}"));
    }
  }

  if let Some(reference) = &node.reference
    && resolve_local_ref(root, reference).is_none()
  {
    messages.push(format!("unresolvable $ref '{reference}' at {path}"));
  }

  for (key, property) in &node.properties {
    check_syntax_node(root, property, &path.join(key), messages);
  }
  for property in node.pattern_properties.values() {
    check_syntax_node(root, property, path, messages);
  }
  if let Some(items) = &node.items {
    check_syntax_node(root, items, &path.item(), messages);
  }
  for member in &node.any_of {
    check_syntax_node(root, member, path, messages);
  }
  for (key, definition) in &node.definitions {
    check_syntax_node(root, definition, &path.join(key), messages);
  }
}

fn resolve_local_ref<'a>(root: &'a JsonSchema, reference: &str) -> Option<&'a JsonSchema> {
  if reference == "#" {
    return Some(root);
  }
  let key = reference.strip_prefix("#/definitions/")?;
  root.definitions.get(key)
}

/// Validates a value document against a schema node. `root` carries the
/// `definitions` table local `$ref` pointers resolve against.
pub(crate) fn validate_value(
  root: &JsonSchema,
  schema: &JsonSchema,
  value: &Value,
  path: &GJsonPath,
  issues: &mut Vec<String>,
) {
  if let Some(reference) = &schema.reference {
    match resolve_local_ref(root, reference) {
      Some(resolved) => validate_value(root, resolved, value, path, issues),
      None => issues.push(format!("unresolvable $ref '{reference}' at {path}")),
    }
    return;
  }

  if !schema.any_of.is_empty() {
    let matched = schema.any_of.iter().any(|member| {
      let mut probe = Vec::new();
      validate_value(root, member, value, path, &mut probe);
      probe.is_empty()
    });
    if !matched {
      issues.push(format!("value at {path} matches no anyOf member"));
    }
    return;
  }

  if let Some(enum_values) = &schema.enum_values
    && !enum_values.contains(value)
  {
    issues.push(format!("value at {path} is not one of the enum values"));
  }

  match schema.kind() {
    SchemaKind::Object => validate_object(root, schema, value, path, issues),
    SchemaKind::Array => validate_array(root, schema, value, path, issues),
    SchemaKind::String => validate_string(schema, value, path, issues),
    SchemaKind::Number | SchemaKind::Integer => validate_number(schema, value, path, issues),
    SchemaKind::Boolean => {
      if !value.is_boolean() {
        issues.push(type_error(path, "boolean", value));
      }
    }
    SchemaKind::Null => {
      if !value.is_null() {
        issues.push(type_error(path, "null", value));
      }
    }
    SchemaKind::Any | SchemaKind::Union | SchemaKind::Reference => {}
  }
}

fn validate_object(root: &JsonSchema, schema: &JsonSchema, value: &Value, path: &GJsonPath, issues: &mut Vec<String>) {
  let Value::Object(map) = value else {
    issues.push(type_error(path, "object", value));
    return;
  };

  for required in &schema.required {
    if !map.contains_key(required) {
      issues.push(format!("missing required property '{required}' at {path}"));
    }
  }

  if let Some(min) = schema.min_properties
    && (map.len() as u64) < min
  {
    issues.push(format!("object at {path} has fewer than {min} properties"));
  }
  if let Some(max) = schema.max_properties
    && (map.len() as u64) > max
  {
    issues.push(format!("object at {path} has more than {max} properties"));
  }

  let patterns: Vec<(Regex, &JsonSchema)> = schema
    .pattern_properties
    .iter()
    .filter_map(|(pattern, property)| Regex::new(pattern).ok().map(|regex| (regex, property)))
    .collect();

  for (key, entry) in map {
    let property_path = path.join(key);
    if let Some(property) = schema.properties.get(key) {
      validate_value(root, property, entry, &property_path, issues);
      continue;
    }

    let matched: Vec<_> = patterns.iter().filter(|(regex, _)| regex.is_match(key)).collect();
    if !matched.is_empty() {
      for (_, property) in matched {
        validate_value(root, property, entry, &property_path, issues);
      }
      continue;
    }

    match &schema.additional_properties {
      Some(AdditionalProperties::Allowed(false)) => {
        issues.push(format!("unexpected property '{key}' at {path}"));
      }
      Some(AdditionalProperties::Schema(extra)) => {
        validate_value(root, extra, entry, &property_path, issues);
      }
      _ => {}
    }
  }
}

fn validate_array(root: &JsonSchema, schema: &JsonSchema, value: &Value, path: &GJsonPath, issues: &mut Vec<String>) {
  let Value::Array(items) = value else {
    issues.push(type_error(path, "array", value));
    return;
  };

  if let Some(min) = schema.min_items
    && (items.len() as u64) < min
  {
    issues.push(format!("array at {path} has fewer than {min} items"));
  }
  if let Some(max) = schema.max_items
    && (items.len() as u64) > max
  {
    issues.push(format!("array at {path} has more than {max} items"));
  }
  if schema.unique_items == Some(true) {
    for (i, item) in items.iter().enumerate() {
      if items[..i].contains(item) {
        issues.push(format!("array at {path} has duplicate items"));
        break;
      }
    }
  }

  if let Some(item_schema) = &schema.items {
    let item_path = path.item();
    for item in items {
      validate_value(root, item_schema, item, &item_path, issues);
    }
  }
}

fn validate_string(schema: &JsonSchema, value: &Value, path: &GJsonPath, issues: &mut Vec<String>) {
  let Value::String(raw) = value else {
    issues.push(type_error(path, "string", value));
    return;
  };

  let length = raw.chars().count() as u64;
  if let Some(min) = schema.min_length
    && length < min
  {
    issues.push(format!("string at {path} is shorter than {min}"));
  }
  if let Some(max) = schema.max_length
    && length > max
  {
    issues.push(format!("string at {path} is longer than {max}"));
  }
  if let Some(pattern) = &schema.pattern
    && let Ok(regex) = Regex::new(pattern)
    && !regex.is_match(raw)
  {
    issues.push(format!("string at {path} does not match pattern '{pattern}'"));
  }
}

fn validate_number(schema: &JsonSchema, value: &Value, path: &GJsonPath, issues: &mut Vec<String>) {
  let Some(number) = value.as_f64() else {
    issues.push(type_error(path, "number", value));
    return;
  };
  if schema.kind() == SchemaKind::Integer && value.as_i64().is_none() && value.as_u64().is_none() {
    issues.push(type_error(path, "integer", value));
    return;
  }

  if let Some(minimum) = schema.minimum.as_ref().and_then(serde_json::Number::as_f64)
    && number < minimum
  {
    issues.push(format!("number at {path} is below minimum {minimum}"));
  }
  if let Some(maximum) = schema.maximum.as_ref().and_then(serde_json::Number::as_f64)
    && number > maximum
  {
    issues.push(format!("number at {path} is above maximum {maximum}"));
  }
  if let Some(minimum) = schema.exclusive_minimum.as_ref().and_then(serde_json::Number::as_f64)
    && number <= minimum
  {
    issues.push(format!("number at {path} must be above {minimum}"));
  }
  if let Some(maximum) = schema.exclusive_maximum.as_ref().and_then(serde_json::Number::as_f64)
    && number >= maximum
  {
    issues.push(format!("number at {path} must be below {maximum}"));
  }
  if let Some(step) = schema.multiple_of.as_ref().and_then(serde_json::Number::as_f64)
    && step > 0.0
    && (number / step).fract().abs() > f64::EPSILON
  {
    issues.push(format!("number at {path} is not a multiple of {step}"));
  }
}

fn type_error(path: &GJsonPath, expected: &str, value: &Value) -> String {
  let actual = match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  };
  format!("expected {expected} at {path}, got {actual}")
}
