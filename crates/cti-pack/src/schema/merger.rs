//! Parent-to-child schema inheritance.
//!
//! `merge(source, target)` produces the schema a child effectively has
//! after inheriting from its parent: `source` is the parent, `target` the
//! child. The child always wins where both constrain the same key; parent
//! facets fill the gaps. `$ref` targets are opaque here; only the
//! transformer resolves references, and only for `cti.schema`.

use indexmap::IndexMap;

use super::{JsonSchema, SchemaKind};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
  #[error("incompatible types: cannot merge {src} into {target}")]
  IncompatibleTypes { src: SchemaKind, target: SchemaKind },

  #[error("no union member of the source schema is compatible with the target")]
  NoCompatibleUnionMember,
}

/// Merges a parent (`source`) schema into a child (`target`) schema.
pub fn merge(source: &JsonSchema, target: &JsonSchema) -> Result<JsonSchema, MergeError> {
  // The any-schema constrains nothing, and a reference target is opaque.
  if source.is_any() || target.reference.is_some() {
    return Ok(target.clone());
  }

  match (source.kind(), target.kind()) {
    (SchemaKind::Union, SchemaKind::Union) => merge_union_into_union(source, target),
    (SchemaKind::Union, _) => merge_union_into_concrete(source, target),
    (_, SchemaKind::Union) => merge_concrete_into_union(source, target),
    (source_kind, target_kind) if source_kind == target_kind => merge_concrete(source, target),
    (source_kind, target_kind) => Err(MergeError::IncompatibleTypes {
      src: source_kind,
      target: target_kind,
    }),
  }
}

fn merge_concrete(source: &JsonSchema, target: &JsonSchema) -> Result<JsonSchema, MergeError> {
  let mut merged = target.clone();

  copy_common(source, &mut merged);

  match source.kind() {
    SchemaKind::String => copy_string_facets(source, &mut merged),
    SchemaKind::Number | SchemaKind::Integer => copy_numeric_facets(source, &mut merged),
    SchemaKind::Array => merge_array(source, &mut merged)?,
    SchemaKind::Object => merge_object(source, &mut merged)?,
    // boolean and null carry no facets beyond the common keys.
    _ => {}
  }

  Ok(merged)
}

fn copy_common(source: &JsonSchema, merged: &mut JsonSchema) {
  if merged.title.is_none() {
    merged.title.clone_from(&source.title);
  }
  if merged.description.is_none() {
    merged.description.clone_from(&source.description);
  }
  if merged.enum_values.is_none() {
    merged.enum_values.clone_from(&source.enum_values);
  }
}

fn copy_string_facets(source: &JsonSchema, merged: &mut JsonSchema) {
  if merged.format.is_none() {
    merged.format.clone_from(&source.format);
  }
  if merged.pattern.is_none() {
    merged.pattern.clone_from(&source.pattern);
  }
  if merged.content_media_type.is_none() {
    merged.content_media_type.clone_from(&source.content_media_type);
  }
  if merged.content_encoding.is_none() {
    merged.content_encoding.clone_from(&source.content_encoding);
  }
  if merged.min_length.is_none() {
    merged.min_length = source.min_length;
  }
  if merged.max_length.is_none() {
    merged.max_length = source.max_length;
  }
}

fn copy_numeric_facets(source: &JsonSchema, merged: &mut JsonSchema) {
  if merged.minimum.is_none() {
    merged.minimum.clone_from(&source.minimum);
  }
  if merged.maximum.is_none() {
    merged.maximum.clone_from(&source.maximum);
  }
  if merged.exclusive_minimum.is_none() {
    merged.exclusive_minimum.clone_from(&source.exclusive_minimum);
  }
  if merged.exclusive_maximum.is_none() {
    merged.exclusive_maximum.clone_from(&source.exclusive_maximum);
  }
  if merged.multiple_of.is_none() {
    merged.multiple_of.clone_from(&source.multiple_of);
  }
}

fn merge_array(source: &JsonSchema, merged: &mut JsonSchema) -> Result<(), MergeError> {
  if merged.min_items.is_none() {
    merged.min_items = source.min_items;
  }
  if merged.max_items.is_none() {
    merged.max_items = source.max_items;
  }
  if merged.unique_items.is_none() {
    merged.unique_items = source.unique_items;
  }

  merged.items = match (&source.items, &merged.items) {
    (Some(source_items), Some(target_items)) => Some(Box::new(merge(source_items, target_items)?)),
    (Some(source_items), None) => Some(source_items.clone()),
    (None, target_items) => target_items.clone(),
  };

  Ok(())
}

fn merge_object(source: &JsonSchema, merged: &mut JsonSchema) -> Result<(), MergeError> {
  if merged.min_properties.is_none() {
    merged.min_properties = source.min_properties;
  }
  if merged.max_properties.is_none() {
    merged.max_properties = source.max_properties;
  }
  if merged.additional_properties.is_none() {
    merged.additional_properties.clone_from(&source.additional_properties);
  }

  // required is a set union, emitted sorted so output is deterministic.
  let mut required: Vec<String> = source.required.iter().chain(&merged.required).cloned().collect();
  required.sort();
  required.dedup();
  merged.required = required;

  merged.pattern_properties = merge_property_maps(&source.pattern_properties, &merged.pattern_properties)?;
  merged.properties = merge_property_maps(&source.properties, &merged.properties)?;

  Ok(())
}

/// Merges per-key, parent keys first: a key in both sides merges
/// recursively, a parent-only key is copied verbatim, child-only keys keep
/// their declaration order after the parent's.
fn merge_property_maps(
  source: &IndexMap<String, JsonSchema>,
  target: &IndexMap<String, JsonSchema>,
) -> Result<IndexMap<String, JsonSchema>, MergeError> {
  let mut merged = IndexMap::new();
  for (key, source_schema) in source {
    let value = match target.get(key) {
      Some(target_schema) => merge(source_schema, target_schema)?,
      None => source_schema.clone(),
    };
    merged.insert(key.clone(), value);
  }
  for (key, target_schema) in target {
    if !merged.contains_key(key) {
      merged.insert(key.clone(), target_schema.clone());
    }
  }
  Ok(merged)
}

/// Source is a union, target a concrete schema: each source member is
/// tried against a copy of the target; incompatible members are discarded.
fn merge_union_into_concrete(source: &JsonSchema, target: &JsonSchema) -> Result<JsonSchema, MergeError> {
  let mut survivors = Vec::new();
  for member in &source.any_of {
    match merge(member, target) {
      Ok(merged) => survivors.push(merged),
      Err(MergeError::IncompatibleTypes { .. }) => {}
      Err(other) => return Err(other),
    }
  }

  match survivors.len() {
    0 => Err(MergeError::NoCompatibleUnionMember),
    1 => Ok(survivors.into_iter().next().unwrap_or_default()),
    _ => Ok(union_of(target, survivors)),
  }
}

/// Target is a union, source concrete: the source folds into every member.
fn merge_concrete_into_union(source: &JsonSchema, target: &JsonSchema) -> Result<JsonSchema, MergeError> {
  let mut survivors = Vec::new();
  for member in &target.any_of {
    match merge(source, member) {
      Ok(merged) => survivors.push(merged),
      Err(MergeError::IncompatibleTypes { .. }) => {}
      Err(other) => return Err(other),
    }
  }

  if survivors.is_empty() {
    return Err(MergeError::NoCompatibleUnionMember);
  }
  Ok(union_of(target, survivors))
}

/// Both sides are unions: Cartesian filtering by compatibility. An empty
/// intersection is a hard error, not a silent drop.
fn merge_union_into_union(source: &JsonSchema, target: &JsonSchema) -> Result<JsonSchema, MergeError> {
  let mut survivors = Vec::new();
  for target_member in &target.any_of {
    for source_member in &source.any_of {
      match merge(source_member, target_member) {
        Ok(merged) => survivors.push(merged),
        Err(MergeError::IncompatibleTypes { .. } | MergeError::NoCompatibleUnionMember) => {}
      }
    }
  }

  if survivors.is_empty() {
    return Err(MergeError::NoCompatibleUnionMember);
  }
  Ok(union_of(target, survivors))
}

fn union_of(template: &JsonSchema, members: Vec<JsonSchema>) -> JsonSchema {
  let mut merged = template.clone();
  merged.any_of = members;
  merged
}
