use super::JsonSchema;

/// Escapes a CTI for use as a `definitions` key referenced by JSON
/// Pointer: `~` becomes `~0`, `/` becomes `~1`.
pub fn escape_definition_key(cti: &str) -> String {
  cti.replace('~', "~0").replace('/', "~1")
}

/// Rewrites every `$ref` listed in `old_refs` to `new_ref`, descending
/// into `items`, `properties`, and `anyOf`.
pub fn fix_self_references(schema: &mut JsonSchema, new_ref: &str, old_refs: &[String]) {
  if let Some(reference) = &schema.reference
    && old_refs.iter().any(|old| old == reference)
  {
    schema.reference = Some(new_ref.to_string());
  }

  if let Some(items) = &mut schema.items {
    fix_self_references(items, new_ref, old_refs);
  }
  for property in schema.properties.values_mut() {
    fix_self_references(property, new_ref, old_refs);
  }
  for member in &mut schema.any_of {
    fix_self_references(member, new_ref, old_refs);
  }
}
