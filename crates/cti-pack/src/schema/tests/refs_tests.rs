use crate::schema::{JsonSchema, escape_definition_key, fix_self_references};

fn ref_schema(target: &str) -> JsonSchema {
  JsonSchema {
    reference: Some(target.to_string()),
    ..JsonSchema::default()
  }
}

#[test]
fn test_top_level_ref_rewritten() {
  let mut schema = ref_schema("#/definitions/OldRef");
  fix_self_references(&mut schema, "#/definitions/NewRef", &["#/definitions/OldRef".to_string()]);
  assert_eq!(schema.reference.as_deref(), Some("#/definitions/NewRef"));
}

#[test]
fn test_unlisted_ref_untouched() {
  let mut schema = ref_schema("#/definitions/Other");
  fix_self_references(&mut schema, "#/definitions/NewRef", &["#/definitions/OldRef".to_string()]);
  assert_eq!(schema.reference.as_deref(), Some("#/definitions/Other"));
}

#[test]
fn test_nested_refs_rewritten() {
  let mut schema = JsonSchema::of_type("object");
  schema.properties.insert("direct".to_string(), ref_schema("#/definitions/OldRef"));
  schema.properties.insert(
    "list".to_string(),
    JsonSchema {
      items: Some(Box::new(ref_schema("#/definitions/OldRef"))),
      ..JsonSchema::of_type("array")
    },
  );
  schema.any_of = vec![ref_schema("#/definitions/OldRef")];

  fix_self_references(&mut schema, "#/definitions/NewRef", &["#/definitions/OldRef".to_string()]);

  assert_eq!(schema.properties["direct"].reference.as_deref(), Some("#/definitions/NewRef"));
  let items = schema.properties["list"].items.as_ref().expect("items survive");
  assert_eq!(items.reference.as_deref(), Some("#/definitions/NewRef"));
  assert_eq!(schema.any_of[0].reference.as_deref(), Some("#/definitions/NewRef"));
}

#[test]
fn test_multiple_old_refs() {
  let mut schema = JsonSchema::of_type("object");
  schema.properties.insert("a".to_string(), ref_schema("#/definitions/A"));
  schema.properties.insert("b".to_string(), ref_schema("#/definitions/B"));

  fix_self_references(
    &mut schema,
    "#",
    &["#/definitions/A".to_string(), "#/definitions/B".to_string()],
  );

  assert_eq!(schema.properties["a"].reference.as_deref(), Some("#"));
  assert_eq!(schema.properties["b"].reference.as_deref(), Some("#"));
}

#[test]
fn test_escape_definition_key() {
  assert_eq!(
    escape_definition_key("cti.a.p.message.v1.0~a.p.email.v1.0"),
    "cti.a.p.message.v1.0~0a.p.email.v1.0"
  );
  assert_eq!(escape_definition_key("plain"), "plain");
}
