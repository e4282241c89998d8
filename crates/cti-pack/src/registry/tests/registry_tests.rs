use serde_json::json;

use crate::{
  registry::{Entity, InstanceEntity, Registry, RegistryError, SourceMap, TypeEntity},
  schema::JsonSchema,
};

pub(crate) fn type_entity(cti: &str) -> TypeEntity {
  TypeEntity {
    cti: cti.parse().expect("test cti should parse"),
    final_: false,
    access: Default::default(),
    resilient: false,
    display_name: None,
    description: None,
    schema: JsonSchema::of_type("object"),
    traits_schema: None,
    traits: None,
    annotations: Default::default(),
    source_map: SourceMap::default(),
    parent: None,
    merged: None,
  }
}

pub(crate) fn instance_entity(cti: &str, values: serde_json::Value) -> InstanceEntity {
  InstanceEntity {
    cti: cti.parse().expect("test cti should parse"),
    final_: true,
    access: Default::default(),
    resilient: false,
    display_name: None,
    description: None,
    values,
    annotations: Default::default(),
    source_map: SourceMap::default(),
    parent: None,
  }
}

#[test]
fn test_add_and_lookup() {
  let mut registry = Registry::new();
  registry
    .add(Entity::Type(type_entity("cti.a.p.message.v1.0")))
    .expect("first add succeeds");

  assert!(registry.contains("cti.a.p.message.v1.0"));
  assert!(registry.get_type("cti.a.p.message.v1.0").is_some());
  assert!(registry.get_instance("cti.a.p.message.v1.0").is_none());
  assert_eq!(registry.len(), 1);
}

#[test]
fn test_duplicate_cti_rejected() {
  let mut registry = Registry::new();
  registry
    .add(Entity::Type(type_entity("cti.x.y.unique_entity.v1.0")))
    .expect("first add succeeds");

  let err = registry
    .add(Entity::Type(type_entity("cti.x.y.unique_entity.v1.0")))
    .unwrap_err();
  assert_eq!(err.to_string(), "duplicate cti.cti: cti.x.y.unique_entity.v1.0");
}

#[test]
fn test_duplicate_across_kinds_rejected() {
  let mut registry = Registry::new();
  registry
    .add(Entity::Type(type_entity("cti.a.p.message.v1.0")))
    .expect("type add succeeds");

  let err = registry
    .add(Entity::Instance(instance_entity("cti.a.p.message.v1.0", json!({}))))
    .unwrap_err();
  assert!(matches!(err, RegistryError::DuplicateCti(_)));
}

#[test]
fn test_insertion_order_preserved() {
  let mut registry = Registry::new();
  for cti in ["cti.a.p.zulu.v1.0", "cti.a.p.alpha.v1.0", "cti.a.p.mike.v1.0"] {
    registry.add(Entity::Type(type_entity(cti))).expect("adds succeed");
  }

  let keys: Vec<_> = registry.keys().collect();
  assert_eq!(keys, ["cti.a.p.zulu.v1.0", "cti.a.p.alpha.v1.0", "cti.a.p.mike.v1.0"]);
}

#[test]
fn test_by_fragment_view() {
  let mut registry = Registry::new();
  let mut first = type_entity("cti.a.p.message.v1.0");
  first.source_map.original_path = "types/message.raml".to_string();
  let mut second = type_entity("cti.a.p.event.v1.0");
  second.source_map.original_path = "types/message.raml".to_string();
  let mut third = type_entity("cti.a.p.other.v1.0");
  third.source_map.original_path = "types/other.raml".to_string();

  for entity in [first, second, third] {
    registry.add(Entity::Type(entity)).expect("adds succeed");
  }

  let from_message = registry.by_fragment("types/message.raml");
  assert_eq!(from_message.len(), 2);
  assert!(registry.by_fragment("types/unknown.raml").is_empty());
}

#[test]
fn test_merged_with_combines_and_detects_collisions() {
  let mut ours = Registry::new();
  ours.add(Entity::Type(type_entity("cti.a.p.message.v1.0"))).expect("add");

  let mut deps = Registry::new();
  deps.add(Entity::Type(type_entity("cti.b.q.event.v1.0"))).expect("add");

  let combined = ours.merged_with(&deps).expect("no collision");
  assert_eq!(combined.len(), 2);

  let mut colliding = Registry::new();
  colliding
    .add(Entity::Type(type_entity("cti.a.p.message.v1.0")))
    .expect("add");
  assert!(ours.merged_with(&colliding).is_err());
}

#[test]
fn test_serialized_round_trip() {
  let mut registry = Registry::new();
  registry
    .add(Entity::Type(type_entity("cti.a.p.message.v1.0")))
    .expect("add type");
  registry
    .add(Entity::Instance(instance_entity(
      "cti.a.p.message.v1.0~a.p._.v1.0",
      json!({"id": "cti.a.p.message.v1.0~a.p._.v1.0", "subject": "hello"}),
    )))
    .expect("add instance");

  let raw = serde_json::to_string(&registry.to_entities()).expect("serializes");
  let entities: Vec<Entity> = serde_json::from_str(&raw).expect("deserializes");
  let rebuilt = Registry::from_entities(entities).expect("rebuilds");

  assert_eq!(rebuilt.len(), 2);
  assert!(rebuilt.get_type("cti.a.p.message.v1.0").is_some());
  let instance = rebuilt
    .get_instance("cti.a.p.message.v1.0~a.p._.v1.0")
    .expect("instance survives");
  assert_eq!(instance.values["subject"], json!("hello"));
}
