use serde_json::json;

use super::common::{
  annotated, cti_type, graph, instances_declaration, instances_extension, object_shape, sample_entity_graph,
  sample_instance_values, string_shape,
};
use crate::{
  compiler::{Validator, compile},
  registry::Registry,
  typegraph::{Shape, ShapeKind, TypeGraph, annotation},
};

fn compiled(type_graph: &TypeGraph) -> Registry {
  compile(type_graph).expect("compile succeeds").0
}

#[test]
fn test_valid_instances_produce_no_issues() {
  let mut type_graph = sample_entity_graph();
  type_graph.extensions.push(instances_extension(
    "SampleEntityInstances",
    sample_instance_values(&["cti.x.y.sample_entity.v1.0~x.y.first.v1.0"]),
  ));

  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();
  assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn test_instance_values_validated_against_merged_schema() {
  let mut type_graph = sample_entity_graph();
  type_graph.extensions.push(instances_extension(
    "SampleEntityInstances",
    json!([{"id": "cti.x.y.sample_entity.v1.0~x.y.first.v1.0", "name": 42}]),
  ));

  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();
  assert_eq!(issues.len(), 1);
  assert!(issues[0].message.contains("expected string at .name"), "{}", issues[0].message);
}

#[test]
fn test_reference_annotation_checked_against_values() {
  let reference_property = annotated(string_shape(), annotation::REFERENCE, json!("cti.a.p.message.v1.0"));
  let id_property = annotated(string_shape(), annotation::ID, json!(true));
  let entity = object_shape(&[("id", id_property, true), ("target", reference_property, false)]);
  let (entity_name, entity_shape) = cti_type("Holder", "cti.a.p.holder.v1.0", entity);
  let (container_name, container_shape) = instances_declaration("HolderInstances", "Holder");
  let (message_name, message_shape) = cti_type("Message", "cti.a.p.message.v1.0", object_shape(&[]));

  let mut type_graph = graph(vec![
    (message_name, message_shape),
    (entity_name, entity_shape),
    (container_name, container_shape),
  ]);
  type_graph.extensions.push(instances_extension(
    "HolderInstances",
    json!([
      {
        "id": "cti.a.p.holder.v1.0~a.p.good.v1.0",
        "target": "cti.a.p.message.v1.0~a.p.welcome.v1.0"
      },
      {
        "id": "cti.a.p.holder.v1.0~a.p.bad.v1.0",
        "target": "cti.b.q.other.v1.0"
      }
    ]),
  ));

  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();

  assert_eq!(issues.len(), 1);
  assert_eq!(issues[0].cti, "cti.a.p.holder.v1.0~a.p.bad.v1.0");
  assert!(issues[0].message.contains("does not match"), "{}", issues[0].message);
}

#[test]
fn test_traits_validated_against_base_traits_schema() {
  let mut base = object_shape(&[]);
  base.traits_schema = Some(Box::new(object_shape(&[("priority", scalar_integer(), true)])));
  let (base_name, base_shape) = cti_type("Message", "cti.a.p.message.v1.0", base);

  let mut child = object_shape(&[]);
  child.traits = Some(json!({"priority": "high"}));
  let (child_name, child_shape) = cti_type("Email", "cti.a.p.message.v1.0~a.p.email.v1.0", child);

  let type_graph = graph(vec![(base_name, base_shape), (child_name, child_shape)]);
  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();

  assert_eq!(issues.len(), 1);
  assert!(issues[0].message.starts_with("traits:"), "{}", issues[0].message);
}

#[test]
fn test_traits_without_base_support() {
  let (base_name, base_shape) = cti_type("Message", "cti.a.p.message.v1.0", object_shape(&[]));

  let mut child = object_shape(&[]);
  child.traits = Some(json!({"priority": 1}));
  let (child_name, child_shape) = cti_type("Email", "cti.a.p.message.v1.0~a.p.email.v1.0", child);

  let type_graph = graph(vec![(base_name, base_shape), (child_name, child_shape)]);
  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();

  assert_eq!(issues.len(), 1);
  assert!(issues[0].message.contains("does not support traits"), "{}", issues[0].message);
}

#[test]
fn test_reference_widening_rejected() {
  let parent_ref = annotated(string_shape(), annotation::REFERENCE, json!("cti.a.p.message.v1.0"));
  let (parent_name, parent_shape) = cti_type(
    "Holder",
    "cti.a.p.holder.v1.0",
    object_shape(&[("target", parent_ref, false)]),
  );

  let child_ref = annotated(string_shape(), annotation::REFERENCE, json!(true));
  let (child_name, child_shape) = cti_type(
    "WideHolder",
    "cti.a.p.holder.v1.0~a.p.wide.v1.0",
    object_shape(&[("target", child_ref, false)]),
  );
  let (message_name, message_shape) = cti_type("Message", "cti.a.p.message.v1.0", object_shape(&[]));

  let type_graph = graph(vec![
    (message_name, message_shape),
    (parent_name, parent_shape),
    (child_name, child_shape),
  ]);
  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();

  assert_eq!(issues.len(), 1);
  assert!(issues[0].message.contains("cannot widen"), "{}", issues[0].message);
}

#[test]
fn test_reference_refinement_accepted() {
  let parent_ref = annotated(string_shape(), annotation::REFERENCE, json!("cti.a.p.message.v1.*"));
  let (parent_name, parent_shape) = cti_type(
    "Holder",
    "cti.a.p.holder.v1.0",
    object_shape(&[("target", parent_ref, false)]),
  );

  let child_ref = annotated(string_shape(), annotation::REFERENCE, json!("cti.a.p.message.v1.3"));
  let (child_name, child_shape) = cti_type(
    "NarrowHolder",
    "cti.a.p.holder.v1.0~a.p.narrow.v1.0",
    object_shape(&[("target", child_ref, false)]),
  );
  let (message_name, message_shape) = cti_type("Message", "cti.a.p.message.v1.0", object_shape(&[]));

  let type_graph = graph(vec![
    (message_name, message_shape),
    (parent_name, parent_shape),
    (child_name, child_shape),
  ]);
  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();
  assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn test_validation_collects_multiple_issues() {
  let mut type_graph = sample_entity_graph();
  type_graph.extensions.push(instances_extension(
    "SampleEntityInstances",
    json!([
      {"id": "cti.x.y.sample_entity.v1.0~x.y.first.v1.0", "name": 42},
      {"id": "cti.x.y.sample_entity.v1.0~x.y.second.v1.0", "name": []}
    ]),
  ));

  let registry = compiled(&type_graph);
  let issues = Validator::new(&registry).validate();
  assert_eq!(issues.len(), 2, "every failing instance is reported: {issues:?}");
}

#[test]
fn test_final_parent_detected_on_prebuilt_registry() {
  let type_graph = graph(vec![
    cti_type(
      "Message",
      "cti.a.p.message.v1.0",
      annotated(object_shape(&[]), annotation::FINAL, json!(true)),
    ),
    cti_type("Email", "cti.a.p.message.v1.0~a.p.email.v1.0", object_shape(&[])),
  ]);

  // The transformer refuses this registry outright; the validator reports
  // the same condition when fed collected-but-untransformed entities.
  let registry = crate::compiler::Collector::new(&type_graph)
    .collect()
    .expect("collect succeeds");
  let issues = Validator::new(&registry).validate();
  assert!(issues.iter().any(|issue| issue.message.contains("final")), "{issues:?}");
}

fn scalar_integer() -> Shape {
  Shape {
    kind: ShapeKind::Integer,
    ..Shape::default()
  }
}
