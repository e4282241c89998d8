use serde_json::{Value, json};

use crate::typegraph::{DomainExtension, PropertyShape, Shape, ShapeKind, SourceLocation, TypeGraph, annotation};

pub(crate) fn scalar(kind: ShapeKind) -> Shape {
  Shape {
    kind,
    ..Shape::default()
  }
}

pub(crate) fn string_shape() -> Shape {
  scalar(ShapeKind::String)
}

pub(crate) fn object_shape(properties: &[(&str, Shape, bool)]) -> Shape {
  let mut shape = scalar(ShapeKind::Object);
  for (key, property, required) in properties {
    shape.properties.insert(
      (*key).to_string(),
      PropertyShape {
        shape: property.clone(),
        required: *required,
      },
    );
  }
  shape
}

pub(crate) fn annotated(mut shape: Shape, name: &str, value: Value) -> Shape {
  shape.custom_domain_properties.insert(name.to_string(), value);
  shape
}

/// A named object declaration carrying `cti.cti`.
pub(crate) fn cti_type(name: &str, cti: &str, shape: Shape) -> (String, Shape) {
  let mut shape = annotated(shape, annotation::CTI, json!(cti));
  shape.name = Some(name.to_string());
  shape.source = SourceLocation {
    fragment: format!("types/{name}.raml"),
    line: Some(1),
  };
  (name.to_string(), shape)
}

pub(crate) fn reference_shape(target: &str) -> Shape {
  Shape {
    reference: Some(target.to_string()),
    ..Shape::default()
  }
}

pub(crate) fn graph(declarations: Vec<(String, Shape)>) -> TypeGraph {
  let mut type_graph = TypeGraph::default();
  for (name, shape) in declarations {
    type_graph.declarations.insert(name, shape);
  }
  type_graph
}

pub(crate) fn instances_extension(defined_by: &str, values: Value) -> DomainExtension {
  DomainExtension {
    defined_by: defined_by.to_string(),
    values,
    source: SourceLocation {
      fragment: "instances.raml".to_string(),
      line: Some(3),
    },
  }
}

/// An `array<object>` annotation type whose item alias points at an
/// existing CTI type declaration, the canonical instances container.
pub(crate) fn instances_declaration(name: &str, item_target: &str) -> (String, Shape) {
  let shape = Shape {
    name: Some(name.to_string()),
    kind: ShapeKind::Array,
    items: Some(Box::new(reference_shape(item_target))),
    ..Shape::default()
  };
  (name.to_string(), shape)
}

/// A ready-made sample: one CTI type with an id property plus an instances
/// container for it.
pub(crate) fn sample_entity_graph() -> TypeGraph {
  let id_property = annotated(string_shape(), annotation::ID, json!(true));
  let entity = object_shape(&[("id", id_property, true), ("name", string_shape(), false)]);
  let (entity_name, entity_shape) = cti_type("SampleEntity", "cti.x.y.sample_entity.v1.0", entity);

  let (container_name, container_shape) = instances_declaration("SampleEntityInstances", "SampleEntity");

  graph(vec![(entity_name, entity_shape), (container_name, container_shape)])
}

pub(crate) fn sample_instance_values(ids: &[&str]) -> Value {
  Value::Array(
    ids
      .iter()
      .map(|id| json!({"id": id, "name": format!("instance {id}")}))
      .collect(),
  )
}
