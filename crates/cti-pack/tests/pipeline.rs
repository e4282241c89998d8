//! End-to-end: a producer-built type graph flows through collect,
//! transform, validation, the serialized cache, and an archive round trip.

use std::path::Path;

use serde_json::{Value, json};

use cti_pack::{
  archive::{ArchiveFormat, Archiver, unpack},
  compiler::{Validator, compile},
  pkg::{METADATA_CACHE_FILE, Package},
  typegraph::{DomainExtension, PropertyShape, Shape, ShapeKind, SourceLocation, TypeGraph, TypeGraphProducer, annotation},
};

/// Stands in for the RAML frontend: returns a pre-built graph regardless
/// of the library text.
struct FixedProducer {
  graph: TypeGraph,
}

impl TypeGraphProducer for FixedProducer {
  fn produce(&self, _library: &str, _base_dir: &Path) -> anyhow::Result<TypeGraph> {
    Ok(self.graph.clone())
  }
}

fn string_shape() -> Shape {
  Shape {
    kind: ShapeKind::String,
    ..Shape::default()
  }
}

fn annotated(mut shape: Shape, name: &str, value: Value) -> Shape {
  shape.custom_domain_properties.insert(name.to_string(), value);
  shape
}

fn message_graph() -> TypeGraph {
  let mut graph = TypeGraph::default();

  // cti.demo.app.message.v1.0: { id (cti.id), subject, attachment (cti.asset) }
  let mut message = Shape {
    name: Some("Message".to_string()),
    kind: ShapeKind::Object,
    source: SourceLocation {
      fragment: "types/message.raml".to_string(),
      line: Some(4),
    },
    ..Shape::default()
  };
  message
    .custom_domain_properties
    .insert(annotation::CTI.to_string(), json!("cti.demo.app.message.v1.0"));
  message.properties.insert(
    "id".to_string(),
    PropertyShape {
      shape: annotated(string_shape(), annotation::ID, json!(true)),
      required: true,
    },
  );
  message.properties.insert(
    "subject".to_string(),
    PropertyShape {
      shape: string_shape(),
      required: true,
    },
  );
  message.properties.insert(
    "attachment".to_string(),
    PropertyShape {
      shape: annotated(string_shape(), annotation::ASSET, json!(true)),
      required: false,
    },
  );
  graph.declarations.insert("Message".to_string(), message);

  let container = Shape {
    name: Some("MessageInstances".to_string()),
    kind: ShapeKind::Array,
    items: Some(Box::new(Shape {
      reference: Some("Message".to_string()),
      ..Shape::default()
    })),
    ..Shape::default()
  };
  graph.declarations.insert("MessageInstances".to_string(), container);

  graph.extensions.push(DomainExtension {
    defined_by: "MessageInstances".to_string(),
    values: json!([
      {
        "id": "cti.demo.app.message.v1.0~demo.app.welcome.v1.0",
        "subject": "Welcome!",
        "attachment": "assets/welcome.txt"
      }
    ]),
    source: SourceLocation {
      fragment: "instances.raml".to_string(),
      line: Some(2),
    },
  });

  graph
}

#[test]
fn test_pipeline_compiles_and_validates() {
  let graph = message_graph();
  let (registry, stats) = compile(&graph).expect("compile succeeds");

  assert_eq!(stats.types_collected, 1);
  assert_eq!(stats.instances_collected, 1);

  let issues = Validator::new(&registry).validate();
  assert!(issues.is_empty(), "unexpected issues: {issues:?}");
}

#[test]
fn test_package_parse_writes_cache_and_archive_round_trips() {
  let root = tempfile::tempdir().expect("tempdir");
  let mut package = Package::initialize(root.path(), "demo.app").expect("initialize succeeds");
  package.index.entities.push("types/message.raml".to_string());
  package.save().expect("save succeeds");

  std::fs::create_dir_all(root.path().join("assets")).expect("assets dir");
  std::fs::write(root.path().join("assets/welcome.txt"), "hello").expect("asset written");

  let producer = FixedProducer { graph: message_graph() };
  let (registry, _) = package.parse(&producer).expect("parse succeeds");
  assert!(root.path().join(METADATA_CACHE_FILE).exists(), "cache written");

  let output = root.path().join("demo.app.cti");
  Archiver::new(&package, &registry, ArchiveFormat::Tgz)
    .write_to(&output)
    .expect("archive written");

  let unpacked = tempfile::tempdir().expect("tempdir");
  unpack(&output, unpacked.path(), ArchiveFormat::Tgz).expect("unpack succeeds");

  // The unpacked package rehydrates the same registry.
  let reopened = Package::open(unpacked.path()).expect("package opens");
  let rehydrated = reopened.parse_cached().expect("cache loads");
  assert_eq!(rehydrated.len(), registry.len());
  assert!(rehydrated.get_type("cti.demo.app.message.v1.0").is_some());
  assert!(
    rehydrated
      .get_instance("cti.demo.app.message.v1.0~demo.app.welcome.v1.0")
      .is_some()
  );
  assert!(unpacked.path().join("assets/welcome.txt").exists(), "asset travels");

  let issues = Validator::new(&rehydrated).validate();
  assert!(issues.is_empty(), "rehydrated registry validates: {issues:?}");
}
