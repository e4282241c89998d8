use cti_id::{Identifier, match_pattern};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{
  registry::{Entity, InstanceEntity, Registry, RegistryError, SourceMap, TypeEntity},
  schema::{AdditionalProperties, Annotations, JsonSchema, MergeError, SchemaKind, SchemaRefValue, merge},
  typegraph::{DomainExtension, Shape, ShapeKind, TypeGraph, annotation},
};

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
  #[error(transparent)]
  Registry(#[from] RegistryError),

  #[error("duplicate cti entity {0}")]
  DuplicateInstance(Identifier),

  #[error("unknown parent type '{0}'")]
  UnknownParent(String),

  #[error("instance {instance} does not belong to type {parent}")]
  InstanceParentMismatch { instance: Identifier, parent: String },

  #[error("no property annotated cti.id on instances of {0}")]
  MissingIdProperty(String),

  #[error("invalid cti.cti value on '{shape}': expected a string or list of strings")]
  InvalidCtiValue { shape: String },

  #[error("annotation {name} on '{shape}' has an unexpected shape")]
  BadAnnotationShape { shape: String, name: String },

  #[error("cti type {0} must be an object shape")]
  NotAnObject(String),

  #[error("merging inherited shape '{parent}' into '{child}'")]
  Inherit {
    parent: String,
    child: String,
    #[source]
    source: MergeError,
  },

  #[error("invalid cti identifier '{raw}'")]
  Cti {
    raw: String,
    #[source]
    source: cti_id::ParseError,
  },
}

/// Builds registry entities out of one frontend type graph.
pub struct Collector<'a> {
  graph: &'a TypeGraph,
  registry: Registry,
}

impl<'a> Collector<'a> {
  pub fn new(graph: &'a TypeGraph) -> Self {
    Self {
      graph,
      registry: Registry::new(),
    }
  }

  pub fn collect(mut self) -> Result<Registry, CollectError> {
    let graph = self.graph;
    for (name, shape) in &graph.declarations {
      if shape.has_annotation(annotation::CTI) {
        self.collect_type(name, shape)?;
      }
    }

    for extension in &graph.extensions {
      self.collect_instances(extension)?;
    }

    Ok(self.registry)
  }

  fn collect_type(&mut self, name: &str, shape: &Shape) -> Result<(), CollectError> {
    let names = cti_names(name, shape.annotation(annotation::CTI))?;

    let mut stack = vec![name.to_string()];
    let schema = self.convert(shape, &mut stack)?;
    if schema.kind() != SchemaKind::Object {
      return Err(CollectError::NotAnObject(name.to_string()));
    }

    let traits_schema = match &shape.traits_schema {
      Some(traits_shape) => Some(self.convert(traits_shape, &mut stack)?),
      None => None,
    };

    let annotations = parse_annotations(name, &shape.custom_domain_properties)?;

    for raw in &names {
      let cti = parse_identifier(raw)?;
      self.registry.add(Entity::Type(TypeEntity {
        cti,
        final_: annotations.final_.unwrap_or(false),
        access: annotations.access.unwrap_or_default(),
        resilient: annotations.resilient.unwrap_or(false),
        display_name: shape.display_name.clone(),
        description: shape.description.clone(),
        schema: schema.clone(),
        traits_schema: traits_schema.clone(),
        traits: shape.traits.clone(),
        annotations: IndexMap::new(),
        source_map: SourceMap {
          original_path: shape.source.fragment.clone(),
          source_path: shape.source.fragment.clone(),
          line: shape.source.line,
        },
        parent: None,
        merged: None,
      }))?;
    }

    Ok(())
  }

  /// Discovers instances declared through a domain extension whose defining
  /// shape is `array<object>` with a `cti.cti`-annotated item alias.
  fn collect_instances(&mut self, extension: &DomainExtension) -> Result<(), CollectError> {
    let Some(defining) = self.graph.declaration(&extension.defined_by) else {
      return Err(CollectError::UnknownParent(extension.defined_by.clone()));
    };
    let defining = self.resolve_alias(defining)?;
    if defining.kind != ShapeKind::Array {
      return Ok(());
    }

    let Some(item) = &defining.items else {
      return Ok(());
    };
    let item = self.resolve_alias(item)?;
    let Some(cti_value) = item.annotation(annotation::CTI) else {
      return Ok(());
    };

    let type_names = cti_names(&extension.defined_by, Some(cti_value))?;
    let parents: Vec<Identifier> = type_names
      .iter()
      .map(|raw| parse_identifier(raw))
      .collect::<Result<_, _>>()?;

    let id_key = item
      .properties
      .iter()
      .find(|(_, property)| property.shape.annotation(annotation::ID).and_then(Value::as_bool) == Some(true))
      .map(|(key, _)| key.clone())
      .ok_or_else(|| CollectError::MissingIdProperty(type_names.join(", ")))?;

    let display_name_key = marker_property(&item, annotation::DISPLAY_NAME);
    let description_key = marker_property(&item, annotation::DESCRIPTION);
    let item_annotations = parse_annotations(&extension.defined_by, &item.custom_domain_properties)?;

    let Value::Array(elements) = &extension.values else {
      return Err(CollectError::BadAnnotationShape {
        shape: extension.defined_by.clone(),
        name: annotation::CTI.to_string(),
      });
    };

    for element in elements {
      let raw_id = element
        .get(&id_key)
        .and_then(Value::as_str)
        .ok_or_else(|| CollectError::MissingIdProperty(type_names.join(", ")))?;
      let cti = parse_identifier(raw_id)?;

      let matched = parents.iter().any(|parent| match_pattern(parent, &cti).is_ok());
      if !matched {
        return Err(CollectError::InstanceParentMismatch {
          instance: cti,
          parent: type_names.join(", "),
        });
      }

      if self.registry.contains(&cti.to_string()) {
        return Err(CollectError::DuplicateInstance(cti));
      }

      self.registry.add(Entity::Instance(InstanceEntity {
        cti,
        final_: true,
        access: item_annotations.access.unwrap_or_default(),
        resilient: item_annotations.resilient.unwrap_or(false),
        display_name: lookup_string(element, display_name_key.as_deref()),
        description: lookup_string(element, description_key.as_deref()),
        values: element.clone(),
        annotations: IndexMap::new(),
        source_map: SourceMap {
          original_path: extension.source.fragment.clone(),
          source_path: extension.source.fragment.clone(),
          line: extension.source.line,
        },
        parent: None,
      }))?;
    }

    Ok(())
  }

  /// Follows reference links to a concrete declaration, overlaying the
  /// alias's own annotations over the target's.
  fn resolve_alias(&self, shape: &Shape) -> Result<Shape, CollectError> {
    let mut resolved = shape.clone();
    let mut hops = 0usize;
    while let Some(target) = resolved.reference.clone() {
      hops += 1;
      if hops > self.graph.declarations.len() + 1 {
        break;
      }
      let Some(declaration) = self.graph.declaration(&target) else {
        return Err(CollectError::UnknownParent(target));
      };
      let mut next = declaration.clone();
      for (key, value) in &resolved.custom_domain_properties {
        next.custom_domain_properties.insert(key.clone(), value.clone());
      }
      resolved = next;
    }
    Ok(resolved)
  }

  /// Converts a shape to its JSON-Schema form, unwrapping non-CTI
  /// inheritance and turning recursive back-edges into `$ref` pointers.
  fn convert(&self, shape: &Shape, stack: &mut Vec<String>) -> Result<JsonSchema, CollectError> {
    if let Some(target) = &shape.reference {
      return self.convert_reference(shape, target, stack);
    }

    let mut schema = self.convert_body(shape, stack)?;

    for parent_name in &shape.inherits {
      let Some(declaration) = self.graph.declaration(parent_name) else {
        return Err(CollectError::UnknownParent(parent_name.clone()));
      };
      // CTI-typed ancestors stay linked through the identifier chain.
      if declaration.has_annotation(annotation::CTI) {
        continue;
      }
      if stack.iter().any(|entry| entry == parent_name) {
        continue;
      }

      stack.push(parent_name.clone());
      let parent_schema = self.convert(declaration, stack)?;
      stack.pop();

      schema = merge(&parent_schema, &schema).map_err(|source| CollectError::Inherit {
        parent: parent_name.clone(),
        child: shape.name.clone().unwrap_or_else(|| "<inline>".to_string()),
        source,
      })?;
    }

    Ok(schema)
  }

  fn convert_reference(&self, shape: &Shape, target: &str, stack: &mut Vec<String>) -> Result<JsonSchema, CollectError> {
    let annotations = parse_annotations(target, &shape.custom_domain_properties)?;

    // Recursive back-edge: the target is an ancestor of this conversion.
    if stack.iter().any(|entry| entry == target) {
      return Ok(JsonSchema {
        reference: Some("#".to_string()),
        annotations,
        ..JsonSchema::default()
      });
    }

    let Some(declaration) = self.graph.declaration(target) else {
      return Err(CollectError::UnknownParent(target.to_string()));
    };

    // A referenced CTI type is not inlined here; it stays behind its
    // cti.schema annotation for the transformer to resolve.
    if let Some(cti_value) = declaration.annotation(annotation::CTI) {
      let names = cti_names(target, Some(cti_value))?;
      let mut schema = JsonSchema::any();
      schema.annotations = annotations;
      if schema.annotations.schema.is_none() {
        schema.annotations.schema = Some(match names.as_slice() {
          [single] => SchemaRefValue::One(single.clone()),
          many => SchemaRefValue::Many(many.iter().cloned().map(Some).collect()),
        });
      }
      return Ok(schema);
    }

    stack.push(target.to_string());
    let mut schema = self.convert(declaration, stack)?;
    stack.pop();

    // Local annotations and description override the referenced body's.
    let mut merged = annotations;
    merged.merge_missing_from(&schema.annotations);
    schema.annotations = merged;
    if let Some(description) = &shape.description {
      schema.description = Some(description.clone());
    }
    Ok(schema)
  }

  fn convert_body(&self, shape: &Shape, stack: &mut Vec<String>) -> Result<JsonSchema, CollectError> {
    let name = shape.name.clone().unwrap_or_else(|| "<inline>".to_string());
    let mut schema = JsonSchema {
      title: shape.display_name.clone(),
      description: shape.description.clone(),
      annotations: parse_annotations(&name, &shape.custom_domain_properties)?,
      ..JsonSchema::default()
    };
    apply_facets(&mut schema, shape);

    match shape.kind {
      ShapeKind::Object => {
        schema.schema_type = Some("object".to_string());
        for (key, property) in &shape.properties {
          let converted = self.convert(&property.shape, stack)?;
          if property.required {
            schema.required.push(key.clone());
          }
          schema.properties.insert(key.clone(), converted);
        }
        for (pattern, pattern_shape) in &shape.pattern_properties {
          let converted = self.convert(pattern_shape, stack)?;
          schema.pattern_properties.insert(pattern.clone(), converted);
        }
      }
      ShapeKind::Array => {
        schema.schema_type = Some("array".to_string());
        if let Some(items) = &shape.items {
          let mut item_schema = self.convert(items, stack)?;
          // cti.reference and cti.schema on the container describe the
          // elements; they move onto the item schema of this (cloned)
          // container and never annotate the array itself.
          if item_schema.annotations.reference.is_none() {
            item_schema.annotations.reference = schema.annotations.reference.take();
          } else {
            schema.annotations.reference = None;
          }
          if item_schema.annotations.schema.is_none() {
            item_schema.annotations.schema = schema.annotations.schema.take();
          } else {
            schema.annotations.schema = None;
          }
          schema.items = Some(Box::new(item_schema));
        }
      }
      ShapeKind::Union => {
        for member in &shape.any_of {
          schema.any_of.push(self.convert(member, stack)?);
        }
      }
      ShapeKind::String => schema.schema_type = Some("string".to_string()),
      ShapeKind::Number => schema.schema_type = Some("number".to_string()),
      ShapeKind::Integer => schema.schema_type = Some("integer".to_string()),
      ShapeKind::Boolean => schema.schema_type = Some("boolean".to_string()),
      ShapeKind::Nil => schema.schema_type = Some("null".to_string()),
      ShapeKind::Any => {}
    }

    Ok(schema)
  }
}

fn apply_facets(schema: &mut JsonSchema, shape: &Shape) {
  let facets = &shape.facets;
  if !facets.enum_values.is_empty() {
    schema.enum_values = Some(facets.enum_values.clone());
  }
  schema.format.clone_from(&facets.format);
  schema.pattern.clone_from(&facets.pattern);
  schema.min_length = facets.min_length;
  schema.max_length = facets.max_length;
  schema.minimum.clone_from(&facets.minimum);
  schema.maximum.clone_from(&facets.maximum);
  schema.multiple_of.clone_from(&facets.multiple_of);
  schema.min_items = facets.min_items;
  schema.max_items = facets.max_items;
  schema.unique_items = facets.unique_items;
  schema.min_properties = facets.min_properties;
  schema.max_properties = facets.max_properties;
  schema.additional_properties = facets.additional_properties.map(AdditionalProperties::Allowed);
}

fn cti_names(shape: &str, value: Option<&Value>) -> Result<Vec<String>, CollectError> {
  let invalid = || CollectError::InvalidCtiValue {
    shape: shape.to_string(),
  };

  match value {
    Some(Value::String(single)) => Ok(vec![single.clone()]),
    Some(Value::Array(entries)) => {
      let names: Option<Vec<String>> = entries
        .iter()
        .map(|entry| entry.as_str().map(ToString::to_string))
        .collect();
      match names {
        Some(names) if !names.is_empty() => Ok(names),
        _ => Err(invalid()),
      }
    }
    _ => Err(invalid()),
  }
}

fn parse_identifier(raw: &str) -> Result<Identifier, CollectError> {
  raw.parse().map_err(|source| CollectError::Cti {
    raw: raw.to_string(),
    source,
  })
}

/// Parses the raw `cti.*` domain properties into the typed annotation set.
fn parse_annotations(shape: &str, properties: &IndexMap<String, Value>) -> Result<Annotations, CollectError> {
  let mut object = serde_json::Map::new();
  for (key, value) in properties {
    if key.starts_with("cti.") {
      object.insert(format!("x-{key}"), value.clone());
    }
  }

  serde_json::from_value(Value::Object(object)).map_err(|_| CollectError::BadAnnotationShape {
    shape: shape.to_string(),
    name: "cti.*".to_string(),
  })
}

fn marker_property(shape: &Shape, marker: &str) -> Option<String> {
  shape
    .properties
    .iter()
    .find(|(_, property)| property.shape.annotation(marker).and_then(Value::as_bool) == Some(true))
    .map(|(key, _)| key.clone())
}

fn lookup_string(element: &Value, key: Option<&str>) -> Option<String> {
  key
    .and_then(|key| element.get(key))
    .and_then(Value::as_str)
    .map(ToString::to_string)
}
