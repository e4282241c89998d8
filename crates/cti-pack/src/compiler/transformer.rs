use cti_id::Identifier;
use indexmap::IndexMap;

use crate::{
  registry::{Entity, Registry},
  schema::{Annotations, GJsonPath, JsonSchema, MergeError, SchemaRefValue, escape_definition_key, merge},
};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
  #[error("parent type not found for {0}")]
  ParentNotFound(Identifier),

  #[error("{0} not found in registry")]
  CtiNotFound(String),

  #[error("final type {parent} cannot have descendant {child}")]
  FinalParent { parent: Identifier, child: Identifier },

  #[error("{child} cannot descend from instance {parent}")]
  InstanceParent { parent: Identifier, child: Identifier },

  #[error("cti.schema on {cti} must reference CTI types, got {value}")]
  InvalidCtiSchemaValue { cti: String, value: String },

  #[error("unexpected schema kind for {cti}: {detail}")]
  UnexpectedSchemaKind { cti: String, detail: String },

  #[error("merging schema chain of {cti}")]
  Merge {
    cti: String,
    #[source]
    source: MergeError,
  },
}

/// Post-collection pass: links entities to parents, folds inheritance,
/// inlines `cti.schema` references, and harvests annotations.
///
/// After a successful run every type's `schema` is its fully merged and
/// inlined form, merge caches are clear, and annotation maps are keyed by
/// stable pre-order paths.
pub struct Transformer<'a> {
  registry: &'a mut Registry,
}

impl<'a> Transformer<'a> {
  pub fn new(registry: &'a mut Registry) -> Self {
    Self { registry }
  }

  pub fn transform(mut self) -> Result<(), TransformError> {
    self.link()?;
    self.merge_schemas()?;
    self.inline_schema_refs()?;
    self.reset_merge_caches();
    self.harvest_annotations();
    Ok(())
  }

  /// Attaches parent links and enforces the registry invariants: parents
  /// exist, are types, and are not final.
  fn link(&mut self) -> Result<(), TransformError> {
    let keys: Vec<String> = self.registry.keys().map(ToString::to_string).collect();

    for key in keys {
      let entity = self.registry.get(&key).expect("key enumerated from registry");
      let cti = entity.cti().clone();
      if cti.is_root() {
        continue;
      }

      let parent_cti = cti.parent();
      let parent_key = parent_cti.to_string();
      let Some(parent) = self.registry.get(&parent_key) else {
        return Err(TransformError::ParentNotFound(cti));
      };
      match parent {
        Entity::Instance(_) => {
          return Err(TransformError::InstanceParent { parent: parent_cti, child: cti });
        }
        Entity::Type(parent_type) => {
          if parent_type.final_ {
            return Err(TransformError::FinalParent { parent: parent_cti, child: cti });
          }
        }
      }

      self
        .registry
        .get_mut(&key)
        .expect("key enumerated from registry")
        .set_parent(parent_cti);
    }

    Ok(())
  }

  /// Computes every type's inheritance-merged schema by folding the parent
  /// chain root-ward through the schema merger.
  fn merge_schemas(&mut self) -> Result<(), TransformError> {
    let keys: Vec<String> = self
      .registry
      .types()
      .map(|entity| entity.cti.to_string())
      .collect();

    for key in keys {
      self.merged_schema(&key)?;
    }
    Ok(())
  }

  fn merged_schema(&mut self, key: &str) -> Result<JsonSchema, TransformError> {
    let entity = self
      .registry
      .get_type(key)
      .ok_or_else(|| TransformError::CtiNotFound(key.to_string()))?;

    if let Some(merged) = &entity.merged {
      return Ok(merged.clone());
    }

    let own = entity.schema.clone();
    let parent = entity.parent.clone();

    let merged = match parent {
      Some(parent_cti) => {
        let parent_schema = self.merged_schema(&parent_cti.to_string())?;
        merge(&parent_schema, &own).map_err(|source| TransformError::Merge {
          cti: key.to_string(),
          source,
        })?
      }
      None => own,
    };

    if let Some(Entity::Type(entity)) = self.registry.get_mut(key) {
      entity.merged = Some(merged.clone());
    }
    Ok(merged)
  }

  /// Replaces every type's schema with its merged form, with `cti.schema`
  /// references inlined recursion-safely.
  fn inline_schema_refs(&mut self) -> Result<(), TransformError> {
    let keys: Vec<String> = self
      .registry
      .types()
      .map(|entity| entity.cti.to_string())
      .collect();

    for key in &keys {
      let merged = self
        .registry
        .get_type(key)
        .and_then(|entity| entity.merged.clone())
        .ok_or_else(|| TransformError::CtiNotFound(key.clone()))?;

      let mut definitions = IndexMap::new();
      let mut history = vec![key.clone()];
      let mut inlined = self.inline_node(merged, key, &mut history, &mut definitions)?;

      for (name, definition) in definitions {
        inlined.definitions.insert(name, definition);
      }

      if let Some(Entity::Type(entity)) = self.registry.get_mut(key) {
        entity.schema = inlined;
      }
    }

    Ok(())
  }

  fn inline_node(
    &mut self,
    mut node: JsonSchema,
    root: &str,
    history: &mut Vec<String>,
    definitions: &mut IndexMap<String, JsonSchema>,
  ) -> Result<JsonSchema, TransformError> {
    if let Some(schema_ref) = node.annotations.schema.clone() {
      return self.resolve_schema_ref(node, &schema_ref, root, history, definitions);
    }

    if let Some(items) = node.items.take() {
      node.items = Some(Box::new(self.inline_node(*items, root, history, definitions)?));
    }

    let properties = std::mem::take(&mut node.properties);
    for (key, property) in properties {
      let inlined = self.inline_node(property, root, history, definitions)?;
      node.properties.insert(key, inlined);
    }

    let pattern_properties = std::mem::take(&mut node.pattern_properties);
    for (key, property) in pattern_properties {
      let inlined = self.inline_node(property, root, history, definitions)?;
      node.pattern_properties.insert(key, inlined);
    }

    let any_of = std::mem::take(&mut node.any_of);
    for member in any_of {
      node.any_of.push(self.inline_node(member, root, history, definitions)?);
    }

    Ok(node)
  }

  /// Substitutes the schema referenced by `cti.schema`, preserving the
  /// annotation on the output node. Self-recursion collapses to `$ref: #`,
  /// external recursion lands in the root's `definitions`.
  fn resolve_schema_ref(
    &mut self,
    node: JsonSchema,
    schema_ref: &SchemaRefValue,
    root: &str,
    history: &mut Vec<String>,
    definitions: &mut IndexMap<String, JsonSchema>,
  ) -> Result<JsonSchema, TransformError> {
    let annotations = node.annotations.clone();

    let resolved = match schema_ref {
      SchemaRefValue::One(target) => self.resolve_one(target, root, history, definitions)?,
      SchemaRefValue::Many(targets) => {
        let mut members = Vec::new();
        for target in targets {
          match target {
            Some(target) => members.push(self.resolve_one(target, root, history, definitions)?),
            None => members.push(JsonSchema::of_type("null")),
          }
        }
        JsonSchema {
          any_of: members,
          ..JsonSchema::default()
        }
      }
    };

    let mut substituted = resolved;
    substituted.annotations = annotations;
    Ok(substituted)
  }

  fn resolve_one(
    &mut self,
    target: &str,
    root: &str,
    history: &mut Vec<String>,
    definitions: &mut IndexMap<String, JsonSchema>,
  ) -> Result<JsonSchema, TransformError> {
    target
      .parse::<Identifier>()
      .map_err(|err| TransformError::InvalidCtiSchemaValue {
        cti: root.to_string(),
        value: format!("{target}: {err}"),
      })?;

    if target == root {
      return Ok(JsonSchema {
        reference: Some("#".to_string()),
        ..JsonSchema::default()
      });
    }

    let target_schema = self
      .registry
      .get_type(target)
      .and_then(|entity| entity.merged.clone())
      .ok_or_else(|| TransformError::CtiNotFound(target.to_string()))?;

    if history.iter().any(|entry| entry == target) {
      // External recursion: park the schema as a definition and point at
      // it. The parked copy keeps its own cti.schema annotations; the
      // cycle is broken by the pointer, not by rewriting the target.
      let key = escape_definition_key(target);
      definitions.entry(key.clone()).or_insert(target_schema);
      return Ok(JsonSchema {
        reference: Some(format!("#/definitions/{key}")),
        ..JsonSchema::default()
      });
    }

    history.push(target.to_string());
    let inlined = self.inline_node(target_schema, root, history, definitions)?;
    history.pop();
    Ok(inlined)
  }

  fn reset_merge_caches(&mut self) {
    let keys: Vec<String> = self
      .registry
      .types()
      .map(|entity| entity.cti.to_string())
      .collect();

    for key in keys {
      if let Some(Entity::Type(entity)) = self.registry.get_mut(&key) {
        entity.merged = None;
      }
    }
  }

  /// Walks every type's schema (and traits schema) collecting `cti.*`
  /// annotations keyed by schema path, in stable pre-order.
  fn harvest_annotations(&mut self) {
    let keys: Vec<String> = self
      .registry
      .types()
      .map(|entity| entity.cti.to_string())
      .collect();

    for key in keys {
      let Some(entity) = self.registry.get_type(&key) else {
        continue;
      };

      let mut harvested = IndexMap::new();
      harvest_node(&entity.schema, &GJsonPath::root(), &mut harvested);
      if let Some(traits_schema) = &entity.traits_schema {
        harvest_node(traits_schema, &GJsonPath::root(), &mut harvested);
      }

      if let Some(Entity::Type(entity)) = self.registry.get_mut(&key) {
        entity.annotations = harvested;
      }
    }
  }
}

fn harvest_node(node: &JsonSchema, path: &GJsonPath, harvested: &mut IndexMap<GJsonPath, Annotations>) {
  if !node.annotations.is_empty() {
    harvested
      .entry(path.clone())
      .and_modify(|existing| existing.merge_missing_from(&node.annotations))
      .or_insert_with(|| node.annotations.clone());
  }

  for (key, property) in &node.properties {
    harvest_node(property, &path.join(key), harvested);
  }
  if let Some(items) = &node.items {
    harvest_node(items, &path.item(), harvested);
  }
  // anyOf branches inherit the parent path.
  for member in &node.any_of {
    harvest_node(member, path, harvested);
  }
}
