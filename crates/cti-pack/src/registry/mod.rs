//! In-memory store of collected entities, indexed by CTI.

mod entity;

use cti_id::Identifier;
use indexmap::IndexMap;

pub use entity::{Entity, InstanceEntity, SourceMap, TypeEntity};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
  #[error("duplicate cti.cti: {0}")]
  DuplicateCti(Identifier),
}

/// Insertion-ordered entity store. The registry is a pure value container;
/// it never parses or validates schemas.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  index: IndexMap<String, Entity>,
  fragments: IndexMap<String, Vec<String>>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds an entity, failing when its CTI is already present in either
  /// kind map.
  pub fn add(&mut self, entity: Entity) -> Result<(), RegistryError> {
    let key = entity.cti().to_string();
    if self.index.contains_key(&key) {
      return Err(RegistryError::DuplicateCti(entity.cti().clone()));
    }

    let fragment = entity.source_map().original_path.clone();
    if !fragment.is_empty() {
      self.fragments.entry(fragment).or_default().push(key.clone());
    }
    self.index.insert(key, entity);
    Ok(())
  }

  pub fn get(&self, cti: &str) -> Option<&Entity> {
    self.index.get(cti)
  }

  pub fn get_mut(&mut self, cti: &str) -> Option<&mut Entity> {
    self.index.get_mut(cti)
  }

  pub fn get_type(&self, cti: &str) -> Option<&TypeEntity> {
    self.index.get(cti).and_then(Entity::as_type)
  }

  pub fn get_instance(&self, cti: &str) -> Option<&InstanceEntity> {
    self.index.get(cti).and_then(Entity::as_instance)
  }

  pub fn contains(&self, cti: &str) -> bool {
    self.index.contains_key(cti)
  }

  /// All entities in insertion order.
  pub fn entities(&self) -> impl Iterator<Item = &Entity> {
    self.index.values()
  }

  pub fn types(&self) -> impl Iterator<Item = &TypeEntity> {
    self.index.values().filter_map(Entity::as_type)
  }

  pub fn instances(&self) -> impl Iterator<Item = &InstanceEntity> {
    self.index.values().filter_map(Entity::as_instance)
  }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.index.keys().map(String::as_str)
  }

  /// Entities collected from one original fragment path.
  pub fn by_fragment(&self, original_path: &str) -> Vec<&Entity> {
    self
      .fragments
      .get(original_path)
      .map(|keys| keys.iter().filter_map(|k| self.index.get(k)).collect())
      .unwrap_or_default()
  }

  pub fn len(&self) -> usize {
    self.index.len()
  }

  pub fn is_empty(&self) -> bool {
    self.index.is_empty()
  }

  /// Produces the enriched view combining this registry with another
  /// (typically a dependency's cached entities). Existing entries win;
  /// colliding dependency entries are an error.
  pub fn merged_with(&self, other: &Registry) -> Result<Registry, RegistryError> {
    let mut combined = self.clone();
    for entity in other.entities() {
      combined.add(entity.clone())?;
    }
    Ok(combined)
  }

  /// Flattens the registry into its serialized-cache form.
  pub fn to_entities(&self) -> Vec<&Entity> {
    self.index.values().collect()
  }

  /// Rebuilds a registry from the serialized-cache form.
  pub fn from_entities(entities: Vec<Entity>) -> Result<Self, RegistryError> {
    let mut registry = Self::new();
    for entity in entities {
      registry.add(entity)?;
    }
    Ok(registry)
  }
}

#[cfg(test)]
pub(crate) mod tests;
