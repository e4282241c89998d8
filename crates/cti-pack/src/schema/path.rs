use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A dotted path keyed from a schema root: `.`, `.foo`, `.foo.#`,
/// `.foo.bar`. `#` stands for the array element position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GJsonPath(String);

impl GJsonPath {
  pub fn root() -> Self {
    Self(".".to_string())
  }

  pub fn is_root(&self) -> bool {
    self.0 == "."
  }

  /// Extends the path with an object property key.
  pub fn join(&self, key: &str) -> Self {
    if self.is_root() {
      Self(format!(".{key}"))
    } else {
      Self(format!("{}.{key}", self.0))
    }
  }

  /// Extends the path with the array element marker.
  pub fn item(&self) -> Self {
    self.join("#")
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The path tokens after the leading dot; empty for the root.
  pub fn tokens(&self) -> impl Iterator<Item = &str> {
    self.0.strip_prefix('.').unwrap_or(&self.0).split('.').filter(|t| !t.is_empty())
  }

  /// Every value the path addresses inside `document`. `#` fans out over
  /// array elements, so a single path can address many values.
  pub fn lookup<'a>(&self, document: &'a Value) -> Vec<&'a Value> {
    let mut current = vec![document];
    for token in self.tokens() {
      let mut next = Vec::new();
      for value in current {
        match (token, value) {
          ("#", Value::Array(items)) => next.extend(items.iter()),
          (key, Value::Object(map)) => {
            if let Some(found) = map.get(key) {
              next.push(found);
            }
          }
          _ => {}
        }
      }
      current = next;
    }
    current
  }
}

impl fmt::Display for GJsonPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for GJsonPath {
  fn from(raw: &str) -> Self {
    if raw.is_empty() { Self::root() } else { Self(raw.to_string()) }
  }
}
