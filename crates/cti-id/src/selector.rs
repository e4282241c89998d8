use std::fmt;

/// Attribute selector failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectorError {
  #[error("empty token at position {0}")]
  EmptyToken(usize),
}

/// A parsed `@a.b.c` attribute selector: an ordered list of property keys
/// descending from the schema root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSelector {
  tokens: Vec<String>,
}

impl AttributeSelector {
  /// Parses a selector body (the text after `@`).
  ///
  /// The empty string yields an empty selector; any empty token, including
  /// the one produced by a lone `.`, is rejected with its position.
  pub fn parse(query: &str) -> Result<Self, SelectorError> {
    if query.is_empty() {
      return Ok(Self::default());
    }

    let mut tokens = Vec::new();
    for (i, token) in query.split('.').enumerate() {
      if token.is_empty() {
        return Err(SelectorError::EmptyToken(i));
      }
      tokens.push(token.to_string());
    }
    Ok(Self { tokens })
  }

  pub fn tokens(&self) -> &[String] {
    &self.tokens
  }

  pub fn is_empty(&self) -> bool {
    self.tokens.is_empty()
  }
}

impl fmt::Display for AttributeSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.tokens.join("."))
  }
}
