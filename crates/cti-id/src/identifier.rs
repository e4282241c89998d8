use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Parse failures for CTI strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
  #[error("empty token at position {0}")]
  EmptyToken(usize),

  #[error("invalid version token '{0}'")]
  InvalidVersion(String),

  #[error("invalid identifier structure: {0}")]
  InvalidStructure(String),
}

/// A `vN.M` version pair. A `None` component is a wildcard and only occurs
/// in pattern identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
  pub major: Option<u64>,
  pub minor: Option<u64>,
}

impl Version {
  pub fn new(major: u64, minor: u64) -> Self {
    Self {
      major: Some(major),
      minor: Some(minor),
    }
  }

  pub fn is_wildcard(&self) -> bool {
    self.major.is_none() || self.minor.is_none()
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.major, self.minor) {
      (Some(major), Some(minor)) => write!(f, "v{major}.{minor}"),
      (Some(major), None) => write!(f, "v{major}.*"),
      (None, Some(minor)) => write!(f, "v*.{minor}"),
      (None, None) => write!(f, "v*.*"),
    }
  }
}

/// One `~`-separated expression segment: vendor, package, at least one
/// entity name token, and a version. A segment ending in a bare `*` has
/// `wildcard_tail` set and carries whatever tokens preceded the star.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
  pub vendor: String,
  pub package: String,
  pub entity: Vec<String>,
  pub version: Option<Version>,
  pub wildcard_tail: bool,
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}", self.vendor, self.package)?;
    for token in &self.entity {
      write!(f, ".{token}")?;
    }
    if let Some(version) = &self.version {
      write!(f, ".{version}")?;
    }
    if self.wildcard_tail {
      write!(f, ".*")?;
    }
    Ok(())
  }
}

/// A parsed CTI identifier.
///
/// Equality, ordering, and hashing are by canonical string form, which is
/// also what [`fmt::Display`] emits, so `parse(format(parse(s)))` is a
/// fixed point for every valid `s`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier {
  segments: Vec<Segment>,
  attribute: Option<String>,
}

impl Identifier {
  /// Parses a CTI string.
  ///
  /// The grammar is `cti.` followed by one or more `~`-separated segments,
  /// each `vendor.package.name[.name...].vN.M`, with an optional trailing
  /// `@a.b.c` attribute selector on the whole identifier.
  pub fn parse(input: &str) -> Result<Self, ParseError> {
    let Some(rest) = input.strip_prefix("cti.") else {
      return Err(ParseError::InvalidStructure(format!(
        "identifier must start with 'cti.': '{input}'"
      )));
    };

    let (rest, attribute) = match rest.split_once('@') {
      Some((head, attr)) => (head, Some(attr.to_string())),
      None => (rest, None),
    };

    if rest.is_empty() {
      return Err(ParseError::InvalidStructure("identifier has no segments".to_string()));
    }

    let mut segments = Vec::new();
    for chunk in rest.split('~') {
      segments.push(parse_segment(chunk)?);
    }

    // A wildcard tail only makes sense on the last segment of a pattern.
    if let Some(pos) = segments.iter().position(|s| s.wildcard_tail || s.version.is_none())
      && pos + 1 != segments.len()
    {
      return Err(ParseError::InvalidStructure(
        "wildcard segment must be the final segment".to_string(),
      ));
    }

    Ok(Self { segments, attribute })
  }

  /// The `~`-separated expression segments, root first.
  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// The attribute selector text after `@`, if any.
  pub fn attribute(&self) -> Option<&str> {
    self.attribute.as_deref()
  }

  /// Whether the identifier names a root type (no `~` chain).
  pub fn is_root(&self) -> bool {
    self.segments.len() == 1
  }

  /// Whether any segment carries a wildcard, i.e. the identifier is only
  /// usable as a pattern.
  pub fn is_pattern(&self) -> bool {
    self.segments.iter().any(|s| {
      s.wildcard_tail
        || s.version.is_none_or(|v| v.is_wildcard())
        || s.vendor == "*"
        || s.package == "*"
        || s.entity.iter().any(|t| t == "*")
    })
  }

  /// Everything before the last `~` segment, or the identifier itself when
  /// it is a root.
  pub fn parent(&self) -> Self {
    if self.is_root() {
      return self.without_attribute();
    }
    Self {
      segments: self.segments[..self.segments.len() - 1].to_vec(),
      attribute: None,
    }
  }

  /// The root type: everything before the first `~`.
  pub fn base(&self) -> Self {
    Self {
      segments: vec![self.segments[0].clone()],
      attribute: None,
    }
  }

  fn without_attribute(&self) -> Self {
    Self {
      segments: self.segments.clone(),
      attribute: None,
    }
  }
}

impl fmt::Display for Identifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "cti.")?;
    for (i, segment) in self.segments.iter().enumerate() {
      if i > 0 {
        write!(f, "~")?;
      }
      write!(f, "{segment}")?;
    }
    if let Some(attribute) = &self.attribute {
      write!(f, "@{attribute}")?;
    }
    Ok(())
  }
}

impl FromStr for Identifier {
  type Err = ParseError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::parse(s)
  }
}

impl PartialOrd for Identifier {
  fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Identifier {
  fn cmp(&self, other: &Self) -> std::cmp::Ordering {
    self.to_string().cmp(&other.to_string())
  }
}

impl Serialize for Identifier {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Identifier {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
  }
}

fn parse_segment(chunk: &str) -> Result<Segment, ParseError> {
  let tokens: Vec<&str> = chunk.split('.').collect();
  for (i, token) in tokens.iter().enumerate() {
    if token.is_empty() {
      return Err(ParseError::EmptyToken(i));
    }
  }

  // A trailing version pair wins over a bare `*` tail, so `v1.*` keeps its
  // major constraint and only `...package.*` becomes a wildcard tail.
  let (body, version, wildcard_tail) = match tokens[..] {
    [ref body @ .., penultimate, last] if parse_version_pair(penultimate, last).is_some() => {
      (body, parse_version_pair(penultimate, last), false)
    }
    [ref body @ .., "*"] if body.len() >= 2 => (body, None, true),
    _ => {
      return Err(ParseError::InvalidVersion(chunk.to_string()));
    }
  };

  if !wildcard_tail && body.len() < 3 {
    return Err(ParseError::InvalidStructure(format!(
      "segment '{chunk}' needs vendor, package, and an entity name"
    )));
  }

  for token in body {
    validate_token(token, chunk)?;
  }

  Ok(Segment {
    vendor: body[0].to_string(),
    package: body[1].to_string(),
    entity: body[2..].iter().map(ToString::to_string).collect(),
    version,
    wildcard_tail,
  })
}

fn parse_version_pair(major_token: &str, minor_token: &str) -> Option<Version> {
  let major = major_token.strip_prefix('v')?;
  let major = match major {
    "*" => None,
    digits => Some(digits.parse::<u64>().ok()?),
  };
  let minor = match minor_token {
    "*" => None,
    digits => Some(digits.parse::<u64>().ok()?),
  };
  Some(Version { major, minor })
}

fn validate_token(token: &str, segment: &str) -> Result<(), ParseError> {
  if token == "*" {
    return Ok(());
  }
  let mut chars = token.chars();
  let head_ok = chars.next().is_some_and(|c| c.is_ascii_lowercase() || c == '_');
  let tail_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
  if head_ok && tail_ok {
    Ok(())
  } else {
    Err(ParseError::InvalidStructure(format!(
      "invalid token '{token}' in segment '{segment}'"
    )))
  }
}
