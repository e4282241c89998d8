use std::fmt;

use crate::identifier::{Identifier, Segment, Version};

/// The reason a concrete identifier failed to match a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchFailure {
  RootMismatch { pattern: String, concrete: String },
  SegmentCount { pattern: usize, concrete: usize },
  TokenMismatch { segment: usize, pattern: String, concrete: String },
  VersionMismatch { segment: usize, pattern: Version, concrete: Version },
  ConcreteIsPattern,
}

impl fmt::Display for MatchFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::RootMismatch { pattern, concrete } => {
        write!(f, "root '{concrete}' does not match '{pattern}'")
      }
      Self::SegmentCount { pattern, concrete } => {
        write!(f, "pattern has {pattern} segments but identifier has {concrete}")
      }
      Self::TokenMismatch {
        segment,
        pattern,
        concrete,
      } => write!(f, "segment {segment}: '{concrete}' does not match '{pattern}'"),
      Self::VersionMismatch {
        segment,
        pattern,
        concrete,
      } => write!(f, "segment {segment}: version {concrete} does not match {pattern}"),
      Self::ConcreteIsPattern => write!(f, "matched identifier must be concrete"),
    }
  }
}

/// Structurally matches `concrete` against `pattern`.
///
/// Matching is prefix-aware: the pattern may name an ancestor chain of the
/// concrete identifier. Within each segment, `*` tokens match any concrete
/// token, a wildcard tail matches any remaining tokens and version, and
/// versions compare numerically with wildcard components matching anything.
pub fn match_pattern(pattern: &Identifier, concrete: &Identifier) -> Result<(), MatchFailure> {
  if concrete.is_pattern() {
    return Err(MatchFailure::ConcreteIsPattern);
  }
  match_structural(pattern, concrete)
}

/// Like [`match_pattern`], but the matched side may itself be a pattern:
/// a wildcard on the outer side accepts anything, while a wildcard on the
/// inner side only survives under an outer wildcard. Used to check that a
/// redeclared reference refines the inherited one.
pub fn match_refinement(outer: &Identifier, inner: &Identifier) -> Result<(), MatchFailure> {
  match_structural(outer, inner)
}

fn match_structural(pattern: &Identifier, concrete: &Identifier) -> Result<(), MatchFailure> {
  let pattern_segments = pattern.segments();
  let concrete_segments = concrete.segments();

  if pattern_segments.len() > concrete_segments.len() {
    return Err(MatchFailure::SegmentCount {
      pattern: pattern_segments.len(),
      concrete: concrete_segments.len(),
    });
  }

  for (i, (ps, cs)) in pattern_segments.iter().zip(concrete_segments).enumerate() {
    match_segment(i, ps, cs)?;
  }

  Ok(())
}

fn match_segment(index: usize, pattern: &Segment, concrete: &Segment) -> Result<(), MatchFailure> {
  let fail_root = || MatchFailure::RootMismatch {
    pattern: pattern.to_string(),
    concrete: concrete.to_string(),
  };

  match_token(index, &pattern.vendor, &concrete.vendor)?;
  match_token(index, &pattern.package, &concrete.package)?;

  if pattern.wildcard_tail {
    // Whatever entity tokens precede the star still have to line up.
    if pattern.entity.len() > concrete.entity.len() {
      return Err(fail_root());
    }
    for (p, c) in pattern.entity.iter().zip(&concrete.entity) {
      match_token(index, p, c)?;
    }
    return Ok(());
  }

  if pattern.entity.len() != concrete.entity.len() {
    return Err(fail_root());
  }
  for (p, c) in pattern.entity.iter().zip(&concrete.entity) {
    match_token(index, p, c)?;
  }

  match (pattern.version, concrete.version) {
    (Some(pv), Some(cv)) => match_version(index, pv, cv),
    (None, _) => Ok(()),
    (Some(pv), None) => Err(MatchFailure::VersionMismatch {
      segment: index,
      pattern: pv,
      concrete: Version { major: None, minor: None },
    }),
  }
}

fn match_token(segment: usize, pattern: &str, concrete: &str) -> Result<(), MatchFailure> {
  if pattern == "*" || pattern == concrete {
    Ok(())
  } else {
    Err(MatchFailure::TokenMismatch {
      segment,
      pattern: pattern.to_string(),
      concrete: concrete.to_string(),
    })
  }
}

fn match_version(segment: usize, pattern: Version, concrete: Version) -> Result<(), MatchFailure> {
  let component_ok = |p: Option<u64>, c: Option<u64>| p.is_none() || p == c;
  if component_ok(pattern.major, concrete.major) && component_ok(pattern.minor, concrete.minor) {
    Ok(())
  } else {
    Err(MatchFailure::VersionMismatch {
      segment,
      pattern,
      concrete,
    })
  }
}
