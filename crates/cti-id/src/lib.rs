//! Cross-domain Type Identifier (CTI) model.
//!
//! A CTI is a dotted, hierarchical identifier with versioned segments and
//! `~`-separated descendant chains, e.g.
//! `cti.a.p.message.v1.0~a.p.email_message.v1.0`. This crate parses and
//! formats identifiers, derives parent/base relations, matches concrete
//! identifiers against patterns, and parses `@a.b.c` attribute selectors.
//!
//! The crate is pure and stateless; nothing here touches schemas, packages,
//! or the filesystem.

mod identifier;
mod matching;
mod selector;

pub use identifier::{Identifier, ParseError, Segment, Version};
pub use matching::{MatchFailure, match_pattern, match_refinement};
pub use selector::{AttributeSelector, SelectorError};

#[cfg(test)]
mod tests;
