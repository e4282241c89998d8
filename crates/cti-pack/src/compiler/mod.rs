//! The metadata pipeline: collect, transform, validate.
//!
//! The collector turns a frontend type graph into registry entities; the
//! transformer links parents, folds inheritance, inlines `cti.schema`
//! references, and harvests annotations; the validator checks the final
//! registry and reports every problem it finds rather than stopping at
//! the first.

mod collector;
mod transformer;
mod validator;

#[cfg(test)]
mod tests;

pub use collector::{CollectError, Collector};
pub use transformer::{TransformError, Transformer};
pub use validator::{ValidationIssue, Validator};

use crate::{
  registry::Registry,
  typegraph::{TypeGraph, recursive_declarations},
};

#[derive(Debug, thiserror::Error)]
pub enum CompileError {
  #[error("collecting entities")]
  Collect(#[source] CollectError),

  #[error("transforming registry")]
  Transform(#[source] TransformError),
}

/// Counters reported by the CLI after a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileStats {
  pub types_collected: usize,
  pub instances_collected: usize,
  /// Declarations participating in reference cycles, in sorted order.
  pub recursive_declarations: Vec<String>,
}

/// Runs collect + transform over one type graph and returns the populated
/// registry.
pub fn compile(graph: &TypeGraph) -> Result<(Registry, CompileStats), CompileError> {
  let mut registry = Collector::new(graph).collect().map_err(CompileError::Collect)?;

  let stats = CompileStats {
    types_collected: registry.types().count(),
    instances_collected: registry.instances().count(),
    recursive_declarations: recursive_declarations(graph).into_iter().collect(),
  };

  Transformer::new(&mut registry)
    .transform()
    .map_err(CompileError::Transform)?;

  Ok((registry, stats))
}
