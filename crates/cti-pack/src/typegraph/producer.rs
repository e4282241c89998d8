use std::path::Path;

use super::TypeGraph;

/// The seam to the RAML frontend.
///
/// `library` is the in-memory `#%RAML 1.0 Library` index text synthesised
/// by the package layer; `base_dir` is the package root the frontend
/// resolves relative includes against. Implementations live outside this
/// crate; tests drive the pipeline with in-code graphs.
pub trait TypeGraphProducer {
  fn produce(&self, library: &str, base_dir: &Path) -> anyhow::Result<TypeGraph>;
}

/// Stands in when no RAML frontend is linked into the binary. Producing
/// always fails, so package preparation falls back to the metadata cache
/// published packages ship.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredFrontend;

impl TypeGraphProducer for UnconfiguredFrontend {
  fn produce(&self, _library: &str, _base_dir: &Path) -> anyhow::Result<TypeGraph> {
    anyhow::bail!("no RAML frontend is configured")
  }
}
