use std::path::{Path, PathBuf};

use crossterm::style::Stylize;

use crate::{
  pkg::{DependencySpec, Package},
  resolver::{GitStorage, Resolver},
  typegraph::UnconfiguredFrontend,
  ui::Colors,
};

fn cache_dir(package_dir: &Path, override_dir: Option<&PathBuf>) -> PathBuf {
  override_dir
    .cloned()
    .unwrap_or_else(|| package_dir.join(".cti-cache"))
}

/// `pkg get`: add the requested dependencies, or install the declared set
/// when none are given.
pub async fn get_dependencies(
  package_dir: &Path,
  dependencies: &[String],
  override_cache: Option<&PathBuf>,
  colors: &Colors,
) -> anyhow::Result<()> {
  let mut package = Package::open(package_dir)?;
  let resolver = Resolver::new(cache_dir(package_dir, override_cache), GitStorage::new());

  let resolved = if dependencies.is_empty() {
    resolver.install(&mut package, &UnconfiguredFrontend).await?
  } else {
    let specs = DependencySpec::parse_all(dependencies)?;
    resolver.add(&mut package, &specs, &UnconfiguredFrontend).await?
  };

  report(&resolved, colors);
  Ok(())
}

/// `pkg tidy`: reinstall the dependency tree from `index.json` alone.
pub async fn tidy_dependencies(
  package_dir: &Path,
  override_cache: Option<&PathBuf>,
  colors: &Colors,
) -> anyhow::Result<()> {
  let mut package = Package::open(package_dir)?;
  let resolver = Resolver::new(cache_dir(package_dir, override_cache), GitStorage::new());

  let resolved = resolver.install(&mut package, &UnconfiguredFrontend).await?;
  report(&resolved, colors);
  Ok(())
}

fn report(resolved: &[crate::resolver::ResolvedDependency], colors: &Colors) {
  if resolved.is_empty() {
    println!("{}", "Nothing to install".with(colors.primary()));
    return;
  }
  for dependency in resolved {
    println!(
      "{} {} {}",
      "Installed".with(colors.primary()),
      format!("{}@{}", dependency.index.package_id, dependency.version).with(colors.value()),
      format!("({})", dependency.integrity).with(colors.label())
    );
  }
}
