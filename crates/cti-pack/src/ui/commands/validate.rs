use std::path::Path;

use anyhow::Context;
use crossterm::style::Stylize;

use crate::{pkg::Package, ui::Colors};

pub async fn validate_package(package_dir: &Path, colors: &Colors) -> anyhow::Result<()> {
  let package = Package::open(package_dir)?;
  let issues = package
    .validate_cached()
    .context("no usable metadata cache; run the RAML frontend to produce one")?;

  if issues.is_empty() {
    println!(
      "{} {}",
      package.index.package_id.clone().with(colors.value()),
      "is valid".with(colors.success())
    );
    return Ok(());
  }

  for issue in &issues {
    eprintln!("{} {issue}", "error:".with(colors.accent()));
  }
  anyhow::bail!("validation failed with {} issue(s)", issues.len());
}
