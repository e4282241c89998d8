use std::path::{Path, PathBuf};

use anyhow::Context;
use crossterm::style::Stylize;

use crate::{
  archive::{ArchiveFormat, Archiver},
  pkg::Package,
  ui::{Colors, cli::PackCommand},
};

pub async fn pack_package(package_dir: &Path, command: &PackCommand, colors: &Colors) -> anyhow::Result<()> {
  let package = Package::open(package_dir)?;
  let registry = package
    .parse_cached()
    .context("no usable metadata cache; run the RAML frontend to produce one")?;

  let format: ArchiveFormat = command.format.into();
  let output: PathBuf = command
    .output
    .clone()
    .unwrap_or_else(|| package_dir.join(format!("{}.cti", package.index.package_id)));

  let mut archiver = Archiver::new(&package, &registry, format).include_sources(command.include_source);
  if let Some(prefix) = &command.prefix {
    archiver = archiver.prefix(prefix);
  }
  archiver
    .write_to(&output)
    .with_context(|| format!("packing {}", package.index.package_id))?;

  println!(
    "{} {}",
    "Packed".with(colors.primary()),
    output.display().to_string().with(colors.value())
  );
  println!(
    "{} {} {}",
    "  entities:".with(colors.label()),
    registry.len().to_string().with(colors.value()),
    format!("({format})").with(colors.label())
  );
  Ok(())
}
