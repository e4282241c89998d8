use std::path::Path;

use crossterm::style::Stylize;

use crate::{pkg::Package, ui::Colors};

pub async fn init_package(package_dir: &Path, package_id: &str, colors: &Colors) -> anyhow::Result<()> {
  let package = Package::initialize(package_dir, package_id)?;

  println!(
    "{} {}",
    "Initialized package".with(colors.primary()),
    package.index.package_id.clone().with(colors.value())
  );
  println!(
    "{} {}",
    "  root:".with(colors.label()),
    package.root().display().to_string().with(colors.value())
  );
  Ok(())
}
