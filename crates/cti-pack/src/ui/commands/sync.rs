use std::path::Path;

use crossterm::style::Stylize;

use crate::{pkg::Package, ui::Colors};

pub async fn sync_package(package_dir: &Path, colors: &Colors) -> anyhow::Result<()> {
  let package = Package::open(package_dir)?;
  package.sync()?;

  println!(
    "{} {}",
    "Synced embedded spec into".with(colors.primary()),
    package.ramlx_dir().display().to_string().with(colors.value())
  );
  Ok(())
}
