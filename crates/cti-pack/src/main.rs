use clap::Parser;
use tracing_subscriber::EnvFilter;

use cti_pack::ui::{Cli, Commands, Colors, PkgCommands, colors, commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let colors = Colors::new(colors::colors_enabled(cli.color), colors::detect_theme(cli.theme));

  match &cli.command {
    Commands::Init { package_id } => commands::init_package(&cli.package_dir, package_id, &colors).await?,
    Commands::Pack(pack_command) => commands::pack_package(&cli.package_dir, pack_command, &colors).await?,
    Commands::Pkg { pkg_command } => match pkg_command {
      PkgCommands::Get { dependencies, cache_dir } => {
        commands::get_dependencies(&cli.package_dir, dependencies, cache_dir.as_ref(), &colors).await?;
      }
      PkgCommands::Tidy { cache_dir } => {
        commands::tidy_dependencies(&cli.package_dir, cache_dir.as_ref(), &colors).await?;
      }
    },
    Commands::Sync => commands::sync_package(&cli.package_dir, &colors).await?,
    Commands::Validate => commands::validate_package(&cli.package_dir, &colors).await?,
  }

  Ok(())
}
