use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, ValueHint};

use super::colors::{ColorMode, ThemeMode};
use crate::archive::ArchiveFormat;

#[derive(Parser, Debug)]
#[command(name = "cti-pack")]
#[command(author, version, about = "CTI package manager and metadata compiler")]
#[command(propagate_version = true)]
pub struct Cli {
  #[command(subcommand)]
  pub command: Commands,

  /// Coloring
  #[arg(
    long,
    value_enum,
    value_name = "WHEN",
    default_value = "auto",
    global = true,
    display_order = 100,
    help_heading = "Terminal Output"
  )]
  pub color: ColorMode,

  /// Theme
  #[arg(
    long,
    value_enum,
    value_name = "THEME",
    default_value = "auto",
    global = true,
    display_order = 100,
    help_heading = "Terminal Output"
  )]
  pub theme: ThemeMode,

  /// Package directory to operate on
  #[arg(
    short = 'd',
    long,
    value_name = "DIR",
    value_hint = ValueHint::DirPath,
    default_value = ".",
    global = true,
    display_order = 90
  )]
  pub package_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
  /// Create a new package in the target directory
  Init {
    /// Package identifier, e.g. `xyz.mock`
    #[arg(value_name = "PACKAGE_ID")]
    package_id: String,
  },

  /// Build a distributable archive from the package
  Pack(PackCommand),

  /// Manage package dependencies
  Pkg {
    #[command(subcommand)]
    pkg_command: PkgCommands,
  },

  /// Re-extract the embedded RAMLx spec into `.ramlx/`
  Sync,

  /// Validate the package metadata against its merged schemas
  Validate,
}

#[derive(Args, Debug, Clone)]
pub struct PackCommand {
  /// Archive format
  #[arg(long, value_enum, value_name = "FORMAT", default_value = "tgz")]
  pub format: FormatArg,

  /// Include package sources in the archive
  #[arg(long)]
  pub include_source: bool,

  /// Path prefix applied to every archive entry
  #[arg(long, value_name = "P")]
  pub prefix: Option<String>,

  /// Output file path
  #[arg(
    short,
    long,
    value_name = "O",
    value_hint = ValueHint::AnyPath
  )]
  pub output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum PkgCommands {
  /// Download and install dependencies
  Get {
    /// Dependencies as `<source>@<version>`; with none given, installs
    /// everything `index.json` declares
    #[arg(value_name = "PKG@VER")]
    dependencies: Vec<String>,

    /// Package cache directory
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    cache_dir: Option<PathBuf>,
  },

  /// Reinstall the dependency tree from `index.json` alone
  Tidy {
    /// Package cache directory
    #[arg(long, value_name = "DIR", value_hint = ValueHint::DirPath)]
    cache_dir: Option<PathBuf>,
  },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
  Tgz,
  Zip,
}

impl From<FormatArg> for ArchiveFormat {
  fn from(arg: FormatArg) -> Self {
    match arg {
      FormatArg::Tgz => Self::Tgz,
      FormatArg::Zip => Self::Zip,
    }
  }
}
