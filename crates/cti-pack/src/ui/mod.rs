pub mod cli;
pub mod colors;
pub mod commands;

pub use cli::{Cli, Commands, PkgCommands};
pub use colors::Colors;
