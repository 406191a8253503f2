//! CLI commands

use std::path::PathBuf;

use clap::Args;
use shipyard_core::DEFAULT_COMPOSE_FILE;

pub mod convert;
pub mod down;
pub mod up;

/// Input files shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Compose file(s) to read, merged in order
    #[arg(
        short = 'f',
        long = "file",
        global = true,
        env = "SHIPYARD_FILE",
        value_delimiter = ',',
        default_value = DEFAULT_COMPOSE_FILE
    )]
    pub files: Vec<PathBuf>,

    /// Distributed application bundle (.dab) to read instead
    #[arg(short = 'b', long = "bundle", global = true, env = "SHIPYARD_BUNDLE")]
    pub bundle: Option<PathBuf>,
}
