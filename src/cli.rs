use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::constants::DEFAULT_CONFIG_NAME;

/// Command-line arguments for the log archive uploader.
///
/// Remote store settings come from the YAML file given with `--config`, then
/// from `--set key=value` overrides, then from environment variables.
#[derive(Parser, Debug)]
#[clap(
    name = "log-archive-uploader",
    about = "Ship rotated log archives to a Manta object store"
)]
pub struct Args {
    /// Verbose logging
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Path to configuration YAML file
    #[clap(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Override a setting, e.g. --set manta.retry_attempts=5 (repeatable)
    #[clap(long = "set", value_name = "KEY=VALUE", global = true)]
    pub overrides: Vec<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compress (optionally) and upload one elapsed-period log file
    Ship {
        /// The rotated log file, or its archive if it already carries the
        /// compression suffix
        file: PathBuf,

        /// Compression applied before upload: none, gz or zip.
        /// Inferred from the file name when omitted.
        #[clap(long)]
        compression: Option<String>,

        /// Upload an existing archive instead of compressing the file first
        #[clap(long)]
        already_compressed: bool,
    },

    /// Create a settings template
    InitConfig {
        /// Path to write the template to
        #[clap(default_value = DEFAULT_CONFIG_NAME)]
        path: PathBuf,
    },

    /// Resolve the configuration and report what would be used
    CheckConfig {
        /// Also load the signing key and probe the remote log directory
        #[clap(long)]
        connect: bool,
    },
}
