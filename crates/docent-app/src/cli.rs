//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Docent - streaming retrieval-augmented assistant server.
#[derive(Debug, Parser)]
#[command(name = "docent", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.docent/config.toml")]
    pub config: PathBuf,

    /// Override the server port from the config file.
    #[arg(long)]
    pub port: Option<u16>,

    /// Override the data directory from the config file.
    #[arg(long)]
    pub data_dir: Option<String>,
}
