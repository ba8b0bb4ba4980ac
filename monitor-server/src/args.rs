//! Command line flags of the monitor binary.
//!
//! Flags win over the configuration file and the environment.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the TOML configuration file (optional, defaults apply if missing)
    #[arg(short, long, default_value = "monitor.toml")]
    config: PathBuf,

    /// Port for the HTTP API to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter, e.g. `info` or `monitor_core=debug`
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    pub fn config_path(&self) -> &PathBuf {
        &self.config
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn log_level(&self) -> Option<&str> {
        self.log_level.as_deref()
    }
}
