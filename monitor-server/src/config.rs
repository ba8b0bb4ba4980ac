//! Layered configuration of the monitor binary.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. the TOML file named by `--config` (skipped when missing)
//! 3. environment variables, e.g. `MONITOR_SERVER__PORT=9000` or
//!    `MONITOR_MONITOR__WORKERS__MAX_CONCURRENT_EFFECTS=8`
//! 4. command line flags

use crate::args::Args;
use config::{Config, Environment, File};
use monitor_core::config::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
    pub log_level: String,
    /// Buffered events per websocket subscriber before it starts lagging.
    pub event_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            static_dir: PathBuf::from("static"),
            log_level: "info".to_string(),
            event_capacity: 256,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
}

impl AppConfig {
    /// Builds the effective configuration for a run of the binary.
    pub fn load(args: &Args) -> anyhow::Result<Self> {
        let mut config = Self::from_sources(args.config_path())?;
        if let Some(port) = args.port() {
            config.server.port = port;
        }
        if let Some(level) = args.log_level() {
            config.server.log_level = level.to_string();
        }
        config.validate()?;
        Ok(config)
    }

    fn from_sources(path: &Path) -> anyhow::Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("MONITOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.event_capacity == 0 {
            anyhow::bail!("server.event_capacity must be greater than zero");
        }
        self.monitor.validate()?;
        Ok(())
    }
}
