//! Tunables for the registries, the worker pool and the metrics refresher.
//!
//! Every struct here has a `Default` with the stock dashboard timings, so an
//! empty configuration file yields a working monitor.

use crate::error::ConfigError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Inclusive range of whole seconds a simulated effect may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl DelayRange {
    pub const fn new(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    /// Draws a uniformly distributed duration from the range.
    pub fn sample(&self) -> Duration {
        let secs = if self.min_secs >= self.max_secs {
            self.min_secs
        } else {
            rand::thread_rng().gen_range(self.min_secs..=self.max_secs)
        };
        Duration::from_secs(secs)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.min_secs > self.max_secs {
            return Err(ConfigError::InvalidRange {
                field,
                min: self.min_secs,
                max: self.max_secs,
            });
        }
        Ok(())
    }
}

/// Delay range per kind of simulated work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DelayConfig {
    pub install: DelayRange,
    pub start: DelayRange,
    pub stop: DelayRange,
    pub reload: DelayRange,
    pub uninstall: DelayRange,
    pub task: DelayRange,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            install: DelayRange::new(1, 5),
            start: DelayRange::new(1, 3),
            stop: DelayRange::new(1, 2),
            reload: DelayRange::new(1, 5),
            uninstall: DelayRange::new(1, 10),
            task: DelayRange::new(1, 10),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Upper bound on simulated effects running at the same time.
    pub max_concurrent_effects: usize,
    /// Abandon an effect that runs longer than this. `None` disables the limit.
    ///
    /// An abandoned effect writes nothing. A timed-out install stays
    /// INSTALLING until the service is uninstalled; a timed-out uninstall stays
    /// UNINSTALLING until the process restarts. Timed-out tasks stay
    /// unfinished until deleted.
    pub effect_timeout_secs: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_effects: 64,
            effect_timeout_secs: None,
        }
    }
}

impl WorkerConfig {
    pub fn effect_timeout(&self) -> Option<Duration> {
        self.effect_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between two refreshes, drawn from `[refresh_min_secs, refresh_max_secs]`.
    pub refresh_min_secs: u64,
    pub refresh_max_secs: u64,
    /// Mount point reported in the disk section.
    pub disk_mount: PathBuf,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            refresh_min_secs: 10,
            refresh_max_secs: 20,
            disk_mount: PathBuf::from("/"),
        }
    }
}

impl MetricsConfig {
    pub fn refresh_period(&self) -> DelayRange {
        DelayRange::new(self.refresh_min_secs, self.refresh_max_secs)
    }
}

/// Everything `monitor-core` can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub workers: WorkerConfig,
    pub delays: DelayConfig,
    pub metrics: MetricsConfig,
}

impl MonitorConfig {
    /// Rejects values that deserialize fine but cannot be honoured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.max_concurrent_effects == 0 {
            return Err(ConfigError::Zero("workers.max_concurrent_effects"));
        }
        if self.workers.effect_timeout_secs == Some(0) {
            return Err(ConfigError::Zero("workers.effect_timeout_secs"));
        }
        self.delays.install.validate("delays.install")?;
        self.delays.start.validate("delays.start")?;
        self.delays.stop.validate("delays.stop")?;
        self.delays.reload.validate("delays.reload")?;
        self.delays.uninstall.validate("delays.uninstall")?;
        self.delays.task.validate("delays.task")?;
        if self.metrics.refresh_min_secs == 0 {
            return Err(ConfigError::Zero("metrics.refresh_min_secs"));
        }
        self.metrics.refresh_period().validate("metrics.refresh")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(MonitorConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut config = MonitorConfig::default();
        config.delays.stop = DelayRange::new(4, 2);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidRange {
                field: "delays.stop",
                min: 4,
                max: 2
            })
        );
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = MonitorConfig::default();
        config.workers.max_concurrent_effects = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sample_stays_in_range() {
        let range = DelayRange::new(1, 3);
        for _ in 0..100 {
            let d = range.sample();
            assert!(d >= Duration::from_secs(1) && d <= Duration::from_secs(3));
        }
        assert_eq!(DelayRange::new(2, 2).sample(), Duration::from_secs(2));
    }

    #[test]
    fn partial_toml_like_input_keeps_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"metrics": {"refresh_min_secs": 2}}"#).unwrap();
        assert_eq!(config.metrics.refresh_min_secs, 2);
        assert_eq!(config.metrics.refresh_max_secs, 20);
        assert_eq!(config.delays.install, DelayRange::new(1, 5));
    }
}
