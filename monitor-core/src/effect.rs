//! The "hands" of the registries.
//!
//! Nothing in the monitor really installs or starts anything: every effect is a
//! wait. The wait sits behind [`EffectExecutor`] so tests can swap the random
//! real-time delay for something deterministic.

use crate::config::DelayConfig;
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Kind of simulated work a detached worker performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Work {
    Install,
    Start,
    Stop,
    Reload,
    Uninstall,
    Task,
}

impl fmt::Display for Work {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Work::Install => "install",
            Work::Start => "start",
            Work::Stop => "stop",
            Work::Reload => "reload",
            Work::Uninstall => "uninstall",
            Work::Task => "task",
        };
        f.write_str(s)
    }
}

impl Work {
    /// What happens to the entity when this work is abandoned on timeout.
    pub fn abandoned_state(self) -> &'static str {
        match self {
            Work::Install => "stays INSTALLING",
            Work::Start => "never becomes STARTED",
            Work::Stop => "never becomes STOPPED",
            Work::Reload => "keeps its status, no reload is reported",
            Work::Uninstall => "stays UNINSTALLING until restart",
            Work::Task => "stays unfinished",
        }
    }
}

/// Abstraction over "wait N time units".
///
/// Implement this for real-time delays, zero delays, or anything a test needs.
#[async_trait]
pub trait EffectExecutor: Send + Sync {
    /// Performs `work` for `subject` (a service name or task id).
    /// Returns once the simulated work is done.
    async fn perform(&self, work: Work, subject: &str);
}

/// Random real-time delay drawn from a per-work range.
#[derive(Debug, Clone)]
pub struct SimulatedDelay {
    delays: DelayConfig,
}

impl SimulatedDelay {
    pub fn new(delays: DelayConfig) -> Self {
        Self { delays }
    }

    fn duration_for(&self, work: Work) -> Duration {
        let range = match work {
            Work::Install => self.delays.install,
            Work::Start => self.delays.start,
            Work::Stop => self.delays.stop,
            Work::Reload => self.delays.reload,
            Work::Uninstall => self.delays.uninstall,
            Work::Task => self.delays.task,
        };
        range.sample()
    }
}

#[async_trait]
impl EffectExecutor for SimulatedDelay {
    async fn perform(&self, work: Work, subject: &str) {
        let delay = self.duration_for(work);
        debug!("Effect: {} '{}' takes {:?}", work, subject, delay);
        tokio::time::sleep(delay).await;
    }
}

/// Completes every effect immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl EffectExecutor for NoDelay {
    async fn perform(&self, _work: Work, _subject: &str) {
        tokio::task::yield_now().await;
    }
}
