use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a simulated service.
///
/// There is no "removed" variant: an uninstalled service leaves the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceStatus {
    Installing,
    Stopped,
    Started,
    Uninstalling,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ServiceStatus::Installing => "INSTALLING",
            ServiceStatus::Stopped => "STOPPED",
            ServiceStatus::Started => "STARTED",
            ServiceStatus::Uninstalling => "UNINSTALLING",
        };
        f.write_str(s)
    }
}

// Public Info struct for API responses (detached from the registry entry)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    name: String,
    status: ServiceStatus,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ServiceStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ServiceStatus) {
        self.status = status;
    }
}
