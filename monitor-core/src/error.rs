use crate::services::ServiceStatus;
use thiserror::Error;

/// Errors returned by the synchronous part of a registry operation.
///
/// These are never retried and never swallowed: the caller always sees them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The operation referenced an entity absent from its registry.
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    /// `install` on a name that is already present.
    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },

    /// The requested transition is not allowed from the current status.
    #[error("{kind} '{key}' is {current}, cannot {operation}")]
    InvalidState {
        kind: &'static str,
        key: String,
        current: ServiceStatus,
        operation: &'static str,
    },
}

impl RegistryError {
    pub fn service_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "service",
            key: name.into(),
        }
    }

    pub fn task_not_found(id: u64) -> Self {
        Self::NotFound {
            kind: "task",
            key: id.to_string(),
        }
    }

    pub fn service_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            kind: "service",
            key: name.into(),
        }
    }

    pub fn invalid_service_state(
        name: impl Into<String>,
        current: ServiceStatus,
        operation: &'static str,
    ) -> Self {
        Self::InvalidState {
            kind: "service",
            key: name.into(),
            current,
            operation,
        }
    }
}

/// A metrics sub-collection failed.
///
/// Internal to the refresher: it causes the cycle to be skipped and is never
/// surfaced to snapshot readers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("collection of {section} failed: {reason}")]
pub struct CollectionError {
    pub section: &'static str,
    pub reason: String,
}

impl CollectionError {
    pub fn new(section: &'static str, reason: impl Into<String>) -> Self {
        Self {
            section,
            reason: reason.into(),
        }
    }
}

/// Configuration values that parse but make no sense.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid range for {field}: min {min} > max {max}")]
    InvalidRange {
        field: &'static str,
        min: u64,
        max: u64,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_entity() {
        assert_eq!(
            RegistryError::service_not_found("web").to_string(),
            "service 'web' not found"
        );
        assert_eq!(
            RegistryError::task_not_found(7).to_string(),
            "task '7' not found"
        );
        assert_eq!(
            RegistryError::invalid_service_state("web", ServiceStatus::Started, "start")
                .to_string(),
            "service 'web' is STARTED, cannot start"
        );
    }
}
