//! # Service Registry
//!
//! In-memory database of simulated services and their lifecycle:
//!
//! ```text
//! (absent) --install--> INSTALLING --(effect)--> STOPPED
//! STOPPED  --start--> (effect) --> STARTED --stop--> (effect) --> STOPPED
//! any      --uninstall--> UNINSTALLING --(effect)--> (absent)
//! ```
//!
//! ## Rules
//! - Operations validate and record intent under the write lock, then return.
//! - The effect runs in a detached worker which re-takes the lock to apply it.
//! - A worker writes only if its record is still the same incarnation and its
//!   transition is still the latest one requested. Anything else is a no-op.
//! - `uninstall` cancels every pending worker of the service.

mod model;

pub use model::{ServiceRecord, ServiceStatus};

use crate::effect::Work;
use crate::error::RegistryError;
use crate::events::{EventBus, MonitorEvent};
use crate::locks;
use crate::worker::WorkerPool;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Registry-side bookkeeping around a record.
struct Entry {
    record: ServiceRecord,
    /// Distinguishes this install from earlier installs of the same name.
    incarnation: u64,
    /// Bumped by every accepted start/stop/uninstall. Workers carry the value
    /// they were launched with.
    transition: u64,
    /// Cancels every pending worker of this incarnation.
    cancel: CancellationToken,
}

/// Status-changing work. Reload and uninstall complete through their own paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Install,
    Start,
    Stop,
}

impl Transition {
    fn work(self) -> Work {
        match self {
            Transition::Install => Work::Install,
            Transition::Start => Work::Start,
            Transition::Stop => Work::Stop,
        }
    }

    /// Status written once the effect completes.
    fn target(self) -> ServiceStatus {
        match self {
            Transition::Install | Transition::Stop => ServiceStatus::Stopped,
            Transition::Start => ServiceStatus::Started,
        }
    }

    fn operation(self) -> &'static str {
        match self {
            Transition::Install => "install",
            Transition::Start => "start",
            Transition::Stop => "stop",
        }
    }

    fn event(self, name: &str) -> MonitorEvent {
        let name = name.to_string();
        match self {
            Transition::Install => MonitorEvent::ServiceInstalled { name },
            Transition::Start => MonitorEvent::ServiceStarted { name },
            Transition::Stop => MonitorEvent::ServiceStopped { name },
        }
    }
}

pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Entry>>,
    next_incarnation: AtomicU64,
    pool: Arc<WorkerPool>,
    bus: EventBus,
}

impl ServiceRegistry {
    pub fn new(pool: Arc<WorkerPool>, bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            services: RwLock::new(HashMap::new()),
            next_incarnation: AtomicU64::new(1),
            pool,
            bus,
        })
    }

    /// Registers `name` as INSTALLING. It becomes STOPPED once the install effect is done.
    pub fn install(self: &Arc<Self>, name: &str) -> Result<(), RegistryError> {
        let incarnation = self.next_incarnation.fetch_add(1, Ordering::Relaxed);
        let cancel = self.pool.entity_token();
        {
            let mut services = locks::write(&self.services);
            if services.contains_key(name) {
                return Err(RegistryError::service_exists(name));
            }
            services.insert(
                name.to_string(),
                Entry {
                    record: ServiceRecord::new(name, ServiceStatus::Installing),
                    incarnation,
                    transition: 0,
                    cancel: cancel.clone(),
                },
            );
        }

        info!("ServiceRegistry: Installing '{}'", name);
        self.spawn_transition(Transition::Install, name, incarnation, 0, cancel);
        Ok(())
    }

    /// Requests STARTED. Fails if the service is already STARTED.
    pub fn start(self: &Arc<Self>, name: &str) -> Result<(), RegistryError> {
        self.request_transition(Transition::Start, name)
    }

    /// Requests STOPPED. Fails if the service is already STOPPED.
    pub fn stop(self: &Arc<Self>, name: &str) -> Result<(), RegistryError> {
        self.request_transition(Transition::Stop, name)
    }

    /// Simulates a reload. The status never changes; completion is only
    /// visible in the log and as a [`MonitorEvent::ServiceReloaded`].
    pub fn reload(self: &Arc<Self>, name: &str) -> Result<(), RegistryError> {
        let (incarnation, cancel) = {
            let services = locks::read(&self.services);
            let entry = services
                .get(name)
                .ok_or_else(|| RegistryError::service_not_found(name))?;
            if entry.record.status() == ServiceStatus::Uninstalling {
                return Err(RegistryError::invalid_service_state(
                    name,
                    ServiceStatus::Uninstalling,
                    "reload",
                ));
            }
            (entry.incarnation, entry.cancel.clone())
        };

        info!("ServiceRegistry: Reloading '{}'", name);
        let registry = Arc::clone(self);
        let name = name.to_string();
        self.pool
            .spawn(Work::Reload, name.clone(), cancel, move || async move {
                registry.complete_reload(&name, incarnation);
            });
        Ok(())
    }

    /// Marks the service UNINSTALLING, cancels its pending workers and removes
    /// it once the uninstall effect is done.
    pub fn uninstall(self: &Arc<Self>, name: &str) -> Result<(), RegistryError> {
        let incarnation = {
            let mut services = locks::write(&self.services);
            let entry = services
                .get_mut(name)
                .ok_or_else(|| RegistryError::service_not_found(name))?;
            if entry.record.status() == ServiceStatus::Uninstalling {
                return Err(RegistryError::invalid_service_state(
                    name,
                    ServiceStatus::Uninstalling,
                    "uninstall",
                ));
            }
            entry.record.set_status(ServiceStatus::Uninstalling);
            entry.transition += 1;
            entry.cancel.cancel();
            entry.incarnation
        };

        info!("ServiceRegistry: Uninstalling '{}'", name);
        let registry = Arc::clone(self);
        let name = name.to_string();
        // The removal must survive the cancellation above, so it gets its own token.
        self.pool.spawn(
            Work::Uninstall,
            name.clone(),
            self.pool.entity_token(),
            move || async move {
                registry.complete_removal(&name, incarnation);
            },
        );
        Ok(())
    }

    /// Current record of `name` (GetStatus).
    pub fn get(&self, name: &str) -> Result<ServiceRecord, RegistryError> {
        locks::read(&self.services)
            .get(name)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| RegistryError::service_not_found(name))
    }

    /// Snapshot of every record, sorted by name.
    ///
    /// The returned vector is owned by the caller; later registry changes never show up in it.
    pub fn list(&self) -> Vec<ServiceRecord> {
        let mut records: Vec<ServiceRecord> = locks::read(&self.services)
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_unstable_by(|a, b| a.name().cmp(b.name()));
        records
    }

    pub fn len(&self) -> usize {
        locks::read(&self.services).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ---------------------------
    // Helpers
    // ---------------------------

    fn request_transition(
        self: &Arc<Self>,
        transition: Transition,
        name: &str,
    ) -> Result<(), RegistryError> {
        let (incarnation, sequence, cancel) = {
            let mut services = locks::write(&self.services);
            let entry = services
                .get_mut(name)
                .ok_or_else(|| RegistryError::service_not_found(name))?;
            let current = entry.record.status();
            if current == transition.target() || current == ServiceStatus::Uninstalling {
                return Err(RegistryError::invalid_service_state(
                    name,
                    current,
                    transition.operation(),
                ));
            }
            entry.transition += 1;
            (entry.incarnation, entry.transition, entry.cancel.clone())
        };

        info!(
            "ServiceRegistry: {} requested for '{}'",
            transition.operation(),
            name
        );
        self.spawn_transition(transition, name, incarnation, sequence, cancel);
        Ok(())
    }

    fn spawn_transition(
        self: &Arc<Self>,
        transition: Transition,
        name: &str,
        incarnation: u64,
        sequence: u64,
        cancel: CancellationToken,
    ) {
        let registry = Arc::clone(self);
        let name = name.to_string();
        self.pool
            .spawn(transition.work(), name.clone(), cancel, move || async move {
                registry.complete_transition(transition, &name, incarnation, sequence);
            });
    }

    fn complete_transition(
        &self,
        transition: Transition,
        name: &str,
        incarnation: u64,
        sequence: u64,
    ) {
        let target = transition.target();
        let operation = transition.operation();
        {
            let mut services = locks::write(&self.services);
            match services.get_mut(name) {
                Some(entry) if entry.incarnation == incarnation && entry.transition == sequence => {
                    entry.record.set_status(target);
                }
                Some(_) => {
                    debug!("ServiceRegistry: {} of '{}' superseded, skipped", operation, name);
                    return;
                }
                None => {
                    debug!("ServiceRegistry: '{}' gone before {} finished", name, operation);
                    return;
                }
            }
        }

        info!("ServiceRegistry: '{}' is now {}", name, target);
        self.bus.publish(transition.event(name));
    }

    fn complete_reload(&self, name: &str, incarnation: u64) {
        let alive = locks::read(&self.services)
            .get(name)
            .is_some_and(|entry| entry.incarnation == incarnation);
        if alive {
            info!("ServiceRegistry: '{}' reloaded successfully", name);
            self.bus.publish(MonitorEvent::ServiceReloaded {
                name: name.to_string(),
            });
        } else {
            debug!("ServiceRegistry: '{}' gone before reload finished", name);
        }
    }

    fn complete_removal(&self, name: &str, incarnation: u64) {
        let removed = {
            let mut services = locks::write(&self.services);
            let same = services
                .get(name)
                .is_some_and(|entry| entry.incarnation == incarnation);
            same && services.remove(name).is_some()
        };
        if removed {
            info!("ServiceRegistry: '{}' removed", name);
            self.bus.publish(MonitorEvent::ServiceRemoved {
                name: name.to_string(),
            });
        }
    }
}
