//! # Task Registry
//!
//! Deferred units of work. A task is stored the moment it is submitted and a
//! detached worker marks it finished once its simulated run is over.
//!
//! Ids come from a counter owned by the registry, never from the number of
//! stored tasks, so deleting a task can never make a later submission collide
//! with an existing one.

mod model;

pub use model::{TaskId, TaskRecord};

use crate::effect::Work;
use crate::error::RegistryError;
use crate::events::{EventBus, MonitorEvent};
use crate::locks;
use crate::worker::WorkerPool;
use chrono::{DateTime, Utc};
use log::{debug, info};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

struct Entry {
    record: TaskRecord,
    cancel: CancellationToken,
}

struct Tasks {
    entries: HashMap<TaskId, Entry>,
    next_id: TaskId,
}

pub struct TaskRegistry {
    tasks: RwLock<Tasks>,
    pool: Arc<WorkerPool>,
    bus: EventBus,
}

impl TaskRegistry {
    pub fn new(pool: Arc<WorkerPool>, bus: EventBus) -> Arc<Self> {
        Arc::new(Self {
            tasks: RwLock::new(Tasks {
                entries: HashMap::new(),
                next_id: 1,
            }),
            pool,
            bus,
        })
    }

    /// Stores a new unfinished task and launches its completion worker.
    ///
    /// Returns a copy of the record as stored.
    pub fn submit(
        self: &Arc<Self>,
        description: impl Into<String>,
        scheduled_run_time: DateTime<Utc>,
    ) -> TaskRecord {
        let cancel = self.pool.entity_token();
        let record = {
            let mut tasks = locks::write(&self.tasks);
            let id = tasks.next_id;
            tasks.next_id += 1;

            let record = TaskRecord::new(id, description.into(), Utc::now(), scheduled_run_time);
            tasks.entries.insert(
                id,
                Entry {
                    record: record.clone(),
                    cancel: cancel.clone(),
                },
            );
            record
        };

        info!(
            "TaskRegistry: Task {} submitted ({})",
            record.id(),
            record.description()
        );
        let registry = Arc::clone(self);
        let id = record.id();
        self.pool
            .spawn(Work::Task, id.to_string(), cancel, move || async move {
                registry.complete(id);
            });
        record
    }

    pub fn get(&self, id: TaskId) -> Result<TaskRecord, RegistryError> {
        locks::read(&self.tasks)
            .entries
            .get(&id)
            .map(|entry| entry.record.clone())
            .ok_or_else(|| RegistryError::task_not_found(id))
    }

    /// Removes the task and cancels its completion worker if it has not fired yet.
    pub fn delete(&self, id: TaskId) -> Result<(), RegistryError> {
        let entry = locks::write(&self.tasks)
            .entries
            .remove(&id)
            .ok_or_else(|| RegistryError::task_not_found(id))?;
        entry.cancel.cancel();
        info!("TaskRegistry: Task {} deleted", id);
        Ok(())
    }

    /// Snapshot of every task, sorted by id.
    pub fn list(&self) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = locks::read(&self.tasks)
            .entries
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_unstable_by_key(TaskRecord::id);
        records
    }

    pub fn len(&self) -> usize {
        locks::read(&self.tasks).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn complete(&self, id: TaskId) {
        let finished = {
            let mut tasks = locks::write(&self.tasks);
            match tasks.entries.get_mut(&id) {
                Some(entry) if !entry.record.is_finished() => {
                    entry.record.mark_finished();
                    Some(entry.record.description().to_string())
                }
                _ => None,
            }
        };

        match finished {
            Some(description) => {
                info!("TaskRegistry: Task {} finished ({})", id, description);
                self.bus.publish(MonitorEvent::TaskFinished { id });
            }
            None => debug!("TaskRegistry: Task {} gone before completion", id),
        }
    }
}
