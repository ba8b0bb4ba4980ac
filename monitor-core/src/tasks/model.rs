use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a submitted task. Never reused within a process lifetime.
pub type TaskId = u64;

/// A deferred unit of work as seen by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    id: TaskId,
    description: String,
    created_time: DateTime<Utc>,
    /// When the caller wants the task to run. Informational only.
    #[serde(rename = "run_time")]
    scheduled_run_time: DateTime<Utc>,
    #[serde(rename = "is_finished")]
    finished: bool,
}

impl TaskRecord {
    pub(crate) fn new(
        id: TaskId,
        description: String,
        created_time: DateTime<Utc>,
        scheduled_run_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            description,
            created_time,
            scheduled_run_time,
            finished: false,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_time(&self) -> DateTime<Utc> {
        self.created_time
    }

    pub fn scheduled_run_time(&self) -> DateTime<Utc> {
        self.scheduled_run_time
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn wire_names_match_dashboard() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let record = TaskRecord::new(4, "backup".into(), at, at);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["id"], 4);
        assert_eq!(json["description"], "backup");
        assert_eq!(json["run_time"], "2024-05-01T12:00:00Z");
        assert_eq!(json["created_time"], "2024-05-01T12:00:00Z");
        assert_eq!(json["is_finished"], false);
    }
}
