//! # Event Bus
//!
//! Completion events emitted by detached workers and the metrics refresher.
//!
//! Registry state is the source of truth; events are the telemetry hook on top of
//! it. They are the only place where a `reload` is observable at all, and the
//! server forwards them to dashboard clients over a websocket.

use serde::Serialize;
use tokio::sync::broadcast;

/// Something a background worker finished doing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// **ServiceRegistry**: install effect done, the service is now STOPPED.
    ServiceInstalled { name: String },

    /// **ServiceRegistry**: start effect applied.
    ServiceStarted { name: String },

    /// **ServiceRegistry**: stop effect applied.
    ServiceStopped { name: String },

    /// **ServiceRegistry**: reload effect done. No state changed.
    ServiceReloaded { name: String },

    /// **ServiceRegistry**: uninstall effect done, the record is gone.
    ServiceRemoved { name: String },

    /// **TaskRegistry**: the task's completion worker marked it finished.
    TaskFinished { id: u64 },

    /// **Refresher**: a new snapshot was published.
    MetricsRefreshed,

    /// **Refresher**: a cycle failed; the previous snapshot stays visible.
    MetricsRefreshFailed { reason: String },
}

/// A wrapper around a tokio broadcast channel.
///
/// Cloning is cheap: all clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Creates a new EventBus holding up to `capacity` undelivered events per
    /// subscriber. Slow subscribers skip old events (Lagged).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: MonitorEvent) {
        // No subscribers is the normal case when nobody watches the dashboard.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(MonitorEvent::TaskFinished { id: 3 });

        assert_eq!(rx.recv().await.unwrap(), MonitorEvent::TaskFinished { id: 3 });
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::default().publish(MonitorEvent::MetricsRefreshed);
    }

    #[test]
    fn events_serialize_with_a_type_tag() {
        let json = serde_json::to_value(MonitorEvent::ServiceReloaded { name: "web".into() })
            .unwrap();
        assert_eq!(json, serde_json::json!({"type": "service_reloaded", "name": "web"}));
    }
}
