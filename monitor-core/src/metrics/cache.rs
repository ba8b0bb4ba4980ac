use super::model::MetricsSnapshot;
use super::provider::{collect_snapshot, MetricsProvider};
use crate::config::DelayRange;
use crate::error::CollectionError;
use crate::events::{EventBus, MonitorEvent};
use crate::locks;
use log::{info, warn};
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The last successfully collected snapshot.
///
/// Readers get a shared pointer; publishing swaps the pointer under a write
/// lock held only for the swap itself.
#[derive(Debug, Default)]
pub struct MetricsCache {
    current: RwLock<Option<Arc<MetricsSnapshot>>>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The published snapshot, or `None` before the first successful refresh.
    ///
    /// Never triggers a collection.
    pub fn read(&self) -> Option<Arc<MetricsSnapshot>> {
        locks::read(&self.current).clone()
    }

    fn publish(&self, snapshot: MetricsSnapshot) {
        let snapshot = Arc::new(snapshot);
        *locks::write(&self.current) = Some(snapshot);
    }
}

/// Periodically rebuilds the snapshot from a [`MetricsProvider`].
///
/// Use `Refresher::new(...)` to create it and `spawn()` to start the loop.
pub struct Refresher {
    cache: Arc<MetricsCache>,
    provider: Arc<dyn MetricsProvider>,
    period: DelayRange,
    bus: EventBus,
}

impl Refresher {
    pub fn new(
        cache: Arc<MetricsCache>,
        provider: Arc<dyn MetricsProvider>,
        period: DelayRange,
        bus: EventBus,
    ) -> Self {
        Self {
            cache,
            provider,
            period,
            bus,
        }
    }

    /// Runs one collection and publishes it if every section succeeded.
    ///
    /// On failure the previously published snapshot stays in place.
    pub async fn refresh_once(&self) -> Result<(), CollectionError> {
        let provider = self.provider.clone();
        let result = tokio::task::spawn_blocking(move || collect_snapshot(provider.as_ref()))
            .await
            .unwrap_or_else(|join_err| {
                Err(CollectionError::new("refresher", join_err.to_string()))
            });

        match result {
            Ok(snapshot) => {
                self.cache.publish(snapshot);
                info!("Refresher: Metrics updated in background.");
                self.bus.publish(MonitorEvent::MetricsRefreshed);
                Ok(())
            }
            Err(e) => {
                warn!("Refresher: Keeping previous snapshot, {}", e);
                self.bus.publish(MonitorEvent::MetricsRefreshFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Refreshes immediately, then once per jittered period, until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!("Refresher: Starting, period {:?}", self.period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.refresh_once() => {}
            }

            let wait = self.period.sample();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("Refresher: Stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::model::*;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::time::Duration;

    /// Every section reports the number of the collection attempt it belongs to.
    #[derive(Default)]
    struct CountingProvider {
        attempts: AtomicU64,
        fail_load: AtomicBool,
    }

    impl CountingProvider {
        fn attempt(&self) -> u64 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    impl MetricsProvider for CountingProvider {
        fn cpu(&self) -> Result<CpuStats, CollectionError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(CpuStats {
                usage: attempt as f64,
            })
        }
        fn memory(&self) -> Result<MemoryStats, CollectionError> {
            Ok(MemoryStats {
                total: self.attempt(),
                ..MemoryStats::default()
            })
        }
        fn disk(&self) -> Result<DiskStats, CollectionError> {
            Ok(DiskStats {
                total: self.attempt(),
                ..DiskStats::default()
            })
        }
        fn network(&self) -> Result<NetworkStats, CollectionError> {
            Ok(NetworkStats {
                bytes_sent: self.attempt(),
                bytes_recv: 0,
            })
        }
        fn interfaces(&self) -> Result<NetworkInterfaceStats, CollectionError> {
            Ok(NetworkInterfaceStats::default())
        }
        fn host(&self) -> Result<HostStats, CollectionError> {
            Ok(HostStats {
                uptime: self.attempt(),
                host_name: "test-host".into(),
                os: "linux".into(),
            })
        }
        fn load(&self) -> Result<LoadStats, CollectionError> {
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(CollectionError::new("load", "sensor offline"));
            }
            Ok(LoadStats {
                load1: self.attempt() as f64,
                ..LoadStats::default()
            })
        }
        fn processes(&self) -> Result<ProcessStats, CollectionError> {
            Ok(ProcessStats::default())
        }
    }

    fn refresher(provider: Arc<CountingProvider>) -> (Refresher, Arc<MetricsCache>, EventBus) {
        let _ = env_logger::builder().is_test(true).try_init();
        let cache = Arc::new(MetricsCache::new());
        let bus = EventBus::default();
        let refresher = Refresher::new(cache.clone(), provider, DelayRange::new(10, 10), bus.clone());
        (refresher, cache, bus)
    }

    #[tokio::test]
    async fn nothing_is_available_before_first_refresh() {
        let (_refresher, cache, _bus) = refresher(Arc::new(CountingProvider::default()));
        assert!(cache.read().is_none());
    }

    #[tokio::test]
    async fn successful_refresh_publishes_one_consistent_snapshot() {
        let provider = Arc::new(CountingProvider::default());
        let (refresher, cache, bus) = refresher(provider.clone());
        let mut rx = bus.subscribe();

        refresher.refresh_once().await.unwrap();

        let snapshot = cache.read().expect("snapshot published");
        assert_eq!(snapshot.cpu.usage, 1.0);
        assert_eq!(snapshot.memory.total, 1);
        assert_eq!(snapshot.disk.total, 1);
        assert_eq!(snapshot.net.bytes_sent, 1);
        assert_eq!(snapshot.host.uptime, 1);
        assert_eq!(snapshot.load.load1, 1.0);
        assert_eq!(rx.recv().await.unwrap(), MonitorEvent::MetricsRefreshed);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let provider = Arc::new(CountingProvider::default());
        let (refresher, cache, bus) = refresher(provider.clone());

        refresher.refresh_once().await.unwrap();
        let before = cache.read().unwrap();

        let mut rx = bus.subscribe();
        provider.fail_load.store(true, Ordering::SeqCst);
        let err = refresher.refresh_once().await.unwrap_err();
        assert_eq!(err.section, "load");

        let after = cache.read().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(*after, *before);
        assert!(matches!(
            rx.recv().await.unwrap(),
            MonitorEvent::MetricsRefreshFailed { .. }
        ));

        provider.fail_load.store(false, Ordering::SeqCst);
        refresher.refresh_once().await.unwrap();
        assert_eq!(cache.read().unwrap().cpu.usage, 3.0);
    }

    #[tokio::test]
    async fn failure_before_any_success_leaves_cache_empty() {
        let provider = Arc::new(CountingProvider::default());
        provider.fail_load.store(true, Ordering::SeqCst);
        let (refresher, cache, _bus) = refresher(provider);

        assert!(refresher.refresh_once().await.is_err());
        assert!(cache.read().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn loop_refreshes_periodically_until_shutdown() {
        let provider = Arc::new(CountingProvider::default());
        let (refresher, cache, _bus) = refresher(provider.clone());
        let shutdown = CancellationToken::new();

        let handle = refresher.spawn(shutdown.clone());

        // Refreshes right away, without waiting for the first period.
        for _ in 0..50 {
            if cache.read().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cache.read().is_some());

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert!(provider.attempt() >= 2);

        shutdown.cancel();
        handle.await.unwrap();
        let attempts = provider.attempt();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(provider.attempt(), attempts);
    }
}
