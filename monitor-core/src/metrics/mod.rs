//! Host metrics: the snapshot model, the provider seam and the published cache.
//!
//! Collection is delegated to a [`MetricsProvider`]. The [`Refresher`] is the
//! only writer of the [`MetricsCache`]; request handlers only ever read it.

mod cache;
mod model;
mod provider;

pub use cache::{MetricsCache, Refresher};
pub use model::{
    CpuStats, DiskStats, HostStats, LoadStats, MemoryStats, MetricsSnapshot, NetworkInterface,
    NetworkInterfaceStats, NetworkStats, ProcessInfo, ProcessStats,
};
pub use provider::{collect_snapshot, MetricsProvider, SysinfoProvider};
