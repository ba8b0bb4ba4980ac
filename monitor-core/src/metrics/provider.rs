use super::model::*;
use crate::error::CollectionError;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use sysinfo::{
    Disks, Networks, ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users,
    MINIMUM_CPU_UPDATE_INTERVAL,
};

/// The abstraction over the operating system's metric sources.
///
/// Every call is blocking and independently fallible. Callers run it off the
/// async runtime.
pub trait MetricsProvider: Send + Sync {
    fn cpu(&self) -> Result<CpuStats, CollectionError>;

    fn memory(&self) -> Result<MemoryStats, CollectionError>;

    /// Usage of the configured mount point.
    fn disk(&self) -> Result<DiskStats, CollectionError>;

    fn network(&self) -> Result<NetworkStats, CollectionError>;

    fn interfaces(&self) -> Result<NetworkInterfaceStats, CollectionError>;

    fn host(&self) -> Result<HostStats, CollectionError>;

    fn load(&self) -> Result<LoadStats, CollectionError>;

    fn processes(&self) -> Result<ProcessStats, CollectionError>;
}

/// Runs every sub-collection and assembles a snapshot.
///
/// The first failing section aborts the whole collection: a snapshot is all or nothing.
pub fn collect_snapshot(provider: &dyn MetricsProvider) -> Result<MetricsSnapshot, CollectionError> {
    Ok(MetricsSnapshot {
        cpu: provider.cpu()?,
        memory: provider.memory()?,
        disk: provider.disk()?,
        net: provider.network()?,
        host: provider.host()?,
        load: provider.load()?,
        processes: provider.processes()?,
        network_interfaces: provider.interfaces()?,
        collected_at: Utc::now(),
    })
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// [`MetricsProvider`] backed by the `sysinfo` crate.
///
/// The `System` handle is kept between collections so CPU usage, which is a
/// delta between two refreshes, stays meaningful for processes too.
pub struct SysinfoProvider {
    system: Mutex<System>,
    disk_mount: PathBuf,
}

impl SysinfoProvider {
    pub fn new(disk_mount: impl Into<PathBuf>) -> Self {
        Self {
            system: Mutex::new(System::new()),
            disk_mount: disk_mount.into(),
        }
    }

    fn system(&self) -> MutexGuard<'_, System> {
        self.system.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsProvider for SysinfoProvider {
    fn cpu(&self) -> Result<CpuStats, CollectionError> {
        let mut system = self.system();
        system.refresh_cpu_usage();
        std::thread::sleep(MINIMUM_CPU_UPDATE_INTERVAL);
        system.refresh_cpu_usage();

        if system.cpus().is_empty() {
            return Err(CollectionError::new("cpu", "no cpu reported"));
        }
        Ok(CpuStats {
            usage: f64::from(system.global_cpu_usage()),
        })
    }

    fn memory(&self) -> Result<MemoryStats, CollectionError> {
        let mut system = self.system();
        system.refresh_memory();

        let total = system.total_memory();
        if total == 0 {
            return Err(CollectionError::new("memory", "total memory reported as zero"));
        }
        let used = system.used_memory();
        Ok(MemoryStats {
            total,
            available: system.available_memory(),
            used,
            used_percent: percent(used, total),
        })
    }

    fn disk(&self) -> Result<DiskStats, CollectionError> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .list()
            .iter()
            .find(|disk| disk.mount_point() == self.disk_mount.as_path())
            .ok_or_else(|| {
                CollectionError::new(
                    "disk",
                    format!("mount point {} not found", self.disk_mount.display()),
                )
            })?;

        let total = disk.total_space();
        let free = disk.available_space();
        let used = total.saturating_sub(free);
        Ok(DiskStats {
            total,
            free,
            used,
            used_percent: percent(used, total),
        })
    }

    fn network(&self) -> Result<NetworkStats, CollectionError> {
        let networks = Networks::new_with_refreshed_list();
        if networks.is_empty() {
            return Err(CollectionError::new("network", "no interface counters"));
        }
        let (bytes_sent, bytes_recv) = networks.iter().fold((0, 0), |(sent, recv), (_, data)| {
            (sent + data.total_transmitted(), recv + data.total_received())
        });
        Ok(NetworkStats {
            bytes_sent,
            bytes_recv,
        })
    }

    fn interfaces(&self) -> Result<NetworkInterfaceStats, CollectionError> {
        let networks = Networks::new_with_refreshed_list();
        let mut interfaces: Vec<NetworkInterface> = networks
            .iter()
            .map(|(name, data)| NetworkInterface {
                name: name.clone(),
                mac_address: data.mac_address().to_string(),
                ips: data
                    .ip_networks()
                    .iter()
                    .map(|net| format!("{}/{}", net.addr, net.prefix))
                    .collect(),
            })
            .collect();
        interfaces.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(NetworkInterfaceStats { interfaces })
    }

    fn host(&self) -> Result<HostStats, CollectionError> {
        let host_name =
            System::host_name().ok_or_else(|| CollectionError::new("host", "no host name"))?;
        Ok(HostStats {
            uptime: System::uptime(),
            host_name,
            os: std::env::consts::OS.to_string(),
        })
    }

    fn load(&self) -> Result<LoadStats, CollectionError> {
        let load = System::load_average();
        Ok(LoadStats {
            load1: load.one,
            load5: load.five,
            load15: load.fifteen,
        })
    }

    fn processes(&self) -> Result<ProcessStats, CollectionError> {
        let mut system = self.system();
        system.refresh_memory();
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cpu()
                .with_memory()
                .with_user(UpdateKind::OnlyIfNotSet),
        );
        let total_memory = system.total_memory();
        let users = Users::new_with_refreshed_list();

        let mut processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .filter_map(|(pid, process)| {
                // Processes we cannot attribute to a user are skipped, not fatal.
                let username = process
                    .user_id()
                    .and_then(|uid| users.get_user_by_id(uid))
                    .map(|user| user.name().to_string())?;
                Some(ProcessInfo {
                    pid: pid.as_u32(),
                    name: process.name().to_string_lossy().into_owned(),
                    cpu_usage: f64::from(process.cpu_usage()),
                    mem_usage: percent(process.memory(), total_memory) as f32,
                    username,
                })
            })
            .collect();
        processes.sort_by_key(|p| p.pid);
        Ok(ProcessStats { processes })
    }
}
