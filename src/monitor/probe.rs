use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sysinfo::{Disks, System};

use crate::monitor::snapshot::ResourceSnapshot;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Source of raw resource metrics. Called only from the monitor's sampling thread.
pub trait ResourceProbe: Send + 'static {
    /// Take one sample. Must be cheap and must not block for long.
    fn sample(&mut self) -> ResourceSnapshot;
}

/// [`ResourceProbe`] backed by `sysinfo`.
///
/// Memory and CPU refresh on every call; free disk space is cached for `disk_interval`.
pub struct SysinfoProbe {
    system: System,
    disk_path: PathBuf,
    disk_interval: Duration,
    disk_cache: Option<(Instant, f64)>,
}

impl SysinfoProbe {
    /// Probe that reports free space on the volume holding `disk_path`.
    pub fn new(disk_path: impl Into<PathBuf>, disk_interval: Duration) -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; establish the baseline now.
        system.refresh_cpu_usage();
        system.refresh_memory();
        Self {
            system,
            disk_path: disk_path.into(),
            disk_interval,
            disk_cache: None,
        }
    }

    fn free_disk_gb(&mut self) -> f64 {
        if let Some((at, gb)) = self.disk_cache
            && at.elapsed() < self.disk_interval
        {
            return gb;
        }
        let gb = free_space_for(&self.disk_path) / GIB;
        self.disk_cache = Some((Instant::now(), gb));
        gb
    }
}

impl ResourceProbe for SysinfoProbe {
    fn sample(&mut self) -> ResourceSnapshot {
        self.system.refresh_memory();
        self.system.refresh_cpu_usage();

        let total = self.system.total_memory();
        let memory_percent = if total == 0 {
            0.0
        } else {
            (self.system.used_memory() as f64 / total as f64 * 100.0) as f32
        };
        let cpu_percent = self.system.global_cpu_usage();
        let free_disk_gb = self.free_disk_gb();

        ResourceSnapshot::now(free_disk_gb, memory_percent, cpu_percent)
    }
}

/// Available bytes on the mounted volume whose mount point is the longest prefix of `path`.
///
/// Unknown volumes report `f64::MAX` so they never trip disk thresholds.
fn free_space_for(path: &Path) -> f64 {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())
        .map(|d| d.available_space() as f64)
        .unwrap_or(f64::MAX)
}
