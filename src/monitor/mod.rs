//! Background resource sampling.
//!
//! A [`ResourceMonitor`] owns a [`ResourceProbe`] and is the single writer of the latest
//! classified [`ResourceStatus`]. Any number of [`ResourceView`]s read it concurrently or
//! subscribe to level changes.

pub mod probe;
pub mod snapshot;

use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::cancel::CancelToken;
use crate::foundation::error::{RecutError, RecutResult};

pub use probe::{ResourceProbe, SysinfoProbe};
pub use snapshot::{MetricLevels, ResourceLevel, ResourceSnapshot, SustainedClassifier, Thresholds};

/// Sampling cadence and classification settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interval between samples.
    pub sample_interval_ms: u64,
    /// How long a disk reading stays fresh.
    pub disk_interval_ms: u64,
    /// Consecutive critical memory/CPU samples before the level turns critical.
    pub sustain_samples: u32,
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 2_000,
            disk_interval_ms: 30_000,
            sustain_samples: 3,
            thresholds: Thresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> RecutResult<()> {
        if self.sample_interval_ms == 0 {
            return Err(RecutError::policy("sample_interval_ms must be > 0"));
        }
        self.thresholds.validate()
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn disk_interval(&self) -> Duration {
        Duration::from_millis(self.disk_interval_ms)
    }
}

/// A snapshot together with its effective level.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceStatus {
    pub level: ResourceLevel,
    pub snapshot: ResourceSnapshot,
}

#[derive(Default)]
struct Shared {
    latest: RwLock<Option<ResourceStatus>>,
    subscribers: Mutex<Vec<mpsc::Sender<ResourceStatus>>>,
}

/// Read-only handle on the latest resource status.
#[derive(Clone, Default)]
pub struct ResourceView {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ResourceView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceView")
            .field("level", &self.level())
            .finish()
    }
}

impl ResourceView {
    /// View with no writer attached. Always reports [`ResourceLevel::Normal`].
    pub fn detached() -> Self {
        Self::default()
    }

    /// Latest published status, if any sample has been taken.
    pub fn latest(&self) -> Option<ResourceStatus> {
        match self.shared.latest.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Latest level; `Normal` before the first sample.
    pub fn level(&self) -> ResourceLevel {
        self.latest().map(|s| s.level).unwrap_or_default()
    }

    /// Receive every status whose level differs from the previous one.
    ///
    /// Sends never block the sampler; dropped receivers are pruned on the next change.
    pub fn subscribe(&self) -> mpsc::Receiver<ResourceStatus> {
        let (tx, rx) = mpsc::channel();
        let mut subs = match self.shared.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.push(tx);
        rx
    }

    fn publish(&self, status: ResourceStatus) {
        let previous = {
            let mut slot = match self.shared.latest.write() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.replace(status.clone()).map(|s| s.level)
        };
        if previous == Some(status.level) {
            return;
        }
        if previous.is_some() || status.level != ResourceLevel::Normal {
            tracing::info!(
                level = ?status.level,
                free_disk_gb = status.snapshot.free_disk_gb,
                memory_percent = status.snapshot.memory_percent,
                cpu_percent = status.snapshot.cpu_percent,
                "resource level changed"
            );
        }
        let mut subs = match self.shared.subscribers.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        subs.retain(|tx| tx.send(status.clone()).is_ok());
    }
}

struct Sampler {
    probe: Box<dyn ResourceProbe>,
    classifier: SustainedClassifier,
}

impl Sampler {
    fn tick(&mut self, view: &ResourceView) -> ResourceStatus {
        let snapshot = self.probe.sample();
        let level = self.classifier.observe(&snapshot);
        let status = ResourceStatus { level, snapshot };
        view.publish(status.clone());
        status
    }
}

/// Owner of the probe and the sampling thread.
///
/// Dropping the monitor stops and joins the thread.
pub struct ResourceMonitor {
    view: ResourceView,
    sampler: Arc<Mutex<Sampler>>,
    interval: Duration,
    stop: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ResourceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceMonitor")
            .field("interval", &self.interval)
            .field("running", &self.thread.is_some())
            .field("view", &self.view)
            .finish()
    }
}

impl ResourceMonitor {
    /// Monitor over `probe` that does not sample until [`tick`](Self::tick) or
    /// [`start`](Self::start) is called.
    pub fn new(probe: impl ResourceProbe, config: &MonitorConfig) -> RecutResult<Self> {
        config.validate()?;
        Ok(Self {
            view: ResourceView::default(),
            sampler: Arc::new(Mutex::new(Sampler {
                probe: Box::new(probe),
                classifier: SustainedClassifier::new(
                    config.thresholds.clone(),
                    config.sustain_samples,
                ),
            })),
            interval: config.sample_interval(),
            stop: CancelToken::new(),
            thread: None,
        })
    }

    /// Monitor on the host via `sysinfo`, watching the volume that holds `disk_path`.
    pub fn for_host(
        disk_path: impl Into<std::path::PathBuf>,
        config: &MonitorConfig,
    ) -> RecutResult<Self> {
        Self::new(
            SysinfoProbe::new(disk_path, config.disk_interval()),
            config,
        )
    }

    /// Convenience: [`new`](Self::new), one synchronous sample, then [`start`](Self::start).
    pub fn spawn(probe: impl ResourceProbe, config: &MonitorConfig) -> RecutResult<Self> {
        let mut monitor = Self::new(probe, config)?;
        monitor.tick();
        monitor.start()?;
        Ok(monitor)
    }

    /// Take one sample on the calling thread and publish it.
    pub fn tick(&self) -> ResourceStatus {
        let mut sampler = match self.sampler.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        sampler.tick(&self.view)
    }

    /// Start the background sampling thread. A no-op if it is already running.
    pub fn start(&mut self) -> RecutResult<()> {
        if self.thread.is_some() {
            return Ok(());
        }
        let sampler = Arc::clone(&self.sampler);
        let view = self.view.clone();
        let stop = self.stop.clone();
        let interval = self.interval;
        let handle = std::thread::Builder::new()
            .name("recut-monitor".to_owned())
            .spawn(move || {
                while stop.sleep(interval).is_ok() {
                    let mut s = match sampler.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    s.tick(&view);
                }
                tracing::debug!("resource monitor stopped");
            })?;
        self.thread = Some(handle);
        Ok(())
    }

    pub fn view(&self) -> ResourceView {
        self.view.clone()
    }

    /// Stop and join the sampling thread.
    pub fn stop(&mut self) {
        self.stop.cancel();
        if let Some(handle) = self.thread.take()
            && handle.join().is_err()
        {
            tracing::warn!("resource monitor thread panicked");
        }
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/monitor/monitor.rs"]
mod tests;
