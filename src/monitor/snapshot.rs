use crate::foundation::error::{RecutError, RecutResult};

/// Coarse system health classification, ordered from best to worst.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLevel {
    /// Plenty of headroom.
    #[default]
    Normal,
    /// Getting tight; keep going.
    Warning,
    /// Pause non-critical work and reclaim space.
    Critical,
}

/// Raw system metrics at one instant.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ResourceSnapshot {
    /// Free space on the workspace volume, in GiB.
    pub free_disk_gb: f64,
    /// Used physical memory, percent of total.
    pub memory_percent: f32,
    /// Global CPU utilisation, percent.
    pub cpu_percent: f32,
    /// When the sample was taken.
    pub sampled_at: chrono::DateTime<chrono::Utc>,
}

impl ResourceSnapshot {
    /// Snapshot stamped with the current time.
    pub fn now(free_disk_gb: f64, memory_percent: f32, cpu_percent: f32) -> Self {
        Self {
            free_disk_gb,
            memory_percent,
            cpu_percent,
            sampled_at: chrono::Utc::now(),
        }
    }
}

/// Per-metric classification.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricLevels {
    /// Disk free space.
    pub disk: ResourceLevel,
    /// Memory usage.
    pub memory: ResourceLevel,
    /// CPU usage.
    pub cpu: ResourceLevel,
}

impl MetricLevels {
    /// Worst of the three.
    pub fn overall(self) -> ResourceLevel {
        self.disk.max(self.memory).max(self.cpu)
    }
}

/// Classification thresholds.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Critical below this many GiB free.
    pub disk_critical_gb: f64,
    /// Warning below this many GiB free.
    pub disk_warning_gb: f64,
    /// Warning above this memory percentage.
    pub memory_warning_percent: f32,
    /// Critical above this memory percentage.
    pub memory_critical_percent: f32,
    /// Warning above this CPU percentage.
    pub cpu_warning_percent: f32,
    /// Critical above this CPU percentage.
    pub cpu_critical_percent: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            disk_critical_gb: 10.0,
            disk_warning_gb: 20.0,
            memory_warning_percent: 75.0,
            memory_critical_percent: 90.0,
            cpu_warning_percent: 85.0,
            cpu_critical_percent: 90.0,
        }
    }
}

impl Thresholds {
    /// Reject warning thresholds that are looser than their critical counterparts.
    pub fn validate(&self) -> RecutResult<()> {
        if self.disk_critical_gb > self.disk_warning_gb {
            return Err(RecutError::policy(
                "disk critical threshold must not exceed the warning threshold",
            ));
        }
        if self.memory_warning_percent > self.memory_critical_percent {
            return Err(RecutError::policy(
                "memory warning threshold must not exceed the critical threshold",
            ));
        }
        if self.cpu_warning_percent > self.cpu_critical_percent {
            return Err(RecutError::policy(
                "cpu warning threshold must not exceed the critical threshold",
            ));
        }
        Ok(())
    }

    /// Classify each metric of `snap` independently.
    pub fn metric_levels(&self, snap: &ResourceSnapshot) -> MetricLevels {
        let disk = if snap.free_disk_gb < self.disk_critical_gb {
            ResourceLevel::Critical
        } else if snap.free_disk_gb < self.disk_warning_gb {
            ResourceLevel::Warning
        } else {
            ResourceLevel::Normal
        };
        MetricLevels {
            disk,
            memory: above(
                snap.memory_percent,
                self.memory_warning_percent,
                self.memory_critical_percent,
            ),
            cpu: above(
                snap.cpu_percent,
                self.cpu_warning_percent,
                self.cpu_critical_percent,
            ),
        }
    }

    /// Instantaneous classification of one snapshot.
    pub fn classify(&self, snap: &ResourceSnapshot) -> ResourceLevel {
        self.metric_levels(snap).overall()
    }
}

fn above(value: f32, warning: f32, critical: f32) -> ResourceLevel {
    if value > critical {
        ResourceLevel::Critical
    } else if value > warning {
        ResourceLevel::Warning
    } else {
        ResourceLevel::Normal
    }
}

/// Classifier that only reports memory/CPU as critical once it has been sustained.
///
/// Disk pressure is reported immediately. A memory or CPU spike shorter than
/// `sustain_samples` consecutive samples is reported as a warning.
#[derive(Clone, Debug)]
pub struct SustainedClassifier {
    thresholds: Thresholds,
    sustain_samples: u32,
    memory_streak: u32,
    cpu_streak: u32,
}

impl SustainedClassifier {
    /// New classifier with empty streaks. `sustain_samples` of 0 behaves like 1.
    pub fn new(thresholds: Thresholds, sustain_samples: u32) -> Self {
        Self {
            thresholds,
            sustain_samples: sustain_samples.max(1),
            memory_streak: 0,
            cpu_streak: 0,
        }
    }

    /// Fold `snap` into the streaks and return the effective level.
    pub fn observe(&mut self, snap: &ResourceSnapshot) -> ResourceLevel {
        let raw = self.thresholds.metric_levels(snap);
        let memory = sustain(raw.memory, &mut self.memory_streak, self.sustain_samples);
        let cpu = sustain(raw.cpu, &mut self.cpu_streak, self.sustain_samples);
        MetricLevels {
            disk: raw.disk,
            memory,
            cpu,
        }
        .overall()
    }
}

fn sustain(level: ResourceLevel, streak: &mut u32, needed: u32) -> ResourceLevel {
    if level == ResourceLevel::Critical {
        *streak = streak.saturating_add(1);
        if *streak >= needed {
            ResourceLevel::Critical
        } else {
            ResourceLevel::Warning
        }
    } else {
        *streak = 0;
        level
    }
}

#[cfg(test)]
#[path = "../../tests/unit/monitor/snapshot.rs"]
mod tests;
