use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cuts::{CutPolicy, ZigzagTail};
use crate::exec::{BlurRegion, ColorPreset, QualityPreset, RenderOptions};
use crate::foundation::core::TimeRange;
use crate::foundation::error::{RecutError, RecutResult};
use crate::monitor::MonitorConfig;
use crate::recovery::RetryPolicy;
use crate::scene::SegmenterConfig;
use crate::workspace::WorkspaceConfig;

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> RecutResult<T> {
    let f = File::open(path)
        .map_err(|e| RecutError::validation(format!("open {what} '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| RecutError::validation(format!("parse {what} '{}': {e}", path.display())))
}

/// Options for one pipeline run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Drop everything before this many seconds.
    pub trim_in: Option<f64>,
    /// Drop everything after this many seconds.
    pub trim_out: Option<f64>,
    /// Leading audio below this level is removed.
    pub silence_threshold_db: f64,
    /// Boundary sensitivity in `(0, 1)`; lower yields more boundaries.
    pub scene_sensitivity: f64,
    pub min_cut_seconds: f64,
    pub max_cut_seconds: f64,
    pub quality_preset: QualityPreset,
    pub hardware_acceleration: bool,
    pub color_preset: ColorPreset,
    /// Where final outputs are written.
    pub output_dir: PathBuf,
    /// Cut sampling seed; a random one is drawn (and reported) when absent.
    pub seed: Option<u64>,
    pub zigzag_tail: ZigzagTail,
    /// Frame-signal sampling rate.
    pub sample_fps: f64,
    pub min_scene_seconds: f64,
    pub blur_regions: Vec<BlurRegion>,
    pub panning: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            trim_in: None,
            trim_out: None,
            silence_threshold_db: -40.0,
            scene_sensitivity: 0.3,
            min_cut_seconds: 3.0,
            max_cut_seconds: 7.0,
            quality_preset: QualityPreset::default(),
            hardware_acceleration: false,
            color_preset: ColorPreset::default(),
            output_dir: PathBuf::from("."),
            seed: None,
            zigzag_tail: ZigzagTail::default(),
            sample_fps: 2.0,
            min_scene_seconds: 3.0,
            blur_regions: Vec::new(),
            panning: false,
        }
    }
}

impl Settings {
    pub fn from_path(path: impl AsRef<Path>) -> RecutResult<Self> {
        read_json(path.as_ref(), "settings JSON")
    }

    /// Reject settings no stage could honour.
    pub fn validate(&self) -> RecutResult<()> {
        self.trim_range()?;
        if !(self.silence_threshold_db.is_finite() && self.silence_threshold_db <= 0.0) {
            return Err(RecutError::policy(format!(
                "silence threshold must be a finite dB value <= 0, got {}",
                self.silence_threshold_db
            )));
        }
        if !(self.sample_fps.is_finite() && self.sample_fps > 0.0) {
            return Err(RecutError::policy("sample fps must be > 0"));
        }
        self.segmenter_config().validate()?;
        self.cut_policy(0).validate()?;
        for region in &self.blur_regions {
            region.validate()?;
        }
        Ok(())
    }

    /// Trim window, or `None` when no trim was requested.
    pub fn trim_range(&self) -> RecutResult<Option<TimeRange>> {
        if self.trim_in.is_none() && self.trim_out.is_none() {
            return Ok(None);
        }
        let start = self.trim_in.unwrap_or(0.0);
        let end = self.trim_out.unwrap_or(f64::MAX);
        TimeRange::new(start, end)
            .map(Some)
            .map_err(|e| RecutError::policy(format!("invalid trim window: {e}")))
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            sensitivity: self.scene_sensitivity,
            min_scene_duration: self.min_scene_seconds,
        }
    }

    pub fn cut_policy(&self, seed: u64) -> CutPolicy {
        CutPolicy {
            min_duration: self.min_cut_seconds,
            max_duration: self.max_cut_seconds,
            seed,
            zigzag_tail: self.zigzag_tail,
        }
    }

    pub fn render_options(&self, hardware_encoder: &str) -> RenderOptions {
        RenderOptions {
            quality: self.quality_preset,
            hardware_acceleration: self.hardware_acceleration,
            hardware_encoder: hardware_encoder.to_owned(),
        }
    }
}

/// Process-wide engine configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub workspace: WorkspaceConfig,
    /// Hard wall-clock limit for every transcoder invocation.
    pub stage_timeout_secs: u64,
    pub retry: RetryPolicy,
    pub monitor: MonitorConfig,
    /// Encoder used when a run asks for hardware acceleration.
    pub hardware_encoder: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceConfig::default(),
            stage_timeout_secs: 300,
            retry: RetryPolicy::default(),
            monitor: MonitorConfig::default(),
            hardware_encoder: "h264_nvenc".to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> RecutResult<Self> {
        read_json(path.as_ref(), "engine config JSON")
    }

    pub fn validate(&self) -> RecutResult<()> {
        if self.stage_timeout_secs == 0 {
            return Err(RecutError::policy("stage_timeout_secs must be > 0"));
        }
        if self.workspace.prefix.is_empty() {
            return Err(RecutError::policy("workspace prefix must not be empty"));
        }
        self.retry.validate()?;
        self.monitor.validate()
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/settings.rs"]
mod tests;
