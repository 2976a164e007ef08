//! Recut turns a source video into a fair-use transformation of itself.
//!
//! A run trims the source, blurs selected regions, strips leading silence, segments the
//! result into scenes, samples one randomized short cut per scene, reorders the cuts in a
//! zigzag sequence, grades colour, and renders the deliverable. Every stage runs under a
//! [`RecoverySupervisor`] that degrades and retries on failure and pauses when the
//! [`ResourceMonitor`] reports critical pressure. All intermediates live in a
//! [`ScopedWorkspace`] that is reclaimed on every exit path.
//!
//! - [`Pipeline::run`] executes one run synchronously.
//! - [`PipelineService`] runs several in the background and tracks them by [`RunId`].
#![forbid(unsafe_code)]

mod foundation;

/// Cut sampling and zigzag ordering.
pub mod cuts;
/// Stage graph, encode parameters and the transform executor.
pub mod exec;
/// External media collaborators (`ffmpeg`, `ffprobe`).
pub mod media;
/// Background resource sampling and classification.
pub mod monitor;
/// Orchestration, settings, progress and the run registry.
pub mod pipeline;
/// Degrade-and-retry supervision.
pub mod recovery;
/// Scene segmentation.
pub mod scene;
/// Scoped artifact storage.
pub mod workspace;

pub use crate::foundation::cancel::CancelToken;
pub use crate::foundation::core::{TIME_EPSILON, TimeRange, format_secs};
pub use crate::foundation::error::{RecutError, RecutResult};

pub use crate::cuts::{Cut, CutPolicy, ZigzagTail, generate_cuts, zigzag, zigzag_with};
pub use crate::exec::{
    BlurRegion, ColorPreset, MediaRef, QualityPreset, StageKind, TransformExecutor,
};
pub use crate::media::{MediaInfo, MediaProbe, Transcoder};
pub use crate::monitor::{
    MonitorConfig, ResourceLevel, ResourceMonitor, ResourceSnapshot, ResourceView, Thresholds,
};
pub use crate::pipeline::{
    CutPlan, EngineConfig, Pipeline, PipelineOutput, PipelineService, Progress, ProgressHandle,
    RunId, RunOutcome, RunStatus, Settings,
};
pub use crate::recovery::{DegradeStrategy, RecoveryAttempt, RecoverySupervisor, RetryPolicy};
pub use crate::scene::{Scene, SceneSegmenter, SegmenterConfig};
pub use crate::workspace::{ArtifactHandle, ScopedWorkspace, WorkspaceConfig};
