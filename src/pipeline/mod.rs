//! Pipeline orchestration: settings, progress reporting, the stage sequence, and the run
//! registry used by front ends.

pub mod orchestrator;
pub mod progress;
pub mod service;
pub mod settings;

pub use orchestrator::{CutPlan, Pipeline, PipelineOutput};
pub use progress::{Progress, ProgressHandle, RunStatus};
pub use service::{PipelineService, RunId, RunOutcome};
pub use settings::{EngineConfig, Settings};
