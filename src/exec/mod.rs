//! Stage execution: the stage graph, encode parameters, and the executor that drives the
//! external transcoder for each stage.

pub mod encode;
pub mod executor;
pub mod stage;

pub use encode::{BlurRegion, ColorPreset, QualityPreset, RenderOptions};
pub use executor::{MediaRef, RenderedOutputs, TransformExecutor, check_output};
pub use stage::StageKind;
