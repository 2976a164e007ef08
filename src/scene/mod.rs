//! Scene segmentation: turns a per-frame similarity signal into contiguous scenes.

/// Scene and signal data types.
pub mod model;
/// Boundary detection and short-scene merge filter.
pub mod segmenter;
/// Colour histograms and histogram correlation for frame similarity.
pub mod signal;

pub use model::{Scene, SignalPoint};
pub use segmenter::{SceneSegmenter, SegmenterConfig, filter_scenes};
pub use signal::{SimilarityTracker, color_histogram, histogram_correlation};
