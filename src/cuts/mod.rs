//! Randomised sub-clip sampling per scene and the zigzag playback order.

/// Cut sampling.
pub mod generator;
/// Zigzag permutation.
pub mod zigzag;

pub use generator::{Cut, CutPolicy, generate_cuts, generate_cuts_with};
pub use zigzag::{ZigzagTail, zigzag, zigzag_with};
