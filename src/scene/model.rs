/// A contiguous time range of source video delimited by detected visual discontinuity.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scene {
    /// Ordinal position in the scene list.
    pub id: usize,
    /// Start in seconds of source time.
    pub start: f64,
    /// End in seconds of source time (exclusive).
    pub end: f64,
    /// Confidence of the boundary that opens this scene, in `[0, 1]`.
    pub confidence: f32,
}

impl Scene {
    /// Scene length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// One sample of the frame-similarity signal.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SignalPoint {
    /// Timestamp of the sampled frame in seconds.
    pub time: f64,
    /// Similarity to the previous sampled frame (`1.0` = identical).
    pub similarity: f64,
}

impl SignalPoint {
    /// Convenience constructor.
    pub fn new(time: f64, similarity: f64) -> Self {
        Self { time, similarity }
    }
}
