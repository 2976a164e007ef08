/// Seconds per chunk on the first `split_into_chunks` attempt; halved on each later attempt.
pub const CHUNK_SECONDS_BASE: f64 = 120.0;

/// Highest quality reduction step an encoder understands.
pub const MAX_QUALITY_STEP: u8 = 3;

/// Fallback execution modes, tried in [`DegradeStrategy::ORDER`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeStrategy {
    /// Reduce encoding preset, resolution and bitrate.
    RetryLowerQuality,
    /// Disable hardware acceleration and force the baseline codec path.
    RetrySoftwareEncoding,
    /// Reprocess in bounded-duration chunks sequentially.
    SplitIntoChunks,
    /// Disable all effects; minimal encode only.
    EmergencyBasic,
}

impl DegradeStrategy {
    pub const ORDER: [DegradeStrategy; 4] = [
        DegradeStrategy::RetryLowerQuality,
        DegradeStrategy::RetrySoftwareEncoding,
        DegradeStrategy::SplitIntoChunks,
        DegradeStrategy::EmergencyBasic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DegradeStrategy::RetryLowerQuality => "retry_lower_quality",
            DegradeStrategy::RetrySoftwareEncoding => "retry_software_encoding",
            DegradeStrategy::SplitIntoChunks => "split_into_chunks",
            DegradeStrategy::EmergencyBasic => "emergency_basic",
        }
    }

    /// Execution profile for the `attempt`-th (1-based) try of this strategy.
    ///
    /// The very first rung (`retry_lower_quality`, attempt 1) is the undegraded profile.
    pub fn profile(self, attempt: u32) -> DegradeProfile {
        let step = u8::try_from(attempt.saturating_sub(1)).unwrap_or(u8::MAX);
        match self {
            DegradeStrategy::RetryLowerQuality => DegradeProfile {
                quality_step: step.min(MAX_QUALITY_STEP),
                ..DegradeProfile::NONE
            },
            DegradeStrategy::RetrySoftwareEncoding => DegradeProfile {
                quality_step: 1,
                software_only: true,
                ..DegradeProfile::NONE
            },
            DegradeStrategy::SplitIntoChunks => DegradeProfile {
                quality_step: 1,
                software_only: true,
                chunk_seconds: Some(CHUNK_SECONDS_BASE / f64::from(1u32 << step.min(8))),
                effects_disabled: false,
            },
            DegradeStrategy::EmergencyBasic => DegradeProfile {
                quality_step: MAX_QUALITY_STEP,
                software_only: true,
                chunk_seconds: None,
                effects_disabled: true,
            },
        }
    }
}

impl std::fmt::Display for DegradeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage should degrade its work for one attempt.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DegradeProfile {
    /// 0 = caller's quality; each step lowers preset, resolution and bitrate.
    pub quality_step: u8,
    /// Never use hardware encoders or decoders.
    pub software_only: bool,
    /// Process the input in chunks of at most this many seconds.
    pub chunk_seconds: Option<f64>,
    /// Skip optional filters (blur, colour, pan) and pass media through.
    pub effects_disabled: bool,
}

impl DegradeProfile {
    pub const NONE: DegradeProfile = DegradeProfile {
        quality_step: 0,
        software_only: false,
        chunk_seconds: None,
        effects_disabled: false,
    };

    pub fn is_degraded(&self) -> bool {
        *self != Self::NONE
    }
}

impl Default for DegradeProfile {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
#[path = "../../tests/unit/recovery/strategy.rs"]
mod tests;
