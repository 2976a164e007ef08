use crate::foundation::error::{RecutError, RecutResult};

/// Tolerance used when comparing timestamps in seconds.
pub const TIME_EPSILON: f64 = 1e-6;

/// Half-open time range `[start, end)` in seconds of source time.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// Inclusive start in seconds.
    pub start: f64,
    /// Exclusive end in seconds.
    pub end: f64,
}

impl TimeRange {
    /// Create a validated range with finite bounds and `start < end`.
    pub fn new(start: f64, end: f64) -> RecutResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(RecutError::validation("time range bounds must be finite"));
        }
        if start < 0.0 {
            return Err(RecutError::validation("time range start must be >= 0"));
        }
        if end <= start {
            return Err(RecutError::validation(format!(
                "time range end ({end:.3}) must be greater than start ({start:.3})"
            )));
        }
        Ok(Self { start, end })
    }

    /// Length of the range in seconds.
    pub fn duration(self) -> f64 {
        self.end - self.start
    }

    /// Split into consecutive pieces no longer than `max_len` seconds.
    ///
    /// The last piece carries the remainder. `max_len <= 0` yields the range itself.
    pub fn split(self, max_len: f64) -> Vec<TimeRange> {
        if max_len <= 0.0 || self.duration() <= max_len + TIME_EPSILON {
            return vec![self];
        }
        let mut out = Vec::new();
        let mut t = self.start;
        while t < self.end - TIME_EPSILON {
            let end = (t + max_len).min(self.end);
            out.push(TimeRange { start: t, end });
            t = end;
        }
        out
    }
}

/// Format seconds the way ffmpeg time options expect them (`12.345`).
pub fn format_secs(t: f64) -> String {
    format!("{:.3}", t.max(0.0))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
