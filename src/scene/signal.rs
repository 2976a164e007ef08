use crate::scene::model::SignalPoint;

const HUE_BINS: usize = 16;
const SAT_BINS: usize = 4;
const VAL_BINS: usize = 4;

/// Number of bins produced by [`color_histogram`].
pub const HISTOGRAM_BINS: usize = HUE_BINS * SAT_BINS * VAL_BINS;

/// Normalised hue/saturation/value histogram of a packed RGB24 frame.
///
/// Trailing bytes that do not form a full pixel are ignored. An empty frame yields an
/// all-zero histogram.
pub fn color_histogram(rgb: &[u8]) -> Vec<f32> {
    let mut hist = vec![0f32; HISTOGRAM_BINS];
    let mut n = 0u32;
    for px in rgb.chunks_exact(3) {
        let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
        let hb = ((h / 360.0) * HUE_BINS as f32) as usize;
        let sb = (s * SAT_BINS as f32) as usize;
        let vb = (v * VAL_BINS as f32) as usize;
        let idx = hb.min(HUE_BINS - 1) * SAT_BINS * VAL_BINS
            + sb.min(SAT_BINS - 1) * VAL_BINS
            + vb.min(VAL_BINS - 1);
        hist[idx] += 1.0;
        n += 1;
    }
    if n > 0 {
        let inv = 1.0 / n as f32;
        for b in &mut hist {
            *b *= inv;
        }
    }
    hist
}

fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };
    (h, s, max)
}

/// Pearson correlation between two histograms, in `[-1, 1]`.
///
/// Zero-variance input (e.g. two empty histograms) correlates as `1.0`. Histograms of
/// different lengths are compared over their common prefix.
pub fn histogram_correlation(a: &[f32], b: &[f32]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 1.0;
    }
    let mean_a = a[..n].iter().map(|&x| x as f64).sum::<f64>() / n as f64;
    let mean_b = b[..n].iter().map(|&x| x as f64).sum::<f64>() / n as f64;

    let (mut s12, mut s1, mut s2) = (0f64, 0f64, 0f64);
    for (&x, &y) in a[..n].iter().zip(&b[..n]) {
        let dx = x as f64 - mean_a;
        let dy = y as f64 - mean_b;
        s12 += dx * dy;
        s1 += dx * dx;
        s2 += dy * dy;
    }
    let denom = (s1 * s2).sqrt();
    if denom <= f64::EPSILON {
        return 1.0;
    }
    (s12 / denom).clamp(-1.0, 1.0)
}

/// Turns a stream of decoded frames into [`SignalPoint`]s.
#[derive(Debug, Default)]
pub struct SimilarityTracker {
    prev: Option<Vec<f32>>,
}

impl SimilarityTracker {
    /// Create a tracker with no previous frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the frame sampled at `time`.
    ///
    /// The first frame only primes the tracker and yields `None`.
    pub fn push_frame(&mut self, time: f64, rgb: &[u8]) -> Option<SignalPoint> {
        let hist = color_histogram(rgb);
        let point = self
            .prev
            .as_ref()
            .map(|prev| SignalPoint::new(time, histogram_correlation(prev, &hist)));
        self.prev = Some(hist);
        point
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/signal.rs"]
mod tests;
