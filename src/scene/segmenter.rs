use crate::foundation::core::TIME_EPSILON;
use crate::foundation::error::{RecutError, RecutResult};
use crate::scene::model::{Scene, SignalPoint};

/// Tunables for [`SceneSegmenter`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Boundary sensitivity in `(0, 1)`. Lower values propose more boundaries.
    pub sensitivity: f64,
    /// Scenes shorter than this (seconds) are merged into a neighbour.
    pub min_scene_duration: f64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sensitivity: 0.3,
            min_scene_duration: 3.0,
        }
    }
}

impl SegmenterConfig {
    /// Reject out-of-range sensitivity or a non-positive minimum duration.
    pub fn validate(&self) -> RecutResult<()> {
        if !(self.sensitivity > 0.0 && self.sensitivity < 1.0) {
            return Err(RecutError::policy(format!(
                "scene sensitivity must be in (0, 1), got {}",
                self.sensitivity
            )));
        }
        if !(self.min_scene_duration.is_finite() && self.min_scene_duration > 0.0) {
            return Err(RecutError::policy(format!(
                "min scene duration must be > 0, got {}",
                self.min_scene_duration
            )));
        }
        Ok(())
    }

    /// Similarity below which a boundary is proposed.
    pub fn cutoff(&self) -> f64 {
        1.0 - self.sensitivity
    }
}

/// Pure segmenter over a similarity signal.
#[derive(Clone, Debug)]
pub struct SceneSegmenter {
    cfg: SegmenterConfig,
}

impl SceneSegmenter {
    /// Create a segmenter after validating `cfg`.
    pub fn new(cfg: SegmenterConfig) -> RecutResult<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    /// Active configuration.
    pub fn config(&self) -> &SegmenterConfig {
        &self.cfg
    }

    /// Segment an infallible signal covering `[0, duration)`.
    pub fn segment<I>(&self, signal: I, duration: f64) -> RecutResult<Vec<Scene>>
    where
        I: IntoIterator<Item = SignalPoint>,
    {
        self.try_segment(signal.into_iter().map(Ok), duration)
    }

    /// Segment a signal whose samples may fail to decode.
    ///
    /// Fails with [`RecutError::Segmentation`] when the signal is empty or `duration` is
    /// shorter than one `min_scene_duration` window. Decode errors propagate unchanged.
    pub fn try_segment<I>(&self, signal: I, duration: f64) -> RecutResult<Vec<Scene>>
    where
        I: IntoIterator<Item = RecutResult<SignalPoint>>,
    {
        if !duration.is_finite() || duration + TIME_EPSILON < self.cfg.min_scene_duration {
            return Err(RecutError::segmentation(format!(
                "source duration {duration:.3}s is shorter than one {:.3}s scene window",
                self.cfg.min_scene_duration
            )));
        }

        let cutoff = self.cfg.cutoff();
        let mut samples = 0usize;
        let mut last_time = f64::NEG_INFINITY;
        let mut boundaries: Vec<(f64, f32)> = Vec::new();

        for point in signal {
            let point = point?;
            samples += 1;
            if point.time <= last_time {
                // Out-of-order samples carry no usable boundary information.
                continue;
            }
            last_time = point.time;
            if point.time <= TIME_EPSILON || point.time >= duration - TIME_EPSILON {
                continue;
            }
            if point.similarity < cutoff {
                let confidence = ((cutoff - point.similarity) / cutoff).clamp(0.0, 1.0);
                boundaries.push((point.time, confidence as f32));
            }
        }

        if samples == 0 {
            return Err(RecutError::segmentation("frame signal is empty"));
        }

        let mut raw = Vec::with_capacity(boundaries.len() + 1);
        let mut start = 0.0;
        let mut confidence = 1.0f32;
        for (t, c) in boundaries {
            raw.push(Scene {
                id: raw.len(),
                start,
                end: t,
                confidence,
            });
            start = t;
            confidence = c;
        }
        raw.push(Scene {
            id: raw.len(),
            start,
            end: duration,
            confidence,
        });

        let scenes = filter_scenes(raw, self.cfg.min_scene_duration);
        tracing::debug!(scenes = scenes.len(), samples, "segmented frame signal");
        Ok(scenes)
    }

    /// Like [`SceneSegmenter::try_segment`], but treats the whole input as one scene when the
    /// signal is unusable.
    pub fn segment_or_whole<I>(&self, signal: I, duration: f64) -> RecutResult<Vec<Scene>>
    where
        I: IntoIterator<Item = RecutResult<SignalPoint>>,
    {
        match self.try_segment(signal, duration) {
            Ok(scenes) => Ok(scenes),
            Err(RecutError::Segmentation(reason)) => {
                if !(duration.is_finite() && duration > 0.0) {
                    return Err(RecutError::segmentation(format!(
                        "cannot fall back to a single scene: {reason}"
                    )));
                }
                tracing::warn!(%reason, "segmentation fell back to a single scene");
                Ok(vec![Scene {
                    id: 0,
                    start: 0.0,
                    end: duration,
                    confidence: 1.0,
                }])
            }
            Err(e) => Err(e),
        }
    }
}

/// Merge every scene shorter than `min_duration` into a neighbour.
///
/// The shortest offending scene is merged first, into whichever adjacent scene is shorter
/// (ties go left). Ids are renumbered. Applying the filter twice is a no-op.
pub fn filter_scenes(mut scenes: Vec<Scene>, min_duration: f64) -> Vec<Scene> {
    while scenes.len() > 1 {
        let shortest = scenes
            .iter()
            .enumerate()
            .filter(|(_, s)| s.duration() + TIME_EPSILON < min_duration)
            .min_by(|a, b| a.1.duration().total_cmp(&b.1.duration()))
            .map(|(i, _)| i);
        let Some(i) = shortest else {
            break;
        };

        let left = i.checked_sub(1);
        let right = (i + 1 < scenes.len()).then_some(i + 1);
        let target = match (left, right) {
            (Some(l), Some(r)) => {
                if scenes[l].duration() <= scenes[r].duration() {
                    l
                } else {
                    r
                }
            }
            (Some(l), None) => l,
            (None, Some(r)) => r,
            (None, None) => break,
        };

        let (lo, hi) = (i.min(target), i.max(target));
        let merged = Scene {
            id: scenes[lo].id,
            start: scenes[lo].start,
            end: scenes[hi].end,
            confidence: scenes[lo].confidence,
        };
        scenes.splice(lo..=hi, [merged]);
    }

    for (id, scene) in scenes.iter_mut().enumerate() {
        scene.id = id;
    }
    scenes
}

#[cfg(test)]
#[path = "../../tests/unit/scene/segmenter.rs"]
mod tests;
