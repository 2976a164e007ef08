use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cuts::zigzag::ZigzagTail;
use crate::foundation::error::{RecutError, RecutResult};
use crate::scene::Scene;

/// Bounds and seed for cut sampling.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CutPolicy {
    /// Shortest cut in seconds (unless the scene itself is shorter).
    pub min_duration: f64,
    /// Longest cut in seconds.
    pub max_duration: f64,
    /// Seed for the sampling generator.
    pub seed: u64,
    /// How the zigzag order treats a tail that does not fill a block of four.
    pub zigzag_tail: ZigzagTail,
}

impl Default for CutPolicy {
    fn default() -> Self {
        Self {
            min_duration: 3.0,
            max_duration: 7.0,
            seed: 0,
            zigzag_tail: ZigzagTail::default(),
        }
    }
}

impl CutPolicy {
    /// Reject non-positive bounds or `min_duration > max_duration`.
    pub fn validate(&self) -> RecutResult<()> {
        if !(self.min_duration.is_finite() && self.min_duration > 0.0) {
            return Err(RecutError::policy(format!(
                "min cut duration must be > 0, got {}",
                self.min_duration
            )));
        }
        if !(self.max_duration.is_finite() && self.max_duration > 0.0) {
            return Err(RecutError::policy(format!(
                "max cut duration must be > 0, got {}",
                self.max_duration
            )));
        }
        if self.min_duration > self.max_duration {
            return Err(RecutError::policy(format!(
                "min cut duration ({}) exceeds max cut duration ({})",
                self.min_duration, self.max_duration
            )));
        }
        Ok(())
    }
}

/// A short sub-clip sampled from within one scene.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Cut {
    /// Owning scene id.
    pub scene_id: usize,
    /// Offset from the scene start in seconds.
    pub start: f64,
    /// Cut length in seconds.
    pub duration: f64,
    /// Position in source order.
    pub sequence_index: usize,
}

impl Cut {
    /// Absolute start in source time.
    pub fn source_start(&self, scene: &Scene) -> f64 {
        scene.start + self.start
    }
}

/// Sample one cut per scene with a generator seeded from `policy.seed`.
pub fn generate_cuts(scenes: &[Scene], policy: &CutPolicy) -> RecutResult<Vec<Cut>> {
    let mut rng = StdRng::seed_from_u64(policy.seed);
    generate_cuts_with(scenes, policy, &mut rng)
}

/// Sample one cut per scene using the injected generator.
///
/// Duration is uniform in `[min, min(max, scene_len)]` and the start offset uniform in
/// `[0, scene_len - duration]`. A scene shorter than `min` becomes a single whole-scene cut.
pub fn generate_cuts_with<R>(
    scenes: &[Scene],
    policy: &CutPolicy,
    rng: &mut R,
) -> RecutResult<Vec<Cut>>
where
    R: Rng + ?Sized,
{
    policy.validate()?;

    let mut cuts = Vec::with_capacity(scenes.len());
    for scene in scenes {
        let len = scene.duration();
        if !(len.is_finite() && len > 0.0) {
            return Err(RecutError::validation(format!(
                "scene {} has non-positive length {len}",
                scene.id
            )));
        }

        let (start, duration) = if len < policy.min_duration {
            (0.0, len)
        } else {
            let hi = policy.max_duration.min(len);
            let duration = rng.gen_range(policy.min_duration..=hi);
            let slack = (len - duration).max(0.0);
            let start = rng.gen_range(0.0..=slack);
            (start.min(slack), duration)
        };

        cuts.push(Cut {
            scene_id: scene.id,
            start,
            duration,
            sequence_index: cuts.len(),
        });
    }

    tracing::debug!(cuts = cuts.len(), seed = policy.seed, "generated cuts");
    Ok(cuts)
}

#[cfg(test)]
#[path = "../../tests/unit/cuts/generator.rs"]
mod tests;
