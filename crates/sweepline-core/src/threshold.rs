#![forbid(unsafe_code)]

//! Retrigger threshold sampling.
//!
//! Each sweep cycle draws the fraction of its duration after which the
//! opposite bar may start. Draws are whole percents, uniform over
//! `50..90`, so every threshold lies in `[0.5, 0.9)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lowest threshold, in percent (inclusive).
pub const THRESHOLD_LOWER_PERCENT: u32 = 50;
/// Highest threshold, in percent (exclusive).
pub const THRESHOLD_UPPER_PERCENT: u32 = 90;

/// Source of retrigger thresholds.
#[derive(Debug, Clone)]
pub struct ThresholdSampler {
    rng: StdRng,
}

impl ThresholdSampler {
    /// Sampler seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sampler for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seeded when `seed` is given, OS-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(seed),
            None => Self::from_os_rng(),
        }
    }

    /// Draw the next threshold.
    pub fn sample(&mut self) -> f32 {
        let percent = self
            .rng
            .random_range(THRESHOLD_LOWER_PERCENT..THRESHOLD_UPPER_PERCENT);
        percent as f32 / 100.0
    }
}
