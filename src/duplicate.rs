//! Rejection of candidates that sit too close to known points.
//!
//! A candidate is a duplicate when its Euclidean distance to any reference
//! point is below `epsilon * (CANONICAL_UPPER - CANONICAL_LOWER)`. Batches are
//! checked column by column, left to right; each column is compared against
//! the training inputs and the columns accepted before it, and replaced by a
//! uniform canonical sample until it passes.

use crate::rng_util;
use crate::space::{CANONICAL_LOWER, CANONICAL_UPPER, canonical_width, distance};

/// Resampling attempts per column before the last draw is kept.
const MAX_RESAMPLES: usize = 1000;

/// Minimum-distance filter for batches of canonical points.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DuplicateGuard {
    epsilon: f64,
}

impl Default for DuplicateGuard {
    fn default() -> Self {
        Self { epsilon: 1e-3 }
    }
}

impl DuplicateGuard {
    /// A guard rejecting points closer than `epsilon` times the canonical width.
    #[must_use]
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// The relative tolerance.
    #[must_use]
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Absolute distance below which two canonical points collide.
    #[must_use]
    pub fn threshold(&self) -> f64 {
        self.epsilon * canonical_width()
    }

    /// Returns `true` if `x` collides with any point of `reference`.
    #[must_use]
    pub fn is_duplicate(&self, x: &[f64], reference: &[Vec<f64>]) -> bool {
        let threshold = self.threshold();
        reference.iter().any(|r| distance(x, r) < threshold)
    }

    /// Replace colliding columns of `batch` with random canonical samples.
    ///
    /// Column `i` is checked against `training` and the already adjusted
    /// columns `0..i`. If no collision-free sample turns up after
    /// [`MAX_RESAMPLES`] draws the last draw is kept.
    #[must_use]
    pub fn adjust(
        &self,
        batch: Vec<Vec<f64>>,
        training: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> Vec<Vec<f64>> {
        let mut accepted: Vec<Vec<f64>> = Vec::with_capacity(batch.len());
        for mut x in batch {
            let mut draws = 0;
            while self.is_duplicate(&x, training) || self.is_duplicate(&x, &accepted) {
                if draws == MAX_RESAMPLES {
                    trace_warn!(
                        column = accepted.len(),
                        "no collision-free sample after {MAX_RESAMPLES} draws, keeping the last one"
                    );
                    break;
                }
                x = rng_util::uniform_point(rng, x.len(), CANONICAL_LOWER, CANONICAL_UPPER);
                draws += 1;
            }
            if draws > 0 {
                trace_debug!(column = accepted.len(), draws, "resampled duplicate candidate");
            }
            accepted.push(x);
        }
        accepted
    }
}
