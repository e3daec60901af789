//! Search-space mapping between the user's box and the canonical box.
//!
//! All optimization math runs in a fixed canonical domain
//! `[CANONICAL_LOWER, CANONICAL_UPPER]^d`, independent of the scale of the
//! user's bounds. [`SearchSpace`] holds the per-dimension affine map
//! `user = a * canonical + b` and its inverse.
//!
//! ```
//! use acq_ensemble::space::SearchSpace;
//!
//! let space = SearchSpace::new(vec![0.0, -1.0], vec![1.0, 3.0]).unwrap();
//! let canonical = space.unscale(&[0.5, 1.0]);
//! assert!(canonical.iter().all(|v| v.abs() < 1e-12));
//! assert_eq!(space.rescale(&canonical), vec![0.5, 1.0]);
//! ```

use crate::error::{Error, Result};
use crate::rng_util;

/// Lower bound of every canonical dimension.
pub const CANONICAL_LOWER: f64 = -25.0;
/// Upper bound of every canonical dimension.
pub const CANONICAL_UPPER: f64 = 25.0;

/// Sobol sequences are only used up to this many dimensions.
const MAX_SOBOL_DIM: usize = 40;

/// Width of the canonical box along one dimension.
#[must_use]
pub const fn canonical_width() -> f64 {
    CANONICAL_UPPER - CANONICAL_LOWER
}

/// Clamp a canonical point into the canonical box, in place.
pub fn clamp_canonical(x: &mut [f64]) {
    for v in x.iter_mut() {
        *v = v.clamp(CANONICAL_LOWER, CANONICAL_UPPER);
    }
}

/// Euclidean distance between two points.
#[must_use]
pub fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// A bounded box `[lb, ub]` together with its canonical rescaling.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchSpace {
    lb: Vec<f64>,
    ub: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
}

impl SearchSpace {
    /// Create a search space from per-dimension lower and upper bounds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when the bound vectors differ in
    /// length or are empty, and [`Error::InvalidBounds`] when some
    /// `lb[i] >= ub[i]` or a bound is not finite.
    pub fn new(lb: Vec<f64>, ub: Vec<f64>) -> Result<Self> {
        if lb.len() != ub.len() || lb.is_empty() {
            return Err(Error::DimensionMismatch {
                expected: lb.len().max(1),
                got: ub.len(),
            });
        }
        for (dim, (&low, &high)) in lb.iter().zip(&ub).enumerate() {
            if !(low.is_finite() && high.is_finite() && low < high) {
                return Err(Error::InvalidBounds { dim, low, high });
            }
        }
        let a = lb
            .iter()
            .zip(&ub)
            .map(|(l, u)| (u - l) / canonical_width())
            .collect();
        let b = lb.iter().zip(&ub).map(|(l, u)| 0.5 * (u + l)).collect();
        Ok(Self { lb, ub, a, b })
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lb.len()
    }

    /// User-domain lower bounds.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lb
    }

    /// User-domain upper bounds.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.ub
    }

    /// Map a canonical point to the user domain, clamped into `[lb, ub]`.
    #[must_use]
    pub fn rescale(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.a.iter().zip(&self.b))
            .zip(self.lb.iter().zip(&self.ub))
            .map(|((v, (a, b)), (l, u))| (a * v + b).clamp(*l, *u))
            .collect()
    }

    /// Map a user-domain point to the canonical domain.
    #[must_use]
    pub fn unscale(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.a.iter().zip(&self.b))
            .map(|(v, (a, b))| (v - b) / a)
            .collect()
    }

    /// Returns `true` if a user-domain point lies inside `[lb, ub]`.
    #[must_use]
    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.lb.iter().zip(&self.ub))
                .all(|(v, (l, u))| *v >= *l && *v <= *u)
    }

    /// Draw a uniformly random canonical point.
    #[must_use]
    pub fn random_canonical(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        rng_util::uniform_point(rng, self.dim(), CANONICAL_LOWER, CANONICAL_UPPER)
    }

    /// Space-filling initial design of `n` canonical points.
    ///
    /// Uses an Owen-scrambled Sobol sequence when `use_sobol` is set and the
    /// dimension is at most 40, uniform random sampling otherwise.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn design_of_experiments(
        &self,
        n: usize,
        use_sobol: bool,
        rng: &mut fastrand::Rng,
    ) -> Vec<Vec<f64>> {
        let dim = self.dim();
        if use_sobol && dim <= MAX_SOBOL_DIM {
            let seed = rng.u32(..);
            (0..n)
                .map(|i| {
                    (0..dim)
                        .map(|d| {
                            let unit = f64::from(sobol_burley::sample(i as u32, d as u32, seed));
                            CANONICAL_LOWER + unit * canonical_width()
                        })
                        .collect()
                })
                .collect()
        } else {
            (0..n).map(|_| self.random_canonical(rng)).collect()
        }
    }
}
