//! Numerical optimizers used by the Bayesian optimization loop.
//!
//! | Module | Role |
//! |--------|------|
//! | [`local`] | Projected L-BFGS and bounded Nelder-Mead local searches |
//! | [`multistart`] | Parallel multi-start local refinement with a derivative-free fallback |
//! | [`de`] | Differential evolution for single-objective global search |
//! | [`moo`] | DE-driven multi-objective search returning a Pareto set and front |
//! | [`pareto`] | Dominance, non-dominated sorting and crowding distance |
//!
//! Every optimizer minimizes. Objectives are small value types implementing
//! [`CostFunction`], [`CostGradient`] or [`MultiCostFunction`], built per call
//! with the state they need.

pub mod de;
pub mod local;
pub mod moo;
pub mod multistart;
pub mod pareto;

use crate::rng_util;
use crate::space::{CANONICAL_LOWER, CANONICAL_UPPER};

/// A scalar function to minimize.
pub trait CostFunction: Sync {
    /// Evaluate the cost at `x`.
    fn cost(&self, x: &[f64]) -> f64;
}

/// A scalar function to minimize that also provides its gradient.
pub trait CostGradient: CostFunction {
    /// Evaluate the cost and its gradient at `x`.
    fn cost_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>);
}

/// A vector-valued function whose components are minimized jointly.
pub trait MultiCostFunction: Sync {
    /// Number of components returned by [`costs`](MultiCostFunction::costs).
    fn n_costs(&self) -> usize;

    /// Evaluate all components at `x`.
    fn costs(&self, x: &[f64]) -> Vec<f64>;
}

/// A per-dimension box constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Box with explicit per-dimension limits. Each `lower[i]` must not
    /// exceed `upper[i]`.
    #[must_use]
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        debug_assert_eq!(lower.len(), upper.len());
        Self { lower, upper }
    }

    /// The canonical box `[CANONICAL_LOWER, CANONICAL_UPPER]^dim`.
    #[must_use]
    pub fn canonical(dim: usize) -> Self {
        Self::new(vec![CANONICAL_LOWER; dim], vec![CANONICAL_UPPER; dim])
    }

    /// Number of dimensions.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower limits.
    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper limits.
    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Width of dimension `i`.
    #[must_use]
    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    /// Clamp `x` into the box, in place.
    pub fn clamp(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*lo, *hi);
        }
    }

    /// Draw a uniformly random point inside the box.
    #[must_use]
    pub fn random(&self, rng: &mut fastrand::Rng) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| rng_util::f64_range(rng, *lo, *hi))
            .collect()
    }
}
