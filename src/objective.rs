//! The black-box function being optimized.
//!
//! An [`Objective`] maps a point of the user's domain to a vector of
//! outputs: entry `0` is minimized, entries `1..` are constraints that are
//! satisfied when `<= 0`. Closures returning `Vec<f64>` implement the trait
//! directly; wrap a scalar closure in [`Scalar`].
//!
//! ```
//! use acq_ensemble::objective::{Objective, Scalar};
//!
//! let constrained = |x: &[f64]| vec![x[0] * x[0], 1.0 - x[0]];
//! assert_eq!(constrained.evaluate(&[2.0]), vec![4.0, -1.0]);
//!
//! let sphere = Scalar(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>());
//! assert_eq!(sphere.evaluate(&[1.0, 2.0]), vec![5.0]);
//! ```
//!
//! Evaluations of one batch run in parallel, so implementations must be
//! [`Sync`].

/// A vector-valued black-box function.
pub trait Objective: Sync {
    /// Evaluate every output at `x`, given in the user's domain.
    fn evaluate(&self, x: &[f64]) -> Vec<f64>;
}

impl<F> Objective for F
where
    F: Fn(&[f64]) -> Vec<f64> + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        self(x)
    }
}

/// Adapter for unconstrained objectives returning a single value.
#[derive(Clone, Copy, Debug)]
pub struct Scalar<F>(pub F);

impl<F> Objective for Scalar<F>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        vec![(self.0)(x)]
    }
}

/// Whether every constraint output is satisfied.
#[must_use]
pub fn is_feasible(outputs: &[f64]) -> bool {
    outputs.iter().skip(1).all(|&c| c <= 0.0)
}

/// Total amount by which the constraint outputs exceed zero.
#[must_use]
pub fn violation(outputs: &[f64]) -> f64 {
    outputs.iter().skip(1).map(|&c| c.max(0.0)).sum()
}

/// Feasibility-first ordering: `a` is strictly better than `b`.
///
/// Two feasible points compare by objective, a feasible point beats an
/// infeasible one, and two infeasible points compare by violation.
#[must_use]
pub fn better(a: &[f64], b: &[f64]) -> bool {
    match (is_feasible(a), is_feasible(b)) {
        (true, true) => a[0] < b[0],
        (true, false) => true,
        (false, true) => false,
        (false, false) => violation(a) < violation(b),
    }
}
