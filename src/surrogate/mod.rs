//! Probabilistic surrogate models.
//!
//! The optimization loop only talks to a model through the [`Surrogate`]
//! trait: a posterior mean and variance per output, with gradients with
//! respect to the query point. [`GaussianProcess`] is the bundled
//! implementation.

mod gp;

pub use gp::{GaussianProcess, Hyperparameters};

/// Posterior mean and variance at one point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Prediction {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior variance, always positive.
    pub variance: f64,
}

impl Prediction {
    /// Posterior standard deviation.
    #[must_use]
    pub fn std(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Posterior mean and variance together with their gradients.
#[derive(Clone, Debug, PartialEq)]
pub struct PredictionGradient {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior variance, always positive.
    pub variance: f64,
    /// Gradient of the mean with respect to the query point.
    pub mean_grad: Vec<f64>,
    /// Gradient of the variance with respect to the query point.
    pub variance_grad: Vec<f64>,
}

/// A trained regression model over the canonical domain.
///
/// Output `0` is the objective; outputs `1..` are constraints.
pub trait Surrogate: Send + Sync {
    /// Input dimension.
    fn dim(&self) -> usize;

    /// Number of modelled outputs.
    fn num_outputs(&self) -> usize;

    /// Whether the model may be queried.
    fn is_trained(&self) -> bool;

    /// Posterior at `x` for one output.
    fn predict(&self, output: usize, x: &[f64]) -> Prediction;

    /// Posterior and gradients at `x` for one output.
    fn predict_with_grad(&self, output: usize, x: &[f64]) -> PredictionGradient;
}
