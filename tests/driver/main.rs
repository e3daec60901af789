#![allow(clippy::float_cmp)]

mod branches;
mod initialize;
mod workflow;

use acq_ensemble::prelude::*;

/// Quadratic bowl with its minimum 0 at `(0.5, 0.5)`.
pub fn bowl(x: &[f64]) -> f64 {
    (x[0] - 0.5).powi(2) + (x[1] - 0.5).powi(2)
}

pub type Bowl = Scalar<fn(&[f64]) -> f64>;

/// Unit-square corners plus one interior point.
pub fn corner_design() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let x = vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 1.0],
        vec![0.1, 0.9],
    ];
    let y = x.iter().map(|p| vec![bowl(p)]).collect();
    (x, y)
}

/// A cheap configuration of the searches, so every test runs in seconds.
pub fn small_moea() -> MoeaConfig {
    MoeaConfig {
        population_size: 16,
        generations: 10,
        ..MoeaConfig::default()
    }
}

pub fn bowl_builder() -> OptimizerBuilder<Bowl> {
    Optimizer::builder(
        Scalar(bowl as fn(&[f64]) -> f64),
        vec![0.0, 0.0],
        vec![1.0, 1.0],
    )
    .moea(small_moea())
    .hyperparameter_candidates(30)
    .seed(42)
}
