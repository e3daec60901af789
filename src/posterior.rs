//! Location of the surrogate's best predicted point.
//!
//! A short differential evolution run over the canonical box, seeded with
//! the incumbent, followed by multi-start L-BFGS on the posterior mean of
//! output `0`.

use crate::acquisition::PosteriorMean;
use crate::error::{Error, Result};
use crate::solver::Bounds;
use crate::solver::de::DifferentialEvolution;
use crate::solver::local::LocalAlgorithm;
use crate::solver::multistart::MultiStart;
use crate::surrogate::Surrogate;

/// Global-search evaluations per input dimension.
const GLOBAL_EVALS_PER_DIM: usize = 50;
const GLOBAL_POPULATION: usize = 10;
/// Local refinement budget.
const LOCAL_ITERS: usize = 40;

/// Minimizer of the posterior mean and the prediction there.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestPosterior {
    /// Canonical location.
    pub x: Vec<f64>,
    /// Posterior mean of every output at `x`.
    pub y: Vec<f64>,
}

/// Minimize the posterior mean of output `0`, starting from `incumbent`.
///
/// # Errors
///
/// Returns [`Error::SurrogateNotTrained`] for an untrained surrogate and
/// [`Error::LocalSearch`] if the refinement hits non-finite values.
pub fn estimate<S: Surrogate + ?Sized>(
    surrogate: &S,
    incumbent: &[f64],
    rng: &mut fastrand::Rng,
) -> Result<BestPosterior> {
    if !surrogate.is_trained() {
        return Err(Error::SurrogateNotTrained);
    }
    let dim = surrogate.dim();
    let bounds = Bounds::canonical(dim);
    let mean = PosteriorMean::new(surrogate);

    let (global, _) = DifferentialEvolution::new(bounds.clone(), dim * GLOBAL_EVALS_PER_DIM)
        .population_size(GLOBAL_POPULATION)
        .minimize(&mean, &[incumbent.to_vec()], rng);
    let (x, _) = MultiStart::new(bounds, LocalAlgorithm::Lbfgs, LOCAL_ITERS).refine(&mean, &[global])?;

    let y = (0..surrogate.num_outputs())
        .map(|o| surrogate.predict(o, &x).mean)
        .collect();
    Ok(BestPosterior { x, y })
}
