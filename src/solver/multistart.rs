//! Parallel multi-start local refinement.
//!
//! Every seed runs its own `argmin` local search on the rayon pool. A run
//! that stalls with [`LocalFailure::NoProgress`] is retried once with
//! Nelder-Mead at three times the iteration budget; if that also stalls the
//! seed itself is kept. Results are reduced sequentially in seed order, the
//! lowest seed index wins ties and non-finite values never win.

use rayon::prelude::*;

use super::local::{LocalAlgorithm, LocalFailure, LocalSearch};
use super::{Bounds, CostGradient};
use crate::error::{Error, Result};

/// Budget multiplier of the derivative-free retry.
const FALLBACK_BUDGET_FACTOR: usize = 3;

/// Multi-start local refiner over a fixed box.
#[derive(Clone, Debug)]
pub struct MultiStart {
    bounds: Bounds,
    search: LocalSearch,
}

impl MultiStart {
    /// Refine with `algorithm`, giving each seed `max_iters` solver iterations.
    #[must_use]
    pub fn new(bounds: Bounds, algorithm: LocalAlgorithm, max_iters: usize) -> Self {
        Self {
            bounds,
            search: LocalSearch::new(algorithm, max_iters),
        }
    }

    /// The box every local search is confined to.
    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Run one local search per seed and return the best point and value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocalSearch`] if any seed evaluates to a non-finite
    /// value or no run ends on a finite one, and [`Error::Internal`] if
    /// `seeds` is empty.
    pub fn refine<F: CostGradient + ?Sized>(
        &self,
        f: &F,
        seeds: &[Vec<f64>],
    ) -> Result<(Vec<f64>, f64)> {
        if seeds.is_empty() {
            return Err(Error::Internal("multi-start refinement needs at least one seed"));
        }
        let results: Vec<Result<(Vec<f64>, f64)>> = seeds
            .par_iter()
            .map(|seed| self.refine_one(f, seed))
            .collect();
        lowest(results)
    }

    fn refine_one<F: CostGradient + ?Sized>(&self, f: &F, seed: &[f64]) -> Result<(Vec<f64>, f64)> {
        match self.search.minimize(f, &self.bounds, seed) {
            Ok(found) => Ok(found),
            Err(LocalFailure::NoProgress) => {
                trace_debug!("local search stalled, retrying with Nelder-Mead");
                let fallback = LocalSearch::new(
                    LocalAlgorithm::NelderMead,
                    self.search.max_iters() * FALLBACK_BUDGET_FACTOR,
                );
                match fallback.minimize(f, &self.bounds, seed) {
                    Ok(found) => Ok(found),
                    Err(LocalFailure::NoProgress) => {
                        let mut x = seed.to_vec();
                        self.bounds.clamp(&mut x);
                        let fx = f.cost(&x);
                        Ok((x, fx))
                    }
                    Err(failure) => Err(Error::LocalSearch(failure.to_string())),
                }
            }
            Err(failure) => Err(Error::LocalSearch(failure.to_string())),
        }
    }
}

/// The first strictly lowest finite value, in input order.
fn lowest(results: Vec<Result<(Vec<f64>, f64)>>) -> Result<(Vec<f64>, f64)> {
    let mut best: Option<(Vec<f64>, f64)> = None;
    for result in results {
        let (x, fx) = result?;
        let improves = match &best {
            Some((_, best_f)) => fx < *best_f,
            None => true,
        };
        if fx.is_finite() && improves {
            best = Some((x, fx));
        }
    }
    best.ok_or_else(|| Error::LocalSearch("every run ended on a non-finite value".into()))
}
