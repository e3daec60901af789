//! Multi-objective search over an acquisition ensemble.
//!
//! Every function of the pool becomes one (negated) objective of a
//! [`MultiObjectiveDe`] run with crowding measured in output space. The run
//! is seeded with one anchor per acquisition: that function's own optimum,
//! located by multi-start L-BFGS from jittered base points, a short
//! differential evolution run and a final L-BFGS polish.

use crate::acquisition::{Acquisition, AcquisitionContext, EnsembleCost, NegatedAcquisition};
use crate::error::{Error, Result};
use crate::rng_util;
use crate::solver::Bounds;
use crate::solver::de::DifferentialEvolution;
use crate::solver::local::LocalAlgorithm;
use crate::solver::moo::{CrowdingSpace, MoeaConfig, MultiObjectiveDe, ParetoSolution};
use crate::solver::multistart::MultiStart;
use crate::space::canonical_width;
use crate::surrogate::Surrogate;

/// Random canonical points added to the anchor base set.
const RANDOM_BASE_POINTS: usize = 3;
/// Jitter applied to base points, relative to the canonical width.
const BASE_JITTER: f64 = 1e-3;
const LOCAL_ITERS: usize = 40;
const GLOBAL_EVALS_PER_DIM: usize = 50;
const GLOBAL_POPULATION: usize = 25;

/// An acquisition pool bound to a surrogate, ready to be optimized jointly.
pub struct EnsembleSearch<'c, 'a, S: Surrogate + ?Sized> {
    context: &'c AcquisitionContext<'a, S>,
    pool: &'c [Acquisition],
    config: MoeaConfig,
}

impl<'c, 'a, S: Surrogate + ?Sized> EnsembleSearch<'c, 'a, S> {
    /// Prepare a search over `pool`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAcquisitionPool`] for an empty pool and
    /// [`Error::ConstrainedUnsupported`] when the surrogate models
    /// constraints and the pool holds objective-only functions.
    pub fn new(
        context: &'c AcquisitionContext<'a, S>,
        pool: &'c [Acquisition],
        config: MoeaConfig,
    ) -> Result<Self> {
        if pool.is_empty() {
            return Err(Error::EmptyAcquisitionPool);
        }
        let outputs = context.surrogate().num_outputs();
        if outputs > 1 && pool.iter().any(|a| a.objective_only()) {
            return Err(Error::ConstrainedUnsupported { outputs });
        }
        Ok(Self {
            context,
            pool,
            config,
        })
    }

    /// One anchor per pool entry, in pool order.
    ///
    /// `incumbent` and `posterior` are the best observed and best predicted
    /// canonical points.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LocalSearch`] if a refinement meets non-finite
    /// acquisition values.
    pub fn anchors(
        &self,
        incumbent: &[f64],
        posterior: &[f64],
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<Vec<f64>>> {
        let dim = incumbent.len();
        let bounds = Bounds::canonical(dim);
        let local = MultiStart::new(bounds.clone(), LocalAlgorithm::Lbfgs, LOCAL_ITERS);
        let global = DifferentialEvolution::new(bounds.clone(), dim * GLOBAL_EVALS_PER_DIM)
            .population_size(GLOBAL_POPULATION);

        let mut base = vec![incumbent.to_vec(), posterior.to_vec()];
        base.extend((0..RANDOM_BASE_POINTS).map(|_| bounds.random(rng)));
        let jitter = BASE_JITTER * canonical_width();
        for x in &mut base {
            for v in x.iter_mut() {
                *v += rng_util::f64_range(rng, -jitter, jitter);
            }
            bounds.clamp(x);
        }

        let mut anchors: Vec<Vec<f64>> = Vec::with_capacity(self.pool.len());
        for &acq in self.pool {
            let f = NegatedAcquisition::new(self.context, acq);
            let (refined, _) = local.refine(&f, &base)?;
            let mut guesses = vec![refined];
            guesses.extend(anchors.iter().cloned());
            let (explored, _) = global.minimize(&f, &guesses, rng);
            let (anchor, _) = local.refine(&f, &[explored])?;
            trace_debug!(acquisition = %acq, "anchor located");
            anchors.push(anchor);
        }
        Ok(anchors)
    }

    /// Run the evolutionary search seeded with `anchors`.
    #[must_use]
    pub fn optimize(&self, anchors: Vec<Vec<f64>>) -> ParetoSolution {
        let cost = EnsembleCost::new(self.context, self.pool);
        MultiObjectiveDe::new(Bounds::canonical(self.context.surrogate().dim()), self.config.clone())
            .crowding(CrowdingSpace::Output)
            .anchors(anchors)
            .optimize(&cost)
    }
}

/// Maximize the log probability of feasibility.
///
/// The result holds exactly one point. For a single-output surrogate the
/// objective is constant and the point is arbitrary.
///
/// # Errors
///
/// Returns [`Error::SurrogateNotTrained`] for an untrained surrogate.
pub fn feasibility_search<S: Surrogate + ?Sized>(
    surrogate: &S,
    config: &MoeaConfig,
) -> Result<ParetoSolution> {
    let context = AcquisitionContext::new(surrogate, 0.0, 0.0)?;
    let pool = [Acquisition::LogProbabilityOfFeasibility];
    let cost = EnsembleCost::new(&context, &pool);
    Ok(MultiObjectiveDe::new(Bounds::canonical(surrogate.dim()), config.clone()).optimize(&cost))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surrogate::GaussianProcess;

    fn trained(outputs: impl Fn(&[f64]) -> Vec<f64>) -> GaussianProcess {
        let mut rng = fastrand::Rng::with_seed(4);
        let x: Vec<Vec<f64>> = (0..12).map(|_| Bounds::canonical(2).random(&mut rng)).collect();
        let y = x.iter().map(|p| outputs(p)).collect();
        let mut gp = GaussianProcess::new(x, y).unwrap();
        let hyps = gp.default_hyperparameters();
        gp.train(&hyps).unwrap();
        gp
    }

    fn small_config() -> MoeaConfig {
        MoeaConfig {
            population_size: 20,
            generations: 15,
            seed: Some(8),
            ..MoeaConfig::default()
        }
    }

    fn bowl(p: &[f64]) -> Vec<f64> {
        vec![(p[0] - 5.0).powi(2) + p[1] * p[1]]
    }

    fn incumbent(gp: &GaussianProcess) -> Vec<f64> {
        let best = gp
            .train_outputs()
            .iter()
            .enumerate()
            .min_by(|a, b| a.1[0].total_cmp(&b.1[0]))
            .map(|(i, _)| i)
            .unwrap();
        gp.train_inputs()[best].clone()
    }

    #[test]
    fn anchors_follow_the_pool() {
        let gp = trained(bowl);
        let best = incumbent(&gp);
        let ctx = AcquisitionContext::new(&gp, 0.0, 2.0).unwrap();
        let pool = [Acquisition::LogExpectedImprovement, Acquisition::LcbImprovement];
        let search = EnsembleSearch::new(&ctx, &pool, small_config()).unwrap();
        let mut rng = fastrand::Rng::with_seed(1);
        let anchors = search.anchors(&best, &best, &mut rng).unwrap();
        assert_eq!(anchors.len(), 2);
        for (anchor, acq) in anchors.iter().zip(pool) {
            assert!(anchor.iter().all(|v| (-25.0..=25.0).contains(v)));
            assert!(ctx.value(acq, anchor).is_finite());
        }
    }

    #[test]
    fn pareto_set_matches_front() {
        let gp = trained(bowl);
        let best = incumbent(&gp);
        let ctx = AcquisitionContext::new(&gp, gp.predict(0, &best).mean, 2.0).unwrap();
        let pool = [
            Acquisition::LogExpectedImprovement,
            Acquisition::LogLcbImprovementTransformed,
            Acquisition::ProbabilityOfImprovementTransformed,
        ];
        let search = EnsembleSearch::new(&ctx, &pool, small_config()).unwrap();
        let mut rng = fastrand::Rng::with_seed(6);
        let anchors = search.anchors(&best, &best, &mut rng).unwrap();
        let solution = search.optimize(anchors);
        assert!(!solution.is_empty());
        assert_eq!(solution.set.len(), solution.front.len());
        assert!(solution.front.iter().all(|row| row.len() == pool.len()));
        assert!(solution.set.iter().flatten().all(|v| (-25.0..=25.0).contains(v)));
    }

    #[test]
    fn empty_pool_is_rejected() {
        let gp = trained(bowl);
        let ctx = AcquisitionContext::new(&gp, 0.0, 1.0).unwrap();
        assert!(matches!(
            EnsembleSearch::new(&ctx, &[], small_config()),
            Err(Error::EmptyAcquisitionPool)
        ));
    }

    #[test]
    fn objective_pool_rejects_constraints() {
        let gp = trained(|p| vec![p[0] * p[0], p[1]]);
        let ctx = AcquisitionContext::new(&gp, 0.0, 1.0).unwrap();
        assert!(matches!(
            EnsembleSearch::new(&ctx, &[Acquisition::ExpectedImprovement], small_config()),
            Err(Error::ConstrainedUnsupported { outputs: 2 })
        ));
        assert!(
            EnsembleSearch::new(&ctx, &[Acquisition::LogProbabilityOfFeasibility], small_config())
                .is_ok()
        );
    }

    #[test]
    fn feasibility_search_prefers_feasible_region() {
        // Feasible where x1 <= 0.
        let gp = trained(|p| vec![p[0], p[1]]);
        let solution = feasibility_search(&gp, &small_config()).unwrap();
        assert_eq!(solution.len(), 1);
        assert!(gp.predict(1, &solution.set[0]).mean < 0.0);
    }
}
