use std::path::PathBuf;

use super::Optimizer;
use crate::acquisition::Acquisition;
use crate::duplicate::DuplicateGuard;
use crate::error::{Error, Result};
use crate::kappa::KappaSchedule;
use crate::objective::Objective;
use crate::selection::SelectionStrategy;
use crate::solver::moo::MoeaConfig;
use crate::space::SearchSpace;

/// Default number of design-of-experiments samples.
pub const DEFAULT_INIT_SIZE: usize = 10;
/// Default evaluation budget.
pub const DEFAULT_MAX_EVAL: usize = 500;
/// Default number of points evaluated per iteration.
pub const DEFAULT_BATCH_SIZE: usize = 1;
/// Default number of non-improving iterations before exploration.
pub const DEFAULT_TOL_NO_IMPROVEMENT: usize = 10;
/// Default lower bound of the surrogate's noise variance.
pub const DEFAULT_NOISE_LOWER_BOUND: f64 = 1e-6;
/// Default random draws when re-selecting hyperparameters.
pub const DEFAULT_HYPERPARAMETER_CANDIDATES: usize = 1000;

/// Every tunable parameter of an [`Optimizer`].
///
/// `Settings::default()` matches what [`OptimizerBuilder`] uses for options
/// that were not set.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings {
    /// Number of objective outputs; entries after the first are constraints.
    pub num_outputs: usize,
    /// Samples drawn by [`Optimizer::initialize`] when no data is supplied.
    pub init_size: usize,
    /// Evaluation budget.
    pub max_eval: usize,
    /// Points evaluated per iteration.
    pub batch_size: usize,
    /// Re-select surrogate hyperparameters at every iteration.
    pub force_select_hyp: bool,
    /// Non-improving iterations that trigger exploration and hyperparameter
    /// re-selection.
    pub tol_no_improvement: usize,
    /// After this many evaluations the surrogate hyperparameters are frozen.
    pub eval_fixed: usize,
    /// Treat observations as exact.
    pub noise_free: bool,
    /// Smallest noise variance of the surrogate.
    pub noise_lower_bound: f64,
    /// Use a Sobol sequence for the initial design.
    pub use_sobol: bool,
    /// Measure improvement from the best predicted value instead of the
    /// best observed one.
    pub posterior_reference: bool,
    /// Amount subtracted from the improvement baseline; negatives count as 0.
    pub ei_jitter: f64,
    /// Exploration coefficient schedule.
    pub kappa: KappaSchedule,
    /// Relative minimum distance between evaluated points.
    pub duplicate_epsilon: f64,
    /// How a batch is drawn from the Pareto set.
    pub selection: SelectionStrategy,
    /// Acquisition functions optimized jointly.
    pub acquisition_pool: Vec<Acquisition>,
    /// Settings of the evolutionary search. A fixed `seed` is reused at
    /// every iteration; without one each run draws a seed from the
    /// optimizer's generator.
    pub moea: MoeaConfig,
    /// Random draws when re-selecting hyperparameters.
    pub hyperparameter_candidates: usize,
    /// Seed of the optimizer's random generator.
    pub seed: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            num_outputs: 1,
            init_size: DEFAULT_INIT_SIZE,
            max_eval: DEFAULT_MAX_EVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            force_select_hyp: false,
            tol_no_improvement: DEFAULT_TOL_NO_IMPROVEMENT,
            eval_fixed: DEFAULT_MAX_EVAL,
            noise_free: false,
            noise_lower_bound: DEFAULT_NOISE_LOWER_BOUND,
            use_sobol: true,
            posterior_reference: false,
            ei_jitter: 0.0,
            kappa: KappaSchedule::default(),
            duplicate_epsilon: DuplicateGuard::default().epsilon(),
            selection: SelectionStrategy::default(),
            acquisition_pool: vec![
                Acquisition::LogExpectedImprovement,
                Acquisition::LogLcbImprovementTransformed,
                Acquisition::ProbabilityOfImprovementTransformed,
            ],
            moea: MoeaConfig::default(),
            hyperparameter_candidates: DEFAULT_HYPERPARAMETER_CANDIDATES,
            seed: None,
        }
    }
}

impl Settings {
    /// Check every setting against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyAcquisitionPool`] for an empty pool and
    /// [`Error::InvalidSetting`] naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        fn invalid(name: &'static str, reason: &str) -> Result<()> {
            Err(Error::InvalidSetting {
                name,
                reason: reason.to_string(),
            })
        }

        if self.acquisition_pool.is_empty() {
            return Err(Error::EmptyAcquisitionPool);
        }
        if self.num_outputs == 0 {
            return invalid("num_outputs", "must be at least 1");
        }
        if self.batch_size == 0 {
            return invalid("batch_size", "must be at least 1");
        }
        if self.tol_no_improvement == 0 {
            return invalid("tol_no_improvement", "must be at least 1");
        }
        if !(self.noise_lower_bound.is_finite() && self.noise_lower_bound >= 0.0) {
            return invalid("noise_lower_bound", "must be finite and non-negative");
        }
        if !self.ei_jitter.is_finite() {
            return invalid("ei_jitter", "must be finite");
        }
        if !(self.duplicate_epsilon.is_finite() && self.duplicate_epsilon >= 0.0) {
            return invalid("duplicate_epsilon", "must be finite and non-negative");
        }
        if !(self.kappa.delta > 0.0 && self.kappa.delta < 1.0) {
            return invalid("kappa.delta", "must lie in (0, 1)");
        }
        if !(self.kappa.upsilon.is_finite() && self.kappa.upsilon > 0.0) {
            return invalid("kappa.upsilon", "must be finite and positive");
        }
        if !(0.0..=1.0).contains(&self.moea.crossover_rate) {
            return invalid("moea.crossover_rate", "must lie in [0, 1]");
        }
        if !(self.moea.mutation_factor > 0.0 && self.moea.mutation_factor <= 2.0) {
            return invalid("moea.mutation_factor", "must lie in (0, 2]");
        }
        if self.moea.population_size < 4 {
            return invalid("moea.population_size", "must be at least 4");
        }
        Ok(())
    }
}

/// A builder for [`Optimizer`] with a fluent API.
///
/// Created via [`Optimizer::builder`]. Options left unset take the values
/// of [`Settings::default`], except `eval_fixed`, which follows `max_eval`.
///
/// # Examples
///
/// ```
/// use acq_ensemble::prelude::*;
///
/// let optimizer = Optimizer::builder(
///     Scalar(|x: &[f64]| (x[0] - 0.3).powi(2)),
///     vec![0.0],
///     vec![1.0],
/// )
/// .max_eval(40)
/// .batch_size(2)
/// .selection(SelectionStrategy::Greedy)
/// .seed(7)
/// .build()
/// .unwrap();
///
/// assert_eq!(optimizer.settings().eval_fixed, 40);
/// assert_eq!(optimizer.phase(), Phase::Uninitialized);
/// ```
pub struct OptimizerBuilder<O> {
    objective: O,
    lower: Vec<f64>,
    upper: Vec<f64>,
    base: Settings,
    num_outputs: Option<usize>,
    init_size: Option<usize>,
    max_eval: Option<usize>,
    batch_size: Option<usize>,
    force_select_hyp: Option<bool>,
    tol_no_improvement: Option<usize>,
    eval_fixed: Option<usize>,
    noise_free: Option<bool>,
    noise_lower_bound: Option<f64>,
    use_sobol: Option<bool>,
    posterior_reference: Option<bool>,
    ei_jitter: Option<f64>,
    kappa: Option<KappaSchedule>,
    duplicate_epsilon: Option<f64>,
    selection: Option<SelectionStrategy>,
    acquisition_pool: Option<Vec<Acquisition>>,
    moea: Option<MoeaConfig>,
    hyperparameter_candidates: Option<usize>,
    seed: Option<u64>,
    journal: Option<PathBuf>,
}

impl<O: Objective> OptimizerBuilder<O> {
    pub(super) fn new(objective: O, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self {
            objective,
            lower,
            upper,
            base: Settings::default(),
            num_outputs: None,
            init_size: None,
            max_eval: None,
            batch_size: None,
            force_select_hyp: None,
            tol_no_improvement: None,
            eval_fixed: None,
            noise_free: None,
            noise_lower_bound: None,
            use_sobol: None,
            posterior_reference: None,
            ei_jitter: None,
            kappa: None,
            duplicate_epsilon: None,
            selection: None,
            acquisition_pool: None,
            moea: None,
            hyperparameter_candidates: None,
            seed: None,
            journal: None,
        }
    }

    /// Start from a complete [`Settings`] value; individual setters still
    /// take precedence.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.base = settings;
        self
    }

    /// Number of objective outputs. Default: 1 (unconstrained).
    #[must_use]
    pub fn num_outputs(mut self, n: usize) -> Self {
        self.num_outputs = Some(n);
        self
    }

    /// Initial design size. Default: 10.
    #[must_use]
    pub fn init_size(mut self, n: usize) -> Self {
        self.init_size = Some(n);
        self
    }

    /// Evaluation budget. Default: 500.
    #[must_use]
    pub fn max_eval(mut self, n: usize) -> Self {
        self.max_eval = Some(n);
        self
    }

    /// Points evaluated per iteration. Default: 1.
    #[must_use]
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }

    /// Re-select hyperparameters at every iteration. Default: `false`.
    #[must_use]
    pub fn force_select_hyp(mut self, force: bool) -> Self {
        self.force_select_hyp = Some(force);
        self
    }

    /// Non-improving iterations before exploration. Default: 10.
    #[must_use]
    pub fn tol_no_improvement(mut self, n: usize) -> Self {
        self.tol_no_improvement = Some(n);
        self
    }

    /// Evaluations after which hyperparameters are frozen. Default: `max_eval`.
    #[must_use]
    pub fn eval_fixed(mut self, n: usize) -> Self {
        self.eval_fixed = Some(n);
        self
    }

    /// Treat observations as exact. Default: `false`.
    #[must_use]
    pub fn noise_free(mut self, noise_free: bool) -> Self {
        self.noise_free = Some(noise_free);
        self
    }

    /// Smallest noise variance. Default: `1e-6`.
    #[must_use]
    pub fn noise_lower_bound(mut self, variance: f64) -> Self {
        self.noise_lower_bound = Some(variance);
        self
    }

    /// Sobol initial design. Default: `true`.
    #[must_use]
    pub fn use_sobol(mut self, use_sobol: bool) -> Self {
        self.use_sobol = Some(use_sobol);
        self
    }

    /// Measure improvement from the best predicted value. Default: `false`.
    #[must_use]
    pub fn posterior_reference(mut self, enabled: bool) -> Self {
        self.posterior_reference = Some(enabled);
        self
    }

    /// Jitter subtracted from the improvement baseline. Default: 0.
    #[must_use]
    pub fn ei_jitter(mut self, jitter: f64) -> Self {
        self.ei_jitter = Some(jitter);
        self
    }

    /// Exploration coefficient schedule.
    #[must_use]
    pub fn kappa_schedule(mut self, schedule: KappaSchedule) -> Self {
        self.kappa = Some(schedule);
        self
    }

    /// Relative duplicate tolerance. Default: `1e-3`.
    #[must_use]
    pub fn duplicate_epsilon(mut self, epsilon: f64) -> Self {
        self.duplicate_epsilon = Some(epsilon);
        self
    }

    /// Batch selection strategy. Default: [`SelectionStrategy::Extreme`].
    #[must_use]
    pub fn selection(mut self, strategy: SelectionStrategy) -> Self {
        self.selection = Some(strategy);
        self
    }

    /// Acquisition functions optimized jointly.
    #[must_use]
    pub fn acquisition_pool(mut self, pool: Vec<Acquisition>) -> Self {
        self.acquisition_pool = Some(pool);
        self
    }

    /// Evolutionary search settings.
    #[must_use]
    pub fn moea(mut self, config: MoeaConfig) -> Self {
        self.moea = Some(config);
        self
    }

    /// Random draws when re-selecting hyperparameters. Default: 1000.
    #[must_use]
    pub fn hyperparameter_candidates(mut self, n: usize) -> Self {
        self.hyperparameter_candidates = Some(n);
        self
    }

    /// Seed of the random generator.
    #[must_use]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Append every iteration record as a JSON line to `path`.
    #[cfg(feature = "journal")]
    #[must_use]
    pub fn journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal = Some(path.into());
        self
    }

    /// Validate the configuration and build the [`Optimizer`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] or [`Error::DimensionMismatch`] for
    /// bad bounds, and the errors of [`Settings::validate`].
    pub fn build(self) -> Result<Optimizer<O>> {
        let space = SearchSpace::new(self.lower, self.upper)?;
        let base = self.base;
        let max_eval = self.max_eval.unwrap_or(base.max_eval);
        let settings = Settings {
            num_outputs: self.num_outputs.unwrap_or(base.num_outputs),
            init_size: self.init_size.unwrap_or(base.init_size),
            max_eval,
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            force_select_hyp: self.force_select_hyp.unwrap_or(base.force_select_hyp),
            tol_no_improvement: self.tol_no_improvement.unwrap_or(base.tol_no_improvement),
            eval_fixed: self.eval_fixed.unwrap_or(if self.max_eval.is_some() {
                max_eval
            } else {
                base.eval_fixed
            }),
            noise_free: self.noise_free.unwrap_or(base.noise_free),
            noise_lower_bound: self.noise_lower_bound.unwrap_or(base.noise_lower_bound),
            use_sobol: self.use_sobol.unwrap_or(base.use_sobol),
            posterior_reference: self.posterior_reference.unwrap_or(base.posterior_reference),
            ei_jitter: self.ei_jitter.unwrap_or(base.ei_jitter),
            kappa: self.kappa.unwrap_or(base.kappa),
            duplicate_epsilon: self.duplicate_epsilon.unwrap_or(base.duplicate_epsilon),
            selection: self.selection.unwrap_or(base.selection),
            acquisition_pool: self.acquisition_pool.unwrap_or(base.acquisition_pool),
            moea: self.moea.unwrap_or(base.moea),
            hyperparameter_candidates: self
                .hyperparameter_candidates
                .unwrap_or(base.hyperparameter_candidates),
            seed: self.seed.or(base.seed),
        };
        settings.validate()?;
        Ok(Optimizer::from_parts(self.objective, space, settings, self.journal))
    }
}
