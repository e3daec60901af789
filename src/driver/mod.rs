//! The Bayesian optimization loop.
//!
//! An [`Optimizer`] owns the search space, the Gaussian-process surrogate,
//! the database of evaluations and the incumbent. Every iteration it:
//!
//! 1. retrains the surrogate, re-selecting hyperparameters when the search
//!    stagnates (or always, with `force_select_hyp`) until `eval_fixed`
//!    evaluations have been spent;
//! 2. locates the best predicted point;
//! 3. proposes a batch in one of the [`Branch`]es;
//! 4. moves colliding points away with the [`DuplicateGuard`], evaluates
//!    the batch in parallel, and updates the incumbent and counters.
//!
//! [`one_step`](Optimizer::one_step) picks the branch automatically: while
//! no feasible point is known it maximizes the probability of feasibility,
//! every `tol_no_improvement` non-improving iterations it explores, and
//! otherwise it exploits the acquisition ensemble.
//!
//! ```
//! use acq_ensemble::prelude::*;
//!
//! let mut optimizer = Optimizer::builder(
//!     Scalar(|x: &[f64]| (x[0] - 0.3).powi(2) + (x[1] + 0.2).powi(2)),
//!     vec![-1.0, -1.0],
//!     vec![1.0, 1.0],
//! )
//! .init_size(6)
//! .max_eval(8)
//! .moea(MoeaConfig { population_size: 16, generations: 8, ..MoeaConfig::default() })
//! .hyperparameter_candidates(50)
//! .seed(1)
//! .build()
//! .unwrap();
//!
//! optimizer.optimize().unwrap();
//! assert_eq!(optimizer.phase(), Phase::Terminated);
//! assert!(optimizer.eval_counter() >= 8);
//! ```

mod builder;
#[cfg(feature = "journal")]
mod journal;
mod record;

use core::fmt;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

pub use builder::{
    DEFAULT_BATCH_SIZE, DEFAULT_HYPERPARAMETER_CANDIDATES, DEFAULT_INIT_SIZE, DEFAULT_MAX_EVAL,
    DEFAULT_NOISE_LOWER_BOUND, DEFAULT_TOL_NO_IMPROVEMENT, OptimizerBuilder, Settings,
};
#[cfg(feature = "journal")]
pub use journal::IterationJournal;
pub use record::{IterationRecord, PointRecord};

use crate::acquisition::{Acquisition, AcquisitionContext, LowerConfidenceBound, NegatedAcquisition};
use crate::duplicate::DuplicateGuard;
use crate::ensemble::{EnsembleSearch, feasibility_search};
use crate::error::{Error, Result};
use crate::io;
use crate::objective::{self, Objective};
use crate::posterior::{self, BestPosterior};
use crate::solver::Bounds;
use crate::solver::de::DifferentialEvolution;
use crate::solver::local::LocalAlgorithm;
use crate::solver::moo::MoeaConfig;
use crate::solver::multistart::MultiStart;
use crate::space::SearchSpace;
use crate::surrogate::{GaussianProcess, Hyperparameters, Surrogate};

/// Global-search evaluations per dimension for exploration and batch LCB.
const BATCH_GLOBAL_EVALS_PER_DIM: usize = 100;
const BATCH_GLOBAL_POPULATION: usize = 25;
/// Local refinement budget of batch LCB picks.
const BATCH_LOCAL_ITERS: usize = 40;

/// Lifecycle of an [`Optimizer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// No data yet.
    Uninitialized,
    /// Initial data loaded, no iteration run.
    Initialized,
    /// At least one iteration run, budget left.
    Iterating,
    /// Evaluation budget spent.
    Terminated,
}

/// How an iteration proposes its batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Branch {
    /// Maximize the probability of feasibility; one point.
    Feasibility,
    /// Maximize posterior variance under fantasized observations.
    Exploration,
    /// Multi-objective search over the acquisition ensemble.
    Exploitation,
    /// Sequential lower confidence bound with fantasized observations.
    BatchLcb,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Feasibility => "feasibility",
            Self::Exploration => "exploration",
            Self::Exploitation => "exploitation",
            Self::BatchLcb => "batch_lcb",
        })
    }
}

/// The incumbent under the feasibility-first ordering.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestSolution {
    /// Location, in the user's domain.
    pub x: Vec<f64>,
    /// Observed outputs.
    pub y: Vec<f64>,
}

/// Progress counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Counters {
    /// True evaluations spent by the optimizer.
    pub eval_counter: usize,
    /// Consecutive iterations without improvement of the incumbent.
    pub no_improve_counter: usize,
}

/// Every evaluation so far, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Database {
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
}

impl Database {
    /// Number of evaluations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns `true` if nothing has been evaluated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Evaluated points, in the canonical domain.
    #[must_use]
    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Observed outputs, aligned with [`inputs`](Self::inputs).
    #[must_use]
    pub fn outputs(&self) -> &[Vec<f64>] {
        &self.y
    }

    fn extend(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) {
        self.x.extend_from_slice(x);
        self.y.extend_from_slice(y);
    }
}

/// Batch Bayesian optimizer over a box.
pub struct Optimizer<O> {
    objective: O,
    space: SearchSpace,
    settings: Settings,
    guard: DuplicateGuard,
    rng: fastrand::Rng,
    phase: Phase,
    gp: Option<GaussianProcess>,
    hyperparameters: Vec<Hyperparameters>,
    database: Database,
    best: Option<BestSolution>,
    counters: Counters,
    initial_evals: usize,
    iteration: usize,
    kappa: f64,
    best_posterior: Option<BestPosterior>,
    #[cfg(feature = "journal")]
    journal: Option<IterationJournal>,
}

impl<O: Objective> Optimizer<O> {
    /// Start configuring an optimizer of `objective` over `[lower, upper]`.
    #[must_use]
    pub fn builder(objective: O, lower: Vec<f64>, upper: Vec<f64>) -> OptimizerBuilder<O> {
        OptimizerBuilder::new(objective, lower, upper)
    }

    #[cfg_attr(not(feature = "journal"), allow(clippy::needless_pass_by_value))]
    fn from_parts(
        objective: O,
        space: SearchSpace,
        settings: Settings,
        journal: Option<PathBuf>,
    ) -> Self {
        let rng = settings
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let kappa = settings.kappa.kappa_at(1.0, space.dim());
        #[cfg(not(feature = "journal"))]
        let _ = journal;
        Self {
            guard: DuplicateGuard::new(settings.duplicate_epsilon),
            objective,
            space,
            settings,
            rng,
            phase: Phase::Uninitialized,
            gp: None,
            hyperparameters: Vec::new(),
            database: Database::default(),
            best: None,
            counters: Counters::default(),
            initial_evals: 0,
            iteration: 0,
            kappa,
            best_posterior: None,
            #[cfg(feature = "journal")]
            journal: journal.map(IterationJournal::new),
        }
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Seed the surrogate with already evaluated points.
    ///
    /// `x` holds one user-domain point per entry and `y` the matching
    /// outputs. Supplied points do not count against the evaluation budget.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`] on a second call,
    /// [`Error::TooFewSamples`] for fewer than two points,
    /// [`Error::DimensionMismatch`] for inconsistent sizes,
    /// [`Error::NonFiniteOutputs`] and [`Error::OutOfBounds`].
    pub fn initialize_with(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()> {
        self.check_uninitialized()?;
        if x.len() != y.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(Error::TooFewSamples(x.len()));
        }
        for (index, (xi, yi)) in x.iter().zip(y).enumerate() {
            if xi.len() != self.space.dim() {
                return Err(Error::DimensionMismatch {
                    expected: self.space.dim(),
                    got: xi.len(),
                });
            }
            if yi.len() != self.settings.num_outputs {
                return Err(Error::DimensionMismatch {
                    expected: self.settings.num_outputs,
                    got: yi.len(),
                });
            }
            if !self.space.contains(xi) {
                return Err(Error::OutOfBounds { index });
            }
        }
        if y.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteOutputs);
        }

        let canonical: Vec<Vec<f64>> = x.iter().map(|p| self.space.unscale(p)).collect();
        self.seed_surrogate(canonical, y.to_vec())
    }

    /// Seed the surrogate from two matrix files.
    ///
    /// The input file is `dim × N` (one point per column) and the output
    /// file `num_outputs × N`, in the format of [`io::read_matrix`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MatrixFile`] for unreadable files and the errors of
    /// [`initialize_with`](Self::initialize_with).
    pub fn initialize_from_files(
        &mut self,
        x_path: impl AsRef<Path>,
        y_path: impl AsRef<Path>,
    ) -> Result<()> {
        let x = io::columns(&io::read_matrix(x_path)?);
        let y = io::columns(&io::read_matrix(y_path)?);
        self.initialize_with(&x, &y)
    }

    /// Evaluate a space-filling design of `n` points and seed the surrogate
    /// with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyInitialized`], [`Error::TooFewSamples`] for
    /// `n < 2`, [`Error::ObjectiveDimensionMismatch`] if the objective
    /// returns the wrong number of outputs and [`Error::NonFiniteOutputs`].
    pub fn initialize(&mut self, n: usize) -> Result<()> {
        self.check_uninitialized()?;
        if n < 2 {
            return Err(Error::TooFewSamples(n));
        }
        let x = self
            .space
            .design_of_experiments(n, self.settings.use_sobol, &mut self.rng);
        let y = self.evaluate_batch(&x)?;
        if y.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteOutputs);
        }
        self.counters.eval_counter += n;
        self.initial_evals = n;
        self.seed_surrogate(x, y)
    }

    fn check_uninitialized(&self) -> Result<()> {
        if self.phase == Phase::Uninitialized {
            Ok(())
        } else {
            Err(Error::AlreadyInitialized)
        }
    }

    fn seed_surrogate(&mut self, x: Vec<Vec<f64>>, y: Vec<Vec<f64>>) -> Result<()> {
        let mut best = 0;
        for (i, yi) in y.iter().enumerate().skip(1) {
            if objective::better(yi, &y[best]) {
                best = i;
            }
        }
        self.best = Some(BestSolution {
            x: self.space.rescale(&x[best]),
            y: y[best].clone(),
        });
        self.database.extend(&x, &y);

        let mut gp = GaussianProcess::new(x, y)?;
        gp.set_noise_free(self.settings.noise_free);
        gp.set_noise_lower_bound(self.settings.noise_lower_bound);
        self.hyperparameters = gp.default_hyperparameters();
        self.gp = Some(gp);
        self.counters.no_improve_counter = 0;
        self.phase = if self.counters.eval_counter >= self.settings.max_eval {
            Phase::Terminated
        } else {
            Phase::Initialized
        };
        trace_info!(
            points = self.database.len(),
            feasible = self.has_feasible(),
            "optimizer initialized"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Iteration
    // -----------------------------------------------------------------------

    /// Run until the evaluation budget is spent, initializing with the
    /// configured design size first if needed.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`initialize`](Self::initialize) and
    /// [`one_step`](Self::one_step).
    pub fn optimize(&mut self) -> Result<Vec<IterationRecord>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!(
            "optimize",
            max_eval = self.settings.max_eval,
            batch_size = self.settings.batch_size
        )
        .entered();

        if self.phase == Phase::Uninitialized {
            self.initialize(self.settings.init_size)?;
        }
        let mut records = Vec::new();
        while self.counters.eval_counter < self.settings.max_eval {
            records.push(self.one_step()?);
        }
        Ok(records)
    }

    /// Run batch-LCB iterations until the evaluation budget is spent.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`initialize`](Self::initialize) and
    /// [`blcb_step`](Self::blcb_step).
    pub fn optimize_blcb(&mut self) -> Result<Vec<IterationRecord>> {
        #[cfg(feature = "tracing")]
        let _span = tracing::info_span!("optimize_blcb", max_eval = self.settings.max_eval).entered();

        if self.phase == Phase::Uninitialized {
            self.initialize(self.settings.init_size)?;
        }
        let mut records = Vec::new();
        while self.counters.eval_counter < self.settings.max_eval {
            records.push(self.blcb_step()?);
        }
        Ok(records)
    }

    /// The branch [`one_step`](Self::one_step) would take next.
    #[must_use]
    pub fn next_branch(&self) -> Branch {
        let stalled = self.counters.no_improve_counter;
        if !self.has_feasible() {
            Branch::Feasibility
        } else if stalled > 0 && stalled % self.settings.tol_no_improvement == 0 {
            Branch::Exploration
        } else {
            Branch::Exploitation
        }
    }

    /// Run one iteration in the automatically chosen branch.
    ///
    /// # Errors
    ///
    /// See [`step_with`](Self::step_with).
    pub fn one_step(&mut self) -> Result<IterationRecord> {
        let branch = self.next_branch();
        self.step_with(branch)
    }

    /// Run one batch-LCB iteration.
    ///
    /// # Errors
    ///
    /// See [`step_with`](Self::step_with).
    pub fn blcb_step(&mut self) -> Result<IterationRecord> {
        self.step_with(Branch::BatchLcb)
    }

    /// Run one iteration in `branch`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] before initialization,
    /// [`Error::ConstrainedUnsupported`] for exploration, exploitation and
    /// batch LCB on multi-output problems, [`Error::NonFiniteOutputs`] if the
    /// objective returns NaN or infinity (the iteration is then discarded),
    /// and propagates surrogate, local search and objective errors.
    pub fn step_with(&mut self, branch: Branch) -> Result<IterationRecord> {
        if self.phase == Phase::Uninitialized {
            return Err(Error::NotInitialized);
        }
        let outputs = self.settings.num_outputs;
        if outputs > 1 && branch != Branch::Feasibility {
            return Err(Error::ConstrainedUnsupported { outputs });
        }

        self.train_surrogate()?;
        let gp = self.gp.as_ref().ok_or(Error::NotInitialized)?;
        let incumbent = self.incumbent_canonical()?;

        let proposed = match branch {
            Branch::Feasibility => {
                self.best_posterior = Some(posterior::estimate(gp, &incumbent, &mut self.rng)?);
                let config = run_config(&self.settings.moea, &mut self.rng);
                feasibility_search(gp, &config)?.set
            }
            Branch::Exploration => {
                self.best_posterior = Some(posterior::estimate(gp, &incumbent, &mut self.rng)?);
                trace_info!("sampling points of maximal uncertainty");
                exploration_batch(gp, self.settings.batch_size, &mut self.rng)?
            }
            Branch::Exploitation => {
                let best_posterior = posterior::estimate(gp, &incumbent, &mut self.rng)?;
                self.kappa = self.current_kappa();
                let tau = self.tau(&best_posterior);
                let context = AcquisitionContext::new(gp, tau, self.kappa)?;
                let config = run_config(&self.settings.moea, &mut self.rng);
                let search =
                    EnsembleSearch::new(&context, &self.settings.acquisition_pool, config)?;
                let anchors = search.anchors(&incumbent, &best_posterior.x, &mut self.rng)?;
                let solution = search.optimize(anchors);
                self.best_posterior = Some(best_posterior);
                self.settings.selection.select(
                    &solution,
                    self.settings.batch_size,
                    self.space.dim(),
                    gp.train_inputs(),
                    &mut self.rng,
                )
            }
            Branch::BatchLcb => {
                self.kappa = self.current_kappa();
                blcb_batch(gp, &incumbent, self.kappa, self.settings.batch_size, &mut self.rng)?
            }
        };

        let batch = self.guard.adjust(proposed, gp.train_inputs(), &mut self.rng);
        self.evaluate_and_record(branch, &batch)
    }

    /// Retrain, re-selecting hyperparameters on stagnation or when forced.
    fn train_surrogate(&mut self) -> Result<()> {
        let Counters {
            eval_counter,
            no_improve_counter,
        } = self.counters;
        let frozen = eval_counter > self.settings.eval_fixed;
        let stalled = no_improve_counter > 0
            && no_improve_counter % self.settings.tol_no_improvement == 0;
        let gp = self.gp.as_mut().ok_or(Error::NotInitialized)?;

        gp.set_fixed(frozen);
        if (self.settings.force_select_hyp || stalled) && !frozen {
            trace_info!("re-selecting surrogate hyperparameters");
            self.hyperparameters = gp.select_init_hyperparameters(
                self.settings.hyperparameter_candidates,
                &self.hyperparameters,
                &mut self.rng,
            )?;
        }
        gp.train(&self.hyperparameters)?;
        self.hyperparameters = gp.hyperparameters().to_vec();
        Ok(())
    }

    fn evaluate_and_record(
        &mut self,
        branch: Branch,
        batch: &[Vec<f64>],
    ) -> Result<IterationRecord> {
        let y = self.evaluate_batch(batch)?;
        if y.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::NonFiniteOutputs);
        }
        let gp = self.gp.as_mut().ok_or(Error::NotInitialized)?;

        let points: Vec<PointRecord> = batch
            .iter()
            .zip(&y)
            .map(|(x, observed)| {
                let (predicted_mean, predicted_std): (Vec<f64>, Vec<f64>) = (0..gp.num_outputs())
                    .map(|o| {
                        let p = gp.predict(o, x);
                        (p.mean, p.std())
                    })
                    .unzip();
                PointRecord {
                    x: self.space.rescale(x),
                    predicted_mean,
                    predicted_std,
                    observed: observed.clone(),
                }
            })
            .collect();

        let best = self.best.as_mut().ok_or(Error::NotInitialized)?;
        let mut improved = false;
        for (x, yi) in batch.iter().zip(&y) {
            if objective::better(yi, &best.y) {
                best.x = self.space.rescale(x);
                best.y.clone_from(yi);
                improved = true;
            }
        }
        if improved {
            self.counters.no_improve_counter = 0;
        } else {
            self.counters.no_improve_counter += 1;
        }
        self.counters.eval_counter += batch.len();

        gp.add_data(batch, &y)?;
        self.database.extend(batch, &y);
        self.phase = if self.counters.eval_counter >= self.settings.max_eval {
            Phase::Terminated
        } else {
            Phase::Iterating
        };

        let record = IterationRecord {
            iteration: self.iteration,
            branch,
            points,
            kappa: self.kappa,
            best_y: best.y.clone(),
            no_improve_counter: self.counters.no_improve_counter,
            eval_counter: self.counters.eval_counter,
        };
        self.iteration += 1;

        #[cfg(feature = "tracing")]
        for point in &record.points {
            trace_debug!(
                x = ?point.x,
                predicted_mean = ?point.predicted_mean,
                predicted_std = ?point.predicted_std,
                observed = ?point.observed,
                "evaluated"
            );
        }
        trace_info!(
            iteration = record.iteration,
            branch = %branch,
            eval_counter = record.eval_counter,
            kappa = record.kappa,
            best_y = ?record.best_y,
            no_improve_counter = record.no_improve_counter,
            "iteration complete"
        );
        #[cfg(feature = "journal")]
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&record) {
                trace_warn!(error = %e, "failed to append iteration record");
                #[cfg(not(feature = "tracing"))]
                let _ = e;
            }
        }
        Ok(record)
    }

    /// Evaluate canonical points in parallel; results keep the batch order.
    fn evaluate_batch(&self, batch: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let expected = self.settings.num_outputs;
        batch
            .par_iter()
            .map(|x| {
                let y = self.objective.evaluate(&self.space.rescale(x));
                if y.len() == expected {
                    Ok(y)
                } else {
                    Err(Error::ObjectiveDimensionMismatch {
                        expected,
                        got: y.len(),
                    })
                }
            })
            .collect()
    }

    fn incumbent_canonical(&self) -> Result<Vec<f64>> {
        self.best
            .as_ref()
            .map(|b| self.space.unscale(&b.x))
            .ok_or(Error::NotInitialized)
    }

    fn current_kappa(&self) -> f64 {
        self.settings.kappa.kappa(
            self.counters.eval_counter,
            self.initial_evals,
            self.settings.batch_size,
            self.space.dim(),
        )
    }

    /// Improvement baseline of the objective.
    fn tau(&self, best_posterior: &BestPosterior) -> f64 {
        let reference = if self.settings.posterior_reference {
            best_posterior.y[0]
        } else {
            self.best.as_ref().map_or(best_posterior.y[0], |b| b.y[0])
        };
        reference - self.settings.ei_jitter.max(0.0)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The resolved settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The search space.
    #[must_use]
    pub fn space(&self) -> &SearchSpace {
        &self.space
    }

    /// The incumbent, once initialized.
    #[must_use]
    pub fn best(&self) -> Option<&BestSolution> {
        self.best.as_ref()
    }

    /// Location of the incumbent, in the user's domain.
    #[must_use]
    pub fn best_x(&self) -> Option<&[f64]> {
        self.best.as_ref().map(|b| b.x.as_slice())
    }

    /// Outputs of the incumbent.
    #[must_use]
    pub fn best_y(&self) -> Option<&[f64]> {
        self.best.as_ref().map(|b| b.y.as_slice())
    }

    /// Whether a point satisfying every constraint has been observed.
    #[must_use]
    pub fn has_feasible(&self) -> bool {
        self.best.as_ref().is_some_and(|b| objective::is_feasible(&b.y))
    }

    /// True evaluations spent by the optimizer.
    #[must_use]
    pub fn eval_counter(&self) -> usize {
        self.counters.eval_counter
    }

    /// Consecutive iterations without improvement.
    #[must_use]
    pub fn no_improve_counter(&self) -> usize {
        self.counters.no_improve_counter
    }

    /// Both progress counters.
    #[must_use]
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Exploration coefficient of the last confidence-bound iteration.
    #[must_use]
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// All evaluations, including the initial data.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Best predicted point of the last iteration, canonical.
    #[must_use]
    pub fn best_posterior(&self) -> Option<&BestPosterior> {
        self.best_posterior.as_ref()
    }

    /// Surrogate hyperparameters, one set per output.
    #[must_use]
    pub fn hyperparameters(&self) -> &[Hyperparameters] {
        &self.hyperparameters
    }

    /// The surrogate, once initialized.
    #[must_use]
    pub fn surrogate(&self) -> Option<&GaussianProcess> {
        self.gp.as_ref()
    }

    /// The journal records are appended to, if configured.
    #[cfg(feature = "journal")]
    #[must_use]
    pub fn journal(&self) -> Option<&IterationJournal> {
        self.journal.as_ref()
    }
}

/// The evolutionary search settings of one run; a missing seed is drawn
/// from `rng`.
fn run_config(config: &MoeaConfig, rng: &mut fastrand::Rng) -> MoeaConfig {
    let mut config = config.clone();
    if config.seed.is_none() {
        config.seed = Some(rng.u64(..));
    }
    config
}

/// `batch_size` points of maximal posterior variance, each fantasized into
/// the model before the next pick.
fn exploration_batch(
    gp: &GaussianProcess,
    batch_size: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Vec<f64>>> {
    let dim = gp.dim();
    let search = DifferentialEvolution::new(Bounds::canonical(dim), dim * BATCH_GLOBAL_EVALS_PER_DIM)
        .population_size(BATCH_GLOBAL_POPULATION);
    let mut model = gp.clone();
    let mut batch = Vec::with_capacity(batch_size);
    for _ in 0..batch_size {
        let context = AcquisitionContext::new(&model, 0.0, 0.0)?;
        let (x, _) = search.minimize(&NegatedAcquisition::new(&context, Acquisition::Variance), &[], rng);
        model = model.fantasize(&x)?;
        batch.push(x);
    }
    Ok(batch)
}

/// Sequential LCB minimization; each pick is fantasized into the model
/// before the next one.
fn blcb_batch(
    gp: &GaussianProcess,
    incumbent: &[f64],
    kappa: f64,
    batch_size: usize,
    rng: &mut fastrand::Rng,
) -> Result<Vec<Vec<f64>>> {
    let dim = gp.dim();
    let bounds = Bounds::canonical(dim);
    let global = DifferentialEvolution::new(bounds.clone(), dim * BATCH_GLOBAL_EVALS_PER_DIM)
        .population_size(BATCH_GLOBAL_POPULATION);
    let local = MultiStart::new(bounds, LocalAlgorithm::Lbfgs, BATCH_LOCAL_ITERS);

    let mut model = gp.clone();
    let mut batch: Vec<Vec<f64>> = Vec::with_capacity(batch_size);
    for _ in 0..batch_size {
        let lcb = LowerConfidenceBound::new(&model, kappa);
        let mut guesses = vec![incumbent.to_vec()];
        guesses.extend(batch.iter().cloned());
        let (explored, _) = global.minimize(&lcb, &guesses, rng);
        let (x, _) = local.refine(&lcb, &[explored])?;
        model = model.fantasize(&x)?;
        batch.push(x);
    }
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objective::Scalar;

    type Quadratic = Scalar<fn(&[f64]) -> f64>;

    fn quadratic(x: &[f64]) -> f64 {
        x.iter().map(|v| (v - 0.5).powi(2)).sum()
    }

    fn small(builder: OptimizerBuilder<Quadratic>) -> OptimizerBuilder<Quadratic> {
        builder
            .moea(MoeaConfig {
                population_size: 12,
                generations: 6,
                ..MoeaConfig::default()
            })
            .hyperparameter_candidates(20)
            .seed(3)
    }

    fn optimizer() -> Optimizer<Quadratic> {
        small(Optimizer::builder(Scalar(quadratic as fn(&[f64]) -> f64), vec![0.0, 0.0], vec![1.0, 1.0]))
            .max_eval(30)
            .build()
            .unwrap()
    }

    #[test]
    fn next_branch_follows_stagnation() {
        let mut opt = optimizer();
        opt.initialize(4).unwrap();
        assert_eq!(opt.next_branch(), Branch::Exploitation);
        opt.counters.no_improve_counter = opt.settings.tol_no_improvement;
        assert_eq!(opt.next_branch(), Branch::Exploration);
        opt.counters.no_improve_counter += 1;
        assert_eq!(opt.next_branch(), Branch::Exploitation);
    }

    #[test]
    fn initial_best_uses_feasibility_first_order() {
        let mut opt = small(Optimizer::builder(
            Scalar(quadratic as fn(&[f64]) -> f64),
            vec![0.0],
            vec![1.0],
        ))
        .num_outputs(2)
        .build()
        .unwrap();
        let x = vec![vec![0.1], vec![0.5], vec![0.9]];
        let y = vec![vec![-3.0, 1.0], vec![2.0, -1.0], vec![1.0, -0.5]];
        opt.initialize_with(&x, &y).unwrap();
        assert_eq!(opt.best_y(), Some(&[1.0, -0.5][..]));
        assert!(opt.has_feasible());
        assert_eq!(opt.eval_counter(), 0);
    }

    #[test]
    fn tau_subtracts_positive_jitter_only() {
        let mut opt = optimizer();
        opt.initialize(4).unwrap();
        let best = opt.best_y().unwrap()[0];
        let posterior = BestPosterior {
            x: vec![0.0, 0.0],
            y: vec![best - 1.0],
        };
        opt.settings.ei_jitter = 0.25;
        assert!((opt.tau(&posterior) - (best - 0.25)).abs() < 1e-15);
        opt.settings.ei_jitter = -4.0;
        assert!((opt.tau(&posterior) - best).abs() < 1e-15);
        opt.settings.posterior_reference = true;
        assert!((opt.tau(&posterior) - (best - 1.0)).abs() < 1e-15);
    }

    #[test]
    fn fixed_moea_seed_is_kept() {
        let mut rng = fastrand::Rng::with_seed(1);
        let fixed = MoeaConfig {
            seed: Some(99),
            ..MoeaConfig::default()
        };
        assert_eq!(run_config(&fixed, &mut rng).seed, Some(99));
        assert!(run_config(&MoeaConfig::default(), &mut rng).seed.is_some());
    }

    #[test]
    fn exploration_batch_spreads_out() {
        let x: Vec<Vec<f64>> = vec![vec![-20.0, -20.0], vec![0.0, 0.0], vec![20.0, 20.0]];
        let y = x.iter().map(|p| vec![p[0] + p[1]]).collect();
        let mut gp = GaussianProcess::new(x, y).unwrap();
        let hyps = gp.default_hyperparameters();
        gp.set_fixed(true);
        gp.train(&hyps).unwrap();
        let mut rng = fastrand::Rng::with_seed(4);
        let batch = exploration_batch(&gp, 3, &mut rng).unwrap();
        assert_eq!(batch.len(), 3);
        for (i, a) in batch.iter().enumerate() {
            for b in &batch[..i] {
                assert!(crate::space::distance(a, b) > 1.0);
            }
        }
    }
}
