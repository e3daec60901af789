//! Independent per-output Gaussian processes over shared inputs.
//!
//! Each output gets its own GP with a **Matérn 5/2 kernel** (ARD
//! lengthscales), zero prior mean on standardized outputs and a Gaussian
//! noise term. Hyperparameters are fitted by minimizing the negative log
//! marginal likelihood (NLZ) with bounded Nelder-Mead in log space, unless
//! the model is fixed.
//!
//! | Hyperparameter | Search range (log space) |
//! |----------------|--------------------------|
//! | lengthscale | `[ln 0.1, ln 500]` canonical units |
//! | signal std | `[-3, 3]` |
//! | noise std | `[ln sqrt(noise_lower_bound), 0]` |
//!
//! Noise variances are expressed in standardized-output units.

use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector, Dyn};
use rayon::prelude::*;

use super::{Prediction, PredictionGradient, Surrogate};
use crate::error::{Error, Result};
use crate::solver::local::{LocalAlgorithm, LocalSearch};
use crate::solver::{Bounds, CostFunction};
use crate::space::canonical_width;

/// Precomputed √5 constant.
const SQRT_5: f64 = 2.236_067_977_499_79;
/// `ln(2π)`.
const LN_2PI: f64 = 1.837_877_066_409_345_5;

const LOG_LENGTHSCALE_MIN: f64 = -2.302_585_092_994_046;
const LOG_LENGTHSCALE_MAX: f64 = 6.214_608_098_422_191;
const LOG_SIGNAL_STD_MIN: f64 = -3.0;
const LOG_SIGNAL_STD_MAX: f64 = 3.0;
const LOG_NOISE_STD_MAX: f64 = 0.0;

/// Noise variance of a noise-free model.
const NOISE_FREE_VARIANCE: f64 = 1e-10;
/// Diagonal jitter ladder, relative to the signal variance.
const JITTER: [f64; 4] = [0.0, 1e-10, 1e-8, 1e-6];
/// Smallest reported predictive variance.
const VARIANCE_FLOOR: f64 = 1e-16;
/// Nelder-Mead iterations per hyperparameter.
const TRAIN_ITERS_PER_PARAM: usize = 100;

/// Log-space hyperparameters of one output's GP.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Hyperparameters {
    /// `ln` of the per-dimension lengthscales.
    pub log_lengthscales: Vec<f64>,
    /// `ln` of the signal standard deviation.
    pub log_signal_std: f64,
    /// `ln` of the noise standard deviation.
    pub log_noise_std: f64,
}

impl Hyperparameters {
    fn lengthscales(&self) -> Vec<f64> {
        self.log_lengthscales.iter().map(|v| v.exp()).collect()
    }

    fn signal_variance(&self) -> f64 {
        (2.0 * self.log_signal_std).exp()
    }

    fn to_params(&self, with_noise: bool) -> Vec<f64> {
        let mut p = self.log_lengthscales.clone();
        p.push(self.log_signal_std);
        if with_noise {
            p.push(self.log_noise_std);
        }
        p
    }

    fn from_params(p: &[f64], dim: usize, fallback_noise: f64) -> Self {
        Self {
            log_lengthscales: p[..dim].to_vec(),
            log_signal_std: p[dim],
            log_noise_std: p.get(dim + 1).copied().unwrap_or(fallback_noise),
        }
    }
}

// ---------------------------------------------------------------------------
// Matérn 5/2 kernel
// ---------------------------------------------------------------------------

/// `k(x1, x2) = σ² (1 + √5 r + 5/3 r²) exp(-√5 r)`,
/// `r = sqrt(Σ ((x1_i - x2_i) / l_i)²)`.
fn matern52(x1: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> f64 {
    let r_sq: f64 = x1
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = SQRT_5 * r_sq.sqrt();
    signal_var * (1.0 + sqrt5_r + 5.0 / 3.0 * r_sq) * (-sqrt5_r).exp()
}

/// Gradient of `k(x, x2)` with respect to `x`:
/// `-σ² (5/3) (1 + √5 r) exp(-√5 r) (x_i - x2_i) / l_i²`.
fn matern52_grad(x: &[f64], x2: &[f64], lengthscales: &[f64], signal_var: f64) -> Vec<f64> {
    let r_sq: f64 = x
        .iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| ((a - b) / l).powi(2))
        .sum();
    let sqrt5_r = SQRT_5 * r_sq.sqrt();
    let scale = -signal_var * 5.0 / 3.0 * (1.0 + sqrt5_r) * (-sqrt5_r).exp();
    x.iter()
        .zip(x2)
        .zip(lengthscales)
        .map(|((a, b), l)| scale * (a - b) / (l * l))
        .collect()
}

/// Cholesky factor of `K + (noise + jitter) I`, climbing the jitter ladder.
fn factorize(
    x: &[Vec<f64>],
    hyp: &Hyperparameters,
    noise_var: f64,
) -> Option<Cholesky<f64, Dyn>> {
    let n = x.len();
    let lengthscales = hyp.lengthscales();
    let signal_var = hyp.signal_variance();
    let kernel = DMatrix::from_fn(n, n, |i, j| matern52(&x[i], &x[j], &lengthscales, signal_var));
    JITTER.iter().find_map(|jitter| {
        let diagonal = DMatrix::<f64>::identity(n, n) * (noise_var + jitter * signal_var);
        Cholesky::new(&kernel + diagonal)
    })
}

/// Standardize `y`; a constant vector keeps unit scale.
#[allow(clippy::cast_precision_loss)]
fn standardize(y: &[f64]) -> (Vec<f64>, f64, f64) {
    let n = y.len() as f64;
    let mean = y.iter().sum::<f64>() / n;
    let var = if y.len() > 1 {
        y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
    } else {
        0.0
    };
    let std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
    (y.iter().map(|v| (v - mean) / std).collect(), mean, std)
}

/// Negative log marginal likelihood from a factorization.
#[allow(clippy::cast_precision_loss)]
fn nlz(chol: &Cholesky<f64, Dyn>, y: &DVector<f64>, alpha: &DVector<f64>) -> f64 {
    let log_det_half: f64 = chol.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    0.5 * y.dot(alpha) + log_det_half + 0.5 * y.len() as f64 * LN_2PI
}

/// A fitted GP for one output.
#[derive(Clone, Debug)]
struct OutputModel {
    hyp: Hyperparameters,
    lengthscales: Vec<f64>,
    signal_var: f64,
    y_mean: f64,
    y_std: f64,
    chol: Cholesky<f64, Dyn>,
    alpha: DVector<f64>,
    nlz: f64,
}

impl OutputModel {
    fn fit(x: &[Vec<f64>], y: &[f64], hyp: &Hyperparameters, noise_var: f64) -> Option<Self> {
        let (standardized, y_mean, y_std) = standardize(y);
        let chol = factorize(x, hyp, noise_var)?;
        let y_vec = DVector::from_vec(standardized);
        let alpha = chol.solve(&y_vec);
        let nlz = nlz(&chol, &y_vec, &alpha);
        Some(Self {
            hyp: hyp.clone(),
            lengthscales: hyp.lengthscales(),
            signal_var: hyp.signal_variance(),
            y_mean,
            y_std,
            chol,
            alpha,
            nlz,
        })
    }

    fn kernel_vector(&self, x: &[f64], train: &[Vec<f64>]) -> DVector<f64> {
        DVector::from_fn(train.len(), |i, _| {
            matern52(x, &train[i], &self.lengthscales, self.signal_var)
        })
    }
}

/// NLZ of standardized outputs as a function of log hyperparameters.
struct NegLogLikelihood<'a> {
    x: &'a [Vec<f64>],
    y: DVector<f64>,
    dim: usize,
    fixed_log_noise: f64,
    noise: NoiseModel,
}

impl CostFunction for NegLogLikelihood<'_> {
    fn cost(&self, params: &[f64]) -> f64 {
        let hyp = Hyperparameters::from_params(params, self.dim, self.fixed_log_noise);
        match factorize(self.x, &hyp, self.noise.variance(&hyp)) {
            Some(chol) => {
                let alpha = chol.solve(&self.y);
                nlz(&chol, &self.y, &alpha)
            }
            None => f64::INFINITY,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct NoiseModel {
    noise_free: bool,
    lower_bound: f64,
}

impl NoiseModel {
    fn variance(self, hyp: &Hyperparameters) -> f64 {
        if self.noise_free {
            NOISE_FREE_VARIANCE
        } else {
            (2.0 * hyp.log_noise_std).exp().max(self.lower_bound)
        }
    }

    fn log_std_min(self) -> f64 {
        (0.5 * self.lower_bound.max(1e-12).ln()).min(LOG_NOISE_STD_MAX)
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Gaussian process surrogate with one independent model per output.
///
/// ```
/// use acq_ensemble::surrogate::{GaussianProcess, Surrogate};
///
/// let x = vec![vec![-10.0], vec![0.0], vec![10.0]];
/// let y = vec![vec![1.0], vec![0.0], vec![1.0]];
/// let mut gp = GaussianProcess::new(x, y).unwrap();
/// gp.set_noise_free(true);
/// gp.set_fixed(true);
/// let hyps = gp.default_hyperparameters();
/// gp.train(&hyps).unwrap();
/// assert!((gp.predict(0, &[0.0]).mean).abs() < 1e-3);
/// ```
#[derive(Clone, Debug)]
pub struct GaussianProcess {
    x: Vec<Vec<f64>>,
    y: Vec<Vec<f64>>,
    dim: usize,
    num_outputs: usize,
    fixed: bool,
    noise: NoiseModel,
    hyperparameters: Vec<Hyperparameters>,
    models: Vec<OutputModel>,
}

impl GaussianProcess {
    /// Create an untrained model from inputs `x` and outputs `y`, one entry
    /// per observation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] if `x` and `y` differ in length,
    /// are empty, or contain rows of inconsistent size.
    pub fn new(x: Vec<Vec<f64>>, y: Vec<Vec<f64>>) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len().max(1),
                got: y.len(),
            });
        }
        let dim = x[0].len();
        let num_outputs = y[0].len();
        check_rows(&x, dim)?;
        check_rows(&y, num_outputs)?;
        if dim == 0 || num_outputs == 0 {
            return Err(Error::DimensionMismatch {
                expected: 1,
                got: 0,
            });
        }
        Ok(Self {
            x,
            y,
            dim,
            num_outputs,
            fixed: false,
            noise: NoiseModel {
                noise_free: false,
                lower_bound: 1e-6,
            },
            hyperparameters: Vec::new(),
            models: Vec::new(),
        })
    }

    /// Data-driven starting hyperparameters, one set per output.
    ///
    /// Lengthscales follow the spread of the training inputs, the signal
    /// std starts at one (outputs are standardized).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn default_hyperparameters(&self) -> Vec<Hyperparameters> {
        let n = self.x.len() as f64;
        let log_lengthscales: Vec<f64> = (0..self.dim)
            .map(|j| {
                let mean = self.x.iter().map(|p| p[j]).sum::<f64>() / n;
                let var = self.x.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
                let spread = if var.sqrt() > 1e-9 {
                    var.sqrt()
                } else {
                    0.25 * canonical_width()
                };
                spread.ln().clamp(LOG_LENGTHSCALE_MIN, LOG_LENGTHSCALE_MAX)
            })
            .collect();
        let log_noise_std = (0.5 * self.noise.lower_bound.max(1e-4).ln()).min(LOG_NOISE_STD_MAX);
        vec![
            Hyperparameters {
                log_lengthscales,
                log_signal_std: 0.0,
                log_noise_std,
            };
            self.num_outputs
        ]
    }

    /// When set, [`train`](Self::train) uses the given hyperparameters as-is.
    pub fn set_fixed(&mut self, fixed: bool) {
        self.fixed = fixed;
    }

    /// Model the observations as exact.
    pub fn set_noise_free(&mut self, noise_free: bool) {
        self.noise.noise_free = noise_free;
    }

    /// Smallest noise variance, in standardized-output units.
    pub fn set_noise_lower_bound(&mut self, variance: f64) {
        self.noise.lower_bound = variance.max(0.0);
    }

    /// Whether training keeps hyperparameters fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Fit every output, starting from `hyps`, and return the NLZ per output.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when `hyps` does not hold one set
    /// per output and [`Error::Cholesky`] when a kernel matrix cannot be
    /// factorized even with jitter.
    pub fn train(&mut self, hyps: &[Hyperparameters]) -> Result<Vec<f64>> {
        if hyps.len() != self.num_outputs
            || hyps.iter().any(|h| h.log_lengthscales.len() != self.dim)
        {
            return Err(Error::DimensionMismatch {
                expected: self.num_outputs,
                got: hyps.len(),
            });
        }
        let fitted: Vec<Option<OutputModel>> = (0..self.num_outputs)
            .into_par_iter()
            .map(|o| {
                let y = self.output_column(o);
                let hyp = if self.fixed {
                    hyps[o].clone()
                } else {
                    self.optimize_hyperparameters(o, &hyps[o])
                };
                OutputModel::fit(&self.x, &y, &hyp, self.noise.variance(&hyp))
            })
            .collect();

        let models = fitted.into_iter().collect::<Option<Vec<_>>>().ok_or(Error::Cholesky)?;
        self.hyperparameters = models.iter().map(|m| m.hyp.clone()).collect();
        let nlz = models.iter().map(|m| m.nlz).collect();
        self.models = models;
        trace_debug!(outputs = self.num_outputs, "GP trained");
        Ok(nlz)
    }

    /// Random multi-start over the hyperparameter box: for each output, the
    /// candidate with the smallest NLZ among `n` random draws and `current`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] when `current` does not hold one
    /// set per output.
    pub fn select_init_hyperparameters(
        &self,
        n: usize,
        current: &[Hyperparameters],
        rng: &mut fastrand::Rng,
    ) -> Result<Vec<Hyperparameters>> {
        if current.len() != self.num_outputs {
            return Err(Error::DimensionMismatch {
                expected: self.num_outputs,
                got: current.len(),
            });
        }
        let bounds = self.param_bounds();
        let with_noise = !self.noise.noise_free;

        let mut selected = Vec::with_capacity(self.num_outputs);
        for (o, start) in current.iter().enumerate() {
            let mut candidates = vec![start.to_params(with_noise)];
            candidates.extend((0..n).map(|_| bounds.random(rng)));
            let objective = self.likelihood(o, start.log_noise_std);
            let scores: Vec<f64> = candidates.par_iter().map(|p| objective.cost(p)).collect();

            let mut best = 0;
            for (i, s) in scores.iter().enumerate().skip(1) {
                if *s < scores[best] {
                    best = i;
                }
            }
            selected.push(Hyperparameters::from_params(
                &candidates[best],
                self.dim,
                start.log_noise_std,
            ));
        }
        Ok(selected)
    }

    /// Append observations. The model must be retrained afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DimensionMismatch`] on inconsistent sizes.
    pub fn add_data(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> Result<()> {
        if x.len() != y.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len(),
                got: y.len(),
            });
        }
        check_rows(x, self.dim)?;
        check_rows(y, self.num_outputs)?;
        self.x.extend_from_slice(x);
        self.y.extend_from_slice(y);
        self.models.clear();
        Ok(())
    }

    /// A copy of this model that has also observed its own posterior mean
    /// at `x`, refitted with the current hyperparameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurrogateNotTrained`] if the model is untrained and
    /// [`Error::Cholesky`] if the enlarged kernel cannot be factorized.
    pub fn fantasize(&self, x: &[f64]) -> Result<Self> {
        if !self.is_trained() {
            return Err(Error::SurrogateNotTrained);
        }
        let y: Vec<f64> = (0..self.num_outputs).map(|o| self.predict(o, x).mean).collect();
        let mut fantasy = self.clone();
        fantasy.x.push(x.to_vec());
        fantasy.y.push(y);
        let models = (0..self.num_outputs)
            .map(|o| {
                let hyp = &self.hyperparameters[o];
                OutputModel::fit(
                    &fantasy.x,
                    &fantasy.output_column(o),
                    hyp,
                    self.noise.variance(hyp),
                )
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::Cholesky)?;
        fantasy.models = models;
        Ok(fantasy)
    }

    /// Training inputs, one entry per observation.
    #[must_use]
    pub fn train_inputs(&self) -> &[Vec<f64>] {
        &self.x
    }

    /// Training outputs, one entry per observation.
    #[must_use]
    pub fn train_outputs(&self) -> &[Vec<f64>] {
        &self.y
    }

    /// Hyperparameters of the last successful training.
    #[must_use]
    pub fn hyperparameters(&self) -> &[Hyperparameters] {
        &self.hyperparameters
    }

    fn output_column(&self, o: usize) -> Vec<f64> {
        self.y.iter().map(|row| row[o]).collect()
    }

    fn param_bounds(&self) -> Bounds {
        let mut lower = vec![LOG_LENGTHSCALE_MIN; self.dim];
        let mut upper = vec![LOG_LENGTHSCALE_MAX; self.dim];
        lower.push(LOG_SIGNAL_STD_MIN);
        upper.push(LOG_SIGNAL_STD_MAX);
        if !self.noise.noise_free {
            lower.push(self.noise.log_std_min());
            upper.push(LOG_NOISE_STD_MAX);
        }
        Bounds::new(lower, upper)
    }

    fn likelihood(&self, o: usize, fixed_log_noise: f64) -> NegLogLikelihood<'_> {
        let (standardized, _, _) = standardize(&self.output_column(o));
        NegLogLikelihood {
            x: &self.x,
            y: DVector::from_vec(standardized),
            dim: self.dim,
            fixed_log_noise,
            noise: self.noise,
        }
    }

    fn optimize_hyperparameters(&self, o: usize, start: &Hyperparameters) -> Hyperparameters {
        let objective = self.likelihood(o, start.log_noise_std);
        let bounds = self.param_bounds();
        let x0 = start.to_params(!self.noise.noise_free);
        let search = LocalSearch::new(LocalAlgorithm::NelderMead, TRAIN_ITERS_PER_PARAM * x0.len());
        match search.minimize_derivative_free(&objective, &bounds, &x0) {
            Ok((best, _)) => Hyperparameters::from_params(&best, self.dim, start.log_noise_std),
            Err(_) => start.clone(),
        }
    }
}

fn check_rows(rows: &[Vec<f64>], expected: usize) -> Result<()> {
    match rows.iter().find(|r| r.len() != expected) {
        Some(r) => Err(Error::DimensionMismatch {
            expected,
            got: r.len(),
        }),
        None => Ok(()),
    }
}

impl Surrogate for GaussianProcess {
    fn dim(&self) -> usize {
        self.dim
    }

    fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    fn is_trained(&self) -> bool {
        self.models.len() == self.num_outputs
    }

    /// Returns `NaN` mean and variance when the model is untrained.
    fn predict(&self, output: usize, x: &[f64]) -> Prediction {
        let Some(model) = self.models.get(output) else {
            return Prediction {
                mean: f64::NAN,
                variance: f64::NAN,
            };
        };
        let k = model.kernel_vector(x, &self.x);
        let w = model.chol.solve(&k);
        let mean = model.y_mean + model.y_std * k.dot(&model.alpha);
        let variance = (model.y_std * model.y_std * (model.signal_var - k.dot(&w))).max(VARIANCE_FLOOR);
        Prediction { mean, variance }
    }

    fn predict_with_grad(&self, output: usize, x: &[f64]) -> PredictionGradient {
        let Some(model) = self.models.get(output) else {
            return PredictionGradient {
                mean: f64::NAN,
                variance: f64::NAN,
                mean_grad: vec![f64::NAN; x.len()],
                variance_grad: vec![f64::NAN; x.len()],
            };
        };
        let k = model.kernel_vector(x, &self.x);
        let w = model.chol.solve(&k);
        let y_var = model.y_std * model.y_std;
        let mean = model.y_mean + model.y_std * k.dot(&model.alpha);
        let raw_variance = y_var * (model.signal_var - k.dot(&w));

        let mut mean_grad = vec![0.0; self.dim];
        let mut variance_grad = vec![0.0; self.dim];
        for (j, xj) in self.x.iter().enumerate() {
            let dk = matern52_grad(x, xj, &model.lengthscales, model.signal_var);
            for ((mg, vg), d) in mean_grad.iter_mut().zip(variance_grad.iter_mut()).zip(&dk) {
                *mg += model.y_std * model.alpha[j] * d;
                *vg -= 2.0 * y_var * w[j] * d;
            }
        }
        if raw_variance <= VARIANCE_FLOOR {
            variance_grad.iter_mut().for_each(|g| *g = 0.0);
        }

        PredictionGradient {
            mean,
            variance: raw_variance.max(VARIANCE_FLOOR),
            mean_grad,
            variance_grad,
        }
    }
}
