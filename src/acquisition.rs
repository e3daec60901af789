//! Acquisition functions over a trained [`Surrogate`].
//!
//! With `s = sqrt(variance)` and `z = (tau - mean) / s` at a canonical point:
//!
//! | Variant | Name | Value |
//! |---------|------|-------|
//! | [`ExpectedImprovement`](Acquisition::ExpectedImprovement) | `ei` | `s (z Φ(z) + φ(z))` |
//! | [`LogExpectedImprovement`](Acquisition::LogExpectedImprovement) | `log_ei` | `ln EI`, asymptotic below `z = -6` |
//! | [`LcbImprovement`](Acquisition::LcbImprovement) | `lcb_improv` | `tau - (mean - kappa s)` |
//! | [`LcbImprovementTransformed`](Acquisition::LcbImprovementTransformed) | `lcb_improv_transf` | softplus of the above |
//! | [`LogLcbImprovementTransformed`](Acquisition::LogLcbImprovementTransformed) | `log_lcb_improv_transf` | log of the softplus, three regimes |
//! | [`ProbabilityOfImprovementTransformed`](Acquisition::ProbabilityOfImprovementTransformed) | `pi_transf` | `z` |
//! | [`Variance`](Acquisition::Variance) | `s2` | `s²` |
//! | [`LogProbabilityOfFeasibility`](Acquisition::LogProbabilityOfFeasibility) | `log_pf` | `Σ_{i≥1} ln Φ(-mean_i / s_i)` |
//!
//! Every function except `log_pf` reads output `0` only. Larger is better;
//! the cost adapters at the bottom of this module negate values for the
//! minimizing solvers.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::normal::{LN_SQRT_2PI, log_norm_cdf_with_derivative, norm_cdf, norm_pdf};
use crate::solver::{CostFunction, CostGradient, MultiCostFunction};
use crate::surrogate::Surrogate;

/// Below this `z`, log EI switches to its asymptotic form.
const LOG_EI_SWITCH: f64 = -6.0;
/// Above this, softplus is the identity.
const SOFTPLUS_LINEAR: f64 = 20.0;
/// Below this, `ln softplus(v)` uses its series expansion.
const SOFTPLUS_LOG_SERIES: f64 = -10.0;

/// The closed set of acquisition functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Acquisition {
    /// Expected improvement.
    #[cfg_attr(feature = "serde", serde(rename = "ei"))]
    ExpectedImprovement,
    /// Log expected improvement, stable deep in the tail.
    #[cfg_attr(feature = "serde", serde(rename = "log_ei"))]
    LogExpectedImprovement,
    /// Signed improvement of the lower confidence bound over `tau`.
    #[cfg_attr(feature = "serde", serde(rename = "lcb_improv"))]
    LcbImprovement,
    /// Softplus of the LCB improvement.
    #[cfg_attr(feature = "serde", serde(rename = "lcb_improv_transf"))]
    LcbImprovementTransformed,
    /// Log of the softplus of the LCB improvement.
    #[cfg_attr(feature = "serde", serde(rename = "log_lcb_improv_transf"))]
    LogLcbImprovementTransformed,
    /// Standardized improvement `z`, monotone in the probability of improvement.
    #[cfg_attr(feature = "serde", serde(rename = "pi_transf"))]
    ProbabilityOfImprovementTransformed,
    /// Posterior variance of the objective.
    #[cfg_attr(feature = "serde", serde(rename = "s2"))]
    Variance,
    /// Log probability that every constraint output is non-positive.
    #[cfg_attr(feature = "serde", serde(rename = "log_pf"))]
    LogProbabilityOfFeasibility,
}

impl Acquisition {
    /// Every variant, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ExpectedImprovement,
        Self::LogExpectedImprovement,
        Self::LcbImprovement,
        Self::LcbImprovementTransformed,
        Self::LogLcbImprovementTransformed,
        Self::ProbabilityOfImprovementTransformed,
        Self::Variance,
        Self::LogProbabilityOfFeasibility,
    ];

    /// Short identifier used in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExpectedImprovement => "ei",
            Self::LogExpectedImprovement => "log_ei",
            Self::LcbImprovement => "lcb_improv",
            Self::LcbImprovementTransformed => "lcb_improv_transf",
            Self::LogLcbImprovementTransformed => "log_lcb_improv_transf",
            Self::ProbabilityOfImprovementTransformed => "pi_transf",
            Self::Variance => "s2",
            Self::LogProbabilityOfFeasibility => "log_pf",
        }
    }

    /// Whether the function is only defined for unconstrained problems.
    #[must_use]
    pub const fn objective_only(self) -> bool {
        !matches!(self, Self::LogProbabilityOfFeasibility)
    }
}

impl fmt::Display for Acquisition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Acquisition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| Error::UnknownAcquisition(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Scalar forms
// ---------------------------------------------------------------------------

/// Expected improvement of a normal posterior over `tau`.
#[must_use]
pub fn expected_improvement(tau: f64, mean: f64, std: f64) -> f64 {
    let z = (tau - mean) / std;
    std * (z * norm_cdf(z) + norm_pdf(z))
}

/// `ln(z Φ(z) + φ(z))` by direct evaluation.
fn log_h_direct(z: f64) -> f64 {
    (z * norm_cdf(z) + norm_pdf(z)).ln()
}

/// Asymptotic `ln φ(z) - ln(z² - 1)` for `z → -∞`.
fn log_h_tail(z: f64) -> f64 {
    -0.5 * z * z - LN_SQRT_2PI - (z * z - 1.0).ln()
}

/// `ln(z Φ(z) + φ(z))` and its derivative `Φ(z) / (z Φ(z) + φ(z))`.
///
/// The tail branch is shifted so both branches agree at the switch point.
fn log_h(z: f64) -> (f64, f64) {
    if z > LOG_EI_SWITCH {
        let cdf = norm_cdf(z);
        let h = z * cdf + norm_pdf(z);
        (h.ln(), cdf / h)
    } else {
        let offset = log_h_direct(LOG_EI_SWITCH) - log_h_tail(LOG_EI_SWITCH);
        let d = -z - 2.0 * z / (z * z - 1.0);
        (log_h_tail(z) + offset, d)
    }
}

/// Log expected improvement, finite for any `z`.
#[must_use]
pub fn log_expected_improvement(tau: f64, mean: f64, std: f64) -> f64 {
    std.ln() + log_h((tau - mean) / std).0
}

/// `ln(1 + e^v)`, linear above 20.
#[must_use]
pub fn softplus(v: f64) -> f64 {
    if v > SOFTPLUS_LINEAR { v } else { v.exp().ln_1p() }
}

fn softplus_derivative(v: f64) -> f64 {
    if v > SOFTPLUS_LINEAR { 1.0 } else { 1.0 / (1.0 + (-v).exp()) }
}

/// `ln softplus(v)` in three numerically stable regimes.
#[must_use]
pub fn log_softplus(v: f64) -> f64 {
    if v > SOFTPLUS_LINEAR {
        v.ln()
    } else if v > SOFTPLUS_LOG_SERIES {
        v.exp().ln_1p().ln()
    } else {
        v - 0.5 * v.exp()
    }
}

fn log_softplus_derivative(v: f64) -> f64 {
    if v > SOFTPLUS_LINEAR {
        1.0 / v
    } else if v > SOFTPLUS_LOG_SERIES {
        let e = v.exp();
        e / ((1.0 + e) * e.ln_1p())
    } else {
        1.0 - 0.5 * v.exp()
    }
}

// ---------------------------------------------------------------------------
// Evaluation against a surrogate
// ---------------------------------------------------------------------------

/// A surrogate together with the baseline and exploration coefficient the
/// acquisition functions need.
#[derive(Debug)]
pub struct AcquisitionContext<'a, S: Surrogate + ?Sized> {
    surrogate: &'a S,
    tau: f64,
    kappa: f64,
}

/// Posterior std and its gradient for one output.
struct Posterior {
    mean: f64,
    std: f64,
    mean_grad: Vec<f64>,
    std_grad: Vec<f64>,
}

struct ImprovementTerms {
    post: Posterior,
    z: f64,
    z_grad: Vec<f64>,
    lcb_grad: Vec<f64>,
}

impl<'a, S: Surrogate + ?Sized> AcquisitionContext<'a, S> {
    /// Bind a trained surrogate to baseline `tau` and coefficient `kappa`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurrogateNotTrained`] if the surrogate is untrained.
    pub fn new(surrogate: &'a S, tau: f64, kappa: f64) -> Result<Self> {
        if !surrogate.is_trained() {
            return Err(Error::SurrogateNotTrained);
        }
        Ok(Self {
            surrogate,
            tau,
            kappa,
        })
    }

    /// The improvement baseline.
    #[must_use]
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// The exploration coefficient.
    #[must_use]
    pub fn kappa(&self) -> f64 {
        self.kappa
    }

    /// The underlying surrogate.
    #[must_use]
    pub fn surrogate(&self) -> &'a S {
        self.surrogate
    }

    /// Value of `acq` at the canonical point `x`.
    #[must_use]
    pub fn value(&self, acq: Acquisition, x: &[f64]) -> f64 {
        let objective = || self.surrogate.predict(0, x);
        match acq {
            Acquisition::LogProbabilityOfFeasibility => (1..self.surrogate.num_outputs())
                .map(|i| {
                    let p = self.surrogate.predict(i, x);
                    log_norm_cdf_with_derivative(-p.mean / p.std()).0
                })
                .sum(),
            Acquisition::Variance => objective().variance,
            Acquisition::ExpectedImprovement => {
                let p = objective();
                expected_improvement(self.tau, p.mean, p.std())
            }
            Acquisition::LogExpectedImprovement => {
                let p = objective();
                log_expected_improvement(self.tau, p.mean, p.std())
            }
            Acquisition::LcbImprovement => {
                let p = objective();
                self.lcb_improvement(p.mean, p.std())
            }
            Acquisition::LcbImprovementTransformed => {
                let p = objective();
                softplus(self.lcb_improvement(p.mean, p.std()))
            }
            Acquisition::LogLcbImprovementTransformed => {
                let p = objective();
                log_softplus(self.lcb_improvement(p.mean, p.std()))
            }
            Acquisition::ProbabilityOfImprovementTransformed => {
                let p = objective();
                (self.tau - p.mean) / p.std()
            }
        }
    }

    /// Value and gradient of `acq` at the canonical point `x`.
    #[must_use]
    pub fn value_with_grad(&self, acq: Acquisition, x: &[f64]) -> (f64, Vec<f64>) {
        match acq {
            Acquisition::LogProbabilityOfFeasibility => self.log_pf_with_grad(x),
            Acquisition::Variance => {
                let g = self.surrogate.predict_with_grad(0, x);
                (g.variance, g.variance_grad)
            }
            Acquisition::ExpectedImprovement => {
                let t = self.improvement_terms(x);
                let cdf = norm_cdf(t.z);
                let lambda = t.z * cdf + norm_pdf(t.z);
                let grad = t
                    .z_grad
                    .iter()
                    .zip(&t.post.std_grad)
                    .map(|(gz, gs)| t.post.std * cdf * gz + lambda * gs)
                    .collect();
                (t.post.std * lambda, grad)
            }
            Acquisition::LogExpectedImprovement => {
                let t = self.improvement_terms(x);
                let (lh, dlh) = log_h(t.z);
                let grad = t
                    .z_grad
                    .iter()
                    .zip(&t.post.std_grad)
                    .map(|(gz, gs)| gs / t.post.std + dlh * gz)
                    .collect();
                (t.post.std.ln() + lh, grad)
            }
            Acquisition::LcbImprovement => {
                let t = self.improvement_terms(x);
                (self.lcb_improvement(t.post.mean, t.post.std), t.lcb_grad)
            }
            Acquisition::LcbImprovementTransformed => {
                let t = self.improvement_terms(x);
                let v = self.lcb_improvement(t.post.mean, t.post.std);
                let d = softplus_derivative(v);
                (softplus(v), t.lcb_grad.into_iter().map(|g| g * d).collect())
            }
            Acquisition::LogLcbImprovementTransformed => {
                let t = self.improvement_terms(x);
                let v = self.lcb_improvement(t.post.mean, t.post.std);
                let d = log_softplus_derivative(v);
                (log_softplus(v), t.lcb_grad.into_iter().map(|g| g * d).collect())
            }
            Acquisition::ProbabilityOfImprovementTransformed => {
                let t = self.improvement_terms(x);
                (t.z, t.z_grad)
            }
        }
    }

    /// Objective posterior at `x` with the derivatives shared by the
    /// improvement-based members.
    fn improvement_terms(&self, x: &[f64]) -> ImprovementTerms {
        let post = self.posterior(0, x);
        let s = post.std;
        let z = (self.tau - post.mean) / s;
        // dz/dx = -(dmean + z ds) / s
        let z_grad = post
            .mean_grad
            .iter()
            .zip(&post.std_grad)
            .map(|(gm, gs)| -(gm + z * gs) / s)
            .collect();
        let lcb_grad = post
            .mean_grad
            .iter()
            .zip(&post.std_grad)
            .map(|(gm, gs)| -(gm - self.kappa * gs))
            .collect();
        ImprovementTerms {
            post,
            z,
            z_grad,
            lcb_grad,
        }
    }

    fn lcb_improvement(&self, mean: f64, std: f64) -> f64 {
        self.tau - (mean - self.kappa * std)
    }

    fn posterior(&self, output: usize, x: &[f64]) -> Posterior {
        let g = self.surrogate.predict_with_grad(output, x);
        let std = g.variance.sqrt();
        let std_grad = g.variance_grad.iter().map(|v| 0.5 * v / std).collect();
        Posterior {
            mean: g.mean,
            std,
            mean_grad: g.mean_grad,
            std_grad,
        }
    }

    fn log_pf_with_grad(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let mut total = 0.0;
        let mut grad = vec![0.0; x.len()];
        for i in 1..self.surrogate.num_outputs() {
            let post = self.posterior(i, x);
            let s = post.std;
            let normed = -post.mean / s;
            let (lp, dlp) = log_norm_cdf_with_derivative(normed);
            total += lp;
            for ((g, gm), gs) in grad.iter_mut().zip(&post.mean_grad).zip(&post.std_grad) {
                *g += dlp * -(s * gm - post.mean * gs) / (s * s);
            }
        }
        (total, grad)
    }
}

// ---------------------------------------------------------------------------
// Cost adapters for the solvers
// ---------------------------------------------------------------------------

/// `-acq(x)`, for minimizing solvers.
pub struct NegatedAcquisition<'c, 'a, S: Surrogate + ?Sized> {
    context: &'c AcquisitionContext<'a, S>,
    acquisition: Acquisition,
}

impl<'c, 'a, S: Surrogate + ?Sized> NegatedAcquisition<'c, 'a, S> {
    /// Negate `acquisition` evaluated through `context`.
    #[must_use]
    pub fn new(context: &'c AcquisitionContext<'a, S>, acquisition: Acquisition) -> Self {
        Self {
            context,
            acquisition,
        }
    }
}

impl<S: Surrogate + ?Sized> CostFunction for NegatedAcquisition<'_, '_, S> {
    fn cost(&self, x: &[f64]) -> f64 {
        -self.context.value(self.acquisition, x)
    }
}

impl<S: Surrogate + ?Sized> CostGradient for NegatedAcquisition<'_, '_, S> {
    fn cost_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let (v, g) = self.context.value_with_grad(self.acquisition, x);
        (-v, g.into_iter().map(|gi| -gi).collect())
    }
}

/// The negated acquisition pool as one vector-valued cost.
pub struct EnsembleCost<'c, 'a, S: Surrogate + ?Sized> {
    context: &'c AcquisitionContext<'a, S>,
    pool: &'c [Acquisition],
}

impl<'c, 'a, S: Surrogate + ?Sized> EnsembleCost<'c, 'a, S> {
    /// One cost component per entry of `pool`, in order.
    #[must_use]
    pub fn new(context: &'c AcquisitionContext<'a, S>, pool: &'c [Acquisition]) -> Self {
        Self { context, pool }
    }
}

impl<S: Surrogate + ?Sized> MultiCostFunction for EnsembleCost<'_, '_, S> {
    fn n_costs(&self) -> usize {
        self.pool.len()
    }

    fn costs(&self, x: &[f64]) -> Vec<f64> {
        self.pool.iter().map(|a| -self.context.value(*a, x)).collect()
    }
}

/// Posterior mean of the objective.
pub struct PosteriorMean<'a, S: Surrogate + ?Sized> {
    surrogate: &'a S,
}

impl<'a, S: Surrogate + ?Sized> PosteriorMean<'a, S> {
    /// Minimize the objective's posterior mean of `surrogate`.
    #[must_use]
    pub fn new(surrogate: &'a S) -> Self {
        Self { surrogate }
    }
}

impl<S: Surrogate + ?Sized> CostFunction for PosteriorMean<'_, S> {
    fn cost(&self, x: &[f64]) -> f64 {
        self.surrogate.predict(0, x).mean
    }
}

impl<S: Surrogate + ?Sized> CostGradient for PosteriorMean<'_, S> {
    fn cost_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let g = self.surrogate.predict_with_grad(0, x);
        (g.mean, g.mean_grad)
    }
}

/// Lower confidence bound `mean - kappa * s` of the objective.
pub struct LowerConfidenceBound<'a, S: Surrogate + ?Sized> {
    surrogate: &'a S,
    kappa: f64,
}

impl<'a, S: Surrogate + ?Sized> LowerConfidenceBound<'a, S> {
    /// LCB of `surrogate` with coefficient `kappa`.
    #[must_use]
    pub fn new(surrogate: &'a S, kappa: f64) -> Self {
        Self { surrogate, kappa }
    }
}

impl<S: Surrogate + ?Sized> CostFunction for LowerConfidenceBound<'_, S> {
    fn cost(&self, x: &[f64]) -> f64 {
        let p = self.surrogate.predict(0, x);
        p.mean - self.kappa * p.std()
    }
}

impl<S: Surrogate + ?Sized> CostGradient for LowerConfidenceBound<'_, S> {
    fn cost_and_gradient(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let g = self.surrogate.predict_with_grad(0, x);
        let s = g.variance.sqrt();
        let grad = g
            .mean_grad
            .iter()
            .zip(&g.variance_grad)
            .map(|(gm, gv)| gm - self.kappa * 0.5 * gv / s)
            .collect();
        (g.mean - self.kappa * s, grad)
    }
}
