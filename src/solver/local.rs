//! Bounded local minimizers on top of `argmin`.
//!
//! `argmin`'s solvers are unconstrained, so every run goes through
//! `BoxProblem`: trial points are projected onto the box before the
//! objective is evaluated and the distance outside the box is charged a
//! quadratic penalty. The returned point is always the projection of the
//! solver's best parameter.
//!
//! [`LocalAlgorithm::Lbfgs`] uses L-BFGS with a More-Thuente line search.
//! [`LocalAlgorithm::NelderMead`] is the derivative-free simplex search. It is
//! slower but never trusts a gradient, which makes it the fallback when
//! L-BFGS stalls.

use argmin::core::{
    CostFunction as ArgminCost, Error as ArgminError, Executor, Gradient as ArgminGradient, State,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;

use super::{Bounds, CostFunction, CostGradient};

/// Number of correction pairs kept by L-BFGS.
const HISTORY: usize = 7;
/// Projected-gradient infinity norm treated as stationary.
const GRAD_TOL: f64 = 1e-10;
/// Initial simplex edge as a fraction of each dimension's width.
const SIMPLEX_STEP: f64 = 0.05;
/// Weight of the squared distance outside the box.
const PENALTY: f64 = 1.0;

type Lbfgs = LBFGS<MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64>, Vec<f64>, Vec<f64>, f64>;

/// Local search algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LocalAlgorithm {
    /// L-BFGS, needs gradients.
    #[default]
    Lbfgs,
    /// Nelder-Mead simplex, derivative-free.
    NelderMead,
}

/// Why a local search stopped without a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LocalFailure {
    /// The solver could not decrease the objective from the start point.
    /// Recoverable by retrying with a derivative-free algorithm.
    #[error("no further progress possible from the starting point")]
    NoProgress,
    /// The objective or its gradient was not finite at the start point.
    #[error("objective is not finite at the starting point")]
    NonFinite,
    /// A tolerance was rejected by the solver.
    #[error("solver rejected a tolerance setting")]
    InvalidTolerance,
}

/// Configuration of a single local search run.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalSearch {
    algorithm: LocalAlgorithm,
    max_iters: usize,
    tolerance_cost: f64,
    tolerance_grad: f64,
}

impl LocalSearch {
    /// Create a local search running at most `max_iters` solver iterations.
    #[must_use]
    pub fn new(algorithm: LocalAlgorithm, max_iters: usize) -> Self {
        Self {
            algorithm,
            max_iters: max_iters.max(1),
            tolerance_cost: 1e-12,
            tolerance_grad: 1e-8,
        }
    }

    /// Stop once the cost changes by less than `tol` between iterations
    /// (L-BFGS) or the simplex costs have a standard deviation below `tol`
    /// (Nelder-Mead).
    #[must_use]
    pub fn tolerance_cost(mut self, tol: f64) -> Self {
        self.tolerance_cost = tol;
        self
    }

    /// Stop L-BFGS once the gradient norm drops below `tol`.
    #[must_use]
    pub fn tolerance_grad(mut self, tol: f64) -> Self {
        self.tolerance_grad = tol;
        self
    }

    /// The configured algorithm.
    #[must_use]
    pub fn algorithm(&self) -> LocalAlgorithm {
        self.algorithm
    }

    /// The configured iteration budget.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Minimize `f` inside `bounds` starting from `x0`.
    ///
    /// # Errors
    ///
    /// Returns [`LocalFailure::NoProgress`] when L-BFGS cannot decrease the
    /// objective at all, [`LocalFailure::NonFinite`] when the start point
    /// evaluates to a non-finite value and [`LocalFailure::InvalidTolerance`]
    /// when a tolerance is negative.
    pub fn minimize<F: CostGradient + ?Sized>(
        &self,
        f: &F,
        bounds: &Bounds,
        x0: &[f64],
    ) -> Result<(Vec<f64>, f64), LocalFailure> {
        match self.algorithm {
            LocalAlgorithm::Lbfgs => self.lbfgs(f, bounds, x0),
            LocalAlgorithm::NelderMead => self.nelder_mead(f, bounds, x0),
        }
    }

    /// Minimize a function without gradient information using Nelder-Mead,
    /// whatever the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns [`LocalFailure::NonFinite`] when the start point evaluates to
    /// a non-finite value.
    pub fn minimize_derivative_free<F: CostFunction + ?Sized>(
        &self,
        f: &F,
        bounds: &Bounds,
        x0: &[f64],
    ) -> Result<(Vec<f64>, f64), LocalFailure> {
        self.nelder_mead(f, bounds, x0)
    }

    fn iterations(&self) -> u64 {
        u64::try_from(self.max_iters).unwrap_or(u64::MAX)
    }

    fn lbfgs<F: CostGradient + ?Sized>(
        &self,
        f: &F,
        bounds: &Bounds,
        x0: &[f64],
    ) -> Result<(Vec<f64>, f64), LocalFailure> {
        let mut start = x0.to_vec();
        bounds.clamp(&mut start);
        let (f0, g0) = f.cost_and_gradient(&start);
        if !f0.is_finite() || g0.iter().any(|g| !g.is_finite()) {
            return Err(LocalFailure::NonFinite);
        }
        if projected_gradient_norm(&start, &g0, bounds) < GRAD_TOL {
            return Ok((start, f0));
        }

        let solver: Lbfgs = LBFGS::new(MoreThuenteLineSearch::new(), HISTORY)
            .with_tolerance_grad(self.tolerance_grad)
            .and_then(|s| s.with_tolerance_cost(self.tolerance_cost))
            .map_err(|_| LocalFailure::InvalidTolerance)?;
        let problem = BoxProblem::strict(f, bounds);
        let iters = self.iterations();
        let result = Executor::new(problem, solver)
            .configure(|state| state.param(start.clone()).max_iters(iters))
            .run()
            .map_err(|_| LocalFailure::NoProgress)?;

        let state = result.state();
        trace_debug!(termination = ?state.get_termination_status(), "l-bfgs finished");
        let mut x = state.get_best_param().cloned().unwrap_or(start);
        bounds.clamp(&mut x);
        let fx = f.cost(&x);
        if fx.is_finite() && fx < f0 {
            Ok((x, fx))
        } else {
            Err(LocalFailure::NoProgress)
        }
    }

    fn nelder_mead<F: CostFunction + ?Sized>(
        &self,
        f: &F,
        bounds: &Bounds,
        x0: &[f64],
    ) -> Result<(Vec<f64>, f64), LocalFailure> {
        let mut start = x0.to_vec();
        bounds.clamp(&mut start);
        let f0 = f.cost(&start);
        if !f0.is_finite() {
            return Err(LocalFailure::NonFinite);
        }

        let solver = NelderMead::new(initial_simplex(&start, bounds))
            .with_sd_tolerance(self.tolerance_cost)
            .map_err(|_| LocalFailure::InvalidTolerance)?;
        let problem = BoxProblem::lenient(f, bounds);
        let iters = self.iterations();
        let result = Executor::new(problem, solver)
            .configure(|state| state.max_iters(iters))
            .run()
            .map_err(|_| LocalFailure::NoProgress)?;

        let state = result.state();
        trace_debug!(termination = ?state.get_termination_status(), "nelder-mead finished");
        let mut x = match state.get_best_param() {
            Some(best) => best.clone(),
            None => return Ok((start, f0)),
        };
        bounds.clamp(&mut x);
        let fx = f.cost(&x);
        if fx.is_finite() && fx < f0 {
            Ok((x, fx))
        } else {
            Ok((start, f0))
        }
    }
}

/// Adapts a box-constrained objective to `argmin`'s unconstrained solvers.
///
/// `strict` problems fail on a non-finite value so a line search aborts;
/// lenient ones report `+inf`, which a simplex simply moves away from.
struct BoxProblem<'a, F: ?Sized> {
    f: &'a F,
    bounds: &'a Bounds,
    strict: bool,
}

impl<'a, F: ?Sized> BoxProblem<'a, F> {
    fn strict(f: &'a F, bounds: &'a Bounds) -> Self {
        Self {
            f,
            bounds,
            strict: true,
        }
    }

    fn lenient(f: &'a F, bounds: &'a Bounds) -> Self {
        Self {
            f,
            bounds,
            strict: false,
        }
    }

    /// The projection of `p` onto the box and the penalty for leaving it.
    fn project(&self, p: &[f64]) -> (Vec<f64>, f64) {
        let mut x = p.to_vec();
        self.bounds.clamp(&mut x);
        let outside: f64 = p.iter().zip(&x).map(|(a, b)| (a - b).powi(2)).sum();
        (x, PENALTY * outside)
    }
}

impl<F: CostFunction + ?Sized> ArgminCost for BoxProblem<'_, F> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, ArgminError> {
        let (x, penalty) = self.project(p);
        let fx = self.f.cost(&x);
        if fx.is_finite() {
            Ok(fx + penalty)
        } else if self.strict {
            Err(ArgminError::msg("objective is not finite"))
        } else {
            Ok(f64::INFINITY)
        }
    }
}

impl<F: CostGradient + ?Sized> ArgminGradient for BoxProblem<'_, F> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, p: &Self::Param) -> Result<Self::Gradient, ArgminError> {
        let (x, _) = self.project(p);
        let (_, g) = self.f.cost_and_gradient(&x);
        if g.iter().any(|v| !v.is_finite()) {
            return Err(ArgminError::msg("gradient is not finite"));
        }
        // Clamped coordinates do not move the projection; only the penalty
        // pulls them back.
        Ok(p.iter()
            .zip(&x)
            .zip(g)
            .enumerate()
            .map(|(i, ((&pi, &xi), gi))| {
                if pi < self.bounds.lower()[i] || pi > self.bounds.upper()[i] {
                    2.0 * PENALTY * (pi - xi)
                } else {
                    gi
                }
            })
            .collect())
    }
}

/// Infinity norm of the gradient with bound-active components dropped.
fn projected_gradient_norm(x: &[f64], g: &[f64], bounds: &Bounds) -> f64 {
    x.iter()
        .zip(g)
        .enumerate()
        .map(|(i, (&xi, &gi))| {
            let pinned_low = xi <= bounds.lower()[i] && gi > 0.0;
            let pinned_high = xi >= bounds.upper()[i] && gi < 0.0;
            if pinned_low || pinned_high { 0.0 } else { gi.abs() }
        })
        .fold(0.0, f64::max)
}

/// `x0` plus one vertex per dimension, stepping inward from a bound.
fn initial_simplex(x0: &[f64], bounds: &Bounds) -> Vec<Vec<f64>> {
    let mut simplex = Vec::with_capacity(x0.len() + 1);
    simplex.push(x0.to_vec());
    for i in 0..x0.len() {
        let step = SIMPLEX_STEP * bounds.width(i);
        let mut vertex = x0.to_vec();
        vertex[i] = if x0[i] + step <= bounds.upper()[i] {
            x0[i] + step
        } else {
            x0[i] - step
        };
        simplex.push(vertex);
    }
    simplex
}
