//! GP-UCB style schedule for the confidence-bound exploration coefficient.
//!
//! With iteration index `t = 1 + (evaluations - initial) / batch_size`:
//!
//! `kappa = sqrt(upsilon * 2 * ln(t^(2 + d/2) * 3π² / (3δ)))`
//!
//! (Brochu, Cora & de Freitas, 2010). The logarithm is expanded term by term
//! so large `t` cannot overflow.

use core::f64::consts::PI;

/// Tunable constants of the kappa schedule.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KappaSchedule {
    /// Overall scale of the exploration coefficient.
    pub upsilon: f64,
    /// Confidence parameter in `(0, 1)`.
    pub delta: f64,
}

impl Default for KappaSchedule {
    fn default() -> Self {
        Self {
            upsilon: 0.5,
            delta: 0.05,
        }
    }
}

impl KappaSchedule {
    /// Kappa for a given iteration index `t` and problem dimension.
    ///
    /// `t` is saturated at 1, so the result is always real and finite.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn kappa_at(&self, t: f64, dim: usize) -> f64 {
        let t = t.max(1.0);
        let exponent = 2.0 + dim as f64 / 2.0;
        let log_arg = exponent * t.ln() + (3.0 * PI * PI).ln() - (3.0 * self.delta).ln();
        (self.upsilon * 2.0 * log_arg.max(0.0)).sqrt()
    }

    /// Kappa from the driver's counters.
    ///
    /// `initial` is the number of true evaluations spent on initialization;
    /// `batch_size` must be positive.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn kappa(&self, eval_counter: usize, initial: usize, batch_size: usize, dim: usize) -> f64 {
        let spent = eval_counter.saturating_sub(initial) as f64;
        let t = 1.0 + spent / batch_size.max(1) as f64;
        self.kappa_at(t, dim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_decreasing_in_t() {
        let schedule = KappaSchedule::default();
        for dim in [1, 2, 10, 50] {
            let mut prev = schedule.kappa_at(1.0, dim);
            assert!(prev.is_finite() && prev > 0.0);
            for step in 1..500 {
                let t = 1.0 + f64::from(step) * 0.37;
                let k = schedule.kappa_at(t, dim);
                assert!(k.is_finite());
                assert!(k >= prev, "kappa decreased at t = {t} for dim {dim}");
                prev = k;
            }
        }
    }

    #[test]
    fn known_value_at_first_iteration() {
        // t = 1: kappa = sqrt(2 * upsilon * ln(π² / δ))
        let schedule = KappaSchedule::default();
        let expected = (2.0 * 0.5 * (PI * PI / 0.05).ln()).sqrt();
        assert!((schedule.kappa_at(1.0, 3) - expected).abs() < 1e-12);
    }

    #[test]
    fn counters_before_initial_budget_saturate() {
        let schedule = KappaSchedule::default();
        assert_eq!(schedule.kappa(0, 10, 4, 2), schedule.kappa_at(1.0, 2));
        assert!(schedule.kappa(30, 10, 4, 2) > schedule.kappa(10, 10, 4, 2));
    }

    #[test]
    fn huge_t_stays_finite() {
        let k = KappaSchedule::default().kappa_at(1e300, 100);
        assert!(k.is_finite());
    }
}
