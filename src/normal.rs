//! Standard normal density, distribution and log-distribution helpers.

/// `1 / sqrt(2π)`.
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
/// `ln(sqrt(2π))`.
pub(crate) const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Below this point `ln Φ` switches to its asymptotic series.
const LOG_CDF_TAIL: f64 = -30.0;

/// Standard normal PDF.
#[must_use]
pub fn norm_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal CDF.
#[must_use]
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / core::f64::consts::SQRT_2)
}

/// Complementary error function with fractional error below 1.2e-7
/// everywhere (Chebyshev fit), so tail probabilities keep their relative
/// precision.
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let result = t * poly.exp();
    if x >= 0.0 { result } else { 2.0 - result }
}

/// `ln Φ(x)`, accurate deep into the lower tail.
#[must_use]
pub fn log_norm_cdf(x: f64) -> f64 {
    if x < LOG_CDF_TAIL {
        let inv2 = 1.0 / (x * x);
        -0.5 * x * x - LN_SQRT_2PI - (-x).ln() + (1.0 - inv2 + 3.0 * inv2 * inv2).ln()
    } else {
        norm_cdf(x).ln()
    }
}

/// `ln Φ(x)` together with its derivative `φ(x) / Φ(x)`.
#[must_use]
pub fn log_norm_cdf_with_derivative(x: f64) -> (f64, f64) {
    let lp = log_norm_cdf(x);
    let log_pdf = -0.5 * x * x - LN_SQRT_2PI;
    (lp, (log_pdf - lp).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cdf_known_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((norm_cdf(1.959_963_985) - 0.975).abs() < 1e-7);
        assert!((norm_cdf(-1.0) - 0.158_655_253_9).abs() < 1e-7);
    }

    #[test]
    fn tail_keeps_relative_precision() {
        // Φ(-6) = 9.8658765e-10
        let p = norm_cdf(-6.0);
        assert!(((p - 9.865_876_450e-10) / 9.865_876_450e-10).abs() < 1e-6);
    }

    #[test]
    fn log_cdf_is_continuous_at_tail_switch() {
        let below = log_norm_cdf(LOG_CDF_TAIL - 1e-9);
        let above = log_norm_cdf(LOG_CDF_TAIL + 1e-9);
        assert!((below - above).abs() < 1e-4 * above.abs());
    }

    #[test]
    fn derivative_matches_finite_difference() {
        for &x in &[-8.0, -2.0, 0.0, 1.5, 4.0] {
            let (_, d) = log_norm_cdf_with_derivative(x);
            let h = 1e-5;
            let fd = (log_norm_cdf(x + h) - log_norm_cdf(x - h)) / (2.0 * h);
            assert!((d - fd).abs() < 1e-4 * (1.0 + d.abs()), "x = {x}: {d} vs {fd}");
        }
    }
}
