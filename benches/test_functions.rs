//! Analytic objectives for benchmarks and integration tests.
//!
//! Constrained problems return `[objective, constraint...]` with constraints
//! satisfied when `<= 0`.

use core::f64::consts::PI;

/// Sphere: convex, minimum 0 at the origin.
pub fn sphere(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum()
}

/// Rosenbrock: curved valley, minimum 0 at `(1, ..., 1)`.
pub fn rosenbrock(x: &[f64]) -> f64 {
    x.windows(2)
        .map(|w| 100.0 * (w[1] - w[0] * w[0]).powi(2) + (1.0 - w[0]).powi(2))
        .sum()
}

/// Branin on `[-5, 10] x [0, 15]`: three global minima of about 0.397887.
pub fn branin(x: &[f64]) -> f64 {
    let (x1, x2) = (x[0], x[1]);
    let b = 5.1 / (4.0 * PI * PI);
    let c = 5.0 / PI;
    let t = 1.0 / (8.0 * PI);
    (x2 - b * x1 * x1 + c * x1 - 6.0).powi(2) + 10.0 * (1.0 - t) * x1.cos() + 10.0
}

/// Hartmann 6D on `[0, 1]^6`: minimum about -3.3224.
pub fn hartmann6(x: &[f64]) -> f64 {
    const ALPHA: [f64; 4] = [1.0, 1.2, 3.0, 3.2];
    const A: [[f64; 6]; 4] = [
        [10.0, 3.0, 17.0, 3.5, 1.7, 8.0],
        [0.05, 10.0, 17.0, 0.1, 8.0, 14.0],
        [3.0, 3.5, 1.7, 10.0, 17.0, 8.0],
        [17.0, 8.0, 0.05, 10.0, 0.1, 14.0],
    ];
    const P: [[f64; 6]; 4] = [
        [0.1312, 0.1696, 0.5569, 0.0124, 0.8283, 0.5886],
        [0.2329, 0.4135, 0.8307, 0.3736, 0.1004, 0.9991],
        [0.2348, 0.1451, 0.3522, 0.2883, 0.3047, 0.6650],
        [0.4047, 0.8828, 0.8732, 0.5743, 0.1091, 0.0381],
    ];
    -ALPHA
        .iter()
        .zip(A.iter().zip(&P))
        .map(|(alpha, (a, p))| {
            let inner: f64 = x
                .iter()
                .zip(a.iter().zip(p))
                .map(|(xj, (aj, pj))| aj * (xj - pj).powi(2))
                .sum();
            alpha * (-inner).exp()
        })
        .sum::<f64>()
}

/// Gardner's constrained problem on `[0, 6]^2`: minimize
/// `sin(x1) + x2` subject to `sin(x1) sin(x2) + 0.95 <= 0`.
pub fn gardner(x: &[f64]) -> Vec<f64> {
    vec![
        x[0].sin() + x[1],
        x[0].sin() * x[1].sin() + 0.95,
    ]
}
