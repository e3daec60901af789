/// Generate a random `f64` in the range `[low, high)`.
#[inline]
pub(crate) fn f64_range(rng: &mut fastrand::Rng, low: f64, high: f64) -> f64 {
    low + rng.f64() * (high - low)
}

/// Generate a point with every coordinate uniform in `[low, high)`.
pub(crate) fn uniform_point(rng: &mut fastrand::Rng, dim: usize, low: f64, high: f64) -> Vec<f64> {
    (0..dim).map(|_| f64_range(rng, low, high)).collect()
}

/// Pick `k` distinct indices from `0..n` (partial Fisher-Yates), in ascending order.
pub(crate) fn distinct_indices(rng: &mut fastrand::Rng, n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.usize(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices.sort_unstable();
    indices
}

