//! Pareto dominance utilities. Every objective is minimized.
//!
//! ```
//! use acq_ensemble::solver::pareto::{non_dominated_sort, pareto_front_indices};
//!
//! let values = vec![
//!     vec![1.0, 5.0],
//!     vec![5.0, 1.0],
//!     vec![3.0, 3.0],
//!     vec![4.0, 4.0], // dominated by (3, 3)
//! ];
//! assert_eq!(non_dominated_sort(&values), vec![vec![0, 1, 2], vec![3]]);
//! assert_eq!(pareto_front_indices(&values), vec![0, 1, 2]);
//! ```

use core::cmp::Ordering;

/// Returns `true` if `a` is no worse than `b` everywhere and strictly
/// better somewhere.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    let mut strictly_better = false;
    for (&av, &bv) in a.iter().zip(b) {
        if av > bv {
            return false;
        }
        if av < bv {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Fast non-dominated sorting (Deb et al., 2002).
///
/// `fronts[0]` is the Pareto front; each front lists indices into `values`
/// in ascending order.
#[must_use]
pub fn non_dominated_sort(values: &[Vec<f64>]) -> Vec<Vec<usize>> {
    let n = values.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0_usize; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&values[i], &values[j]) {
                dominated_by[i].push(j);
                domination_count[j] += 1;
            } else if dominates(&values[j], &values[i]) {
                dominated_by[j].push(i);
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        next.sort_unstable();
        fronts.push(current);
        current = next;
    }
    fronts
}

/// Indices of the non-dominated members of `values`, ascending.
#[must_use]
pub fn pareto_front_indices(values: &[Vec<f64>]) -> Vec<usize> {
    non_dominated_sort(values).into_iter().next().unwrap_or_default()
}

/// Crowding distance of each member of `front`, measured on `coords`.
///
/// `coords[i]` is the vector the distance is computed in (objective values
/// or decision variables). Boundary members get `f64::INFINITY`. Output
/// order follows `front`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn crowding_distance(front: &[usize], coords: &[Vec<f64>]) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }

    let m = coords[front[0]].len();
    let mut distances = vec![0.0_f64; n];
    let val = |pos: usize, k: usize| coords[front[pos]][k];

    for k in 0..m {
        let mut sorted: Vec<usize> = (0..n).collect();
        sorted.sort_by(|&a, &b| val(a, k).partial_cmp(&val(b, k)).unwrap_or(Ordering::Equal));

        distances[sorted[0]] = f64::INFINITY;
        distances[sorted[n - 1]] = f64::INFINITY;

        let range = val(sorted[n - 1], k) - val(sorted[0], k);
        if range > 0.0 {
            for i in 1..(n - 1) {
                distances[sorted[i]] += (val(sorted[i + 1], k) - val(sorted[i - 1], k)) / range;
            }
        }
    }
    distances
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dominance_requires_strict_improvement() {
        assert!(dominates(&[1.0, 2.0], &[1.0, 3.0]));
        assert!(!dominates(&[1.0, 2.0], &[1.0, 2.0]));
        assert!(!dominates(&[0.0, 4.0], &[1.0, 3.0]));
    }

    #[test]
    fn sort_produces_layered_fronts() {
        let values = vec![
            vec![3.0, 3.0],
            vec![1.0, 1.0],
            vec![2.0, 2.0],
            vec![0.5, 4.0],
        ];
        let fronts = non_dominated_sort(&values);
        assert_eq!(fronts, vec![vec![1, 3], vec![2], vec![0]]);
    }

    #[test]
    fn identical_points_share_a_front() {
        let values = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        assert_eq!(pareto_front_indices(&values), vec![0, 1]);
    }

    #[test]
    fn empty_input_has_no_front() {
        assert!(pareto_front_indices(&[]).is_empty());
    }

    #[test]
    fn crowding_marks_boundaries_infinite() {
        let values = vec![
            vec![0.0, 4.0],
            vec![1.0, 3.0],
            vec![3.0, 1.0],
            vec![4.0, 0.0],
        ];
        let cd = crowding_distance(&[0, 1, 2, 3], &values);
        assert!(cd[0].is_infinite() && cd[3].is_infinite());
        // (3 - 0) / 4 per objective
        assert!((cd[1] - 1.5).abs() < 1e-12);
        assert!((cd[2] - 1.5).abs() < 1e-12);
    }
}
