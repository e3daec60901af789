//! Reduction of a Pareto set to the batch that is actually evaluated.
//!
//! Every strategy returns exactly `batch_size` canonical points. When the
//! Pareto set is too small, the remainder is filled with uniform samples.

use core::fmt;
use core::str::FromStr;

use crate::error::{Error, Result};
use crate::rng_util;
use crate::solver::de::argmin;
use crate::solver::moo::ParetoSolution;
use crate::space::{CANONICAL_LOWER, CANONICAL_UPPER, distance};

/// How the batch is drawn from the Pareto set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum SelectionStrategy {
    /// Uniform subsample without replacement.
    Random,
    /// Farthest-point traversal away from the training data.
    Greedy,
    /// The best point of every acquisition first, then random.
    #[default]
    Extreme,
}

impl SelectionStrategy {
    /// Pick `batch_size` points from `solution`.
    ///
    /// `training` holds the canonical training inputs; only
    /// [`Greedy`](Self::Greedy) looks at it.
    #[must_use]
    pub fn select(
        self,
        solution: &ParetoSolution,
        batch_size: usize,
        dim: usize,
        training: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> Vec<Vec<f64>> {
        let mut batch = match self {
            Self::Random => select_random(&solution.set, batch_size, rng),
            Self::Greedy => select_greedy(&solution.set, batch_size, training),
            Self::Extreme => select_extreme(solution, batch_size, rng),
        };
        let missing = batch_size.saturating_sub(batch.len());
        if missing > 0 {
            trace_debug!(missing, "filling batch with random samples");
        }
        batch.extend((0..missing).map(|_| {
            rng_util::uniform_point(rng, dim, CANONICAL_LOWER, CANONICAL_UPPER)
        }));
        batch
    }

    /// Lower-case name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Greedy => "greedy",
            Self::Extreme => "extreme",
        }
    }
}

impl fmt::Display for SelectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SelectionStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            "greedy" => Ok(Self::Greedy),
            "extreme" => Ok(Self::Extreme),
            _ => Err(Error::InvalidSetting {
                name: "selection",
                reason: format!("unknown strategy `{s}`"),
            }),
        }
    }
}

fn select_random(set: &[Vec<f64>], batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    rng_util::distinct_indices(rng, set.len(), batch_size)
        .into_iter()
        .map(|i| set[i].clone())
        .collect()
}

/// Farthest-point traversal. Without any reference point the first pick is
/// the candidate whose farthest neighbour is farthest.
fn select_greedy(set: &[Vec<f64>], batch_size: usize, training: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let count = batch_size.min(set.len());
    let mut selected: Vec<Vec<f64>> = Vec::with_capacity(count);
    while selected.len() < count {
        let scores: Vec<f64> = if training.is_empty() && selected.is_empty() {
            set.iter()
                .map(|p| set.iter().map(|q| distance(p, q)).fold(0.0, f64::max))
                .collect()
        } else {
            set.iter()
                .map(|p| {
                    training
                        .iter()
                        .chain(&selected)
                        .map(|r| distance(p, r))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect()
        };
        let negated: Vec<f64> = scores.iter().map(|s| -s).collect();
        selected.push(set[argmin(&negated)].clone());
    }
    selected
}

/// Per-objective minimizers first, then distinct random members of the rest.
fn select_extreme(solution: &ParetoSolution, batch_size: usize, rng: &mut fastrand::Rng) -> Vec<Vec<f64>> {
    let count = batch_size.min(solution.set.len());
    let n_objectives = solution.front.first().map_or(0, Vec::len);
    let mut chosen: Vec<usize> = Vec::with_capacity(count);
    for k in 0..n_objectives {
        if chosen.len() == count {
            break;
        }
        let column: Vec<f64> = solution.front.iter().map(|row| row[k]).collect();
        let best = argmin(&column);
        if !chosen.contains(&best) {
            chosen.push(best);
        }
    }
    let rest: Vec<usize> = (0..solution.set.len())
        .filter(|i| !chosen.contains(i))
        .collect();
    let fill = rng_util::distinct_indices(rng, rest.len(), count - chosen.len());
    chosen.extend(fill.into_iter().map(|j| rest[j]));
    chosen.into_iter().map(|i| solution.set[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRATEGIES: [SelectionStrategy; 3] = [
        SelectionStrategy::Random,
        SelectionStrategy::Greedy,
        SelectionStrategy::Extreme,
    ];

    fn solution(n: usize) -> ParetoSolution {
        #[allow(clippy::cast_precision_loss)]
        let set: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, -(i as f64)]).collect();
        let front = set.iter().map(|x| vec![x[0], -x[0]]).collect();
        ParetoSolution {
            set,
            front,
            history: Vec::new(),
        }
    }

    #[test]
    fn batch_size_is_always_met() {
        let mut rng = fastrand::Rng::with_seed(21);
        let training = vec![vec![0.5, 0.5]];
        for strategy in STRATEGIES {
            for n in [0, 2, 4, 9] {
                let batch = strategy.select(&solution(n), 4, 2, &training, &mut rng);
                assert_eq!(batch.len(), 4, "{strategy} with {n} candidates");
                assert!(batch.iter().all(|x| x.len() == 2));
            }
        }
    }

    #[test]
    fn random_picks_distinct_members() {
        let mut rng = fastrand::Rng::with_seed(2);
        let sol = solution(9);
        let batch = SelectionStrategy::Random.select(&sol, 4, 2, &[], &mut rng);
        for (i, x) in batch.iter().enumerate() {
            assert!(sol.set.contains(x));
            assert!(!batch[..i].contains(x));
        }
    }

    #[test]
    fn greedy_picks_farthest_pair_without_training() {
        let sol = ParetoSolution {
            set: vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![10.0, 10.0],
                vec![0.0, 1.0],
            ],
            front: vec![vec![0.0]; 4],
            history: Vec::new(),
        };
        let mut rng = fastrand::Rng::with_seed(0);
        let mut batch = SelectionStrategy::Greedy.select(&sol, 2, 2, &[], &mut rng);
        batch.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_eq!(batch, vec![vec![0.0, 0.0], vec![10.0, 10.0]]);
    }

    #[test]
    fn greedy_moves_away_from_training() {
        let sol = solution(5);
        let training = vec![vec![0.0, 0.0], vec![1.0, -1.0]];
        let mut rng = fastrand::Rng::with_seed(0);
        let batch = SelectionStrategy::Greedy.select(&sol, 2, 2, &training, &mut rng);
        assert_eq!(batch[0], vec![4.0, -4.0]);
        assert_eq!(batch[1], vec![2.0, -2.0]);
    }

    #[test]
    fn extreme_leads_with_per_objective_minimizers() {
        let sol = solution(6);
        let mut rng = fastrand::Rng::with_seed(8);
        let batch = SelectionStrategy::Extreme.select(&sol, 3, 2, &[], &mut rng);
        // Objective 0 is smallest at index 0, objective 1 at index 5.
        assert_eq!(batch[0], sol.set[0]);
        assert_eq!(batch[1], sol.set[5]);
        assert!(sol.set.contains(&batch[2]));
    }

    #[test]
    fn extreme_batch_has_no_duplicates() {
        let sol = solution(5);
        for seed in 0..20 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let batch = SelectionStrategy::Extreme.select(&sol, 4, 2, &[], &mut rng);
            for (i, a) in batch.iter().enumerate() {
                assert!(batch[i + 1..].iter().all(|b| b != a), "seed {seed}: {batch:?}");
            }
        }
    }

    #[test]
    fn extreme_shared_minimizer_is_taken_once() {
        let set = vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]];
        let front = vec![
            vec![0.0, 0.0],
            vec![1.0, 2.0],
            vec![2.0, 1.0],
            vec![3.0, 3.0],
        ];
        let sol = ParetoSolution {
            set,
            front,
            history: Vec::new(),
        };
        let mut rng = fastrand::Rng::with_seed(11);
        let batch = SelectionStrategy::Extreme.select(&sol, 4, 1, &[], &mut rng);
        assert_eq!(batch[0], vec![0.0]);
        let mut sorted: Vec<f64> = batch.iter().map(|x| x[0]).collect();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn names_parse() {
        for strategy in STRATEGIES {
            assert_eq!(strategy.name().parse::<SelectionStrategy>().unwrap(), strategy);
        }
        assert!("best".parse::<SelectionStrategy>().is_err());
    }
}
