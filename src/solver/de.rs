//! Bounded differential evolution for single-objective global search.
//!
//! Each generation, for every population member *xᵢ*:
//! 1. **Mutation** with the selected [`DeStrategy`]:
//!    - `Rand1`:  `v = x_r1 + F * (x_r2 - x_r3)`
//!    - `Best1`:  `v = x_best + F * (x_r1 - x_r2)`
//!    - `CurrentToBest1`:  `v = x_i + F * (x_best - x_i) + F * (x_r1 - x_r2)`
//! 2. **Binomial crossover** with rate CR, at least one coordinate taken from
//!    the mutant, then clamping into the box.
//! 3. **Selection**: *xᵢ* is replaced when `f(u) <= f(xᵢ)`.
//!
//! Initial guesses take the first population slots; the rest is uniform.
//! Trial vectors of one generation are evaluated in parallel.

use rayon::prelude::*;

use super::{Bounds, CostFunction};

const DEFAULT_POPULATION: usize = 20;
const DEFAULT_MUTATION_FACTOR: f64 = 0.8;
const DEFAULT_CROSSOVER_RATE: f64 = 0.9;
/// Smallest population every strategy can draw its donors from.
const MIN_POPULATION: usize = 4;

/// Differential Evolution mutation strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DeStrategy {
    /// DE/rand/1, the most robust choice.
    #[default]
    Rand1,
    /// DE/best/1, converges faster around the incumbent.
    Best1,
    /// DE/current-to-best/1.
    CurrentToBest1,
}

/// Differential evolution configuration.
///
/// ```
/// use acq_ensemble::solver::de::{DeStrategy, DifferentialEvolution};
/// use acq_ensemble::solver::{Bounds, CostFunction};
///
/// struct Sphere;
/// impl CostFunction for Sphere {
///     fn cost(&self, x: &[f64]) -> f64 {
///         x.iter().map(|v| v * v).sum()
///     }
/// }
///
/// let de = DifferentialEvolution::new(Bounds::canonical(2), 2000)
///     .population_size(20)
///     .strategy(DeStrategy::Best1);
/// let mut rng = fastrand::Rng::with_seed(1);
/// let (_, fx) = de.minimize(&Sphere, &[], &mut rng);
/// assert!(fx < 1e-2);
/// ```
#[derive(Clone, Debug)]
pub struct DifferentialEvolution {
    bounds: Bounds,
    max_eval: usize,
    population_size: usize,
    mutation_factor: f64,
    crossover_rate: f64,
    strategy: DeStrategy,
}

impl DifferentialEvolution {
    /// Search inside `bounds` with a total budget of `max_eval` evaluations.
    #[must_use]
    pub fn new(bounds: Bounds, max_eval: usize) -> Self {
        Self {
            bounds,
            max_eval,
            population_size: DEFAULT_POPULATION,
            mutation_factor: DEFAULT_MUTATION_FACTOR,
            crossover_rate: DEFAULT_CROSSOVER_RATE,
            strategy: DeStrategy::default(),
        }
    }

    /// Number of population members; raised to 4 if smaller.
    ///
    /// Default: 20.
    #[must_use]
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Differential weight `F`.
    ///
    /// Default: 0.8.
    #[must_use]
    pub fn mutation_factor(mut self, f: f64) -> Self {
        self.mutation_factor = f;
        self
    }

    /// Crossover probability `CR`.
    ///
    /// Default: 0.9.
    #[must_use]
    pub fn crossover_rate(mut self, cr: f64) -> Self {
        self.crossover_rate = cr;
        self
    }

    /// Mutation strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: DeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Minimize `f`, seeding the population with `guesses`.
    ///
    /// Returns the best point seen and its value. `NaN` costs rank last.
    pub fn minimize<F: CostFunction + ?Sized>(
        &self,
        f: &F,
        guesses: &[Vec<f64>],
        rng: &mut fastrand::Rng,
    ) -> (Vec<f64>, f64) {
        let pop_size = self.population_size.max(MIN_POPULATION);
        let evaluate = |x: &Vec<f64>| {
            let v = f.cost(x);
            if v.is_nan() { f64::INFINITY } else { v }
        };

        let mut population: Vec<Vec<f64>> = guesses
            .iter()
            .take(pop_size)
            .map(|g| {
                let mut x = g.clone();
                self.bounds.clamp(&mut x);
                x
            })
            .collect();
        while population.len() < pop_size {
            population.push(self.bounds.random(rng));
        }
        let mut fitness: Vec<f64> = population.par_iter().map(evaluate).collect();
        let mut evals = pop_size;
        let mut best_idx = argmin(&fitness);

        while evals < self.max_eval {
            let n_trials = pop_size.min(self.max_eval - evals);
            let trials: Vec<Vec<f64>> = (0..n_trials)
                .map(|i| self.trial_vector(&population, best_idx, i, rng))
                .collect();
            let trial_fitness: Vec<f64> = trials.par_iter().map(evaluate).collect();
            evals += n_trials;

            for (i, (trial, ft)) in trials.into_iter().zip(trial_fitness).enumerate() {
                if ft <= fitness[i] {
                    population[i] = trial;
                    fitness[i] = ft;
                }
            }
            best_idx = argmin(&fitness);
        }

        (population.swap_remove(best_idx), fitness[best_idx])
    }

    fn trial_vector(
        &self,
        population: &[Vec<f64>],
        best_idx: usize,
        target: usize,
        rng: &mut fastrand::Rng,
    ) -> Vec<f64> {
        let dim = self.bounds.dim();
        let f = self.mutation_factor;
        let x = &population[target];
        let donors = select_donors(rng, population.len(), 3, target);
        let (r1, r2, r3) = (&population[donors[0]], &population[donors[1]], &population[donors[2]]);
        let best = &population[best_idx];

        let mutant: Vec<f64> = (0..dim)
            .map(|j| match self.strategy {
                DeStrategy::Rand1 => r1[j] + f * (r2[j] - r3[j]),
                DeStrategy::Best1 => best[j] + f * (r1[j] - r2[j]),
                DeStrategy::CurrentToBest1 => x[j] + f * (best[j] - x[j]) + f * (r1[j] - r2[j]),
            })
            .collect();

        let j_rand = rng.usize(0..dim.max(1));
        let mut trial: Vec<f64> = (0..dim)
            .map(|j| {
                if j == j_rand || rng.f64() < self.crossover_rate {
                    mutant[j]
                } else {
                    x[j]
                }
            })
            .collect();
        self.bounds.clamp(&mut trial);
        trial
    }
}

/// Pick `count` distinct indices from `0..n`, none equal to `exclude`.
fn select_donors(rng: &mut fastrand::Rng, n: usize, count: usize, exclude: usize) -> Vec<usize> {
    let mut selected = Vec::with_capacity(count);
    while selected.len() < count {
        let idx = rng.usize(0..n);
        if idx != exclude && !selected.contains(&idx) {
            selected.push(idx);
        }
    }
    selected
}

/// Index of the smallest value; the first one wins ties.
pub(crate) fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v < values[best] {
            best = i;
        }
    }
    best
}
