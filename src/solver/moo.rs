//! DE-driven multi-objective evolutionary search.
//!
//! Offspring are produced with DE/rand/1/bin, merged with their parents and
//! truncated back to the population size NSGA-II style: whole
//! non-dominated fronts first, the last partial front by descending crowding
//! distance. Crowding can be measured on the objective vectors or on the
//! decision variables ([`CrowdingSpace`]).
//!
//! Anchor points take the first population slots, so a caller can bias the
//! search toward known good regions.

use core::cmp::Ordering;

use rayon::prelude::*;

use super::de::argmin;
use super::pareto::{crowding_distance, non_dominated_sort, pareto_front_indices};
use super::{Bounds, MultiCostFunction};

/// Smallest population DE/rand/1 can draw three donors from.
const MIN_POPULATION: usize = 4;

/// Where crowding distance is measured during truncation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CrowdingSpace {
    /// On the decision variables.
    Input,
    /// On the objective vectors.
    #[default]
    Output,
}

/// Settings of the multi-objective evolutionary search.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MoeaConfig {
    /// Population size. Default: 100.
    pub population_size: usize,
    /// Number of generations. Default: 100.
    pub generations: usize,
    /// DE differential weight `F`. Default: 0.8.
    pub mutation_factor: f64,
    /// DE crossover probability `CR`. Default: 0.8.
    pub crossover_rate: f64,
    /// Seed of the search; random when `None`.
    pub seed: Option<u64>,
    /// Keep the first front of every generation. Default: `false`.
    pub record: bool,
}

impl Default for MoeaConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            generations: 100,
            mutation_factor: 0.8,
            crossover_rate: 0.8,
            seed: None,
            record: false,
        }
    }
}

/// Result of a multi-objective search.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParetoSolution {
    /// Non-dominated points, without duplicates.
    pub set: Vec<Vec<f64>>,
    /// Objective vector of each point in `set`.
    pub front: Vec<Vec<f64>>,
    /// First front of every generation, when recording was requested.
    pub history: Vec<Vec<Vec<f64>>>,
}

impl ParetoSolution {
    /// Number of points in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.set.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Multi-objective differential evolution over a box.
#[derive(Clone, Debug)]
pub struct MultiObjectiveDe {
    bounds: Bounds,
    config: MoeaConfig,
    crowding: CrowdingSpace,
    anchors: Vec<Vec<f64>>,
}

impl MultiObjectiveDe {
    /// Create a search over `bounds`.
    #[must_use]
    pub fn new(bounds: Bounds, config: MoeaConfig) -> Self {
        Self {
            bounds,
            config,
            crowding: CrowdingSpace::default(),
            anchors: Vec::new(),
        }
    }

    /// Space in which crowding distance is measured.
    #[must_use]
    pub fn crowding(mut self, space: CrowdingSpace) -> Self {
        self.crowding = space;
        self
    }

    /// Points injected into the initial population.
    #[must_use]
    pub fn anchors(mut self, anchors: Vec<Vec<f64>>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Run the search.
    ///
    /// With a single objective the result holds exactly one point, the best
    /// one found (lowest population index on ties). `NaN` objective values
    /// are treated as `+inf`.
    #[must_use]
    pub fn optimize<F: MultiCostFunction + ?Sized>(&self, f: &F) -> ParetoSolution {
        let mut rng = self
            .config
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let np = self.config.population_size.max(MIN_POPULATION);
        let evaluate = |x: &Vec<f64>| -> Vec<f64> {
            f.costs(x)
                .into_iter()
                .map(|v| if v.is_nan() { f64::INFINITY } else { v })
                .collect()
        };

        let mut population: Vec<Vec<f64>> = self
            .anchors
            .iter()
            .take(np)
            .map(|a| {
                let mut x = a.clone();
                self.bounds.clamp(&mut x);
                x
            })
            .collect();
        while population.len() < np {
            population.push(self.bounds.random(&mut rng));
        }
        let mut costs: Vec<Vec<f64>> = population.par_iter().map(evaluate).collect();
        let mut history = Vec::new();

        for _ in 0..self.config.generations {
            let offspring: Vec<Vec<f64>> = (0..np)
                .map(|i| self.offspring(&population, i, &mut rng))
                .collect();
            let offspring_costs: Vec<Vec<f64>> = offspring.par_iter().map(evaluate).collect();

            population.extend(offspring);
            costs.extend(offspring_costs);
            let keep = self.survivors(&population, &costs, np);
            population = keep.iter().map(|&i| population[i].clone()).collect();
            costs = keep.iter().map(|&i| costs[i].clone()).collect();

            if self.config.record {
                history.push(
                    pareto_front_indices(&costs)
                        .into_iter()
                        .map(|i| costs[i].clone())
                        .collect(),
                );
            }
        }

        if f.n_costs() == 1 {
            let scalar: Vec<f64> = costs.iter().map(|c| c[0]).collect();
            let best = argmin(&scalar);
            return ParetoSolution {
                set: vec![population.swap_remove(best)],
                front: vec![costs.swap_remove(best)],
                history,
            };
        }

        let mut solution = ParetoSolution {
            history,
            ..ParetoSolution::default()
        };
        for i in pareto_front_indices(&costs) {
            if solution.set.contains(&population[i]) {
                continue;
            }
            solution.set.push(population[i].clone());
            solution.front.push(costs[i].clone());
        }
        solution
    }

    fn offspring(&self, population: &[Vec<f64>], target: usize, rng: &mut fastrand::Rng) -> Vec<f64> {
        let dim = self.bounds.dim();
        let n = population.len();
        let mut donors = [0_usize; 3];
        let mut picked = 0;
        while picked < 3 {
            let idx = rng.usize(0..n);
            if idx != target && !donors[..picked].contains(&idx) {
                donors[picked] = idx;
                picked += 1;
            }
        }
        let (r1, r2, r3) = (&population[donors[0]], &population[donors[1]], &population[donors[2]]);
        let x = &population[target];
        let j_rand = rng.usize(0..dim.max(1));

        let mut child: Vec<f64> = (0..dim)
            .map(|j| {
                if j == j_rand || rng.f64() < self.config.crossover_rate {
                    r1[j] + self.config.mutation_factor * (r2[j] - r3[j])
                } else {
                    x[j]
                }
            })
            .collect();
        self.bounds.clamp(&mut child);
        child
    }

    /// Indices of the `np` members that survive truncation.
    fn survivors(&self, population: &[Vec<f64>], costs: &[Vec<f64>], np: usize) -> Vec<usize> {
        let coords = match self.crowding {
            CrowdingSpace::Input => population,
            CrowdingSpace::Output => costs,
        };
        let mut selected = Vec::with_capacity(np);
        for front in non_dominated_sort(costs) {
            if selected.len() + front.len() <= np {
                selected.extend_from_slice(&front);
                continue;
            }
            let remaining = np - selected.len();
            let cd = crowding_distance(&front, coords);
            let mut order: Vec<usize> = (0..front.len()).collect();
            order.sort_by(|&a, &b| cd[b].partial_cmp(&cd[a]).unwrap_or(Ordering::Equal));
            selected.extend(order[..remaining].iter().map(|&pos| front[pos]));
            break;
        }
        selected
    }
}
