//! Differential Evolution over the volume-ratio simplex
//!
//! Population-based global search: each generation builds a trial vector
//! per individual from scaled differences of other population members
//! (rand/1/bin), repairs it onto the simplex, and keeps it only when it
//! strictly beats its parent. Ties keep the incumbent, which makes seeded
//! runs fully deterministic.

use std::time::Instant;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::OptimizeError;
use crate::mixture::{
    Candidate, FitnessOracle, SearchReport, Termination, random_simplex, repair_ratios,
};

/// Population size bounds when auto-calculated
pub const MIN_POPULATION: usize = 20;
pub const MAX_POPULATION: usize = 200;
const POPULATION_PER_DIMENSION: usize = 10;

/// Adaptive F/CR bounds and the success-rate window that drives them
const MIN_MUTATION_FACTOR: f64 = 0.3;
const MAX_MUTATION_FACTOR: f64 = 1.2;
const MIN_CROSSOVER_RATE: f64 = 0.5;
const MAX_CROSSOVER_RATE: f64 = 0.98;
const LOW_SUCCESS_RATE: f64 = 0.05;
const HIGH_SUCCESS_RATE: f64 = 0.2;

/// Differential Evolution parameters, validated at construction.
#[derive(Debug, Clone)]
pub struct DeConfig {
    /// Explicit population size; `None` auto-calculates
    /// `clamp(dimensions * 10, 20, 200)`
    pub population_size: Option<usize>,
    /// Mutation scale F in (0, 2]
    pub mutation_factor: f64,
    /// Per-dimension crossover probability CR in [0, 1]
    pub crossover_rate: f64,
    pub max_iterations: usize,
    /// Improvement below this does not reset the stagnation counter
    pub convergence_tolerance: f64,
    pub max_stagnation: usize,
    /// Stop once the best fitness drops to this Delta E
    pub target_delta_e: f64,
    pub time_budget_ms: u64,
    /// Adjust F/CR from the recent trial success rate
    pub adaptive: bool,
    /// Seed for reproducible runs; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for DeConfig {
    fn default() -> Self {
        Self {
            population_size: None,
            mutation_factor: 0.8,
            crossover_rate: 0.9,
            max_iterations: 1000,
            convergence_tolerance: 1e-6,
            max_stagnation: 50,
            target_delta_e: 0.5,
            time_budget_ms: 28_000,
            adaptive: true,
            seed: None,
        }
    }
}

impl DeConfig {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let invalid = |reason: String| OptimizeError::InvalidConfig { reason };
        if !(0.0..=2.0).contains(&self.mutation_factor) || self.mutation_factor == 0.0 {
            return Err(invalid(format!("mutation factor F={} outside (0, 2]", self.mutation_factor)));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(invalid(format!("crossover rate CR={} outside [0, 1]", self.crossover_rate)));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max iterations must be > 0".into()));
        }
        if let Some(size) = self.population_size
            && size < 4
        {
            return Err(invalid(format!("population size {} too small for rand/1 mutation", size)));
        }
        if self.target_delta_e < 0.0 {
            return Err(invalid(format!("target delta E {} must be >= 0", self.target_delta_e)));
        }
        Ok(())
    }

    /// Auto-sized population for a given search dimension
    pub fn population_for(&self, dimensions: usize) -> usize {
        self.population_size
            .unwrap_or((dimensions * POPULATION_PER_DIMENSION).clamp(MIN_POPULATION, MAX_POPULATION))
    }
}

/// Owned search state for one run: population, fitness, best index.
/// Threaded through generations explicitly so seeded runs replay exactly.
struct Population {
    members: Vec<Candidate>,
    best_idx: usize,
}

impl Population {
    fn initialize(oracle: &FitnessOracle, size: usize, rng: &mut StdRng) -> Self {
        let n = oracle.dimensions();
        let mut members = Vec::with_capacity(size);

        // Seed one member with the uniform blend; the rest are random
        let mut uniform = DVector::from_element(n, 1.0 / n as f64);
        repair_ratios(&mut uniform);
        members.push(oracle.evaluate(uniform));
        for _ in 1..size {
            members.push(oracle.evaluate(random_simplex(n, rng)));
        }

        let best_idx = Self::find_best(&members);
        Self { members, best_idx }
    }

    fn find_best(members: &[Candidate]) -> usize {
        let mut best = 0;
        for (i, c) in members.iter().enumerate() {
            if c.fitness < members[best].fitness {
                best = i;
            }
        }
        best
    }

    fn best(&self) -> &Candidate {
        &self.members[self.best_idx]
    }
}

/// Differential Evolution optimizer. Stateless across runs: every call to
/// [`run`](Self::run) builds a fresh population.
pub struct DifferentialEvolution {
    config: DeConfig,
}

impl DifferentialEvolution {
    pub fn new(config: DeConfig) -> Result<Self, OptimizeError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn make_rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Run the search against the oracle. Always returns the best
    /// candidate found, whatever the termination reason.
    pub fn run(&self, oracle: &FitnessOracle) -> SearchReport {
        let started = Instant::now();
        let mut rng = self.make_rng();

        let n = oracle.dimensions();
        let pop_size = self.config.population_for(n);
        let mut population = Population::initialize(oracle, pop_size, &mut rng);

        let mut f = self.config.mutation_factor;
        let mut cr = self.config.crossover_rate;
        let mut stagnation = 0usize;
        let mut iterations = 0usize;

        let termination = loop {
            if population.best().fitness <= self.config.target_delta_e {
                break Termination::Converged;
            }
            if iterations >= self.config.max_iterations {
                break Termination::MaxIterationsReached;
            }
            if stagnation >= self.config.max_stagnation {
                break Termination::Stagnated;
            }
            // Cooperative budget check at the generation boundary
            if started.elapsed().as_millis() as u64 >= self.config.time_budget_ms {
                break Termination::TimedOut;
            }

            let best_before = population.best().fitness;
            let successes = self.evolve_generation(oracle, &mut population, f, cr, &mut rng);
            iterations += 1;

            if best_before - population.best().fitness > self.config.convergence_tolerance {
                stagnation = 0;
            } else {
                stagnation += 1;
            }

            if self.config.adaptive {
                let success_rate = successes as f64 / pop_size as f64;
                (f, cr) = adapt_parameters(f, cr, success_rate);
            }
        };

        SearchReport {
            best: population.best().clone(),
            iterations,
            termination,
        }
    }

    /// One generation of rand/1/bin with greedy selection. Returns the
    /// number of trials that replaced their parent.
    fn evolve_generation(
        &self,
        oracle: &FitnessOracle,
        population: &mut Population,
        f: f64,
        cr: f64,
        rng: &mut StdRng,
    ) -> usize {
        let pop_size = population.members.len();
        let n = oracle.dimensions();
        let mut successes = 0;

        for i in 0..pop_size {
            let [r1, r2, r3] = distinct_indices(pop_size, i, rng);

            // Mutation: base vector plus scaled difference of two others
            let mut trial = DVector::zeros(n);
            let base = &population.members[r1].ratios;
            let diff_a = &population.members[r2].ratios;
            let diff_b = &population.members[r3].ratios;

            // Binomial crossover with one guaranteed mutant dimension
            let j_rand = rng.gen_range(0..n);
            for j in 0..n {
                trial[j] = if j == j_rand || rng.gen_range(0.0..1.0) < cr {
                    base[j] + f * (diff_a[j] - diff_b[j])
                } else {
                    population.members[i].ratios[j]
                };
            }

            repair_ratios(&mut trial);
            let candidate = oracle.evaluate(trial);

            // Strictly fitter only: equal fitness keeps the incumbent
            if candidate.fitness < population.members[i].fitness {
                population.members[i] = candidate;
                if population.members[i].fitness < population.members[population.best_idx].fitness {
                    population.best_idx = i;
                }
                successes += 1;
            }
        }

        successes
    }
}

/// Nudge F/CR toward exploration when trials stop landing and toward
/// exploitation when most of them succeed
fn adapt_parameters(f: f64, cr: f64, success_rate: f64) -> (f64, f64) {
    if success_rate < LOW_SUCCESS_RATE {
        (
            (f * 1.1).min(MAX_MUTATION_FACTOR),
            (cr * 0.98).max(MIN_CROSSOVER_RATE),
        )
    } else if success_rate > HIGH_SUCCESS_RATE {
        (
            (f * 0.95).max(MIN_MUTATION_FACTOR),
            (cr * 1.01).min(MAX_CROSSOVER_RATE),
        )
    } else {
        (f, cr)
    }
}

/// Three distinct population indices, all different from `exclude`
fn distinct_indices(pop_size: usize, exclude: usize, rng: &mut StdRng) -> [usize; 3] {
    let mut picked = [usize::MAX; 3];
    for slot in 0..3 {
        loop {
            let idx = rng.gen_range(0..pop_size);
            if idx != exclude && !picked[..slot].contains(&idx) {
                picked[slot] = idx;
                break;
            }
        }
    }
    picked
}
