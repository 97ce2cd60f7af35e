//! Tree-structured Parzen Estimator search over the ratio simplex
//!
//! Bayesian-style alternative to Differential Evolution, better suited to
//! larger paint catalogs: completed trials are split at the gamma quantile
//! into a "good" group and the rest, per-dimension Parzen densities model
//! each group, and new candidates are drawn from the good density and
//! ranked by the l(x)/g(x) density ratio (the expected-improvement proxy).
//! The first `n_startup_trials` are uniform random to seed the history.

use std::time::Instant;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::OptimizeError;
use crate::mixture::{
    Candidate, FitnessOracle, MAX_VOLUME_RATIO, MIN_VOLUME_RATIO, SearchReport, Termination,
    random_simplex, repair_ratios,
};

/// Quantile used while the history is still warming up
const WARMUP_GAMMA: f64 = 0.5;

/// Density floor; keeps log-ratios finite in empty regions
const DENSITY_FLOOR: f64 = 1e-12;

/// Bandwidth floor for the Parzen kernels
const MIN_BANDWIDTH: f64 = 1e-3;

/// TPE parameters, validated at construction.
#[derive(Debug, Clone)]
pub struct TpeConfig {
    /// Uniform random trials before the estimator switches on
    pub n_startup_trials: usize,
    /// Trials after startup during which the good/other split stays loose
    pub n_warmup_steps: usize,
    /// Candidate pool size scored by the acquisition ratio per trial
    pub n_ei_candidates: usize,
    /// Quantile splitting "good" from "other" trials, in (0, 1)
    pub gamma: f64,
    /// Blend a uniform prior into both densities
    pub consider_prior: bool,
    pub prior_weight: f64,
    /// Include the ratio bounds when estimating kernel bandwidths
    pub consider_endpoints: bool,
    pub max_trials: usize,
    /// Stop once the best fitness drops to this Delta E
    pub target_delta_e: f64,
    pub time_limit_ms: u64,
    /// Seed for reproducible runs; `None` draws from entropy
    pub seed: Option<u64>,
}

impl Default for TpeConfig {
    fn default() -> Self {
        Self {
            n_startup_trials: 20,
            n_warmup_steps: 10,
            n_ei_candidates: 24,
            gamma: 0.25,
            consider_prior: true,
            prior_weight: 1.0,
            consider_endpoints: false,
            max_trials: 1000,
            target_delta_e: 0.5,
            time_limit_ms: 28_000,
            seed: None,
        }
    }
}

impl TpeConfig {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let invalid = |reason: String| OptimizeError::InvalidConfig { reason };
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(invalid(format!("gamma {} outside (0, 1)", self.gamma)));
        }
        if self.n_startup_trials == 0 {
            return Err(invalid("startup trials must be > 0".into()));
        }
        if self.n_ei_candidates == 0 {
            return Err(invalid("EI candidate pool must be > 0".into()));
        }
        if self.max_trials == 0 {
            return Err(invalid("max trials must be > 0".into()));
        }
        if self.consider_prior && self.prior_weight <= 0.0 {
            return Err(invalid(format!("prior weight {} must be > 0", self.prior_weight)));
        }
        if self.target_delta_e < 0.0 {
            return Err(invalid(format!("target delta E {} must be >= 0", self.target_delta_e)));
        }
        Ok(())
    }
}

/// One-dimensional Parzen estimator: Gaussian kernels on observed values,
/// optionally blended with a uniform prior over the ratio bounds.
struct ParzenDensity {
    points: Vec<f64>,
    bandwidth: f64,
    prior_weight: f64,
}

impl ParzenDensity {
    fn fit(values: &[f64], config: &TpeConfig) -> Self {
        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for &v in values {
            lo = lo.min(v);
            hi = hi.max(v);
        }
        if config.consider_endpoints {
            lo = lo.min(MIN_VOLUME_RATIO);
            hi = hi.max(MAX_VOLUME_RATIO);
        }
        let spread = (hi - lo).max(MIN_BANDWIDTH);
        let bandwidth = (spread / (values.len().max(1) as f64).sqrt()).max(MIN_BANDWIDTH);

        Self {
            points: values.to_vec(),
            bandwidth,
            prior_weight: if config.consider_prior { config.prior_weight } else { 0.0 },
        }
    }

    fn density(&self, x: f64) -> f64 {
        let uniform = 1.0 / (MAX_VOLUME_RATIO - MIN_VOLUME_RATIO);
        let norm = 1.0 / (self.bandwidth * (2.0 * std::f64::consts::PI).sqrt());

        let kernel_sum: f64 = self
            .points
            .iter()
            .map(|&m| {
                let z = (x - m) / self.bandwidth;
                norm * (-0.5 * z * z).exp()
            })
            .sum();

        let total_weight = self.points.len() as f64 + self.prior_weight;
        ((kernel_sum + self.prior_weight * uniform) / total_weight).max(DENSITY_FLOOR)
    }

    /// Draw one value: a prior-weighted coin picks the uniform component,
    /// otherwise a random kernel center plus Gaussian noise
    fn sample(&self, rng: &mut StdRng) -> f64 {
        let total_weight = self.points.len() as f64 + self.prior_weight;
        if rng.gen_range(0.0..total_weight) < self.prior_weight {
            return rng.gen_range(MIN_VOLUME_RATIO..MAX_VOLUME_RATIO);
        }
        let center = self.points[rng.gen_range(0..self.points.len())];
        (center + self.bandwidth * sample_standard_normal(rng))
            .clamp(MIN_VOLUME_RATIO, MAX_VOLUME_RATIO)
    }
}

/// Box-Muller transform; avoids pulling in a distributions crate for one
/// Gaussian draw
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// TPE hybrid optimizer. Stateless across runs; trial history lives on
/// the stack of [`run`](Self::run).
pub struct TpeHybrid {
    config: TpeConfig,
}

impl TpeHybrid {
    pub fn new(config: TpeConfig) -> Result<Self, OptimizeError> {
        config.validate()?;
        Ok(Self { config })
    }

    fn make_rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn run(&self, oracle: &FitnessOracle) -> SearchReport {
        let started = Instant::now();
        let mut rng = self.make_rng();
        let n = oracle.dimensions();

        let mut history: Vec<Candidate> = Vec::with_capacity(self.config.max_trials);
        let mut best_idx = 0usize;
        let mut trials = 0usize;

        let termination = loop {
            if trials >= self.config.max_trials {
                break Termination::MaxIterationsReached;
            }
            if !history.is_empty() && history[best_idx].fitness <= self.config.target_delta_e {
                break Termination::Converged;
            }
            // Cooperative budget check at the trial boundary
            if started.elapsed().as_millis() as u64 >= self.config.time_limit_ms {
                if history.is_empty() {
                    // Guarantee at least one evaluated candidate to return
                    history.push(oracle.evaluate(random_simplex(n, &mut rng)));
                }
                break Termination::TimedOut;
            }

            let ratios = if history.len() < self.config.n_startup_trials {
                random_simplex(n, &mut rng)
            } else {
                self.suggest(&history, n, &mut rng)
            };

            let candidate = oracle.evaluate(ratios);
            if history.is_empty() || candidate.fitness < history[best_idx].fitness {
                best_idx = history.len();
            }
            history.push(candidate);
            trials += 1;
        };

        SearchReport {
            best: history[best_idx].clone(),
            iterations: trials,
            termination,
        }
    }

    /// Model-guided suggestion: fit good/other densities per dimension,
    /// draw a candidate pool from the good model, keep the draw with the
    /// highest log density ratio.
    fn suggest(&self, history: &[Candidate], n: usize, rng: &mut StdRng) -> DVector<f64> {
        let mut order: Vec<usize> = (0..history.len()).collect();
        order.sort_by(|&a, &b| {
            history[a]
                .fitness
                .partial_cmp(&history[b].fitness)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Loose split until the warm-up window has passed
        let gamma = if history.len() < self.config.n_startup_trials + self.config.n_warmup_steps {
            WARMUP_GAMMA
        } else {
            self.config.gamma
        };
        let n_good = ((gamma * history.len() as f64).ceil() as usize)
            .clamp(1, history.len().saturating_sub(1).max(1));

        let good_models: Vec<ParzenDensity> = (0..n)
            .map(|d| {
                let values: Vec<f64> =
                    order[..n_good].iter().map(|&i| history[i].ratios[d]).collect();
                ParzenDensity::fit(&values, &self.config)
            })
            .collect();
        let other_models: Vec<ParzenDensity> = (0..n)
            .map(|d| {
                let values: Vec<f64> =
                    order[n_good..].iter().map(|&i| history[i].ratios[d]).collect();
                ParzenDensity::fit(&values, &self.config)
            })
            .collect();

        let mut best_ratios: Option<DVector<f64>> = None;
        let mut best_score = f64::NEG_INFINITY;

        for _ in 0..self.config.n_ei_candidates {
            let mut draw = DVector::from_fn(n, |d, _| good_models[d].sample(rng));
            repair_ratios(&mut draw);

            let score: f64 = (0..n)
                .map(|d| {
                    good_models[d].density(draw[d]).ln() - other_models[d].density(draw[d]).ln()
                })
                .sum();

            if score > best_score {
                best_score = score;
                best_ratios = Some(draw);
            }
        }

        best_ratios.unwrap_or_else(|| random_simplex(n, rng))
    }
}
