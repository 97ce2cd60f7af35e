//! Request orchestration: validation, algorithm selection, time budgets,
//! and assembly of the reportable formula + metrics
//!
//! This is the single entry point the request-handling layer calls. It
//! never persists anything and never fails for an unreachable target
//! color: infeasible targets come back as a normal result with
//! `target_met: false` and explanatory warnings.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::color::{LabColor, delta_e_2000};
use crate::de::{DeConfig, DifferentialEvolution};
use crate::error::OptimizeError;
use crate::kubelka_munk::{classify_opacity, mixture_optics};
use crate::mixture::{FitnessOracle, SearchReport, Termination};
use crate::paint::{OpacityClass, Paint, VolumeConstraints};
use crate::tpe::{TpeConfig, TpeHybrid};

/// Bounds on the incoming paint catalog
pub const MIN_AVAILABLE_PAINTS: usize = 2;
pub const MAX_AVAILABLE_PAINTS: usize = 100;

/// Bounds on how many paints one mixture may use
pub const MIN_PAINT_COUNT: usize = 2;
pub const MAX_PAINT_COUNT: usize = 5;

/// Accepted wall-clock budget window
pub const MIN_TIME_LIMIT_MS: u64 = 1000;
pub const MAX_TIME_LIMIT_MS: u64 = 30_000;

/// Default hard budget, kept below the expected outer request timeout
pub const DEFAULT_TIME_LIMIT_MS: u64 = 28_000;

/// Catalogs up to this size use Differential Evolution; larger ones get
/// the TPE hybrid (inclusive boundary)
const DE_PAINT_COUNT_THRESHOLD: usize = 8;

const DEFAULT_ACCURACY_TARGET: f64 = 2.0;
const DEFAULT_MAX_PAINT_COUNT: usize = 4;

/// Iteration caps for the cheaper `standard` mode
const STANDARD_MODE_ITERATIONS: usize = 150;
const ENHANCED_MODE_ITERATIONS: usize = 1000;

/// Optimization effort level. `standard` trades accuracy for speed with
/// smaller iteration caps; `enhanced` runs the full search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Standard,
    #[default]
    Enhanced,
}

impl Mode {
    /// Case-insensitive parse with a distinct error for unknown modes
    pub fn parse(s: &str) -> Result<Self, OptimizeError> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Mode::Standard),
            "enhanced" => Ok(Mode::Enhanced),
            _ => Err(OptimizeError::InvalidMode { mode: s.to_string() }),
        }
    }
}

/// Which global-search algorithm handled a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    DifferentialEvolution,
    TpeHybrid,
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Algorithm::DifferentialEvolution => f.write_str("differential_evolution"),
            Algorithm::TpeHybrid => f.write_str("tpe_hybrid"),
        }
    }
}

/// Pick the search algorithm for a catalog size: DE for small spaces,
/// TPE for large ones. The boundary is inclusive on 8.
pub fn recommended_algorithm(paint_count: usize) -> Algorithm {
    if paint_count <= DE_PAINT_COUNT_THRESHOLD {
        Algorithm::DifferentialEvolution
    } else {
        Algorithm::TpeHybrid
    }
}

/// Perceptual quality band for an achieved Delta E
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyRating {
    Excellent,
    Good,
    Acceptable,
    Poor,
}

impl AccuracyRating {
    pub fn from_delta_e(delta_e: f64) -> Self {
        if delta_e <= 2.0 {
            AccuracyRating::Excellent
        } else if delta_e <= 4.0 {
            AccuracyRating::Good
        } else if delta_e <= 6.0 {
            AccuracyRating::Acceptable
        } else {
            AccuracyRating::Poor
        }
    }
}

/// How fiddly the recipe is to mix by hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixingComplexity {
    Simple,
    Moderate,
    Complex,
}

impl MixingComplexity {
    pub fn from_paint_count(count: usize) -> Self {
        match count {
            0..=2 => MixingComplexity::Simple,
            3..=4 => MixingComplexity::Moderate,
            _ => MixingComplexity::Complex,
        }
    }
}

/// One optimization request: a pure value, no shared state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub target_color: LabColor,
    pub available_paints: Vec<Paint>,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_max_paint_count")]
    pub max_paint_count: usize,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    #[serde(default = "default_accuracy_target")]
    pub accuracy_target: f64,
    #[serde(default)]
    pub volume_constraints: VolumeConstraints,
    /// Seed for reproducible runs; stochastic otherwise
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_paint_count() -> usize {
    DEFAULT_MAX_PAINT_COUNT
}

fn default_time_limit_ms() -> u64 {
    DEFAULT_TIME_LIMIT_MS
}

fn default_accuracy_target() -> f64 {
    DEFAULT_ACCURACY_TARGET
}

impl OptimizationRequest {
    pub fn new(target_color: LabColor, available_paints: Vec<Paint>) -> Self {
        Self {
            target_color,
            available_paints,
            mode: Mode::default(),
            max_paint_count: DEFAULT_MAX_PAINT_COUNT,
            time_limit_ms: DEFAULT_TIME_LIMIT_MS,
            accuracy_target: DEFAULT_ACCURACY_TARGET,
            volume_constraints: VolumeConstraints::default(),
            seed: None,
        }
    }

    /// Fail fast on anything malformed, before any search work starts
    fn validate(&self) -> Result<(), OptimizeError> {
        self.target_color.validate()?;

        let count = self.available_paints.len();
        if !(MIN_AVAILABLE_PAINTS..=MAX_AVAILABLE_PAINTS).contains(&count) {
            return Err(OptimizeError::PaintCountOutOfRange {
                count,
                min: MIN_AVAILABLE_PAINTS,
                max: MAX_AVAILABLE_PAINTS,
            });
        }
        for paint in &self.available_paints {
            paint.validate()?;
        }
        if !(MIN_PAINT_COUNT..=MAX_PAINT_COUNT).contains(&self.max_paint_count) {
            return Err(OptimizeError::InvalidMaxPaintCount {
                value: self.max_paint_count,
            });
        }
        if !(MIN_TIME_LIMIT_MS..=MAX_TIME_LIMIT_MS).contains(&self.time_limit_ms) {
            return Err(OptimizeError::InvalidTimeLimit {
                value: self.time_limit_ms,
                min: MIN_TIME_LIMIT_MS,
                max: MAX_TIME_LIMIT_MS,
            });
        }
        if !self.accuracy_target.is_finite() || self.accuracy_target <= 0.0 {
            return Err(OptimizeError::InvalidAccuracyTarget {
                value: self.accuracy_target,
            });
        }
        self.volume_constraints.validate()?;
        Ok(())
    }
}

/// One component of the final recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaintRatio {
    pub paint_id: String,
    pub paint_name: String,
    /// Volume fraction in [0.001, 0.999]; fractions sum to 1.0
    pub ratio: f64,
    pub volume_ml: f64,
}

/// The reportable mixing recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixingFormula {
    pub paint_ratios: Vec<PaintRatio>,
    pub total_volume_ml: f64,
    pub achieved_color: LabColor,
    pub delta_e: f64,
    pub accuracy_rating: AccuracyRating,
    pub mixing_complexity: MixingComplexity,
    pub kubelka_munk_k: f64,
    pub kubelka_munk_s: f64,
    pub opacity: f64,
    pub opacity_class: OpacityClass,
    pub warnings: Vec<String>,
}

/// Performance and quality numbers for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationMetrics {
    pub time_elapsed_ms: u64,
    pub iterations_completed: usize,
    pub algorithm_used: Algorithm,
    pub convergence_achieved: bool,
    pub target_met: bool,
    pub early_termination: bool,
    pub initial_best_delta_e: f64,
    pub final_best_delta_e: f64,
    /// Relative gain over the best single paint, clamped to [0, 1]
    pub improvement_rate: f64,
}

/// Everything a caller gets back from one optimization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationOutcome {
    pub formula: MixingFormula,
    pub metrics: OptimizationMetrics,
}

/// Match the target color with a mixture of the available paints.
///
/// Validates the request, selects Differential Evolution or the TPE
/// hybrid by catalog size, runs the search under the request's
/// wall-clock budget, and assembles the formula and metrics. Unreachable
/// targets and exhausted budgets are reported in the result, never as
/// errors.
pub fn optimize(request: &OptimizationRequest) -> Result<OptimizationOutcome, OptimizeError> {
    let started = Instant::now();
    request.validate()?;

    let target = request.target_color;

    // Rank the catalog by single-paint closeness; the nearest paint is
    // both the improvement baseline and the subset-selection criterion
    let mut ranked: Vec<(usize, f64)> = request
        .available_paints
        .iter()
        .enumerate()
        .map(|(i, p)| (i, delta_e_2000(p.color, target)))
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let initial_best_delta_e = ranked[0].1;

    let subset_size = request.max_paint_count.min(request.available_paints.len());
    let selected: Vec<Paint> = ranked[..subset_size]
        .iter()
        .map(|&(i, _)| request.available_paints[i].clone())
        .collect();

    let algorithm = recommended_algorithm(request.available_paints.len());
    let oracle = FitnessOracle::new(&selected, target);

    let budget_ms = request.time_limit_ms.min(MAX_TIME_LIMIT_MS);

    let report = match algorithm {
        Algorithm::DifferentialEvolution => run_de(request, budget_ms, &oracle)?,
        Algorithm::TpeHybrid => run_tpe(request, budget_ms, &oracle)?,
    };

    let outcome = assemble_outcome(
        request,
        &selected,
        algorithm,
        report,
        initial_best_delta_e,
        started,
    );
    Ok(outcome)
}

fn run_de(
    request: &OptimizationRequest,
    budget_ms: u64,
    oracle: &FitnessOracle,
) -> Result<SearchReport, OptimizeError> {
    let config = DeConfig {
        max_iterations: match request.mode {
            Mode::Standard => STANDARD_MODE_ITERATIONS,
            Mode::Enhanced => ENHANCED_MODE_ITERATIONS,
        },
        population_size: match request.mode {
            Mode::Standard => Some(crate::de::MIN_POPULATION),
            Mode::Enhanced => None,
        },
        adaptive: request.mode == Mode::Enhanced,
        target_delta_e: request.accuracy_target,
        time_budget_ms: budget_ms,
        seed: request.seed,
        ..Default::default()
    };
    Ok(DifferentialEvolution::new(config)?.run(oracle))
}

fn run_tpe(
    request: &OptimizationRequest,
    budget_ms: u64,
    oracle: &FitnessOracle,
) -> Result<SearchReport, OptimizeError> {
    let config = TpeConfig {
        max_trials: match request.mode {
            Mode::Standard => STANDARD_MODE_ITERATIONS * 2,
            Mode::Enhanced => ENHANCED_MODE_ITERATIONS * 2,
        },
        target_delta_e: request.accuracy_target,
        time_limit_ms: budget_ms,
        seed: request.seed,
        ..Default::default()
    };
    Ok(TpeHybrid::new(config)?.run(oracle))
}

/// Realize a batch size that satisfies the volume constraints. With
/// scaling allowed, the batch grows (within the max) until the smallest
/// component clears the per-component minimum. A per-component maximum
/// shrinks the batch again, never below `min_total_volume_ml`; a cap the
/// floor makes unsatisfiable is reported as a warning by the caller.
fn realize_total_volume(
    constraints: &VolumeConstraints,
    smallest_ratio: f64,
    largest_ratio: f64,
) -> f64 {
    let mut total = constraints.min_total_volume_ml;
    if constraints.allow_scaling
        && let Some(min_component) = constraints.min_component_volume_ml
        && smallest_ratio > 0.0
    {
        let needed = min_component / smallest_ratio;
        total = total.max(needed).min(constraints.max_total_volume_ml);
    }
    if let Some(max_component) = constraints.max_component_volume_ml
        && largest_ratio > 0.0
    {
        let cap = max_component / largest_ratio;
        total = total.min(cap).max(constraints.min_total_volume_ml);
    }
    total
}

fn assemble_outcome(
    request: &OptimizationRequest,
    selected: &[Paint],
    algorithm: Algorithm,
    report: SearchReport,
    initial_best_delta_e: f64,
    started: Instant,
) -> OptimizationOutcome {
    let best = &report.best;
    let final_delta_e = best.delta_e;
    let target_met = final_delta_e <= request.accuracy_target;

    let smallest_ratio = best.ratios.iter().copied().fold(f64::INFINITY, f64::min);
    let largest_ratio = best.ratios.iter().copied().fold(0.0, f64::max);
    let total_volume_ml =
        realize_total_volume(&request.volume_constraints, smallest_ratio, largest_ratio);

    let paint_ratios: Vec<PaintRatio> = selected
        .iter()
        .zip(best.ratios.iter())
        .map(|(paint, &ratio)| PaintRatio {
            paint_id: paint.id.clone(),
            paint_name: paint.name.clone(),
            ratio,
            volume_ml: ratio * total_volume_ml,
        })
        .collect();

    let optics = mixture_optics(selected, best.ratios.as_slice());

    let mut warnings = Vec::new();
    if !target_met {
        warnings.push(format!(
            "Target color appears to lie outside the achievable gamut of the \
             selected paints: best achievable mixture differs by delta E {:.2} \
             (requested {:.2}). Pigment limitations may make a closer match \
             impossible with this palette.",
            final_delta_e, request.accuracy_target
        ));
    }
    if let Some(max_component) = request.volume_constraints.max_component_volume_ml {
        let largest_ml = largest_ratio * total_volume_ml;
        if largest_ml > max_component + 1e-9 {
            warnings.push(format!(
                "Largest component needs {:.2} ml but components are capped at \
                 {:.2} ml; the minimum batch size of {:.2} ml prevents scaling \
                 down any further.",
                largest_ml, max_component, request.volume_constraints.min_total_volume_ml
            ));
        }
    }
    if report.termination.is_early() {
        warnings.push(format!(
            "Search stopped early after exhausting the {} ms time budget; \
             a longer budget may find a closer mixture.",
            request.time_limit_ms
        ));
    }

    let improvement_rate = if initial_best_delta_e > 0.0 {
        ((initial_best_delta_e - final_delta_e) / initial_best_delta_e).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let formula = MixingFormula {
        mixing_complexity: MixingComplexity::from_paint_count(paint_ratios.len()),
        paint_ratios,
        total_volume_ml,
        achieved_color: best.color,
        delta_e: final_delta_e,
        accuracy_rating: AccuracyRating::from_delta_e(final_delta_e),
        kubelka_munk_k: optics.k,
        kubelka_munk_s: optics.s,
        opacity: optics.opacity,
        opacity_class: classify_opacity(optics.opacity),
        warnings,
    };

    let metrics = OptimizationMetrics {
        time_elapsed_ms: started.elapsed().as_millis() as u64,
        iterations_completed: report.iterations,
        algorithm_used: algorithm,
        convergence_achieved: report.termination == Termination::Converged,
        target_met,
        early_termination: report.termination.is_early(),
        initial_best_delta_e,
        final_best_delta_e: final_delta_e,
        improvement_rate,
    };

    OptimizationOutcome { formula, metrics }
}
