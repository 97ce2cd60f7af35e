//! Candidate mixtures: the shared search-space contract for both optimizers
//!
//! A candidate is a point on the volume-ratio simplex: one ratio per
//! selected paint, summing to 1.0, each component within hard bounds.
//! Both optimizers repair raw vectors onto this region and score them
//! through the same fitness oracle.

use nalgebra::DVector;
use rand::Rng;

use crate::color::{LabColor, delta_e_2000};
use crate::kubelka_munk::mix_paints;
use crate::paint::Paint;

/// Hard bounds on a single component of the ratio vector
pub const MIN_VOLUME_RATIO: f64 = 0.001;
pub const MAX_VOLUME_RATIO: f64 = 0.999;

/// Accepted deviation of the ratio sum from 1.0
pub const RATIO_SUM_TOLERANCE: f64 = 1e-6;

/// Penalty weight applied per unit of residual constraint violation.
/// Large enough that any violating candidate loses to any feasible one.
const CONSTRAINT_PENALTY_WEIGHT: f64 = 1000.0;

/// A scored point on the ratio simplex
#[derive(Debug, Clone)]
pub struct Candidate {
    pub ratios: DVector<f64>,
    pub color: LabColor,
    pub delta_e: f64,
    /// Delta E plus constraint-violation penalty; the selection criterion
    pub fitness: f64,
}

/// Why a search run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Best fitness reached the configured target
    Converged,
    /// No meaningful improvement for the configured stagnation window
    Stagnated,
    /// Generation/trial cap exhausted
    MaxIterationsReached,
    /// Wall-clock budget exhausted; best-so-far is still returned
    TimedOut,
}

impl Termination {
    pub fn is_early(&self) -> bool {
        matches!(self, Termination::TimedOut)
    }
}

/// Outcome of one optimizer run
#[derive(Debug, Clone)]
pub struct SearchReport {
    pub best: Candidate,
    pub iterations: usize,
    pub termination: Termination,
}

/// Project a raw vector onto the feasible simplex: clamp each component
/// into bounds, then renormalize to sum 1.0. Normalizing can push a
/// component back out of bounds when the dimension is small, so the two
/// steps alternate until the sum settles.
pub fn repair_ratios(ratios: &mut DVector<f64>) {
    for value in ratios.iter_mut() {
        if !value.is_finite() {
            *value = MIN_VOLUME_RATIO;
        }
    }

    for _ in 0..16 {
        for value in ratios.iter_mut() {
            *value = value.clamp(MIN_VOLUME_RATIO, MAX_VOLUME_RATIO);
        }
        let sum: f64 = ratios.iter().sum();
        if (sum - 1.0).abs() <= RATIO_SUM_TOLERANCE {
            return;
        }
        for value in ratios.iter_mut() {
            *value /= sum;
        }
    }
}

/// Residual constraint violation after repair; zero for feasible vectors
fn constraint_violation(ratios: &DVector<f64>) -> f64 {
    let mut violation = 0.0;
    for &r in ratios.iter() {
        if r < MIN_VOLUME_RATIO {
            violation += MIN_VOLUME_RATIO - r;
        } else if r > MAX_VOLUME_RATIO {
            violation += r - MAX_VOLUME_RATIO;
        }
    }
    let sum_error = (ratios.iter().sum::<f64>() - 1.0).abs();
    if sum_error > RATIO_SUM_TOLERANCE {
        violation += sum_error;
    }
    violation
}

/// Scores ratio vectors against the target through the Kubelka-Munk
/// forward model. Borrows the paint slice; paints are never mutated.
pub struct FitnessOracle<'a> {
    paints: &'a [Paint],
    target: LabColor,
}

impl<'a> FitnessOracle<'a> {
    pub fn new(paints: &'a [Paint], target: LabColor) -> Self {
        Self { paints, target }
    }

    pub fn dimensions(&self) -> usize {
        self.paints.len()
    }

    /// Predict the mixture color and score it. Closed-form, no iteration:
    /// this runs once per candidate, thousands of times per optimization.
    pub fn evaluate(&self, ratios: DVector<f64>) -> Candidate {
        let color = mix_paints(self.paints, ratios.as_slice());
        let delta_e = delta_e_2000(color, self.target);
        let fitness = delta_e + CONSTRAINT_PENALTY_WEIGHT * constraint_violation(&ratios);
        Candidate {
            ratios,
            color,
            delta_e,
            fitness,
        }
    }
}

/// Uniform random point on the simplex (normalized exponential draws),
/// repaired into component bounds
pub fn random_simplex<R: Rng + ?Sized>(n: usize, rng: &mut R) -> DVector<f64> {
    let mut v = DVector::from_fn(n, |_, _| {
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        -u.ln()
    });
    repair_ratios(&mut v);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::PaintFinish;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn paints() -> Vec<Paint> {
        vec![
            Paint {
                id: "w".into(),
                name: "White".into(),
                brand: String::new(),
                color: LabColor::new(95.0, 0.0, 0.0),
                k: 0.05,
                s: 8.0,
                opacity: 0.98,
                tinting_strength: 1.0,
                finish: PaintFinish::Matte,
            },
            Paint {
                id: "b".into(),
                name: "Black".into(),
                brand: String::new(),
                color: LabColor::new(16.0, 0.0, 0.0),
                k: 9.0,
                s: 0.5,
                opacity: 0.97,
                tinting_strength: 1.0,
                finish: PaintFinish::Matte,
            },
        ]
    }

    fn assert_feasible(v: &DVector<f64>) {
        let sum: f64 = v.iter().sum();
        assert!((sum - 1.0).abs() <= RATIO_SUM_TOLERANCE, "sum = {}", sum);
        for &r in v.iter() {
            assert!((MIN_VOLUME_RATIO..=MAX_VOLUME_RATIO).contains(&r), "r = {}", r);
        }
    }

    #[test]
    fn test_repair_normalizes_sum() {
        let mut v = DVector::from_vec(vec![3.0, 1.0]);
        repair_ratios(&mut v);
        assert_feasible(&v);
    }

    #[test]
    fn test_repair_handles_zeros_and_negatives() {
        let mut v = DVector::from_vec(vec![0.0, -2.0, 5.0]);
        repair_ratios(&mut v);
        assert_feasible(&v);
    }

    #[test]
    fn test_repair_handles_nan() {
        let mut v = DVector::from_vec(vec![f64::NAN, 1.0, f64::INFINITY]);
        repair_ratios(&mut v);
        assert_feasible(&v);
    }

    #[test]
    fn test_repair_two_dimension_extreme() {
        // Degenerate region: one component pinned at each bound
        let mut v = DVector::from_vec(vec![100.0, 1e-9]);
        repair_ratios(&mut v);
        assert_feasible(&v);
    }

    #[test]
    fn test_random_simplex_feasible() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..=5 {
            for _ in 0..50 {
                let v = random_simplex(n, &mut rng);
                assert_feasible(&v);
            }
        }
    }

    #[test]
    fn test_oracle_feasible_candidate_unpenalized() {
        let paints = paints();
        let oracle = FitnessOracle::new(&paints, LabColor::new(60.0, 0.0, 0.0));
        let mut v = DVector::from_vec(vec![0.9, 0.1]);
        repair_ratios(&mut v);
        let c = oracle.evaluate(v);
        // Feasible candidates score pure delta E
        assert!((c.fitness - c.delta_e).abs() < 1e-9);
        assert!(c.delta_e >= 0.0);
    }

    #[test]
    fn test_oracle_penalizes_violations() {
        let paints = paints();
        let oracle = FitnessOracle::new(&paints, LabColor::new(60.0, 0.0, 0.0));
        let infeasible = DVector::from_vec(vec![0.9, 0.3]); // sums to 1.2
        let c = oracle.evaluate(infeasible);
        assert!(c.fitness > c.delta_e + 1.0);
    }
}
