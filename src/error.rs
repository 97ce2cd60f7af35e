//! Error types for the paintmix library

use thiserror::Error;

/// Result type alias for paintmix operations
pub type Result<T> = std::result::Result<T, OptimizeError>;

/// Request validation failures, raised before any optimization work starts.
///
/// An unreachable target color or an exhausted time budget is *not* an
/// error: both return a normal [`crate::OptimizationOutcome`] with the
/// best mixture found and explanatory warnings.
#[derive(Error, Debug)]
pub enum OptimizeError {
    /// Target color outside the LAB range or non-finite
    #[error("Invalid target color: {reason}")]
    InvalidTargetColor { reason: String },

    /// Too few or too many available paints
    #[error("Paint count {count} outside allowed range [{min}, {max}]")]
    PaintCountOutOfRange { count: usize, min: usize, max: usize },

    /// A paint carries unusable optical data (NaN, infinite, or non-positive K/S)
    #[error("Paint '{paint_id}' has invalid optical data: {reason}")]
    InvalidPaintData { paint_id: String, reason: String },

    /// Unrecognized optimization mode
    #[error("Invalid mode '{mode}': expected 'standard' or 'enhanced'")]
    InvalidMode { mode: String },

    /// Requested max paint count outside [2, 5]
    #[error("Max paint count {value} outside allowed range [2, 5]")]
    InvalidMaxPaintCount { value: usize },

    /// Time limit outside the accepted window
    #[error("Time limit {value} ms outside allowed range [{min}, {max}] ms")]
    InvalidTimeLimit { value: u64, min: u64, max: u64 },

    /// Accuracy target must be a positive Delta E
    #[error("Accuracy target {value} must be > 0")]
    InvalidAccuracyTarget { value: f64 },

    /// Volume constraint bounds are inverted or non-positive
    #[error("Invalid volume constraints: {reason}")]
    InvalidVolumeConstraints { reason: String },

    /// Optimizer configuration rejected at construction
    #[error("Invalid optimizer configuration: {reason}")]
    InvalidConfig { reason: String },
}
