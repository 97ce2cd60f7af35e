pub mod color;
pub mod de;
pub mod error;
pub mod kubelka_munk;
pub mod mixture;
pub mod optimize;
pub mod paint;
pub mod tpe;

pub use crate::color::{LabColor, delta_e_2000, parse_hex_color};
pub use crate::error::{OptimizeError, Result};
pub use crate::optimize::{
    Algorithm, MixingFormula, Mode, OptimizationMetrics, OptimizationOutcome,
    OptimizationRequest, optimize, recommended_algorithm,
};
pub use crate::paint::{Paint, PaintFinish, VolumeConstraints};
