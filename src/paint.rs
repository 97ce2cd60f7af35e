//! Paint catalog types: read-only inputs to the optimization core

use serde::{Deserialize, Serialize};

use crate::color::LabColor;
use crate::error::OptimizeError;

/// Surface finish category of a paint film
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaintFinish {
    Matte,
    Semigloss,
    Gloss,
    Metallic,
    Pearlescent,
}

impl PaintFinish {
    /// Case-insensitive parse; unknown strings fall back to matte
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().trim() {
            "semigloss" | "semi-gloss" => PaintFinish::Semigloss,
            "gloss" | "glossy" => PaintFinish::Gloss,
            "metallic" => PaintFinish::Metallic,
            "pearlescent" | "pearl" => PaintFinish::Pearlescent,
            _ => PaintFinish::Matte,
        }
    }
}

/// Opacity classification bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpacityClass {
    Opaque,
    SemiOpaque,
    Translucent,
    Transparent,
}

impl std::fmt::Display for OpacityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OpacityClass::Opaque => "Opaque",
            OpacityClass::SemiOpaque => "Semi-opaque",
            OpacityClass::Translucent => "Translucent",
            OpacityClass::Transparent => "Transparent",
        };
        f.write_str(s)
    }
}

/// A paint with measured color and Kubelka-Munk optical properties.
///
/// Paints are read-only inputs: the optimizer never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub brand: String,
    pub color: LabColor,
    /// Kubelka-Munk absorption coefficient
    pub k: f64,
    /// Kubelka-Munk scattering coefficient
    pub s: f64,
    /// Hiding power in [0, 1]
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Relative tinting strength; 1.0 = nominal
    #[serde(default = "default_tinting_strength")]
    pub tinting_strength: f64,
    #[serde(default = "default_finish")]
    pub finish: PaintFinish,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_tinting_strength() -> f64 {
    1.0
}

fn default_finish() -> PaintFinish {
    PaintFinish::Matte
}

impl Paint {
    /// Reject paints whose optical data would poison the fitness oracle
    /// (NaN/infinite coefficients surface as NaN fitness mid-run otherwise)
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let invalid = |reason: &str| OptimizeError::InvalidPaintData {
            paint_id: self.id.clone(),
            reason: reason.to_string(),
        };

        self.color.validate().map_err(|_| invalid("LAB color out of range"))?;

        if !self.k.is_finite() || self.k <= 0.0 {
            return Err(invalid("absorption coefficient k must be finite and > 0"));
        }
        if !self.s.is_finite() || self.s <= 0.0 {
            return Err(invalid("scattering coefficient s must be finite and > 0"));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(invalid("opacity must lie in [0, 1]"));
        }
        if !self.tinting_strength.is_finite() || self.tinting_strength <= 0.0 {
            return Err(invalid("tinting strength must be finite and > 0"));
        }
        Ok(())
    }
}

/// Feasible region for realized mixture volumes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeConstraints {
    pub min_total_volume_ml: f64,
    pub max_total_volume_ml: f64,
    /// Smallest measurable amount per component, if any
    #[serde(default)]
    pub min_component_volume_ml: Option<f64>,
    #[serde(default)]
    pub max_component_volume_ml: Option<f64>,
    /// Allow growing the batch to satisfy per-component minimums
    #[serde(default = "default_allow_scaling")]
    pub allow_scaling: bool,
}

fn default_allow_scaling() -> bool {
    true
}

impl Default for VolumeConstraints {
    fn default() -> Self {
        Self {
            min_total_volume_ml: 10.0,
            max_total_volume_ml: 100.0,
            min_component_volume_ml: None,
            max_component_volume_ml: None,
            allow_scaling: true,
        }
    }
}

impl VolumeConstraints {
    pub fn validate(&self) -> Result<(), OptimizeError> {
        let invalid = |reason: String| OptimizeError::InvalidVolumeConstraints { reason };

        if !self.min_total_volume_ml.is_finite() || self.min_total_volume_ml <= 0.0 {
            return Err(invalid(format!(
                "min total volume {} must be finite and > 0",
                self.min_total_volume_ml
            )));
        }
        if self.max_total_volume_ml < self.min_total_volume_ml {
            return Err(invalid(format!(
                "max total volume {} is below min total volume {}",
                self.max_total_volume_ml, self.min_total_volume_ml
            )));
        }
        if let (Some(min_c), Some(max_c)) =
            (self.min_component_volume_ml, self.max_component_volume_ml)
            && max_c < min_c
        {
            return Err(invalid(format!(
                "max component volume {} is below min component volume {}",
                max_c, min_c
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_paint() -> Paint {
        Paint {
            id: "tw-1".into(),
            name: "Titanium White".into(),
            brand: "Test".into(),
            color: LabColor::new(95.0, 0.0, 0.0),
            k: 0.05,
            s: 8.0,
            opacity: 0.98,
            tinting_strength: 1.0,
            finish: PaintFinish::Matte,
        }
    }

    #[test]
    fn test_paint_validate_ok() {
        assert!(sample_paint().validate().is_ok());
    }

    #[test]
    fn test_paint_validate_rejects_bad_coefficients() {
        let mut p = sample_paint();
        p.k = f64::NAN;
        assert!(p.validate().is_err());

        let mut p = sample_paint();
        p.s = 0.0;
        assert!(p.validate().is_err());

        let mut p = sample_paint();
        p.k = f64::INFINITY;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_paint_validate_rejects_bad_opacity() {
        let mut p = sample_paint();
        p.opacity = 1.5;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_finish_parse_case_insensitive() {
        assert_eq!(PaintFinish::parse("GLOSS"), PaintFinish::Gloss);
        assert_eq!(PaintFinish::parse("Semi-Gloss"), PaintFinish::Semigloss);
        assert_eq!(PaintFinish::parse("pearl"), PaintFinish::Pearlescent);
        // Unknown falls back to matte
        assert_eq!(PaintFinish::parse("sparkly"), PaintFinish::Matte);
    }

    #[test]
    fn test_volume_constraints_default_valid() {
        assert!(VolumeConstraints::default().validate().is_ok());
    }

    #[test]
    fn test_volume_constraints_inverted_bounds() {
        let vc = VolumeConstraints {
            min_total_volume_ml: 100.0,
            max_total_volume_ml: 10.0,
            ..Default::default()
        };
        assert!(vc.validate().is_err());
    }

    #[test]
    fn test_paint_json_roundtrip() {
        let paint = sample_paint();
        let json = serde_json::to_string(&paint).unwrap();
        let back: Paint = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, paint.id);
        assert_eq!(back.color, paint.color);
    }
}
