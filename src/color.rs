use serde::{Deserialize, Serialize};

use crate::error::OptimizeError;

/// D65 reference white (2-degree observer)
const REF_X: f64 = 95.047;
const REF_Y: f64 = 100.000;
const REF_Z: f64 = 108.883;

/// CIE Lab f-function thresholds
const LAB_EPSILON: f64 = 0.008856;
const LAB_KAPPA: f64 = 903.3;

/// Multiplier to expand hex color shorthand (e.g., F -> FF)
const HEX_SHORTHAND_MULTIPLIER: u8 = 17;

/// A color in CIE LAB space (D65 illuminant).
///
/// `l` is lightness in [0, 100]; `a` (green-red) and `b` (blue-yellow)
/// lie in [-128, 127].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabColor {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

impl LabColor {
    pub fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Check that all components are finite and within the LAB range
    pub fn validate(&self) -> Result<(), OptimizeError> {
        if !self.l.is_finite() || !self.a.is_finite() || !self.b.is_finite() {
            return Err(OptimizeError::InvalidTargetColor {
                reason: format!("non-finite component in L={} a={} b={}", self.l, self.a, self.b),
            });
        }
        if !(0.0..=100.0).contains(&self.l) {
            return Err(OptimizeError::InvalidTargetColor {
                reason: format!("L={} outside [0, 100]", self.l),
            });
        }
        if !(-128.0..=127.0).contains(&self.a) || !(-128.0..=127.0).contains(&self.b) {
            return Err(OptimizeError::InvalidTargetColor {
                reason: format!("a={} or b={} outside [-128, 127]", self.a, self.b),
            });
        }
        Ok(())
    }

    /// Chroma: distance from the neutral axis
    pub fn chroma(&self) -> f64 {
        (self.a * self.a + self.b * self.b).sqrt()
    }

    /// Convert to linear sRGB channels in [0, 1], gamut-clamped
    pub fn to_linear_rgb(&self) -> [f64; 3] {
        let (x, y, z) = lab_to_xyz(*self);
        xyz_to_linear_rgb(x, y, z)
    }

    /// Build from linear sRGB channels in [0, 1]
    pub fn from_linear_rgb(rgb: [f64; 3]) -> Self {
        let (x, y, z) = linear_rgb_to_xyz(rgb);
        xyz_to_lab(x, y, z)
    }

    /// Build from 8-bit sRGB
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        let linear = [
            srgb_decode(rgb[0] as f64 / 255.0),
            srgb_decode(rgb[1] as f64 / 255.0),
            srgb_decode(rgb[2] as f64 / 255.0),
        ];
        Self::from_linear_rgb(linear)
    }

    /// Convert to 8-bit sRGB, gamut-clamped
    pub fn to_rgb8(&self) -> [u8; 3] {
        let linear = self.to_linear_rgb();
        [
            (srgb_encode(linear[0]) * 255.0).round().clamp(0.0, 255.0) as u8,
            (srgb_encode(linear[1]) * 255.0).round().clamp(0.0, 255.0) as u8,
            (srgb_encode(linear[2]) * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// Hex representation for display (e.g., "#3A6B2F")
    pub fn to_hex(&self) -> String {
        let rgb = self.to_rgb8();
        format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
    }
}

/// Parse a hex color string into LAB
/// Supports: "#ff0000", "ff0000", "#f00", "f00"
pub fn parse_hex_color(hex: &str) -> Result<LabColor, OptimizeError> {
    let hex = hex.trim_start_matches('#');

    let component = |s: &str, name: &str| {
        u8::from_str_radix(s, 16).map_err(|_| OptimizeError::InvalidTargetColor {
            reason: format!("invalid {} component in hex color", name),
        })
    };

    let (r, g, b) = match hex.len() {
        3 => {
            // Expand shorthand: "f00" -> "ff0000"
            let r = component(&hex[0..1], "red")?;
            let g = component(&hex[1..2], "green")?;
            let b = component(&hex[2..3], "blue")?;
            (
                r * HEX_SHORTHAND_MULTIPLIER,
                g * HEX_SHORTHAND_MULTIPLIER,
                b * HEX_SHORTHAND_MULTIPLIER,
            )
        }
        6 => {
            let r = component(&hex[0..2], "red")?;
            let g = component(&hex[2..4], "green")?;
            let b = component(&hex[4..6], "blue")?;
            (r, g, b)
        }
        _ => {
            return Err(OptimizeError::InvalidTargetColor {
                reason: format!("hex color must be 3 or 6 characters long (got: {})", hex),
            });
        }
    };

    Ok(LabColor::from_rgb8([r, g, b]))
}

fn srgb_decode(c: f64) -> f64 {
    if c > 0.04045 {
        ((c + 0.055) / 1.055).powf(2.4)
    } else {
        c / 12.92
    }
}

fn srgb_encode(c: f64) -> f64 {
    let c = c.clamp(0.0, 1.0);
    if c > 0.0031308 {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    } else {
        12.92 * c
    }
}

fn linear_rgb_to_xyz(rgb: [f64; 3]) -> (f64, f64, f64) {
    let r = rgb[0] * 100.0;
    let g = rgb[1] * 100.0;
    let b = rgb[2] * 100.0;

    let x = r * 0.4124564 + g * 0.3575761 + b * 0.1804375;
    let y = r * 0.2126729 + g * 0.7151522 + b * 0.0721750;
    let z = r * 0.0193339 + g * 0.1191920 + b * 0.9503041;

    (x, y, z)
}

fn xyz_to_linear_rgb(x: f64, y: f64, z: f64) -> [f64; 3] {
    let x = x / 100.0;
    let y = y / 100.0;
    let z = z / 100.0;

    let r = x * 3.2404542 + y * -1.5371385 + z * -0.4985314;
    let g = x * -0.9692660 + y * 1.8760108 + z * 0.0415560;
    let b = x * 0.0556434 + y * -0.2040259 + z * 1.0572252;

    [r.clamp(0.0, 1.0), g.clamp(0.0, 1.0), b.clamp(0.0, 1.0)]
}

fn xyz_to_lab(x: f64, y: f64, z: f64) -> LabColor {
    let f = |t: f64| {
        if t > LAB_EPSILON {
            t.cbrt()
        } else {
            (LAB_KAPPA * t + 16.0) / 116.0
        }
    };

    let fx = f(x / REF_X);
    let fy = f(y / REF_Y);
    let fz = f(z / REF_Z);

    LabColor {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

fn lab_to_xyz(lab: LabColor) -> (f64, f64, f64) {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = fy + lab.a / 500.0;
    let fz = fy - lab.b / 200.0;

    let finv = |t: f64| {
        let t3 = t * t * t;
        if t3 > LAB_EPSILON { t3 } else { (116.0 * t - 16.0) / LAB_KAPPA }
    };

    let yr = if lab.l > LAB_KAPPA * LAB_EPSILON {
        fy * fy * fy
    } else {
        lab.l / LAB_KAPPA
    };

    (finv(fx) * REF_X, yr * REF_Y, finv(fz) * REF_Z)
}

/// CIEDE2000 perceptual color difference.
///
/// Symmetric, non-negative, zero only for identical colors. Implements
/// the full formula: G chroma compensation, hue weighting T, and the
/// blue-region rotation term RT. The `c1p * c2p == 0` branches keep the
/// hue terms stable for neutral colors (a = b = 0).
pub fn delta_e_2000(lab1: LabColor, lab2: LabColor) -> f64 {
    let (l1, a1, b1) = (lab1.l, lab1.a, lab1.b);
    let (l2, a2, b2) = (lab2.l, lab2.a, lab2.b);

    let c1 = (a1 * a1 + b1 * b1).sqrt();
    let c2 = (a2 * a2 + b2 * b2).sqrt();
    let c_avg = (c1 + c2) / 2.0;

    let c_avg_pow7 = c_avg.powi(7);
    let g = 0.5 * (1.0 - (c_avg_pow7 / (c_avg_pow7 + 25.0_f64.powi(7))).sqrt());

    let a1p = a1 * (1.0 + g);
    let a2p = a2 * (1.0 + g);

    let c1p = (a1p * a1p + b1 * b1).sqrt();
    let c2p = (a2p * a2p + b2 * b2).sqrt();

    // atan2(0, 0) is defined as 0, so neutral colors are safe here
    let h1p = {
        let h = b1.atan2(a1p).to_degrees();
        if h >= 0.0 { h } else { h + 360.0 }
    };
    let h2p = {
        let h = b2.atan2(a2p).to_degrees();
        if h >= 0.0 { h } else { h + 360.0 }
    };

    let dl_p = l2 - l1;
    let dc_p = c2p - c1p;

    let dhp = if c1p * c2p == 0.0 {
        0.0
    } else if (h2p - h1p).abs() <= 180.0 {
        h2p - h1p
    } else if h2p - h1p > 180.0 {
        h2p - h1p - 360.0
    } else {
        h2p - h1p + 360.0
    };

    let dh_p = 2.0 * (c1p * c2p).sqrt() * (dhp.to_radians() / 2.0).sin();

    let lp = (l1 + l2) / 2.0;
    let cp = (c1p + c2p) / 2.0;

    let hp = if c1p * c2p == 0.0 {
        h1p + h2p
    } else if (h1p - h2p).abs() <= 180.0 {
        (h1p + h2p) / 2.0
    } else if h1p + h2p < 360.0 {
        (h1p + h2p + 360.0) / 2.0
    } else {
        (h1p + h2p - 360.0) / 2.0
    };

    let t = 1.0 - 0.17 * (hp - 30.0).to_radians().cos()
        + 0.24 * (2.0 * hp).to_radians().cos()
        + 0.32 * (3.0 * hp + 6.0).to_radians().cos()
        - 0.20 * (4.0 * hp - 63.0).to_radians().cos();

    let lp_minus_50_sq = (lp - 50.0).powi(2);
    let sl = 1.0 + (0.015 * lp_minus_50_sq) / (20.0 + lp_minus_50_sq).sqrt();
    let sc = 1.0 + 0.045 * cp;
    let sh = 1.0 + 0.015 * cp * t;

    let d_theta = 30.0 * (-((hp - 275.0) / 25.0).powi(2)).exp();
    let cp_pow7 = cp.powi(7);
    let rc = 2.0 * (cp_pow7 / (cp_pow7 + 25.0_f64.powi(7))).sqrt();
    let rt = -rc * (2.0 * d_theta).to_radians().sin();

    let term_l = dl_p / sl;
    let term_c = dc_p / sc;
    let term_h = dh_p / sh;

    (term_l * term_l + term_c * term_c + term_h * term_h + rt * term_c * term_h).sqrt()
}
