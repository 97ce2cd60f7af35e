//! Kubelka-Munk subtractive color mixing
//!
//! Relates pigment absorption (K) and scattering (S) to reflectance and
//! predicts the color of a volumetric paint blend. Pigments mix additively
//! in K/S space, not in RGB, which is why "average the colors" gives wrong
//! answers for real paint.
//!
//! All functions here are closed-form: this module is the fitness oracle
//! the optimizers call once per candidate, thousands of times per run.

use serde::{Deserialize, Serialize};

use crate::color::LabColor;
use crate::paint::{OpacityClass, Paint, PaintFinish};

/// Reflectance clamp bounds; avoids division by zero in the K/S inversion
pub const MIN_REFLECTANCE: f64 = 0.001;
pub const MAX_REFLECTANCE: f64 = 0.999;

/// Floors for degenerate inputs (infinite dilution, zero-thickness films)
pub const MIN_PIGMENT_CONCENTRATION: f64 = 0.01;
pub const MIN_FILM_THICKNESS: f64 = 0.001;
pub const MAX_FILM_THICKNESS: f64 = 10.0;

/// Film thickness assumed when reporting blend opacity (mm)
pub const DEFAULT_FILM_THICKNESS: f64 = 0.1;

/// Decimal places kept on derived coefficients
const COEFFICIENT_PRECISION: f64 = 1e6;

/// Derived optical coefficients for a paint film
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KubelkaMunkCoefficients {
    pub k: f64,
    pub s: f64,
    pub k_over_s: f64,
    pub surface_reflection: f64,
    pub film_thickness: f64,
    pub pigment_concentration: f64,
}

/// Scalar optics of a finished blend, reported alongside the formula
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixtureOptics {
    pub k: f64,
    pub s: f64,
    pub opacity: f64,
}

fn round_coefficient(x: f64) -> f64 {
    (x * COEFFICIENT_PRECISION).round() / COEFFICIENT_PRECISION
}

/// Surface-reflection constant for a finish category.
/// Values increase monotonically from matte to pearlescent.
pub fn surface_reflection_for_finish(finish: PaintFinish) -> f64 {
    match finish {
        PaintFinish::Matte => 0.02,
        PaintFinish::Semigloss => 0.03,
        PaintFinish::Gloss => 0.04,
        PaintFinish::Metallic => 0.05,
        PaintFinish::Pearlescent => 0.06,
    }
}

/// Invert reflectance into the Kubelka-Munk K/S ratio: (1 - R)^2 / 2R.
///
/// Reflectance is clamped to [0.001, 0.999]; the result is strictly
/// decreasing in R. With a surface-reflection constant the Saunderson
/// correction removes the gloss component before inverting.
pub fn reflectance_to_ks(reflectance: f64, surface_reflection: Option<f64>) -> f64 {
    let r = match surface_reflection {
        Some(rs) => (reflectance - rs) / (1.0 - rs),
        None => reflectance,
    };
    let r = r.clamp(MIN_REFLECTANCE, MAX_REFLECTANCE);
    (1.0 - r).powi(2) / (2.0 * r)
}

/// Forward Kubelka-Munk: K/S ratio back to reflectance.
/// R = 1 + K/S - sqrt((K/S)^2 + 2 K/S), clamped to [0, 1].
pub fn ks_to_reflectance(ks: f64) -> f64 {
    if ks <= 0.0 {
        return 1.0; // no absorption: pure white
    }
    let r = 1.0 + ks - (ks * ks + 2.0 * ks).sqrt();
    r.clamp(0.0, 1.0)
}

/// Derive the full coefficient set for a single-paint film.
///
/// Deterministic: identical inputs produce bit-identical outputs. Inputs
/// below the concentration/thickness floors are raised to the floor, and
/// every derived value is rounded to six decimals.
pub fn calculate_coefficients(
    reflectance: f64,
    pigment_concentration: f64,
    film_thickness: f64,
    surface_reflection: Option<f64>,
) -> KubelkaMunkCoefficients {
    let concentration = pigment_concentration.max(MIN_PIGMENT_CONCENTRATION);
    let thickness = film_thickness.clamp(MIN_FILM_THICKNESS, MAX_FILM_THICKNESS);
    let rs = surface_reflection.unwrap_or(0.0);

    let k_over_s = reflectance_to_ks(reflectance, surface_reflection);
    // Scattering scales with how much pigment the film holds
    let s = concentration * thickness;
    let k = k_over_s * s;

    KubelkaMunkCoefficients {
        k: round_coefficient(k),
        s: round_coefficient(s),
        k_over_s: round_coefficient(k_over_s),
        surface_reflection: round_coefficient(rs),
        film_thickness: round_coefficient(thickness),
        pigment_concentration: round_coefficient(concentration),
    }
}

/// Opacity classification: thresholds at 0.99 / 0.7 / 0.3
pub fn classify_opacity(opacity: f64) -> OpacityClass {
    if opacity >= 0.99 {
        OpacityClass::Opaque
    } else if opacity >= 0.7 {
        OpacityClass::SemiOpaque
    } else if opacity >= 0.3 {
        OpacityClass::Translucent
    } else {
        OpacityClass::Transparent
    }
}

/// Opacity a film reaches as thickness grows without bound.
/// 1 - R_inf, where R_inf is the reflectance of an infinitely thick film.
fn asymptotic_opacity(coeffs: &KubelkaMunkCoefficients) -> f64 {
    1.0 - ks_to_reflectance(coeffs.k_over_s)
}

/// Invert the opacity equation: film thickness needed to reach a target
/// opacity.
///
/// Returns 0 for a zero target or zero scattering, `MAX_FILM_THICKNESS`
/// when the target meets or exceeds what the pigment can ever achieve,
/// otherwise a value strictly increasing in the target and clamped to
/// [`MIN_FILM_THICKNESS`, `MAX_FILM_THICKNESS`].
pub fn required_thickness(coeffs: &KubelkaMunkCoefficients, target_opacity: f64) -> f64 {
    if target_opacity <= 0.0 || coeffs.s <= 0.0 {
        return 0.0;
    }
    let asymptote = asymptotic_opacity(coeffs);
    if target_opacity >= 1.0 || target_opacity >= asymptote {
        return MAX_FILM_THICKNESS;
    }

    // opacity(x) = asymptote * (1 - exp(-s * b * x)), b = sqrt(1 + 2 K/S)
    let b = (1.0 + 2.0 * coeffs.k_over_s).sqrt();
    let x = -(1.0 - target_opacity / asymptote).ln() / (coeffs.s * b);
    x.clamp(MIN_FILM_THICKNESS, MAX_FILM_THICKNESS)
}

/// Fraction of a film's hiding power realized at a given thickness.
/// Approaches 1 as the film thickens; 0 for a non-scattering film.
fn hiding_fraction(k: f64, s: f64, thickness: f64) -> f64 {
    if s <= 0.0 {
        return 0.0;
    }
    let b = (1.0 + 2.0 * k / s).sqrt();
    (1.0 - (-s * b * thickness).exp()).clamp(0.0, 1.0)
}

/// Normalized mixing weights: volume ratio scaled by tinting strength
fn mixing_weights(paints: &[Paint], ratios: &[f64]) -> Vec<f64> {
    let mut weights: Vec<f64> = paints
        .iter()
        .zip(ratios)
        .map(|(p, &r)| r * p.tinting_strength)
        .collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        for w in weights.iter_mut() {
            *w /= total;
        }
    }
    weights
}

/// Predict the color of a volumetric blend.
///
/// Each paint's LAB color becomes a three-channel reflectance proxy
/// (linear sRGB); channels are inverted to K/S, mixed additively with
/// tinting-strength-scaled volume weights, converted back to reflectance
/// and re-assembled into LAB. The surface-reflection component is removed
/// per paint before mixing and restored for the blend.
///
/// K/S mixing is strongly nonlinear: a near-black paint clamps to the
/// reflectance floor, so even the smallest trace of it darkens a light
/// blend by several L units.
pub fn mix_paints(paints: &[Paint], ratios: &[f64]) -> LabColor {
    debug_assert_eq!(paints.len(), ratios.len());
    let weights = mixing_weights(paints, ratios);

    // Blend surface reflection is the volume-weighted gloss of the parts
    let rs_mix: f64 = paints
        .iter()
        .zip(&weights)
        .map(|(p, &w)| w * surface_reflection_for_finish(p.finish))
        .sum();

    let mut mixed = [0.0f64; 3];
    for channel in 0..3 {
        let mut ks_sum = 0.0;
        for (paint, &w) in paints.iter().zip(&weights) {
            let r = paint.color.to_linear_rgb()[channel];
            let rs = surface_reflection_for_finish(paint.finish);
            ks_sum += w * reflectance_to_ks(r, Some(rs));
        }
        let body = ks_to_reflectance(ks_sum);
        mixed[channel] = (rs_mix + (1.0 - rs_mix) * body).clamp(0.0, 1.0);
    }

    LabColor::from_linear_rgb(mixed)
}

/// Scalar K, S and predicted opacity of a blend, for formula reporting.
///
/// Blend hiding power is the volume-weighted mean of each paint's
/// measured opacity, attenuated by the fraction of full hiding a film
/// of [`DEFAULT_FILM_THICKNESS`] achieves with the blend's K and S.
pub fn mixture_optics(paints: &[Paint], ratios: &[f64]) -> MixtureOptics {
    let weights = mixing_weights(paints, ratios);

    let k: f64 = paints.iter().zip(&weights).map(|(p, &w)| w * p.k).sum();
    let s: f64 = paints.iter().zip(&weights).map(|(p, &w)| w * p.s).sum();
    let measured: f64 = paints.iter().zip(&weights).map(|(p, &w)| w * p.opacity).sum();
    let opacity = (measured * hiding_fraction(k, s, DEFAULT_FILM_THICKNESS)).clamp(0.0, 1.0);

    MixtureOptics {
        k: round_coefficient(k),
        s: round_coefficient(s),
        opacity: round_coefficient(opacity),
    }
}
