use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use paintmix::{
    LabColor, Mode, OptimizationOutcome, OptimizationRequest, Paint, VolumeConstraints, optimize,
    parse_hex_color,
};

#[derive(Parser, Debug)]
#[command(
    name = "paintmix",
    about = "Paint mixing optimizer: find the paint ratios that match a target color",
    version,
    disable_version_flag = true
)]
struct Args {
    /// Target color, either hex (e.g., f00, ff0000, #ff0000) or CIELAB as "L,a,b"
    target: String,

    /// Path to a JSON file with the available paints
    #[arg(short = 'p', long = "paints", value_name = "FILE")]
    paints: PathBuf,

    /// Optimization mode: standard (faster) or enhanced (more accurate)
    #[arg(short = 'm', long = "mode", default_value = "enhanced")]
    mode: String,

    /// Maximum number of paints in the mixture (2-5)
    #[arg(long = "max-paints", value_name = "N")]
    max_paints: Option<usize>,

    /// Wall-clock time limit in milliseconds (1000-30000)
    #[arg(short = 't', long = "time-limit", value_name = "MS")]
    time_limit_ms: Option<u64>,

    /// Target accuracy as a delta E value (lower is stricter)
    #[arg(short = 'a', long = "accuracy", value_name = "DELTA_E")]
    accuracy: Option<f64>,

    /// Batch size to mix, in milliliters
    #[arg(long = "volume", value_name = "ML")]
    volume_ml: Option<f64>,

    /// Seed for reproducible runs
    #[arg(long = "seed", value_name = "SEED")]
    seed: Option<u64>,

    /// Print the full result as JSON instead of the human-readable report
    #[arg(long = "json")]
    json: bool,

    /// Print version
    #[arg(short = 'v', short_alias = 'V', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn main() -> Result<()> {
    let args = Args::parse();

    let target = parse_target(&args.target)
        .with_context(|| format!("Invalid target color: {}", args.target))?;
    let paints = load_paints(&args.paints)?;
    let request = build_request(&args, target, paints)?;

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Optimizing paint mixture...")
            .expect("Failed to create progress bar style"),
    );
    progress.enable_steady_tick(std::time::Duration::from_millis(100));

    let outcome = optimize(&request)?;

    progress.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_report(&outcome);
    }

    Ok(())
}

/// Parse the target either as a hex triplet or as comma-separated CIELAB
fn parse_target(input: &str) -> Result<LabColor> {
    if input.contains(',') {
        let parts: Vec<&str> = input.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            anyhow::bail!("Expected three comma-separated components, got {}", parts.len());
        }
        let l: f64 = parts[0].parse().context("Invalid L component")?;
        let a: f64 = parts[1].parse().context("Invalid a component")?;
        let b: f64 = parts[2].parse().context("Invalid b component")?;
        return Ok(LabColor::new(l, a, b));
    }

    Ok(parse_hex_color(input)?)
}

fn load_paints(path: &Path) -> Result<Vec<Paint>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read paints file: {}", path.display()))?;
    let paints: Vec<Paint> = serde_json::from_str(&data)
        .with_context(|| format!("Failed to parse paints file: {}", path.display()))?;
    Ok(paints)
}

fn build_request(args: &Args, target: LabColor, paints: Vec<Paint>) -> Result<OptimizationRequest> {
    let mut request = OptimizationRequest::new(target, paints);
    request.mode = Mode::parse(&args.mode)?;
    if let Some(max_paints) = args.max_paints {
        request.max_paint_count = max_paints;
    }
    if let Some(time_limit_ms) = args.time_limit_ms {
        request.time_limit_ms = time_limit_ms;
    }
    if let Some(accuracy) = args.accuracy {
        request.accuracy_target = accuracy;
    }
    if let Some(volume_ml) = args.volume_ml {
        if !volume_ml.is_finite() || volume_ml <= 0.0 {
            anyhow::bail!("Volume must be a positive number of milliliters, got: {volume_ml}");
        }
        request.volume_constraints = VolumeConstraints {
            min_total_volume_ml: volume_ml,
            max_total_volume_ml: volume_ml,
            ..Default::default()
        };
    }
    request.seed = args.seed;
    Ok(request)
}

fn print_report(outcome: &OptimizationOutcome) {
    let formula = &outcome.formula;
    let metrics = &outcome.metrics;

    println!(
        "✓ Mixture found: delta E {:.2} ({:?}) using {} paints",
        formula.delta_e,
        formula.accuracy_rating,
        formula.paint_ratios.len()
    );
    println!();
    for component in &formula.paint_ratios {
        println!(
            "  {:5.1}% ({:6.2} ml)  {}",
            component.ratio * 100.0,
            component.volume_ml,
            component.paint_name
        );
    }
    println!("  Total: {:.2} ml", formula.total_volume_ml);
    println!();
    println!(
        "  Achieved color: L={:.2} a={:.2} b={:.2} ({})",
        formula.achieved_color.l,
        formula.achieved_color.a,
        formula.achieved_color.b,
        formula.achieved_color.to_hex()
    );
    println!(
        "  Opacity: {:.2} ({}), complexity: {:?}",
        formula.opacity, formula.opacity_class, formula.mixing_complexity
    );
    println!(
        "  {} in {} ms, {} iterations ({})",
        if metrics.target_met {
            "Target met"
        } else {
            "Target not met"
        },
        metrics.time_elapsed_ms,
        metrics.iterations_completed,
        metrics.algorithm_used
    );

    for warning in &formula.warnings {
        println!("  ⚠ {warning}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_lab() {
        let color = parse_target("60.5, -3.2, 12").unwrap();
        assert_eq!(color.l, 60.5);
        assert_eq!(color.a, -3.2);
        assert_eq!(color.b, 12.0);
    }

    #[test]
    fn test_parse_target_hex() {
        let white = parse_target("#ffffff").unwrap();
        assert!((white.l - 100.0).abs() < 0.01);
        assert!(white.a.abs() < 0.01);
        assert!(white.b.abs() < 0.01);
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert!(parse_target("1,2").is_err());
        assert!(parse_target("1,2,three").is_err());
        assert!(parse_target("not-a-color").is_err());
    }

    #[test]
    fn test_load_paints_from_json() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("paints.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "w", "name": "Titanium White", "brand": "Test",
                 "color": {"l": 95.0, "a": 0.0, "b": 0.0}, "k": 0.05, "s": 8.0},
                {"id": "b", "name": "Carbon Black", "brand": "Test",
                 "color": {"l": 16.0, "a": 0.0, "b": 0.0}, "k": 20.0, "s": 0.5}
            ]"#,
        )
        .unwrap();

        let paints = load_paints(&path).unwrap();
        assert_eq!(paints.len(), 2);
        assert_eq!(paints[0].name, "Titanium White");
        assert_eq!(paints[1].opacity, 1.0);
    }

    #[test]
    fn test_load_paints_missing_file() {
        let err = load_paints(Path::new("/no/such/file.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
