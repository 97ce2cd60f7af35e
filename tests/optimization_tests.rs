use paintmix::{
    Algorithm, LabColor, Mode, OptimizationRequest, OptimizeError, Paint, PaintFinish,
    optimize, recommended_algorithm,
};

fn paint(id: &str, l: f64, a: f64, b: f64, k: f64, s: f64) -> Paint {
    Paint {
        id: id.to_string(),
        name: id.to_string(),
        brand: "Test".to_string(),
        color: LabColor::new(l, a, b),
        k,
        s,
        opacity: 0.9,
        tinting_strength: 1.0,
        finish: PaintFinish::Matte,
    }
}

/// A small but usable artist palette
fn palette() -> Vec<Paint> {
    vec![
        paint("white", 95.0, 0.0, 0.0, 0.05, 8.0),
        paint("black", 16.0, 0.0, 0.0, 20.0, 0.5),
        paint("cad-red", 45.0, 65.0, 45.0, 5.0, 2.0),
        paint("ultramarine", 30.0, 20.0, -55.0, 8.0, 1.5),
        paint("cad-yellow", 80.0, 5.0, 80.0, 2.0, 4.0),
    ]
}

fn request(target: LabColor) -> OptimizationRequest {
    let mut req = OptimizationRequest::new(target, palette());
    req.time_limit_ms = 5000;
    req.seed = Some(7);
    req
}

#[test]
fn ratios_sum_to_one_and_volumes_match_total() {
    let outcome = optimize(&request(LabColor::new(55.0, 10.0, 20.0))).unwrap();
    let formula = &outcome.formula;

    let ratio_sum: f64 = formula.paint_ratios.iter().map(|c| c.ratio).sum();
    assert!((ratio_sum - 1.0).abs() < 1e-6, "ratios sum to {ratio_sum}");

    for component in &formula.paint_ratios {
        assert!(component.ratio >= 0.001 && component.ratio <= 0.999);
    }

    let volume_sum: f64 = formula.paint_ratios.iter().map(|c| c.volume_ml).sum();
    let rel = (volume_sum - formula.total_volume_ml).abs() / formula.total_volume_ml;
    assert!(rel < 1e-6);
}

#[test]
fn formula_respects_max_paint_count() {
    let mut req = request(LabColor::new(55.0, 10.0, 20.0));
    req.max_paint_count = 3;
    let outcome = optimize(&req).unwrap();

    let count = outcome.formula.paint_ratios.len();
    assert!((2..=3).contains(&count), "got {count} paints");
}

#[test]
fn algorithm_selection_switches_at_catalog_size() {
    assert_eq!(recommended_algorithm(8), Algorithm::DifferentialEvolution);
    assert_eq!(recommended_algorithm(9), Algorithm::TpeHybrid);

    // A 5-paint catalog goes through DE
    let outcome = optimize(&request(LabColor::new(55.0, 10.0, 20.0))).unwrap();
    assert_eq!(
        outcome.metrics.algorithm_used,
        Algorithm::DifferentialEvolution
    );

    // Pad the catalog past the boundary and TPE takes over
    let mut big = palette();
    for i in 0..6 {
        let shade = 20.0 + 10.0 * i as f64;
        big.push(paint(&format!("gray-{i}"), shade, 0.0, 0.0, 2.0, 2.0));
    }
    let mut req = OptimizationRequest::new(LabColor::new(55.0, 10.0, 20.0), big);
    req.time_limit_ms = 5000;
    req.seed = Some(7);
    let outcome = optimize(&req).unwrap();
    assert_eq!(outcome.metrics.algorithm_used, Algorithm::TpeHybrid);
}

#[test]
fn run_stays_within_time_budget() {
    let mut req = request(LabColor::new(55.0, 10.0, 20.0));
    req.time_limit_ms = 2000;
    req.accuracy_target = 0.001;
    req.mode = Mode::Enhanced;

    let start = std::time::Instant::now();
    let outcome = optimize(&req).unwrap();
    let elapsed = start.elapsed().as_millis() as u64;

    // Budget plus post-processing overhead
    assert!(elapsed < 3000, "took {elapsed} ms");
    assert!(outcome.metrics.time_elapsed_ms < 3000);
}

#[test]
fn out_of_gamut_target_reports_rather_than_fails() {
    // A saturated orange no desaturated palette can reach
    let desaturated = vec![
        paint("white", 95.0, 0.0, 0.0, 0.05, 8.0),
        paint("gray", 50.0, 0.0, 0.0, 2.0, 2.0),
        paint("black", 16.0, 0.0, 0.0, 20.0, 0.5),
    ];
    let mut req = OptimizationRequest::new(LabColor::new(75.0, 95.0, 85.0), desaturated);
    req.time_limit_ms = 3000;
    req.seed = Some(7);

    let outcome = optimize(&req).unwrap();
    assert!(outcome.formula.delta_e > 2.0);
    assert!(!outcome.metrics.target_met);
    assert!(
        outcome
            .formula
            .warnings
            .iter()
            .any(|w| w.contains("gamut") || w.contains("igment")),
        "warnings: {:?}",
        outcome.formula.warnings
    );
}

#[test]
fn exact_match_on_a_catalog_paint() {
    // Target sits on one of the two available paints; the trace of the
    // second paint forced by the component floor barely moves the color
    let two = vec![
        paint("cad-red", 45.0, 65.0, 45.0, 5.0, 2.0),
        paint("white", 95.0, 0.0, 0.0, 0.05, 8.0),
    ];
    let mut req = OptimizationRequest::new(LabColor::new(45.0, 65.0, 45.0), two);
    req.max_paint_count = 2;
    req.accuracy_target = 0.1;
    req.time_limit_ms = 5000;
    req.seed = Some(7);

    let outcome = optimize(&req).unwrap();
    assert!(
        outcome.formula.delta_e < 0.5,
        "delta E {}",
        outcome.formula.delta_e
    );
}

#[test]
fn near_white_target_with_black_pays_the_component_floor() {
    // Both catalog paints must appear at >= 0.1% of the mixture, and a
    // near-black trace darkens a white base far more than its volume
    // share suggests, so pure white is unreachable here
    let two = vec![
        paint("white", 95.0, 0.0, 0.0, 0.05, 8.0),
        paint("black", 16.0, 0.0, 0.0, 20.0, 0.5),
    ];
    let mut req = OptimizationRequest::new(LabColor::new(95.0, 0.0, 0.0), two);
    req.time_limit_ms = 5000;
    req.seed = Some(7);

    let outcome = optimize(&req).unwrap();
    assert_eq!(outcome.formula.paint_ratios.len(), 2);
    assert!(
        outcome.formula.delta_e > 2.0,
        "delta E {}",
        outcome.formula.delta_e
    );
    assert!(!outcome.metrics.target_met);
    assert!(
        outcome
            .formula
            .warnings
            .iter()
            .any(|w| w.contains("gamut") || w.contains("igment")),
        "warnings: {:?}",
        outcome.formula.warnings
    );
}

#[test]
fn two_paint_gray_mixture() {
    let two = vec![
        paint("white", 95.0, 0.0, 0.0, 0.05, 8.0),
        paint("black", 16.0, 0.0, 0.0, 20.0, 0.5),
    ];
    let mut req = OptimizationRequest::new(LabColor::new(60.0, 0.0, 0.0), two);
    req.time_limit_ms = 5000;
    req.seed = Some(7);

    let outcome = optimize(&req).unwrap();
    assert_eq!(outcome.formula.paint_ratios.len(), 2);
    assert!(
        outcome.formula.delta_e < 10.0,
        "delta E {}",
        outcome.formula.delta_e
    );
}

#[test]
fn seeded_runs_reproduce_exactly() {
    let a = optimize(&request(LabColor::new(55.0, 10.0, 20.0))).unwrap();
    let b = optimize(&request(LabColor::new(55.0, 10.0, 20.0))).unwrap();

    assert_eq!(a.formula.delta_e.to_bits(), b.formula.delta_e.to_bits());
    for (x, y) in a.formula.paint_ratios.iter().zip(&b.formula.paint_ratios) {
        assert_eq!(x.ratio.to_bits(), y.ratio.to_bits());
    }
}

#[test]
fn validation_errors_name_the_problem() {
    let mut req = request(LabColor::new(55.0, 10.0, 20.0));
    req.available_paints.truncate(1);
    assert!(matches!(
        optimize(&req),
        Err(OptimizeError::PaintCountOutOfRange { count: 1, .. })
    ));

    let mut req = request(LabColor::new(55.0, 10.0, 200.0));
    req.target_color.b = 200.0;
    assert!(matches!(
        optimize(&req),
        Err(OptimizeError::InvalidTargetColor { .. })
    ));

    let mut req = request(LabColor::new(55.0, 10.0, 20.0));
    req.time_limit_ms = 50_000;
    assert!(matches!(
        optimize(&req),
        Err(OptimizeError::InvalidTimeLimit { value: 50_000, .. })
    ));
}
