use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_palette(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("paints.json");
    std::fs::write(
        &path,
        r#"[
            {"id": "w", "name": "Titanium White", "brand": "Test",
             "color": {"l": 95.0, "a": 0.0, "b": 0.0}, "k": 0.05, "s": 8.0},
            {"id": "g", "name": "Neutral Gray", "brand": "Test",
             "color": {"l": 50.0, "a": 0.0, "b": 0.0}, "k": 2.0, "s": 2.0},
            {"id": "b", "name": "Carbon Black", "brand": "Test",
             "color": {"l": 16.0, "a": 0.0, "b": 0.0}, "k": 20.0, "s": 0.5}
        ]"#,
    )
    .unwrap();
    path
}

#[test]
fn test_basic_mix_reports_formula() {
    let temp_dir = TempDir::new().unwrap();
    let palette = write_palette(&temp_dir);

    let mut cmd = Command::cargo_bin("paintmix").unwrap();
    cmd.arg("60,0,0")
        .arg("--paints")
        .arg(&palette)
        .arg("--time-limit")
        .arg("2000")
        .arg("--seed")
        .arg("7");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Mixture found"))
        .stdout(predicate::str::contains("Titanium White"));
}

#[test]
fn test_json_output_is_parseable() {
    let temp_dir = TempDir::new().unwrap();
    let palette = write_palette(&temp_dir);

    let mut cmd = Command::cargo_bin("paintmix").unwrap();
    let output = cmd
        .arg("808080")
        .arg("--paints")
        .arg(&palette)
        .arg("--time-limit")
        .arg("2000")
        .arg("--seed")
        .arg("7")
        .arg("--json")
        .output()
        .unwrap();

    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed["formula"]["paint_ratios"].is_array());
    assert!(parsed["metrics"]["time_elapsed_ms"].is_number());
}

#[test]
fn test_invalid_target_color_fails() {
    let temp_dir = TempDir::new().unwrap();
    let palette = write_palette(&temp_dir);

    let mut cmd = Command::cargo_bin("paintmix").unwrap();
    cmd.arg("not-a-color").arg("--paints").arg(&palette);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid target color"));
}

#[test]
fn test_missing_paints_file_fails() {
    let mut cmd = Command::cargo_bin("paintmix").unwrap();
    cmd.arg("808080")
        .arg("--paints")
        .arg("/no/such/paints.json");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read paints file"));
}

#[test]
fn test_invalid_mode_fails() {
    let temp_dir = TempDir::new().unwrap();
    let palette = write_palette(&temp_dir);

    let mut cmd = Command::cargo_bin("paintmix").unwrap();
    cmd.arg("808080")
        .arg("--paints")
        .arg(&palette)
        .arg("--mode")
        .arg("turbo");

    cmd.assert().failure();
}
