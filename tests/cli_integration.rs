use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_irradiance-sim"))
        .args(args)
        .output()
        .expect("irradiance-sim process should run")
}

fn out_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name)
}

fn run_scenario(path: &str, out: &PathBuf) -> String {
    let out_arg = out.to_string_lossy().into_owned();
    let output = run_cli(&["--config", path, "--nsim", "2", "--out", &out_arg]);
    assert!(
        output.status.success(),
        "scenario run failed for {path}: stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).expect("stdout should be valid UTF-8")
}

#[test]
fn baseline_scenario_writes_report_summary_and_csv() {
    let out = out_path("cli_baseline.csv");
    let stdout = run_scenario("scenarios/baseline.toml", &out);

    assert!(stdout.contains("--- Model Report ---"), "stdout: {stdout}");
    assert!(stdout.contains("Seasons: 12 (month)"), "stdout: {stdout}");
    assert!(stdout.contains("--- Ensemble Summary ---"), "stdout: {stdout}");
    assert!(stdout.contains("Replicates:            2"), "stdout: {stdout}");

    let csv = fs::read_to_string(&out).expect("ensemble CSV should exist");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("date,value,id"));
    let rows: Vec<&str> = lines.collect();
    // 2020 is a leap year
    assert_eq!(rows.len(), 2 * 366);
    assert!(rows[0].starts_with("2020-01-01,"));
    assert!(rows[0].ends_with(",0"));
    assert!(rows[rows.len() - 1].starts_with("2020-12-31,"));
    assert!(rows[rows.len() - 1].ends_with(",1"));
}

#[test]
fn seed_override_changes_output_deterministically() {
    let a = out_path("cli_seed_a.csv");
    let b = out_path("cli_seed_b.csv");
    let c = out_path("cli_seed_c.csv");
    for (path, seed) in [(&a, "11"), (&b, "11"), (&c, "12")] {
        let out_arg = path.to_string_lossy().into_owned();
        let output = run_cli(&[
            "--config",
            "scenarios/parametric_acs.toml",
            "--nsim",
            "1",
            "--seed",
            seed,
            "--out",
            &out_arg,
        ]);
        assert!(
            output.status.success(),
            "stderr={}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    let read = |p: &PathBuf| fs::read_to_string(p).expect("CSV should exist");
    assert_eq!(read(&a), read(&b));
    assert_ne!(read(&a), read(&c));
}

#[test]
fn zero_inflated_scenario_prints_density_report() {
    let out = out_path("cli_zero_inflated.csv");
    let stdout = run_scenario("scenarios/zero_inflated.toml", &out);
    assert!(stdout.contains("marginal: gamma"), "stdout: {stdout}");
    assert!(stdout.contains("empirical"), "stdout: {stdout}");

    let csv = fs::read_to_string(&out).expect("ensemble CSV should exist");
    for row in csv.lines().skip(1) {
        let value: f64 = row.split(',').nth(1).unwrap().parse().unwrap();
        assert!(value >= 0.0, "negative radiation in row {row}");
    }
}

#[test]
fn covered_range_reports_no_simulation() {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR"));
    let config = dir.join("cli_covered.toml");
    fs::write(
        &config,
        r#"
[input]
path = "data/sample_daily.csv"

[analysis]
lag_max = 5

[simulation]
from = "2015-01-01"
to = "2019-12-31"
"#,
    )
    .unwrap();
    let output = run_cli(&["--config", &config.to_string_lossy()]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("no simulation needed"), "stdout: {stdout}");
    assert!(!stdout.contains("--- Ensemble Summary ---"));
}

#[test]
fn unknown_preset_fails() {
    let output = run_cli(&["--preset", "nonexistent"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"), "stderr: {stderr}");
}

#[test]
fn invalid_config_lists_errors() {
    let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR"));
    let config = dir.join("cli_invalid.toml");
    fs::write(
        &config,
        r#"
[analysis]
distribution = "weibull"

[simulation]
nsim = 0
"#,
    )
    .unwrap();
    let output = run_cli(&["--config", &config.to_string_lossy()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("analysis.distribution"), "stderr: {stderr}");
    assert!(stderr.contains("simulation.nsim"), "stderr: {stderr}");
}

#[test]
fn help_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--config <path>"));
    assert!(stderr.contains("--nsim <n>"));
}
