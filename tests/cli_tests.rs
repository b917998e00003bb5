// End-to-end tests of the coruscant binary on summary files

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const OLD_SNAPSHOT: &str = r#"{"span_markov": {}, "fail_bernoulli": {}}"#;

const SNAPSHOT: &str = r#"{"span_markov": {"checkout": {"__INITIAL_STATE__": {"auth": 1.0}, "auth": {"payment": 0.9, "__FAILURE_STATE__": 0.1}, "payment": {"__SUCCESS_STATE__": 0.7, "__FAILURE_STATE__": 0.3}}, "search": {"__INITIAL_STATE__": {"__SUCCESS_STATE__": 1.0}}}, "fail_bernoulli": {"checkout": {"__TOTAL__": [37, 100], "payment": [27, 30], "auth": [10, 12], "": [0, 58]}, "search": {"__TOTAL__": [0, 40]}}}"#;

fn write_summary(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("dependency_summary.jsons");
    fs::write(&path, format!("{}\n{}\n", OLD_SNAPSHOT, SNAPSHOT)).unwrap();
    path
}

#[test]
fn test_default_output_names_top_subspan() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Analyzed 2 spans"))
        .stdout(predicate::str::contains("checkout"))
        .stdout(predicate::str::contains("payment ("));
}

#[test]
fn test_verbose_prints_score_table() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg("-v").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("__INITIAL_STATE__"))
        .stdout(predicate::str::contains("auth"));
}

#[test]
fn test_double_verbose_prints_details() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg("-vv").arg(&path);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("count(s/f)="))
        .stdout(predicate::str::contains("pi_f="));
}

#[test]
fn test_mc_prints_span_view() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path).arg("--mc").arg("checkout");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("span= checkout"))
        .stdout(predicate::str::contains("Absorption probabilities"))
        .stdout(predicate::str::contains("37/100"));
}

#[test]
fn test_mc_unknown_span_fails() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path).arg("--mc").arg("inventory");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("inventory"));
}

#[test]
fn test_print_fault_lists_non_zero_spans() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path).arg("--print-fault");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("checkout: 0.37"))
        .stdout(predicate::str::contains("search:").not());
}

#[test]
fn test_print_fault_with_focus_spans() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path)
        .arg("--print-fault")
        .arg("--spans")
        .arg("search")
        .arg("inventory");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("search: 0"))
        .stdout(predicate::str::contains("inventory: 0"))
        .stdout(predicate::str::contains("checkout: 0.37").not());
}

#[test]
fn test_json_output_is_parseable() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path).arg("--format").arg("json").arg("--workers").arg("2");

    let output = cmd.output().unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let score = value["spans"]["checkout"]["influence"]["scores"]["payment"]
        .as_f64()
        .unwrap();
    assert!(score > 0.99);
    assert_eq!(value["config"]["workers"], 2);
}

#[test]
fn test_config_file_is_applied() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);
    let config = tmp_dir.path().join("coruscant.toml");
    fs::write(&config, "mu = 7.5\nsolver = \"matrix_power\"\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path)
        .arg("--config")
        .arg(&config)
        .arg("--format")
        .arg("json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"mu\": 7.5"))
        .stdout(predicate::str::contains("\"matrix_power\""));
}

#[test]
fn test_invalid_mu_is_rejected() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path).arg("--mu=-1");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("mu"));
}

#[test]
fn test_missing_summary_fails() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg("/nonexistent/dependency_summary.jsons");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load summary"));
}

#[test]
fn test_empty_summary_fails() {
    let tmp_dir = TempDir::new().unwrap();
    let path = tmp_dir.path().join("empty.jsons");
    fs::write(&path, "\n\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg(&path);

    cmd.assert().failure();
}

#[test]
fn test_debug_logs_to_stderr() {
    let tmp_dir = TempDir::new().unwrap();
    let path = write_summary(&tmp_dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("coruscant");
    cmd.arg("--debug").arg(&path);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Analyzed 2 spans"));
}
