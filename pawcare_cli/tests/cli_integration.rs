use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, toml: &str) -> PathBuf {
    let path = dir.path().join("pawcare.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn json_lines(stdout: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|l| l.trim_start().starts_with('{'))
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["feeder", "--bogus"], 2, "unexpected argument", "stderr")]
#[case(&["calibrate-distance"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let mut cmd = Command::cargo_bin("pawcare").unwrap();
    for a in args {
        cmd.arg(a);
    }
    let assert = cmd.assert().code(exit_code);
    let pred = predicate::str::contains(needle);
    if stream == "stdout" {
        assert.stdout(pred);
    } else {
        assert.stderr(pred);
    }
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[feeder]\nmax_loops = 0\n");
    Command::cargo_bin("pawcare")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("feeder.max_loops must be >= 1"));
}

#[test]
fn json_mode_reports_structured_errors() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "[collar]\nsample_rate_hz = 0\n");
    let out = Command::cargo_bin("pawcare")
        .unwrap()
        .args(["--json", "--config"])
        .arg(&cfg)
        .arg("self-check")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(2));
    let err_line = String::from_utf8_lossy(&out.stderr)
        .lines()
        .rev()
        .find(|l| l.contains("\"reason\""))
        .map(str::to_owned)
        .expect("structured error line");
    let v: Value = serde_json::from_str(&err_line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert_eq!(v["exit_code"], 2);
}

#[test]
fn unreadable_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("pawcare")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("self-check")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("read config"));
}

#[test]
fn self_check_passes_in_simulation() {
    let out = Command::cargo_bin("pawcare")
        .unwrap()
        .arg("self-check")
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines = json_lines(&out.stdout);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["failures"], 0);
    assert_eq!(lines[0]["feeder"]["scale"]["ok"], true);
    assert_eq!(lines[0]["config"]["max_loops"], 20);
}

#[test]
fn collar_publishes_battery_and_vitals() {
    let out = Command::cargo_bin("pawcare")
        .unwrap()
        .args(["collar", "--fast", "--ticks", "300"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines = json_lines(&out.stdout);

    let battery: Vec<&Value> = lines
        .iter()
        .filter(|l| l["topic"] == "pet/manager/topic/battery")
        .collect();
    assert_eq!(battery.len(), 1);
    assert_eq!(battery[0]["payload"]["status"], "normal");

    let health: Vec<&Value> = lines
        .iter()
        .filter(|l| l["topic"] == "pet/manager/topic/collar")
        .collect();
    assert_eq!(health.len(), 1);
    let bpm = health[0]["payload"]["heart_rate"].as_u64().unwrap();
    assert!((100..=200).contains(&bpm), "bpm {bpm}");
    assert_eq!(health[0]["payload"]["pet_id"], "collar-pet");
}

#[test]
fn collar_replays_a_trace() {
    let dir = tempdir().unwrap();
    let trace = dir.path().join("trace.csv");
    let mut csv = String::from("t_ms,red,ir,ax,ay,az\n");
    for i in 0..20 {
        csv.push_str(&format!("{},61000,80000,0.0,0.0,1.0\n", i * 20));
    }
    fs::write(&trace, csv).unwrap();

    let out = Command::cargo_bin("pawcare")
        .unwrap()
        .args(["collar", "--fast", "--trace"])
        .arg(&trace)
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines = json_lines(&out.stdout);
    assert!(lines.iter().any(|l| l["topic"] == "pet/manager/topic/battery"));
}

#[test]
fn collar_rejects_trace_with_wrong_headers() {
    let dir = tempdir().unwrap();
    let trace = dir.path().join("trace.csv");
    fs::write(&trace, "time,red,ir\n0,1,2\n").unwrap();
    Command::cargo_bin("pawcare")
        .unwrap()
        .args(["collar", "--fast", "--trace"])
        .arg(&trace)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers in trace CSV"));
}

#[test]
fn calibrate_scale_recovers_reference_unit() {
    let out = Command::cargo_bin("pawcare")
        .unwrap()
        .args(["calibrate-scale", "--known-grams", "100", "--no-wait"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let lines = json_lines(&out.stdout);
    let unit = lines[0]["reference_unit"].as_f64().unwrap();
    assert!((unit - 1.0).abs() < 0.05, "unit {unit}");
    let zero = lines[0]["zero_counts"].as_i64().unwrap();
    assert!((8_399..=8_401).contains(&zero), "zero {zero}");
}

#[test]
fn calibrate_scale_rejects_non_positive_mass() {
    Command::cargo_bin("pawcare")
        .unwrap()
        .args(["calibrate-scale", "--known-grams", "0", "--no-wait"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("positive number of grams"));
}
