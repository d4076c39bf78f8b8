// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests. These drive the `rhino` binary against simulated
//! instruments.

use std::{path::Path, process::Output, str::from_utf8};

use assert_cmd::{output::OutputError, Command};
use serde_json::Value;
use tempfile::TempDir;

fn rhino() -> Command {
    Command::cargo_bin("rhino").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Observe a simulated receiver for one 6 s cycle of load, noise diode and
/// antenna.
fn simulated_observe(dir: &Path) -> (String, String) {
    let cmd = rhino()
        .args([
            "observe",
            "--simulate",
            "--settle-time",
            "0",
            "--run-length",
            "6s",
            "--cycle-length",
            "6s",
            "--num-channels",
            "64",
            "--sample-rate",
            "64kHz",
            "--integration-time",
            "500ms",
            "--no-progress-bars",
            "--output",
        ])
        .arg(dir)
        .ok();
    assert!(cmd.is_ok(), "observe failed: {:?}", get_cmd_output(cmd));
    get_cmd_output(cmd)
}

#[test]
fn test_observe_then_reduce() {
    let tmp = TempDir::new().unwrap();
    let run_dir = tmp.path().join("run");
    let (stdout, _) = simulated_observe(&run_dir);
    assert!(stdout.contains("rhino observe complete"), "{stdout}");
    assert!(run_dir.join("manifest.json").exists());

    let summary_file = tmp.path().join("reduction.json");
    let cmd = rhino()
        .arg("reduce")
        .arg("--cache")
        .arg(&run_dir)
        .args(["--guard-buffer", "0.5"])
        .arg("--output")
        .arg(&summary_file)
        .ok();
    assert!(cmd.is_ok(), "reduce failed: {:?}", get_cmd_output(cmd));

    let summary: Value =
        serde_json::from_reader(std::fs::File::open(&summary_file).unwrap()).unwrap();
    assert_eq!(summary["channel_frequencies"].as_array().unwrap().len(), 64);
    assert_eq!(summary["dwells"].as_array().unwrap().len(), 3);
    let cycles = summary["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 1);
    let temperature = cycles[0]["temperature"].as_array().unwrap();
    assert_eq!(temperature.len(), 64);
    let mean = temperature.iter().map(|t| t.as_f64().unwrap()).sum::<f64>() / 64.0;
    assert!((mean - 3000.0).abs() < 1.0, "{mean}");
}

#[test]
fn test_calibration_cycle_with_vna() {
    let tmp = TempDir::new().unwrap();
    let cmd = rhino()
        .args([
            "calibration-cycle",
            "--simulate",
            "--dwell",
            "1s",
            "--num-channels",
            "32",
            "--sample-rate",
            "32kHz",
            "--vna",
            "--vna-sweeps",
            "2",
            "--no-progress-bars",
            "--output",
        ])
        .arg(tmp.path())
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));

    let vna: Value =
        serde_json::from_reader(std::fs::File::open(tmp.path().join("vna.json")).unwrap())
            .unwrap();
    assert_eq!(vna["paths"].as_object().unwrap().len(), 4);
    assert!(tmp.path().join("manifest.json").exists());
}

#[test]
fn test_dry_run_does_not_acquire() {
    let tmp = TempDir::new().unwrap();
    let run_dir = tmp.path().join("run");
    let cmd = rhino()
        .args(["observe", "--simulate", "--run-length", "1h", "--dry-run", "--output"])
        .arg(&run_dir)
        .ok();
    let (stdout, _) = get_cmd_output(cmd);
    assert!(stdout.contains("Dry run -- exiting now."), "{stdout}");
    assert!(!run_dir.exists());
}

#[test]
fn test_save_toml_round_trips() {
    let tmp = TempDir::new().unwrap();
    let toml_file = tmp.path().join("args.toml");
    let cmd = rhino()
        .args([
            "observe",
            "--simulate",
            "--run-length",
            "10min",
            "--window",
            "hann",
            "--dry-run",
            "--save-toml",
        ])
        .arg(&toml_file)
        .ok();
    assert!(cmd.is_ok(), "{:?}", get_cmd_output(cmd));
    let contents = std::fs::read_to_string(&toml_file).unwrap();
    assert!(contents.contains("run_length = \"10min\""), "{contents}");

    let cmd = rhino().arg("observe").arg(&toml_file).arg("--dry-run").ok();
    let (stdout, stderr) = get_cmd_output(cmd);
    assert!(stdout.contains("Hann window"), "{stdout}\n{stderr}");
}

#[test]
fn test_bad_window_is_an_error() {
    let cmd = rhino()
        .args([
            "observe",
            "--simulate",
            "--run-length",
            "1s",
            "--window",
            "triangle-ish",
            "--dry-run",
        ])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Unknown window function"), "{stderr}");
}

#[test]
fn test_reduce_of_an_unfinished_run_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let cmd = rhino()
        .arg("reduce")
        .arg("--cache")
        .arg(tmp.path())
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.starts_with("Error: "), "{stderr}");
}
