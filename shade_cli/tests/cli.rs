use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

// Fast timings so a full travel takes a fraction of a second in sim mode
fn write_config(dir: &TempDir) -> PathBuf {
    let store = dir.path().join("calibration.toml");
    let toml = format!(
        r#"
[stepper]
pulse_us = 5
step_delay_us = 100
yield_every_steps = 100

[report]
poll_ms = 10
min_interval_ms = 20
min_steps = 20

[calibration]
default_travel = 1000
poll_ms = 5
debounce_ms = 10
hold_ms = 200
inactivity_timeout_ms = 5000
double_press_ms = 300

[led]
poll_ms = 5

[storage]
path = "{}"
"#,
        store.display().to_string().replace('\\', "/")
    );
    let path = dir.path().join("shade.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn shade(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("shade").unwrap();
    cmd.env_remove("RUST_LOG").arg("--config").arg(cfg);
    cmd
}

fn write_script(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("script.txt");
    fs::write(&path, body).unwrap();
    path
}

#[rstest]
#[case(&["--help"], "Usage:")]
#[case(&["run", "--help"], "--script")]
#[case(&["calibration", "--help"], "show")]
fn help_lists_commands(#[case] args: &[&str], #[case] needle: &str) {
    Command::cargo_bin("shade")
        .unwrap()
        .args(args)
        .assert()
        .success()
        .stdout(predicate::str::contains(needle));
}

#[test]
fn calibration_show_reports_defaults_when_nothing_stored() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    shade(&cfg)
        .args(["calibration", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("travel_steps=1000 (default)"))
        .stdout(predicate::str::contains("home_steps missing"));
    // Inspection never writes the store.
    assert!(!dir.path().join("calibration.toml").exists());
}

#[test]
fn calibration_show_reads_stored_record_and_clear_erases_it() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    fs::write(
        dir.path().join("calibration.toml"),
        "[calibration]\nhome_steps = 0\ntravel_steps = 4200\n",
    )
    .unwrap();

    let out = shade(&cfg)
        .args(["--json", "calibration", "show"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["travel_steps"], 4200);
    assert_eq!(v["stored"], true);

    shade(&cfg).args(["calibration", "clear"]).assert().success();
    shade(&cfg)
        .args(["calibration", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(default)"));
}

#[test]
fn out_of_range_record_is_reported_as_unused() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    fs::write(
        dir.path().join("calibration.toml"),
        "[calibration]\nhome_steps = 0\ntravel_steps = 50\n",
    )
    .unwrap();
    shade(&cfg)
        .args(["calibration", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("travel_steps 50 outside [100, 20000]"));
}

#[test]
fn scripted_close_reaches_fully_closed_and_reports_stall() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let script = write_script(&dir, "close\nwait 1500\nstatus\nquit\n");
    shade(&cfg)
        .args(["run", "--script"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("close 100.00%: Accepted"))
        .stdout(predicate::str::contains("report position=100.00% state=Stall"))
        .stdout(predicate::str::contains("steps=1000/1000"));
}

#[test]
fn json_run_emits_report_lines() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let script = write_script(&dir, "target 5000\nwait 1000\n");
    let out = shade(&cfg)
        .args(["--json", "run", "--script"])
        .arg(&script)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let reports: Vec<serde_json::Value> = stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter(|v| v["event"] == "report")
        .collect();
    let last = reports.last().expect("at least one report");
    assert_eq!(last["position"], 5000);
    assert_eq!(last["state"], "Stall");
}

#[test]
fn button_calibration_persists_measured_travel() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    // hold STOP -> Ready; UP seeks home; STOP sets home; DOWN counts; STOP measures
    let script = write_script(
        &dir,
        "press stop 400\n\
         status\n\
         target 2000\n\
         press up\n\
         wait 50\n\
         press stop\n\
         press down\n\
         wait 200\n\
         press stop\n\
         status\n\
         press stop\n\
         press stop\n\
         status\n",
    );
    shade(&cfg)
        .args(["run", "--script"])
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("phase=Ready"))
        .stdout(predicate::str::contains("target 20.00%: Blocked"))
        .stdout(predicate::str::contains("phase=Complete"))
        .stdout(predicate::str::contains("phase=Idle"));

    let out = shade(&cfg)
        .args(["--json", "calibration", "show"])
        .output()
        .unwrap();
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["stored"], true);
    assert_eq!(v["home_steps"], 0);
    let travel = v["travel_steps"].as_u64().unwrap();
    assert!((100..=20000).contains(&travel), "travel {travel}");
}

#[test]
fn bad_script_line_fails_with_location() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    let script = write_script(&dir, "open\njump 5\n");
    shade(&cfg)
        .args(["run", "--script"])
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"));
}

#[rstest]
#[case("[stepper]\npulse_us = 0\n", "stepper.pulse_us must be > 0")]
#[case("[pins]\nstep = 5\ndir = 5\n", "share GPIO 5")]
#[case("[calibration]\nmin_travel = 500\nmax_travel = 400\n", "min_travel")]
#[case("[stepper\n", "not valid TOML")]
fn invalid_config_is_rejected(#[case] toml: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();
    shade(&path)
        .args(["calibration", "show"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[test]
fn missing_config_error_is_json_when_asked() {
    let out = Command::cargo_bin("shade")
        .unwrap()
        .args(["--json", "--config", "/nonexistent/shade.toml", "self-check"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(v["reason"], "Error");
    assert!(v["message"].as_str().unwrap().contains("config"));
}

#[test]
fn self_check_passes_and_leaves_store_alone() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir);
    shade(&cfg)
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("self-check ok"));
    assert!(!dir.path().join("calibration.toml").exists());
}
