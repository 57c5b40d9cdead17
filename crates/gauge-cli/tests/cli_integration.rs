//! Integration tests driving the built `gauge` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

/// A temp workspace with its own config file and database.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("data").join("gauge.db");
        let config = format!("database_path = '{}'\n", db_path.display());
        std::fs::write(dir.path().join("config.toml"), config).unwrap();
        Self { dir }
    }

    fn config_path(&self) -> std::path::PathBuf {
        self.dir.path().join("config.toml")
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_gauge"));
        command
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_path());
        command
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command()
            .args(args)
            .output()
            .expect("failed to run gauge")
    }

    fn run_with_stdin(&self, args: &[&str], input: &str) -> Output {
        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn gauge");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().expect("failed to wait for gauge")
    }

    fn db_path(&self) -> std::path::PathBuf {
        self.dir.path().join("data").join("gauge.db")
    }
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "gauge failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_exists(path: &Path) {
    assert!(path.exists(), "expected {} to exist", path.display());
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(env!("CARGO_BIN_EXE_gauge"))
        .arg("--help")
        .output()
        .expect("failed to run gauge --help");
    let help = stdout(&output);
    for command in ["cylinder", "record", "import", "replay", "summary", "chart", "scan", "status"] {
        assert!(help.contains(command), "expected '{command}' in help: {help}");
    }
}

#[test]
fn test_add_record_and_status() {
    let ws = Workspace::new();

    let added = stdout(&ws.run(&["cylinder", "add", "Propane", "--tare", "5", "--capacity", "10", "--activate"]));
    assert!(added.contains("Added cylinder 1 (Propane)"), "{added}");
    assert_exists(&ws.db_path());

    let recorded = stdout(&ws.run(&["record", "12", "--at", "2025-02-01T08:00:00Z"]));
    assert_eq!(recorded, "Recorded 7.00 kg (70.0%) for Propane\n");

    let status = stdout(&ws.run(&["status"]));
    assert!(status.contains("Active cylinder: Propane (#1)"), "{status}");
    assert!(
        status.contains("Latest reading: 7.00 kg (70.0%) at 2025-02-01T08:00:00Z"),
        "{status}"
    );
}

#[test]
fn test_record_without_active_cylinder_fails() {
    let ws = Workspace::new();
    stdout(&ws.run(&["cylinder", "add", "Spare", "--tare", "5", "--capacity", "10"]));

    let output = ws.run(&["record", "12"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("No active cylinder configured"),
        "unexpected stderr: {stderr}"
    );
}

#[test]
fn test_invalid_cylinder_is_rejected() {
    let ws = Workspace::new();
    let output = ws.run(&["cylinder", "add", "Broken", "--tare", "-1", "--capacity", "10"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("tare cannot be negative"), "unexpected stderr: {stderr}");
}

#[test]
fn test_import_then_summary_json() {
    let ws = Workspace::new();
    stdout(&ws.run(&["cylinder", "add", "Propane", "--tare", "5", "--capacity", "10", "--activate"]));

    // Timestamps relative to now so the summary window covers them.
    let now = chrono::Utc::now().timestamp_millis();
    let hour = 3_600_000;
    let samples = format!(
        "{{\"weight_kg\":14.0,\"timestamp\":{}}}\n\
         {{\"weight_kg\":13.0,\"timestamp\":{}}}\n\
         {{\"weight_kg\":40.0,\"timestamp\":{}}}\n",
        now - 3 * hour,
        now - 2 * hour,
        now - hour,
    );
    let imported = stdout(&ws.run_with_stdin(&["import", "--cylinder", "1"], &samples));
    assert_eq!(imported, "Imported 2 of 3 samples into cylinder 1\n");

    let summary = stdout(&ws.run(&["summary", "--days", "7", "--json"]));
    let json: serde_json::Value = serde_json::from_str(&summary).unwrap();
    assert_eq!(json["days"], 7);
    assert_eq!(json["cylinders"][0]["name"], "Propane");
    assert!((json["total_kg"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    assert_eq!(json["active"]["fuel_kg"], 8.0);
}

#[test]
fn test_replay_removes_transient_dip() {
    let ws = Workspace::new();
    stdout(&ws.run(&["cylinder", "add", "Propane", "--tare", "5", "--capacity", "10", "--activate"]));

    let samples = r#"{"weight_kg":11.5,"timestamp":"2025-02-01T08:00:00Z"}
{"weight_kg":6.0,"timestamp":"2025-02-01T08:10:00Z"}
{"weight_kg":12.0,"timestamp":"2025-02-01T08:20:00Z"}
{"weight_kg":11.8,"timestamp":"2025-02-01T08:30:00Z"}
"#;
    let replayed = stdout(&ws.run_with_stdin(&["replay"], samples));
    assert_eq!(
        replayed,
        "Replayed 4 samples: 4 recorded, 0 rejected, 1 outlier(s) removed\n"
    );

    let status = stdout(&ws.run(&["status"]));
    assert!(status.contains("Measurements: 3 across 1 cylinder(s)"), "{status}");
}

#[test]
fn test_outlier_correction_can_be_disabled_by_env() {
    let ws = Workspace::new();
    stdout(&ws.run(&["cylinder", "add", "Propane", "--tare", "5", "--capacity", "10", "--activate"]));

    let samples = r#"{"weight_kg":11.5,"timestamp":"2025-02-01T08:00:00Z"}
{"weight_kg":6.0,"timestamp":"2025-02-01T08:10:00Z"}
{"weight_kg":12.0,"timestamp":"2025-02-01T08:20:00Z"}
{"weight_kg":11.8,"timestamp":"2025-02-01T08:30:00Z"}
"#;
    let mut child = ws
        .command()
        .env("GAUGE_OUTLIER__ENABLED", "false")
        .arg("replay")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .take()
        .unwrap()
        .write_all(samples.as_bytes())
        .unwrap();
    let replayed = stdout(&child.wait_with_output().unwrap());
    assert!(replayed.contains("0 outlier(s) removed"), "{replayed}");
}

#[test]
fn test_scan_filters_advertisements() {
    let ws = Workspace::new();
    let advertisements = r#"{"name":"GasScale","address":"aa:00:00:00:00:01","rssi":-70,"advertised_services":["4fafc201-1fb5-459e-8fcc-c5c9c331914b"],"is_connectable":true}
{"address":"BB:00:00:00:00:02","rssi":-85,"advertised_services":[],"is_connectable":false}
"#;
    let filtered = stdout(&ws.run_with_stdin(&["scan", "--json"], advertisements));
    let devices: serde_json::Value = serde_json::from_str(&filtered).unwrap();
    assert_eq!(devices.as_array().unwrap().len(), 1);
    assert_eq!(devices[0]["address"], "AA:00:00:00:00:01");

    let all = stdout(&ws.run_with_stdin(&["scan", "--all"], advertisements));
    assert_eq!(all.lines().count(), 2, "{all}");
}
