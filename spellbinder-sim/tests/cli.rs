use std::process::Command;

fn temp_path(label: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "spellbinder-cli-{label}-{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[test]
fn cli_writes_a_json_report_for_each_seed() {
    let exe = env!("CARGO_BIN_EXE_spellbinder-sim");
    let output_path = temp_path("json");
    let status = Command::new(exe)
        .args([
            "--seeds",
            "1,2",
            "--minutes",
            "2",
            "--preset",
            "water",
            "--report",
            "json",
            "--output",
        ])
        .arg(&output_path)
        .status()
        .expect("run cli");
    assert!(status.success());
    let content = std::fs::read_to_string(output_path).expect("read output");
    let report: serde_json::Value = serde_json::from_str(&content).expect("valid json");
    assert_eq!(report["passed"], true);
    let sessions = report["sessions"].as_array().expect("sessions array");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["preset"], "water");
    assert_eq!(sessions[1]["round_trip_ok"], true);
}

#[test]
fn cli_console_report_mentions_each_seed() {
    let exe = env!("CARGO_BIN_EXE_spellbinder-sim");
    let output = Command::new(exe)
        .args(["--seeds", "7", "--minutes", "1", "--tick-ms", "500"])
        .output()
        .expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Spellbinder Simulator"));
    assert!(stdout.contains("seed"));
}

#[test]
fn cli_rejects_a_malformed_seed() {
    let exe = env!("CARGO_BIN_EXE_spellbinder-sim");
    let output = Command::new(exe)
        .args(["--seeds", "abc"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid seed"));
}
