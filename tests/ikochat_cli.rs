//! Integration tests that lock ikochat CLI flag and output behavior.

use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn ikochat_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_ikochat").expect("ikochat test binary not built")
}

#[test]
fn help_mentions_core_flags() {
    let output = Command::new(ikochat_bin())
        .arg("--help")
        .output()
        .expect("run ikochat --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Iko"));
    assert!(combined.contains("--agent-url"));
    assert!(combined.contains("--effort"));
    assert!(combined.contains("--list-input-devices"));
}

#[test]
fn unknown_effort_tier_is_rejected() {
    let output = Command::new(ikochat_bin())
        .args(["--effort", "turbo"])
        .output()
        .expect("run ikochat --effort turbo");
    assert!(!output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("invalid value") || combined.contains("possible values"));
}

#[test]
fn list_input_devices_prints_injected_fakes() {
    let output = Command::new(ikochat_bin())
        .arg("--list-input-devices")
        .env("IKOCHAT_TEST_DEVICES", "Fake Mic A,Fake Mic B")
        .output()
        .expect("run ikochat --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Available audio input devices:"));
    assert!(combined.contains("Fake Mic A"));
    assert!(combined.contains("Fake Mic B"));
}

#[test]
fn list_input_devices_reports_empty_device_set() {
    let output = Command::new(ikochat_bin())
        .arg("--list-input-devices")
        .env("IKOCHAT_TEST_DEVICES", " ")
        .output()
        .expect("run ikochat --list-input-devices");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("No audio input devices detected."));
}
