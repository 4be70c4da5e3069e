//! Tests for the kmctl-agent command line

use std::process::Command;

fn agent() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kmctl-agent"));
    cmd.env_remove("KUBECONFIG");
    cmd
}

#[test]
fn test_help_lists_serve_options() {
    let output = agent().args(["serve", "--help"]).output().unwrap();

    assert!(output.status.success());
    let help = String::from_utf8_lossy(&output.stdout);
    for flag in ["--host", "--port", "--kubeconfig", "--ledger", "--health-port"] {
        assert!(help.contains(flag), "missing {flag} in:\n{help}");
    }
}

#[test]
fn test_missing_subcommand_fails() {
    let output = agent().output().unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_unreadable_kubeconfig_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = dir.path().join("ledger.db");

    let output = agent()
        .args(["serve", "-K"])
        .arg(dir.path().join("missing-kubeconfig"))
        .arg("--ledger")
        .arg(&ledger)
        .args(["-P", "0", "--health-port", "0"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("failed to create Kubernetes client"),
        "unexpected stderr:\n{stderr}"
    );
    assert!(!ledger.exists());
}

#[test]
fn test_invalid_port_in_environment_fails() {
    let output = agent()
        .arg("serve")
        .env("KMCTL_AGENT_PORT", "not-a-port")
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid agent configuration"), "{stderr}");
}
