//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const MANIFEST: &str = "apiVersion: v1\nkind: Pod\nmetadata:\n  name: toolbox\nspec:\n  containers:\n    - name: toolbox\n      image: busybox\n";

fn kmctl(inventory: Option<&NamedTempFile>, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kmctl"));
    cmd.env_remove("KMCTL_CONFIG")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env("RUST_LOG", "off");
    if let Some(file) = inventory {
        cmd.arg("--config").arg(file.path());
    }
    cmd.args(args).output().expect("Failed to execute kmctl")
}

fn file_with(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

/// Inventory pointing at ports nothing listens on
fn unreachable_inventory() -> NamedTempFile {
    file_with(
        "server:\n  - name: offline-a\n    host: 127.0.0.1\n    port: 1\n  - name: offline-b\n    host: 127.0.0.1\n    port: \"1\"\n",
        ".yaml",
    )
}

#[test]
fn test_cli_help() {
    let output = kmctl(None, &["--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "CLI help should succeed");
    for command in ["get", "logs", "apply", "delete", "upgrade"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

#[test]
fn test_cli_version() {
    let output = kmctl(None, &["--version"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("kmctl"));
}

#[test]
fn test_upgrade_help_lists_options() {
    let output = kmctl(None, &["upgrade", "--help"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("--type"));
    assert!(stdout.contains("--version"));
    assert!(stdout.contains("--file"));
}

#[test]
fn test_missing_required_argument_fails() {
    let output = kmctl(None, &["get", "node"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--name"));
}

#[test]
fn test_missing_inventory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    let output = Command::new(env!("CARGO_BIN_EXE_kmctl"))
        .arg("--config")
        .arg(&path)
        .args(["get", "nodes"])
        .env("RUST_LOG", "off")
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("cluster inventory"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_unreachable_clusters_are_reported_not_fatal() {
    let inventory = unreachable_inventory();

    let output = kmctl(Some(&inventory), &["get", "nodes"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "per-cluster failures keep exit code 0");
    assert!(stdout.contains("Cluster: offline-a (127.0.0.1)"), "{stdout}");
    assert!(stdout.contains("Cluster: offline-b (127.0.0.1)"), "{stdout}");
    assert_eq!(stdout.matches("Error: transport error").count(), 2, "{stdout}");
}

#[test]
fn test_json_output_has_one_line_per_cluster() {
    let inventory = unreachable_inventory();

    let output = kmctl(Some(&inventory), &["--format", "json", "get", "pods", "-s", "kube-system"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    for value in &lines {
        assert_eq!(value["host"], "127.0.0.1");
        assert!(value["error"].as_str().unwrap().contains("transport error"));
    }
}

#[test]
fn test_apply_reads_manifest_before_dispatch() {
    let inventory = unreachable_inventory();
    let manifest = file_with(MANIFEST, ".yaml");

    let output = kmctl(
        Some(&inventory),
        &["apply", "-f", manifest.path().to_str().unwrap()],
    );
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).matches("Cluster: ").count(),
        2
    );

    let output = kmctl(Some(&inventory), &["apply", "-f", "/nonexistent/manifest.yaml"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to read manifest"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_invalid_upgrade_arguments_dispatch_nothing() {
    let inventory = unreachable_inventory();
    let manifest = file_with(MANIFEST, ".yaml");
    let path = manifest.path().to_str().unwrap();

    let output = kmctl(Some(&inventory), &["upgrade", "-t", "7", "-v", "1.2.3", "-f", path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid upgrade type 7"));
    assert!(output.stdout.is_empty());

    let output = kmctl(Some(&inventory), &["upgrade", "-t", "0", "-v", "1.2", "-f", path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid version"));
    assert!(output.stdout.is_empty());
}
