//! CLI Argument Parsing Compatibility Tests for rsftp
//!
//! These tests verify that command-line arguments are parsed correctly and keep working across
//! versions. None of them reach the network.

use assert_cmd::Command;

fn rsftp() -> Command {
    Command::cargo_bin("rsftp").unwrap()
}

#[test]
fn test_help_runs() {
    rsftp().arg("--help").assert().success();
}

#[test]
fn test_version_runs() {
    rsftp().arg("--version").assert().success();
}

#[test]
fn test_help_lists_connection_options() {
    rsftp()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--private-key"))
        .stdout(predicates::str::contains("--conn-timeout-sec"))
        .stdout(predicates::str::contains("Connection options"));
}

// ============================================================================
// ProgressType Argument Parsing Tests
// ============================================================================

#[test]
fn test_progress_type_auto_lowercase() {
    rsftp()
        .args(["--progress-type", "auto", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_progress_bar_pascal_case() {
    rsftp()
        .args(["--progress-type", "ProgressBar", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_text_updates_kebab_case() {
    rsftp()
        .args(["--progress-type", "text-updates", "--help"])
        .assert()
        .success();
}

#[test]
fn test_progress_type_invalid_value() {
    rsftp()
        .args(["--progress-type", "invalid-value", "--help"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'invalid-value'"));
}

// ============================================================================
// Transfer and connection arguments
// ============================================================================

#[test]
fn test_upload_and_download_conflict() {
    rsftp()
        .args([
            "--upload", "--download", "--host", "h", "-u", "me", "-s", "a", "-d", "b",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("cannot be used with"));
}

#[test]
fn test_public_key_requires_private_key() {
    rsftp()
        .args([
            "--public-key",
            "/k/id_rsa.pub",
            "--host",
            "h",
            "-u",
            "me",
            "-s",
            "a",
            "-d",
            "b",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--private-key"));
}

#[test]
fn test_port_out_of_range() {
    rsftp()
        .args([
            "--port", "70000", "--host", "h", "-u", "me", "-s", "a", "-d", "b",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value '70000'"));
}

#[test]
fn test_source_is_required() {
    rsftp()
        .args(["--host", "h", "-u", "me", "-d", "b"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--source"));
}

#[test]
fn test_chunk_size_must_be_a_size() {
    rsftp()
        .args([
            "--chunk-size",
            "lots",
            "--host",
            "h",
            "-u",
            "me",
            "-s",
            "a",
            "-d",
            "b",
        ])
        .assert()
        .failure()
        .stderr(predicates::str::contains("invalid value 'lots'"));
}
