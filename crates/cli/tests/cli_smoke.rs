//! CLI smoke tests for stagehand.
//!
//! These tests verify that the commands parse, report state, and fail
//! with usable messages, without touching a real repository.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the stagehand binary.
fn stagehand_cmd() -> Command {
  cargo_bin_cmd!("stagehand")
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  stagehand_cmd()
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  stagehand_cmd()
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("stagehand"));
}

#[test]
fn subcommand_help_works() {
  for cmd in &["init", "deploy", "daemon", "status"] {
    stagehand_cmd()
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

#[test]
fn missing_subcommand_fails() {
  stagehand_cmd().assert().failure();
}

// =============================================================================
// Status
// =============================================================================

#[test]
fn status_on_empty_root_reports_nothing_active() {
  let temp = TempDir::new().unwrap();

  stagehand_cmd()
    .arg("status")
    .arg("--work-root")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("No active snapshot"));
}

#[test]
fn status_json_on_empty_root() {
  let temp = TempDir::new().unwrap();

  stagehand_cmd()
    .arg("status")
    .arg("--output")
    .arg("json")
    .arg("--work-root")
    .arg(temp.path())
    .assert()
    .success()
    .stdout(predicate::str::contains("\"active\": null"));
}

#[cfg(unix)]
#[test]
fn status_reports_seeded_state() {
  let temp = TempDir::new().unwrap();
  let staging = temp.path().join("staging");
  let snapshot = staging.join("1000");
  std::fs::create_dir_all(&snapshot).unwrap();
  std::os::unix::fs::symlink(&snapshot, temp.path().join("active")).unwrap();
  std::fs::create_dir_all(temp.path().join("tarballs/app")).unwrap();
  std::fs::write(temp.path().join("tarballs/app/app.tar.gz"), b"cached").unwrap();

  stagehand_cmd()
    .arg("status")
    .arg("--work-root")
    .arg(temp.path())
    .arg("--namespace")
    .arg("app")
    .arg("--tarball-name")
    .arg("app.tar.gz")
    .assert()
    .success()
    .stdout(predicate::str::contains("Active snapshot"))
    .stdout(predicate::str::contains("1000"))
    .stdout(predicate::str::contains("Tarball digest"));
}

// =============================================================================
// Configuration errors
// =============================================================================

#[test]
fn deploy_without_repo_path_fails() {
  let temp = TempDir::new().unwrap();

  stagehand_cmd()
    .arg("deploy")
    .arg("--work-root")
    .arg(temp.path())
    .assert()
    .failure()
    .stderr(predicate::str::contains("repo_path"));
}

#[test]
fn deploy_without_credentials_fails() {
  let temp = TempDir::new().unwrap();

  stagehand_cmd()
    .arg("deploy")
    .arg("--repo-path")
    .arg("releases/app/app.tar.gz")
    .arg("--work-root")
    .arg(temp.path())
    .arg("--credentials")
    .arg(temp.path().join("missing.conf"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("credentials"));
}

#[test]
fn daemon_with_zero_interval_fails() {
  let temp = TempDir::new().unwrap();

  stagehand_cmd()
    .arg("daemon")
    .arg("--repo-path")
    .arg("releases/app/app.tar.gz")
    .arg("--work-root")
    .arg(temp.path())
    .arg("--interval")
    .arg("0s")
    .assert()
    .failure()
    .stderr(predicate::str::contains("interval must be positive"));
}

#[test]
fn bad_interval_flag_fails_at_parse() {
  stagehand_cmd()
    .arg("daemon")
    .arg("--interval")
    .arg("not-a-duration")
    .assert()
    .failure();
}

#[test]
fn missing_config_file_fails() {
  stagehand_cmd()
    .arg("status")
    .arg("--config")
    .arg("/nonexistent/agent.yaml")
    .assert()
    .failure();
}
