//! CLI smoke tests for enclave.
//!
//! These tests run the binary against the scripts in `tests/fixtures` with the
//! data directory pointed at a temp dir.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

fn enclave_cmd(data: &TempDir) -> Command {
  let mut cmd = cargo_bin_cmd!("enclave");
  cmd.env("ENCLAVE_DATA_DIR", data.path()).env_remove("RUST_LOG");
  cmd
}

fn fixture(name: &str) -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn saved_plans(data: &TempDir) -> Vec<PathBuf> {
  match std::fs::read_dir(data.path().join("plans")) {
    Ok(entries) => entries.flatten().map(|e| e.path()).collect(),
    Err(_) => Vec::new(),
  }
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_works() {
  let data = TempDir::new().unwrap();
  enclave_cmd(&data)
    .arg("--help")
    .assert()
    .success()
    .stdout(predicate::str::contains("Usage"));
}

#[test]
fn version_flag_works() {
  let data = TempDir::new().unwrap();
  enclave_cmd(&data)
    .arg("--version")
    .assert()
    .success()
    .stdout(predicate::str::contains("enclave"));
}

#[test]
fn subcommand_help_works() {
  let data = TempDir::new().unwrap();
  for cmd in &["plan", "apply", "status"] {
    enclave_cmd(&data)
      .arg(cmd)
      .arg("--help")
      .assert()
      .success()
      .stdout(predicate::str::contains("Usage"));
  }
}

// =============================================================================
// plan
// =============================================================================

#[test]
#[serial]
fn plan_prints_summary_and_saves_plan() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("plan")
    .arg(fixture("web.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("#0 upload_files"))
    .stdout(predicate::str::contains("#2 add_service"))
    .stdout(predicate::str::contains("needs: #1"))
    .stdout(predicate::str::contains("Instructions: 3"));

  assert_eq!(saved_plans(&data).len(), 1);
}

#[test]
#[serial]
fn plan_json_output() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("plan")
    .arg(fixture("web.json"))
    .arg("--json")
    .assert()
    .success()
    .stdout(predicate::str::contains("\"instructions\""))
    .stdout(predicate::str::contains("\"idempotency_key\""));
}

#[test]
#[serial]
fn plan_reports_every_interpretation_error() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("plan")
    .arg(fixture("broken.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("unknown action or type 'restart_service'"))
    .stderr(predicate::str::contains("outside the allowed range"))
    .stderr(predicate::str::contains("2 error(s)"));

  assert!(saved_plans(&data).is_empty());
}

#[test]
#[serial]
fn plan_reports_every_validation_error() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("plan")
    .arg(fixture("invalid.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("service 'ghost' does not exist"))
    .stderr(predicate::str::contains("artifact 'missing-artifact'"));
}

#[test]
#[serial]
fn plan_nonexistent_script_fails() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("plan")
    .arg("/nonexistent/path/script.json")
    .assert()
    .failure()
    .stderr(predicate::str::contains("Failed to load script"));
}

// =============================================================================
// apply
// =============================================================================

#[test]
#[serial]
fn apply_creates_environment() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("apply")
    .arg(fixture("web.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("Applied: 3"))
    .stdout(predicate::str::contains("Executed: 3"))
    .stdout(predicate::str::contains("Apply complete"));

  assert!(data.path().join("state.json").exists());
  assert_eq!(saved_plans(&data).len(), 1);
}

#[test]
#[serial]
fn reapply_executes_nothing() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data).arg("apply").arg(fixture("web.json")).assert().success();

  enclave_cmd(&data)
    .arg("apply")
    .arg(fixture("web.json"))
    .assert()
    .success()
    .stdout(predicate::str::contains("(already applied)"))
    .stdout(predicate::str::contains("Executed: 0"));
}

#[test]
#[serial]
fn apply_saved_plan_file() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data).arg("plan").arg(fixture("web.json")).assert().success();
  let plans = saved_plans(&data);
  assert_eq!(plans.len(), 1);

  enclave_cmd(&data)
    .arg("apply")
    .arg("--plan")
    .arg(&plans[0])
    .assert()
    .success()
    .stdout(predicate::str::contains("Executed: 3"));

  let saved = std::fs::read_to_string(&plans[0]).unwrap();
  assert!(saved.contains("\"applied\": true"));
}

#[test]
#[serial]
fn apply_invalid_script_fails_without_state() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("apply")
    .arg(fixture("invalid.json"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("plan validation failed"));

  assert!(!data.path().join("state.json").exists());
}

#[test]
fn apply_requires_script_or_plan() {
  let data = TempDir::new().unwrap();
  enclave_cmd(&data).arg("apply").assert().failure();
}

// =============================================================================
// status
// =============================================================================

#[test]
#[serial]
fn status_without_state() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data)
    .arg("status")
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing recorded yet"));
}

#[test]
#[serial]
fn status_lists_applied_components() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data).arg("apply").arg(fixture("web.json")).assert().success();

  enclave_cmd(&data)
    .arg("status")
    .arg("--verbose")
    .assert()
    .success()
    .stdout(predicate::str::contains("Components: 2"))
    .stdout(predicate::str::contains("nginx:1.27"))
    .stdout(predicate::str::contains("persistent 'pgdata' (512.0 MB)"));
}

#[test]
#[serial]
fn status_json_output() {
  let data = TempDir::new().unwrap();

  enclave_cmd(&data).arg("apply").arg(fixture("web.json")).assert().success();

  enclave_cmd(&data)
    .arg("status")
    .arg("--json")
    .assert()
    .success()
    .stdout(predicate::str::contains("\"components\""))
    .stdout(predicate::str::contains("\"site\""));
}
