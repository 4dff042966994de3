//! End-to-end tests for the nhsync binary
//!
//! Everything runs with `--dry-run` or `plan`, so no tenant is contacted.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PROVIDERS: &str = "\
CMS Certification Number (CCN),Provider Name,State,County/Parish,Number of Certified Beds
015009,BURNS NURSING HOME,AL,Franklin,57
035001,SUNVIEW CARE,AZ,Maricopa,120
295002,DESERT SPRINGS,NV,Clark,90
";

fn shipped_metadata() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../data/metadata.json")
}

fn nhsync(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("nhsync").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("CONSUMER_KEY")
        .env_remove("CONSUMER_SECRET")
        .env_remove("DOMAIN")
        .env_remove("NHSYNC_STATES")
        .env("LOG_LEVEL", "warn");
    cmd
}

#[test]
fn test_plan_prints_descriptors() {
    let dir = TempDir::new().unwrap();

    nhsync(&dir)
        .arg("plan")
        .arg("--metadata")
        .arg(shipped_metadata())
        .assert()
        .success()
        .stdout(predicate::str::contains("CCN__c"))
        .stdout(predicate::str::contains("length=50, unique, external id"))
        .stdout(predicate::str::contains("Provider_Changed_O_I_L_12_M__c"))
        .stdout(predicate::str::contains("BillingPostalCode"));
}

#[test]
fn test_dry_run_sync_writes_summary() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("providers.csv");
    std::fs::write(&csv, PROVIDERS).unwrap();
    let summary_path = dir.path().join("summary.json");

    nhsync(&dir)
        .arg("--dry-run")
        .arg("--metadata")
        .arg(shipped_metadata())
        .arg("--summary-json")
        .arg(&summary_path)
        .arg("sync")
        .arg("--csv-path")
        .arg(&csv)
        .arg("--delay-seconds")
        .arg("0")
        .arg("--delay-ms")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("Field Creation Summary"))
        .stdout(predicate::str::contains("Account Load Summary"));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["load"]["created"].as_array().unwrap().len(), 2);
    assert!(summary["provision"]["failed"].as_array().unwrap().is_empty());
}

#[test]
fn test_field_failure_sets_exit_code() {
    let dir = TempDir::new().unwrap();
    let metadata = dir.path().join("metadata.json");
    std::fs::write(
        &metadata,
        r#"{"columns": {"fields": {"Chain Name": "text", "Weird Column": "foo"}}}"#,
    )
    .unwrap();

    nhsync(&dir)
        .args(["--dry-run", "provision", "--delay-seconds", "0", "--metadata"])
        .arg(&metadata)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Weird_Column__c: Unknown field type"));
}

#[test]
fn test_malformed_metadata_is_fatal() {
    let dir = TempDir::new().unwrap();
    let metadata = dir.path().join("metadata.json");
    std::fs::write(&metadata, r#"{"columns": {"fields": {"Chain Name": 7}}}"#).unwrap();

    nhsync(&dir)
        .args(["--dry-run", "provision", "--metadata"])
        .arg(&metadata)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a string"));
}

#[test]
fn test_live_run_requires_credentials() {
    let dir = TempDir::new().unwrap();

    nhsync(&dir)
        .arg("provision")
        .arg("--metadata")
        .arg(shipped_metadata())
        .assert()
        .failure()
        .stderr(predicate::str::contains("is not set"));
}

#[test]
fn test_aborted_sync_still_reports_provisioning() {
    let dir = TempDir::new().unwrap();
    let csv = dir.path().join("providers.csv");
    std::fs::write(&csv, "CMS Certification Number (CCN),Provider Name\n035001,SUNVIEW\n").unwrap();
    let summary_path = dir.path().join("summary.json");

    nhsync(&dir)
        .arg("--dry-run")
        .arg("--metadata")
        .arg(shipped_metadata())
        .arg("--summary-json")
        .arg(&summary_path)
        .args(["sync", "--delay-seconds", "0", "--delay-ms", "0", "--csv-path"])
        .arg(&csv)
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Field Creation Summary"))
        .stderr(predicate::str::contains("Load aborted"));

    let summary: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert!(!summary["provision"]["created"].as_array().unwrap().is_empty());
    assert!(summary.get("load").is_none());
    assert!(summary["aborted"].as_str().unwrap().contains("State"));
}
