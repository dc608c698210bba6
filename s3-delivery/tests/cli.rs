use assert_cmd::Command;
use predicates::prelude::*;
use std::fs::{self, write};
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

/// Creates a config file with credentials and the given extra YAML.
fn create_config(extra: &str) -> NamedTempFile {
    let config = NamedTempFile::new().expect("Creating temp config file failed");
    let yaml = format!(
        "credentials:\n  access_key_id: AKIATESTONLY\n  secret_access_key: test-secret\n{extra}"
    );
    write(config.path(), yaml).expect("Writing temp config failed");
    config
}

fn command() -> Command {
    let mut cmd = Command::cargo_bin("s3-delivery").expect("Binary exists");
    cmd.env_remove("RUST_LOG");
    cmd
}

fn staged_prefix(dataset: &str) -> String {
    format!("delivery/dataset={dataset}/status=staged/delivery-date=")
}

#[test]
fn upload_dry_run_lists_every_key_and_succeeds() {
    let config = create_config("");
    let data = tempdir().unwrap();
    write(data.path().join("campaigns.csv"), "id,spend\n1,10\n").unwrap();
    fs::create_dir(data.path().join("march")).unwrap();
    write(data.path().join("march").join("social.csv"), "").unwrap();

    command()
        .arg("--config")
        .arg(config.path())
        .arg("upload")
        .arg("winistry")
        .arg(data.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Would upload")
                .and(predicate::str::contains(staged_prefix("winistry")))
                .and(predicate::str::contains("/campaigns.csv"))
                .and(predicate::str::contains("/march/social.csv"))
                .and(predicate::str::contains("Delivered 2 file(s), 0 failed (dry run)")),
        );
}

#[test]
fn missing_config_fails_before_any_upload() {
    let data = tempdir().unwrap();
    write(data.path().join("campaigns.csv"), "id\n1\n").unwrap();

    command()
        .arg("--config")
        .arg(data.path().join("absent.yaml"))
        .arg("upload")
        .arg("sparkloft")
        .arg(data.path())
        .arg("-n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stdout(predicate::str::contains("Would upload").not());
}

#[test]
fn unknown_dataset_is_rejected() {
    let config = create_config("");
    let data = tempdir().unwrap();

    command()
        .arg("--config")
        .arg(config.path())
        .arg("upload")
        .arg("facebook")
        .arg(data.path())
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("winistry"));
}

#[test]
fn dashboard_dry_run_reports_missing_files_and_exits_non_zero() {
    let data = tempdir().unwrap();
    let present = data.path().join("Monthly Data Report.csv");
    write(&present, "month,visits\n2025-01,100\n").unwrap();
    let missing = data.path().join("KPI Dashboard.xlsx");
    let config = create_config(&format!(
        "dashboard:\n  - path: {}\n    dataset: winistry\n    description: KPI Dashboard\n  - path: {}\n    dataset: sparkloft\n",
        yaml_path(&missing),
        yaml_path(&present),
    ));

    command()
        .arg("--config")
        .arg(config.path())
        .arg("upload-dashboard")
        .arg("--dry-run")
        .assert()
        .failure()
        .stdout(
            predicate::str::contains(staged_prefix("sparkloft"))
                .and(predicate::str::contains("Monthly Data Report.csv"))
                .and(predicate::str::contains("FAILED"))
                .and(predicate::str::contains("KPI Dashboard.xlsx")),
        );
}

#[test]
fn dashboard_without_entries_has_nothing_to_do() {
    let config = create_config("");

    command()
        .arg("--config")
        .arg(config.path())
        .arg("upload-dashboard")
        .arg("-n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to deliver."));
}

fn yaml_path(path: &Path) -> String {
    format!("{:?}", path.display().to_string())
}
