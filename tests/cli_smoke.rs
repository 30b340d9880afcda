//! Behavioural smoke tests for the binary entrypoint.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn help_lists_required_variables() {
    let mut cmd = cargo_bin_cmd!("oci-poller");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("OCI_COMPARTMENT_ID"));
}

#[test]
fn missing_configuration_fails_before_polling() {
    let workdir = TempDir::new().expect("temp dir");
    let mut cmd = cargo_bin_cmd!("oci-poller");
    cmd.current_dir(workdir.path())
        .env_clear()
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("OCI_IMAGE_ID"));
}

#[test]
fn env_file_supplies_configuration() {
    let workdir = TempDir::new().expect("temp dir");
    std::fs::write(
        workdir.path().join(".env"),
        "OCI_IMAGE_ID=ocid1.image\nOCI_COMPARTMENT_ID=ocid1.compartment\n",
    )
    .expect("write .env");

    let mut cmd = cargo_bin_cmd!("oci-poller");
    cmd.current_dir(workdir.path())
        .env_clear()
        .env("RUST_LOG", "off")
        .assert()
        .failure()
        .stderr(predicate::str::contains("OCI_SUBNET_ID"))
        .stderr(predicate::str::contains("OCI_IMAGE_ID").not());
}
