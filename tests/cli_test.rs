use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn base_args(cmd: &mut Command, script: &std::path::Path) {
    cmd.arg(script).args([
        "--domain",
        "foo.co.ke",
        "--owner",
        "user-1",
        "--phone",
        "0712345678",
        "--amount",
        "500",
        "--confirmation-timeout-ms",
        "5000",
    ]);
}

#[test]
fn test_cli_confirmed_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "ack, , CO1, ,").unwrap();
    writeln!(file, "deliver, 50, CO1, 0,").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    base_args(&mut cmd, file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("outcome: confirmed"))
        .stdout(predicate::str::contains("domain,owner,booked_at,expires_at"))
        .stdout(predicate::str::contains("foo.co.ke,user-1,"));
}

#[test]
fn test_cli_declined_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "ack, , CO2, ,").unwrap();
    writeln!(file, "deliver, 50, CO2, 1, Insufficient funds").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    base_args(&mut cmd, file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "outcome: failed (payment declined: Insufficient funds)",
        ))
        // No booking row after the header.
        .stdout(predicate::str::contains("foo.co.ke").not());
}

#[test]
fn test_cli_timeout_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "silence, , , ,").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    cmd.arg(file.path()).args([
        "--domain",
        "foo.co.ke",
        "--owner",
        "user-1",
        "--phone",
        "0712345678",
        "--amount",
        "500",
        "--confirmation-timeout-ms",
        "300",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("no confirmation arrived in time"))
        .stdout(predicate::str::contains("check your M-PESA messages"));
}

#[test]
fn test_cli_gateway_rejection_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "reject, , , , Merchant not onboarded").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    base_args(&mut cmd, file.path());

    cmd.assert().success().stdout(predicate::str::contains(
        "outcome: failed (payment gateway rejected the charge: Merchant not onboarded)",
    ));
}

#[test]
fn test_cli_reconnect_flow() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "ack, , CO4, ,").unwrap();
    writeln!(file, "close, 20, , ,").unwrap();
    writeln!(file, "deliver, 20, CO4, 0,").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    base_args(&mut cmd, file.path());

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("outcome: confirmed"));
}

#[test]
fn test_cli_rejects_invalid_input() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    cmd.arg(file.path()).args([
        "--domain",
        "foo.com",
        "--owner",
        "user-1",
        "--phone",
        "0712345678",
        "--amount",
        "500",
    ]);

    cmd.assert().failure();
}

#[test]
fn test_cli_skips_malformed_script_rows() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "event, delay_ms, correlation_id, result_code, reason").unwrap();
    writeln!(file, "ack, , CO5, ,").unwrap();
    writeln!(file, "explode, , , ,").unwrap();
    writeln!(file, "deliver, 50, CO5, 0,").unwrap();

    let mut cmd = Command::new(cargo_bin!("booking-reconciler"));
    base_args(&mut cmd, file.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading script row"))
        .stdout(predicate::str::contains("outcome: confirmed"));
}
