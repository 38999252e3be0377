use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("expense-approvals"));
    cmd.arg("tests/fixtures/commands.csv")
        .arg("--directory")
        .arg("tests/fixtures/directory.json");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("expense,status,rejection_reason"))
        // Legacy unanimity
        .stdout(predicate::str::contains("1,APPROVED,"))
        // ceil(60% of 3) = 2 approvals
        .stdout(predicate::str::contains("2,APPROVED,"))
        .stdout(predicate::str::contains("3,REJECTED,Missing receipt"))
        .stdout(predicate::str::contains("4,PENDING,"));

    Ok(())
}

#[test]
fn test_cli_reports_bad_rows_and_continues() {
    let mut directory = NamedTempFile::new().unwrap();
    writeln!(
        directory,
        r#"{{"users": [{{"id": "erin", "role": "employee"}}, {{"id": "bob", "role": "manager"}}]}}"#
    )
    .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "type, expense, user, amount, sequence, comment").unwrap();
    writeln!(file, "submit, 1, erin, 30.0, ,").unwrap();
    writeln!(file, "escalate, 1, bob, , ,").unwrap(); // Unknown command type
    writeln!(file, "approve, 1, erin, , ,").unwrap(); // erin holds no slot
    writeln!(file, "submit, 2, erin, -5, ,").unwrap(); // Non-positive amount
    writeln!(file, "approve, 1, bob, , ,").unwrap();

    let mut cmd = Command::new(cargo_bin!("expense-approvals"));
    cmd.arg(file.path()).arg("--directory").arg(directory.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Error reading command"))
        .stderr(predicate::str::contains("Error processing command"))
        .stdout(predicate::str::contains("1,APPROVED,"))
        .stdout(predicate::str::contains("2,").not());
}

#[test]
fn test_cli_missing_input_fails() {
    let mut cmd = Command::new(cargo_bin!("expense-approvals"));
    cmd.arg("tests/fixtures/does_not_exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_cli_out_of_range_sequence_fails_only_its_submission() {
    let mut directory = NamedTempFile::new().unwrap();
    writeln!(
        directory,
        r#"{{"users": [{{"id": "erin", "role": "employee"}}, {{"id": "bob", "role": "manager"}}],
            "sequences": [{{"id": 9, "name": "Board", "min_approval_percentage": 300, "approvers": ["bob"]}}]}}"#
    )
    .unwrap();

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "type, expense, user, amount, sequence, comment").unwrap();
    writeln!(file, "submit, 1, erin, 30.0, 9,").unwrap();
    writeln!(file, "submit, 2, erin, 30.0, ,").unwrap();

    let mut cmd = Command::new(cargo_bin!("expense-approvals"));
    cmd.arg(file.path()).arg("--directory").arg(directory.path());

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("minimum approval percentage 300"))
        .stdout(predicate::str::contains("1,").not())
        .stdout(predicate::str::contains("2,PENDING,"));
}
