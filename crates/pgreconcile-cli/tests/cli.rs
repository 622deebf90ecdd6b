//! Black-box CLI tests that don't require a live cluster.
//!
//! Tests that exercise `inspect`/`apply` against a real PostgreSQL server
//! live under `tests/integration/`, behind the `postgres-integration`
//! feature.

use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pgreconcile"))
        .args(args)
        .output()
        .expect("failed to execute pgreconcile CLI")
}

#[test]
fn test_password_with_given_password_prints_md5() {
    let output = run(&["password", "alice", "--password", "hunter2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "expected exit 0, got: {stdout}");
    assert!(stdout.contains("username: alice"), "{stdout}");
    assert!(stdout.contains("password: hunter2"), "{stdout}");
    assert!(stdout.contains("md5: md5"), "{stdout}");
}

#[test]
fn test_password_generates_one_of_requested_length_when_omitted() {
    let output = run(&["password", "bob", "--length", "12"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "expected exit 0, got: {stdout}");
    let generated = stdout
        .lines()
        .find_map(|l| l.strip_prefix("password: "))
        .expect("password line present");
    assert_eq!(generated.len(), 12);
}

#[test]
fn test_password_same_username_and_password_yields_deterministic_hash() {
    let first = run(&["password", "carol", "--password", "s3cret"]);
    let second = run(&["password", "carol", "--password", "s3cret"]);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_missing_subcommand_is_a_usage_error() {
    let output = run(&[]);
    assert!(!output.status.success());
}

#[test]
fn test_unknown_subcommand_is_a_usage_error() {
    let output = run(&["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn test_help_lists_all_three_subcommands() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("inspect"));
    assert!(stdout.contains("apply"));
    assert!(stdout.contains("password"));
}
