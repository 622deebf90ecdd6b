//! Exercises `inspect`/`apply` end-to-end against a real server.
//!
//! Connection details come from `PGO_*` env vars, matching the CLI's own
//! default prefix; point them at a disposable database before running.

use crate::{run_cli, run_cli_success};

fn env_prefix_args() -> Vec<(&'static str, &'static str)> {
    Vec::new()
}

#[test]
fn test_inspect_fresh_cluster_lists_implicit_objects_only() {
    let _ = env_prefix_args();
    let definition = r#"{"objects": []}"#;
    let output = run_cli_success(&["inspect", definition]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Group(public)"));
    assert!(stdout.contains("User("));
}

#[test]
fn test_inspect_no_current_state_blanks_state_column() {
    let definition = r#"{"objects": [{"type": "Group", "name": "devops"}]}"#;
    let output = run_cli_success(&["inspect", definition, "--no-current-state"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Group(devops)"));
}

#[test]
fn test_apply_dry_run_creates_nothing() {
    let definition = r#"{"objects": [{"type": "Group", "name": "devops_dry_run_probe"}]}"#;
    let output = run_cli_success(&["apply", definition, "--dry-run"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("CREATE GROUP devops_dry_run_probe"));

    let inspect = run_cli(&["inspect", r#"{"objects": []}"#]);
    let inspect_stdout = String::from_utf8_lossy(&inspect.stdout);
    assert!(!inspect_stdout.contains("devops_dry_run_probe"));
}

#[test]
fn test_apply_fresh_install_then_idempotent_rerun() {
    let definition = r#"{
        "objects": [
            {"type": "Group", "name": "devops_it_probe"},
            {"type": "Database", "name": "sales_it_probe", "owner": "devops_it_probe"}
        ]
    }"#;
    run_cli_success(&["apply", definition]);
    let second = run_cli_success(&["apply", definition]);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(!stdout.is_empty() || second.status.success());

    run_cli_success(&["apply", r#"{"objects": [
        {"type": "Database", "name": "sales_it_probe", "present": false},
        {"type": "Group", "name": "devops_it_probe", "present": false}
    ]}"#]);
}
