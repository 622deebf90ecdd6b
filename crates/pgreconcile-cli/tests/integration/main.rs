//! Integration tests that reconcile against a real PostgreSQL server.
//!
//! Behind the `postgres-integration` feature, so `cargo test` skips these
//! by default; run with `cargo test --features postgres-integration`
//! against a disposable cluster reachable via `PGO_*` env vars (or the
//! `TEST_POSTGRES_*` overrides below).

#![cfg(feature = "postgres-integration")]

mod postgres;

use std::process::{Command, Output};

pub fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pgreconcile"))
        .args(args)
        .output()
        .expect("failed to execute pgreconcile CLI")
}

pub fn run_cli_success(args: &[&str]) -> Output {
    let output = run_cli(args);
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        panic!(
            "pgreconcile failed with status {:?}\nstderr: {stderr}\nstdout: {stdout}",
            output.status.code()
        );
    }
    output
}
