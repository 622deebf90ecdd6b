//! pg-reconcile CLI - declarative PostgreSQL cluster object reconciler.

mod cli;
mod definition;
mod driver;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::OsRng;

use cli::{Cli, Command};
use driver::SqlxConnection;
use pgreconcile_core::password;
use pgreconcile_core::ConnectionManager;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("pgreconcile: error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    configure_logging(&cli.log_level);

    match &cli.command {
        Command::Inspect { definition, no_current_state } => {
            run_inspect(&cli.env_prefix, definition, !*no_current_state)
        }
        Command::Apply { definition, dry_run } => run_apply(&cli.env_prefix, definition, *dry_run),
        Command::Password { username, password, length } => run_password(username, password.as_deref(), *length),
    }
}

fn configure_logging(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

struct ConnectionDetails {
    host: String,
    port: u16,
    database: String,
    username: String,
    password: String,
}

/// Reads connection details from `{prefix}HOST`/`{prefix}PORT`/etc.,
/// supplementing the original's single `{prefix}USER` lookup with a
/// `{prefix}USERNAME` fallback.
fn connection_details_from_env(prefix: &str) -> ConnectionDetails {
    let var = |suffix: &str| std::env::var(format!("{prefix}{suffix}")).ok();
    ConnectionDetails {
        host: var("HOST").unwrap_or_else(|| "localhost".to_string()),
        port: var("PORT").and_then(|p| p.parse().ok()).unwrap_or(5432),
        database: var("DATABASE").unwrap_or_else(|| "postgres".to_string()),
        username: var("USER").or_else(|| var("USERNAME")).unwrap_or_default(),
        password: var("PASSWORD").unwrap_or_default(),
    }
}

fn open_setup(env_prefix: &str, definition_json: &str) -> Result<pgreconcile_core::Setup> {
    let details = connection_details_from_env(env_prefix);
    let master = SqlxConnection::connect(
        &details.host,
        details.port,
        &details.username,
        &details.password,
        &details.database,
    )
    .context("failed to open master connection")?;
    let mut setup = pgreconcile_core::Setup::new(ConnectionManager::new(Box::new(master)));
    definition::load_definition(&mut setup, definition_json)?;
    Ok(setup)
}

/// Prints the topological order with each object's classified state.
/// `load_current_state` mirrors `Setup.inspect`'s own flag: when `false`,
/// the master connection is still opened (it backs the registry itself)
/// but no observed-state query is ever issued, and the state column is
/// left blank for every object.
fn run_inspect(env_prefix: &str, definition_json: &str, load_current_state: bool) -> Result<()> {
    let mut setup = open_setup(env_prefix, definition_json)?;
    for (index, present, state, key) in setup.inspect(load_current_state)? {
        println!("{index:>3}. [{}] {:<10} {key}", if present { "present" } else { "absent " }, state);
    }
    Ok(())
}

fn run_apply(env_prefix: &str, definition_json: &str, dry_run: bool) -> Result<()> {
    let mut setup = open_setup(env_prefix, definition_json)?;
    let stmts = setup.execute(dry_run)?;
    if dry_run {
        for stmt in describe_statements(&stmts) {
            println!("{stmt}");
        }
    }
    Ok(())
}

/// Dry-run's only externally visible behavior is this log, so every line
/// goes through the same redaction policy as the execution path's query
/// logging, rather than printing statement text straight through.
fn describe_statements(stmts: &[pgreconcile_core::Statement]) -> Vec<String> {
    use pgreconcile_core::connection::format_query;
    use pgreconcile_core::Statement;
    stmts
        .iter()
        .flat_map(|s| match s {
            Statement::Create(c) => vec![format_query(&c.query())],
            Statement::Drop(d) => vec![format_query(&d.query())],
            Statement::Text(t) => vec![format_query(&t.query)],
            Statement::Transaction(inner, _) => describe_statements(inner),
        })
        .collect()
}

fn run_password(username: &str, given_password: Option<&str>, length: usize) -> Result<()> {
    let plaintext = match given_password {
        Some(p) => p.to_string(),
        None => password::generate_password(length, &mut OsRng),
    };
    let hash = password::password_md5(username, &plaintext);
    println!("username: {username}");
    println!("password: {plaintext}");
    println!("md5: {hash}");
    Ok(())
}
