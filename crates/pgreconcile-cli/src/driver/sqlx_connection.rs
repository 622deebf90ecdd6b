//! sqlx-backed implementation of `pgreconcile_core::connection::Connection`.
//!
//! The core crate's `Connection` trait is synchronous (the reconciliation
//! algorithm is inherently sequential), so every method here bridges into a
//! `tokio::runtime::Runtime::block_on` call to give a sync entry point to
//! an async sqlx client.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo};
use tokio::runtime::Runtime;

use pgreconcile_core::connection::{log_query, QueryResult};
use pgreconcile_core::{Connection as CoreConnection, ReconcileError, Result as CoreResult};

/// One physical connection to one database, plus the credentials needed to
/// open further connections against the same server (used by
/// `clone_for_database`).
pub struct SqlxConnection {
    runtime: Arc<Runtime>,
    conn: sqlx::PgConnection,
    host: String,
    port: u16,
    username: String,
    password: String,
    database: String,
}

impl SqlxConnection {
    /// Opens the master connection, creating the runtime it and every
    /// connection cloned from it will share.
    pub fn connect(host: &str, port: u16, username: &str, password: &str, database: &str) -> Result<Self> {
        let runtime = Arc::new(Runtime::new().context("failed to create async runtime")?);
        let conn = runtime.block_on(open(host, port, username, password, database))?;
        Ok(Self {
            runtime,
            conn,
            host: host.to_string(),
            port,
            username: username.to_string(),
            password: password.to_string(),
            database: database.to_string(),
        })
    }
}

async fn open(host: &str, port: u16, username: &str, password: &str, database: &str) -> Result<sqlx::PgConnection> {
    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .username(username)
        .password(password)
        .database(database);
    options
        .connect()
        .await
        .with_context(|| format!("failed to connect to database {database:?} as {username:?}@{host}:{port}"))
}

/// Converts one sqlx row into the name-keyed map [`QueryResult`] expects.
/// Decoding falls back through common Postgres scalar types the way
/// `sqlx_provider::get_primary_key_from_row` tries bool then integer types,
/// since the columns returned by the catalog queries here are not known at
/// compile time.
fn row_to_map(row: &PgRow) -> pgreconcile_core::connection::Row {
    let mut map = pgreconcile_core::connection::Row::new();
    for (idx, col) in row.columns().iter().enumerate() {
        let value = column_to_json(row, idx, col.type_info().name());
        map.insert(col.name().to_string(), value);
    }
    map
}

fn column_to_json(row: &PgRow, idx: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).ok().flatten().map(Value::Bool),
        "INT2" | "INT4" => row
            .try_get::<Option<i32>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(idx).ok().flatten().map(Value::from),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => row
            .try_get::<Option<f64>, _>(idx)
            .ok()
            .flatten()
            .map(Value::from),
        "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String),
        // Array types used by the ACL loaders (`_aclitem`, `_text`, ...)
        // come back as already-formatted text via the cast queries this
        // crate issues, so they take the TEXT path; anything else decodes
        // to its text form as a last resort.
        _ => row
            .try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(Value::String),
    }
    .unwrap_or(Value::Null)
}

impl CoreConnection for SqlxConnection {
    fn database(&self) -> &str {
        &self.database
    }

    fn username(&self) -> &str {
        &self.username
    }

    fn host(&self) -> &str {
        &self.host
    }

    fn execute(&mut self, query: &str) -> CoreResult<QueryResult> {
        log_query(&self.database, query);
        let database = self.database.clone();
        let runtime = self.runtime.clone();
        let rows = runtime
            .block_on(sqlx::query(query).fetch_all(&mut self.conn))
            .map_err(|err| ReconcileError::StatementExecution {
                database,
                query: query.to_string(),
                message: err.to_string(),
            })?;
        Ok(QueryResult::new(rows.iter().map(row_to_map).collect()))
    }

    fn begin(&mut self) -> CoreResult<()> {
        self.execute("BEGIN").map(|_| ())
    }

    fn commit(&mut self) -> CoreResult<()> {
        self.execute("COMMIT").map(|_| ())
    }

    fn rollback(&mut self) -> CoreResult<()> {
        self.execute("ROLLBACK").map(|_| ())
    }

    fn close(&mut self) {
        // sqlx closes the physical connection when `PgConnection` drops;
        // nothing to flush synchronously here beyond that.
    }

    fn clone_for_database(&self, database: &str) -> CoreResult<Box<dyn CoreConnection>> {
        let conn = self
            .runtime
            .block_on(open(&self.host, self.port, &self.username, &self.password, database))
            .map_err(|err| ReconcileError::ObservedStateLoad(err.to_string()))?;
        Ok(Box::new(SqlxConnection {
            runtime: self.runtime.clone(),
            conn,
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: database.to_string(),
        }))
    }
}
