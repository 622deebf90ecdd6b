//! The connection abstraction the engine executes statements through, plus
//! the query-logging and redaction policy every execution path shares.
//!
//! Grounded on `pg_objects/connection.py`. The core crate only defines the
//! trait; a concrete driver (sqlx-backed, in the CLI crate) provides the
//! implementation.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::{ReconcileError, Result};

/// Query prefixes (case-insensitive, checked against the first 30
/// characters) that get logged at `warn` instead of `debug`, since they
/// mutate cluster state.
const KEY_QUERIES: &[&str] = &["drop ", "create ", "grant ", "revoke ", "alter "];

fn password_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(password\s+['"])([^'"]+)(['"])"#).expect("valid regex")
    })
}

/// Collapses a multi-line, indented SQL string into one line and redacts
/// any `password '...'` literal it contains.
pub fn format_query(query: &str) -> String {
    let collapsed = query
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    password_regex()
        .replace_all(&collapsed, "$1***$3")
        .into_owned()
}

/// Logs a query at `warn` if it begins with a cluster-mutating keyword,
/// `debug` otherwise.
pub fn log_query(database: &str, query: &str) {
    let head: String = query.trim().chars().take(30).collect();
    let head = head.to_lowercase();
    let formatted = format!("{database:>15}: {}", format_query(query));

    let is_key_query = KEY_QUERIES.iter().any(|kw| head.contains(kw));

    #[cfg(feature = "tracing")]
    {
        if is_key_query {
            tracing::warn!("{formatted}");
        } else {
            tracing::debug!("{formatted}");
        }
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = (is_key_query, formatted);
    }
}

/// One row of a query result, keyed by column name.
pub type Row = std::collections::HashMap<String, Value>;

/// The rows returned by a single [`Connection::execute`] call.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Returns the requested columns from every row.
    pub fn get_all(&self, columns: &[&str]) -> Vec<Vec<Value>> {
        self.rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(*c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }

    /// Returns the requested columns from the single row expected, or
    /// `None` if there were no rows.
    ///
    /// Mirrors `connection.py::Result.get_one`: more than one row is a
    /// caller error, not an absent-value case.
    pub fn get_one(&self, columns: &[&str]) -> Result<Option<Vec<Value>>> {
        match self.rows.len() {
            0 => Ok(None),
            1 => Ok(Some(self.get_all(columns).remove(0))),
            count => Err(ReconcileError::MultipleRows { count }),
        }
    }

    /// Returns the single scalar value of the single row and column
    /// expected.
    pub fn scalar(&self) -> Result<Value> {
        match self.rows.len() {
            1 => Ok(self
                .rows[0]
                .values()
                .next()
                .cloned()
                .unwrap_or(Value::Null)),
            count => Err(ReconcileError::MultipleRows { count }),
        }
    }
}

/// A connection to one PostgreSQL database, either the master (cluster
/// catalog) connection or a per-database one.
///
/// Implementations are synchronous: the engine's reconciliation algorithm
/// is inherently sequential (statements must run in dependency order), so
/// there is nothing to gain from async plumbing in the core crate. A
/// driver backed by an async client bridges with its own runtime instead.
pub trait Connection {
    /// The database name this connection is attached to.
    fn database(&self) -> &str;

    fn username(&self) -> &str;

    fn host(&self) -> &str;

    /// Executes `query`, logging it per [`log_query`] first.
    fn execute(&mut self, query: &str) -> Result<QueryResult>;

    /// Begins a transaction; statements run via the returned handle are
    /// committed together on success or rolled back on the first error.
    fn begin(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Idempotent: a second call on an already-closed connection is a
    /// no-op.
    fn close(&mut self);

    /// Creates a new connection to `database`, reusing this connection's
    /// host, port, and credentials. Grounded on
    /// `connection.py::Connection.clone`.
    fn clone_for_database(&self, database: &str) -> Result<Box<dyn Connection>>;
}

/// Caches one connection per database, cloned lazily from the master
/// connection on first use. Grounded on the `ConnectionManager` referenced
/// throughout `pg_objects/setup.py` and `state.py`.
pub struct ConnectionManager {
    master: Box<dyn Connection>,
    cache: std::collections::HashMap<String, Box<dyn Connection>>,
}

impl ConnectionManager {
    pub fn new(master: Box<dyn Connection>) -> Self {
        Self {
            master,
            cache: std::collections::HashMap::new(),
        }
    }

    pub fn master(&mut self) -> &mut dyn Connection {
        self.master.as_mut()
    }

    pub fn master_database(&self) -> &str {
        self.master.database()
    }

    pub fn master_username(&self) -> &str {
        self.master.username()
    }

    /// Returns the cached connection to `database`, opening and caching
    /// one if this is the first request for it. Requests for the master
    /// database return the master connection itself.
    pub fn database(&mut self, database: &str) -> Result<&mut dyn Connection> {
        if database == self.master.database() {
            return Ok(self.master.as_mut());
        }
        if !self.cache.contains_key(database) {
            let conn = self.master.clone_for_database(database)?;
            self.cache.insert(database.to_string(), conn);
        }
        Ok(self.cache.get_mut(database).unwrap().as_mut())
    }

    /// Closes and evicts the cached connection to `database`, if any.
    /// Must be called before a `DROP DATABASE` targeting it (§4.7).
    pub fn close_database(&mut self, database: &str) {
        if let Some(mut conn) = self.cache.remove(database) {
            conn.close();
        }
    }

    /// Closes every cached connection and the master connection.
    pub fn close_all(&mut self) {
        for (_, mut conn) in self.cache.drain() {
            conn.close();
        }
        self.master.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_query_collapses_whitespace() {
        let query = "\n    SELECT 1\n    FROM foo\n";
        assert_eq!(format_query(query), "SELECT 1 FROM foo");
    }

    #[test]
    fn test_format_query_redacts_password_single_quotes() {
        let query = "ALTER USER alice WITH PASSWORD 'hunter2'";
        assert_eq!(
            format_query(query),
            "ALTER USER alice WITH PASSWORD '***'"
        );
    }

    #[test]
    fn test_format_query_redacts_password_case_insensitive() {
        let query = "alter user alice with Password \"hunter2\"";
        assert!(!format_query(query).contains("hunter2"));
    }

    #[test]
    fn test_query_result_get_one_multiple_rows_errors() {
        let mut row = Row::new();
        row.insert("name".to_string(), Value::String("a".to_string()));
        let qr = QueryResult::new(vec![row.clone(), row]);
        assert!(matches!(
            qr.get_one(&["name"]),
            Err(ReconcileError::MultipleRows { count: 2 })
        ));
    }

    #[test]
    fn test_query_result_get_one_no_rows() {
        let qr = QueryResult::new(vec![]);
        assert_eq!(qr.get_one(&["name"]).unwrap(), None);
    }

    struct FakeConnection {
        database: String,
        closed: bool,
    }

    impl Connection for FakeConnection {
        fn database(&self) -> &str {
            &self.database
        }
        fn username(&self) -> &str {
            "admin"
        }
        fn host(&self) -> &str {
            "localhost"
        }
        fn execute(&mut self, _query: &str) -> Result<QueryResult> {
            Ok(QueryResult::default())
        }
        fn begin(&mut self) -> Result<()> {
            Ok(())
        }
        fn commit(&mut self) -> Result<()> {
            Ok(())
        }
        fn rollback(&mut self) -> Result<()> {
            Ok(())
        }
        fn close(&mut self) {
            self.closed = true;
        }
        fn clone_for_database(&self, database: &str) -> Result<Box<dyn Connection>> {
            Ok(Box::new(FakeConnection {
                database: database.to_string(),
                closed: false,
            }))
        }
    }

    #[test]
    fn test_connection_manager_caches_per_database() {
        let master = Box::new(FakeConnection { database: "postgres".into(), closed: false });
        let mut mgr = ConnectionManager::new(master);
        assert_eq!(mgr.database("postgres").unwrap().database(), "postgres");
        assert_eq!(mgr.database("sales").unwrap().database(), "sales");
        // Second request for the same database reuses the cached entry
        // rather than cloning again (observable via object identity would
        // require PartialEq; here we just confirm no panic/error on reuse).
        assert_eq!(mgr.database("sales").unwrap().database(), "sales");
    }

    #[test]
    fn test_connection_manager_close_database_evicts_cache() {
        let master = Box::new(FakeConnection { database: "postgres".into(), closed: false });
        let mut mgr = ConnectionManager::new(master);
        mgr.database("sales").unwrap();
        mgr.close_database("sales");
        assert!(!mgr.cache.contains_key("sales"));
    }
}
