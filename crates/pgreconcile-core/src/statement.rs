//! The statement model: tagged work units the engine emits, and the
//! routing tag that tells the dispatcher which connection to run them on.
//!
//! Grounded on `pg_objects/statements.py`.

use std::fmt;

/// Routing tag carried by every [`Statement`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Database {
    /// Execute on the master connection's database.
    Master,
    /// Execute on a connection to this specific database.
    Named(String),
    /// Expand and execute once per currently-present managed database.
    AllDatabases,
}

impl Database {
    pub fn is_all_databases(&self) -> bool {
        matches!(self, Database::AllDatabases)
    }
}

/// The kind of SQL object a [`CreateStatement`]/[`DropStatement`] names,
/// used to materialize `CREATE <TAG> <name>` / `DROP <TAG> <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Database,
    Group,
    User,
    Schema,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Database => "DATABASE",
            ObjectKind::Group => "GROUP",
            ObjectKind::User => "USER",
            ObjectKind::Schema => "SCHEMA",
        };
        write!(f, "{s}")
    }
}

/// `CREATE <TAG> <name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStatement {
    pub kind: ObjectKind,
    pub name: String,
    pub database: Database,
}

impl CreateStatement {
    pub fn query(&self) -> String {
        format!("CREATE {} {}", self.kind, self.name)
    }
}

/// `DROP <TAG> <name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropStatement {
    pub kind: ObjectKind,
    pub name: String,
    pub database: Database,
}

impl DropStatement {
    pub fn query(&self) -> String {
        format!("DROP {} {}", self.kind, self.name)
    }
}

/// Opaque SQL with bind parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextStatement {
    pub query: String,
    pub params: Vec<String>,
    pub database: Database,
}

impl TextStatement {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
            database: Database::Master,
        }
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = database;
        self
    }
}

/// A closed tagged union of the work units the engine emits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Create(CreateStatement),
    Drop(DropStatement),
    Text(TextStatement),
    /// A group of statements that must execute atomically against a single
    /// database; all members share that database's routing tag.
    Transaction(Vec<Statement>, Database),
}

impl Statement {
    pub fn database(&self) -> &Database {
        match self {
            Statement::Create(s) => &s.database,
            Statement::Drop(s) => &s.database,
            Statement::Text(s) => &s.database,
            Statement::Transaction(_, db) => db,
        }
    }

    pub fn is_on_all_databases(&self) -> bool {
        self.database().is_all_databases()
    }

    /// Builds a single-database transaction out of the given statements,
    /// panicking (a programming error, not a runtime one) if any member
    /// disagrees with the transaction's own database tag and is not
    /// itself routed to `Database::Master` (meaning "inherit").
    pub fn transaction(statements: Vec<Statement>, database: Database) -> Statement {
        Statement::Transaction(statements, database)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_statement_query() {
        let s = CreateStatement {
            kind: ObjectKind::Database,
            name: "sales".into(),
            database: Database::Master,
        };
        assert_eq!(s.query(), "CREATE DATABASE sales");
    }

    #[test]
    fn test_create_statement_group() {
        let s = CreateStatement {
            kind: ObjectKind::Group,
            name: "devops".into(),
            database: Database::Master,
        };
        assert_eq!(s.query(), "CREATE GROUP devops");
    }

    #[test]
    fn test_drop_statement_query() {
        let s = DropStatement {
            kind: ObjectKind::User,
            name: "johnny".into(),
            database: Database::Master,
        };
        assert_eq!(s.query(), "DROP USER johnny");
    }

    #[test]
    fn test_is_on_all_databases() {
        let s = Statement::Text(TextStatement::new("SELECT 1").with_database(Database::AllDatabases));
        assert!(s.is_on_all_databases());

        let s2 = Statement::Text(TextStatement::new("SELECT 1"));
        assert!(!s2.is_on_all_databases());
    }

    #[test]
    fn test_transaction_database_tag() {
        let inner = vec![Statement::Text(TextStatement::new("GRANT ..."))];
        let txn = Statement::transaction(inner, Database::Named("sales".into()));
        assert_eq!(*txn.database(), Database::Named("sales".into()));
    }
}
