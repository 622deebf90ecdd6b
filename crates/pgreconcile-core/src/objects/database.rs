//! Databases, database ownership, and database-level privileges.
//!
//! Grounded on `pg_objects/objects/database.py`.

use std::collections::BTreeSet;

use crate::objects::base::EmitResult;
use crate::privilege;
use crate::statement::{CreateStatement, Database as Routing, DropStatement, ObjectKind, Statement, TextStatement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Database {
    pub name: String,
    pub owner: Option<String>,
    pub present: bool,
}

impl Database {
    pub fn key(&self) -> String {
        format!("Database({})", self.name)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        if !self.present {
            return Ok(Vec::new());
        }
        Ok(vec![Statement::Create(CreateStatement {
            kind: ObjectKind::Database,
            name: self.name.clone(),
            database: Routing::Master,
        })])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Drop(DropStatement {
            kind: ObjectKind::Database,
            name: self.name.clone(),
            database: Routing::Master,
        })])
    }

    /// We do not allow public access to managed databases. This has to
    /// run every pass since a freshly created database starts with
    /// default public privileges that observed state was never loaded
    /// for (the database didn't exist at load time).
    pub fn stmts_to_maintain(&self) -> EmitResult {
        if !self.present {
            return Ok(Vec::new());
        }
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "REVOKE ALL PRIVILEGES ON DATABASE {} FROM GROUP public",
            self.name
        )))])
    }
}

/// The link between a [`Database`] and its owning role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseOwner {
    pub database: String,
    pub owner: String,
    pub present: bool,
}

impl DatabaseOwner {
    pub fn key(&self) -> String {
        format!("DatabaseOwner({}+{})", self.database, self.owner)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "ALTER DATABASE {} OWNER TO {}",
            self.database, self.owner
        )))])
    }
}

/// A grant of database-level privileges to one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabasePrivilege {
    pub database: String,
    pub grantee: String,
    pub privileges: BTreeSet<privilege::DatabasePrivilege>,
    pub present: bool,
}

impl DatabasePrivilege {
    pub fn key(&self) -> String {
        format!(
            "DatabasePrivilege({}@{}:{})",
            self.grantee,
            self.database,
            privileges_to_key(&self.privileges),
        )
    }

    fn all() -> BTreeSet<privilege::DatabasePrivilege> {
        use privilege::PrivilegeKind;
        privilege::DatabasePrivilege::all().iter().copied().collect()
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        let mut inner = Vec::new();
        if self.privileges != Self::all() {
            inner.push(Statement::Text(TextStatement::new(format!(
                "REVOKE ALL ON DATABASE {} FROM {}",
                self.database, self.grantee
            ))));
        }
        inner.push(Statement::Text(TextStatement::new(format!(
            "GRANT {} ON DATABASE {} TO {}",
            privileges_joined(&self.privileges),
            self.database,
            self.grantee
        ))));
        Ok(vec![Statement::transaction(inner, Routing::Master)])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "REVOKE {} ON DATABASE {} FROM {}",
            privileges_joined(&self.privileges),
            self.database,
            self.grantee
        )))])
    }
}

fn privileges_joined<P: ToString + Ord>(privileges: &BTreeSet<P>) -> String {
    privileges
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn privileges_to_key<P: ToString + Ord>(privileges: &BTreeSet<P>) -> String {
    privileges
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use privilege::DatabasePrivilege as DP;

    #[test]
    fn test_database_create_and_maintain() {
        let db = Database { name: "sales".into(), owner: Some("devops".into()), present: true };
        let create = db.stmts_to_create().unwrap();
        assert_eq!(create.len(), 1);
        let maintain = db.stmts_to_maintain().unwrap();
        match &maintain[0] {
            Statement::Text(t) => assert!(t.query.contains("REVOKE ALL PRIVILEGES")),
            _ => panic!(),
        }
    }

    #[test]
    fn test_database_owner_statement() {
        let owner = DatabaseOwner { database: "sales".into(), owner: "devops".into(), present: true };
        assert_eq!(owner.key(), "DatabaseOwner(sales+devops)");
        match &owner.stmts_to_create().unwrap()[0] {
            Statement::Text(t) => assert_eq!(t.query, "ALTER DATABASE sales OWNER TO devops"),
            _ => panic!(),
        }
    }

    #[test]
    fn test_database_privilege_partial_revokes_first() {
        let mut privileges = BTreeSet::new();
        privileges.insert(DP::Connect);
        privileges.insert(DP::Temporary);
        let p = DatabasePrivilege { database: "sales".into(), grantee: "datascience".into(), privileges, present: true };
        let stmts = p.stmts_to_create().unwrap();
        match &stmts[0] {
            Statement::Transaction(inner, _) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(&inner[0], Statement::Text(t) if t.query.starts_with("REVOKE ALL")));
            }
            _ => panic!("expected transaction"),
        }
    }

    #[test]
    fn test_database_privilege_full_set_skips_revoke() {
        let p = DatabasePrivilege { database: "sales".into(), grantee: "datascience".into(), privileges: DatabasePrivilege::all(), present: true };
        let stmts = p.stmts_to_create().unwrap();
        match &stmts[0] {
            Statement::Transaction(inner, _) => assert_eq!(inner.len(), 1),
            _ => panic!("expected transaction"),
        }
    }
}
