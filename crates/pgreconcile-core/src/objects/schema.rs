//! Schemas, schema ownership, schema-level privileges, and privileges on
//! all tables of a schema.
//!
//! Grounded on `pg_objects/objects/schema.py`.

use std::collections::BTreeSet;

use crate::objects::base::EmitResult;
use crate::privilege::{self, PrivilegeKind};
use crate::statement::{CreateStatement, Database as Routing, DropStatement, ObjectKind, Statement, TextStatement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub database: String,
    pub name: String,
    pub owner: Option<String>,
    pub present: bool,
}

impl Schema {
    pub fn key(&self) -> String {
        format!("Schema({}.{})", self.database, self.name)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        if !self.present {
            return Ok(Vec::new());
        }
        Ok(vec![Statement::Create(CreateStatement {
            kind: ObjectKind::Schema,
            name: self.name.clone(),
            database: Routing::Named(self.database.clone()),
        })])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Drop(DropStatement {
            kind: ObjectKind::Schema,
            name: self.name.clone(),
            database: Routing::Named(self.database.clone()),
        })])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaOwner {
    pub database: String,
    pub schema: String,
    pub owner: String,
    pub present: bool,
}

impl SchemaOwner {
    pub fn key(&self) -> String {
        format!("SchemaOwner({}.{}+{})", self.database, self.schema, self.owner)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        Ok(vec![Statement::Text(
            TextStatement::new(format!("ALTER SCHEMA {} OWNER TO {}", self.schema, self.owner))
                .with_database(Routing::Named(self.database.clone())),
        )])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPrivilege {
    pub database: String,
    pub schema: String,
    pub grantee: String,
    pub privileges: BTreeSet<privilege::SchemaPrivilege>,
    pub present: bool,
}

impl SchemaPrivilege {
    pub fn key(&self) -> String {
        format!(
            "SchemaPrivilege({}@{}.{}:{})",
            self.grantee,
            self.database,
            self.schema,
            privileges_to_key(&self.privileges)
        )
    }

    fn all() -> BTreeSet<privilege::SchemaPrivilege> {
        privilege::SchemaPrivilege::all().iter().copied().collect()
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        let db = Routing::Named(self.database.clone());
        let mut inner = Vec::new();
        if self.privileges != Self::all() {
            inner.push(Statement::Text(
                TextStatement::new(format!("REVOKE ALL ON SCHEMA {} FROM {}", self.schema, self.grantee))
                    .with_database(db.clone()),
            ));
        }
        inner.push(Statement::Text(
            TextStatement::new(format!(
                "GRANT {} ON SCHEMA {} TO {}",
                privileges_joined(&self.privileges),
                self.schema,
                self.grantee
            ))
            .with_database(db.clone()),
        ));
        Ok(vec![Statement::transaction(inner, db)])
    }

    /// Matches the original's drop behavior for plain schema privileges:
    /// it revokes everything rather than just the configured set (unlike
    /// `DatabasePrivilege`/`SchemaTablesPrivilege`, which revoke only the
    /// configured privileges on drop).
    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Text(
            TextStatement::new(format!("REVOKE ALL ON SCHEMA {} FROM {}", self.schema, self.grantee))
                .with_database(Routing::Named(self.database.clone())),
        )])
    }
}

/// Privileges on every table of a schema, with optional projection into a
/// default-privilege clause (see [`crate::objects::default_privilege`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTablesPrivilege {
    pub database: String,
    pub schema: String,
    pub grantee: String,
    pub privileges: BTreeSet<privilege::SchemaTablesPrivilege>,
    pub present: bool,
}

impl SchemaTablesPrivilege {
    pub fn key(&self) -> String {
        format!(
            "SchemaTablesPrivilege({}@{}.{}:{})",
            self.grantee,
            self.database,
            self.schema,
            privileges_to_key(&self.privileges)
        )
    }

    fn all() -> BTreeSet<privilege::SchemaTablesPrivilege> {
        privilege::SchemaTablesPrivilege::all().iter().copied().collect()
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        let db = Routing::Named(self.database.clone());
        let mut inner = Vec::new();
        if self.privileges != Self::all() {
            inner.push(Statement::Text(
                TextStatement::new(format!(
                    "REVOKE ALL ON ALL TABLES IN SCHEMA {} FROM {}",
                    self.schema, self.grantee
                ))
                .with_database(db.clone()),
            ));
        }
        inner.push(Statement::Text(
            TextStatement::new(format!(
                "GRANT {} ON ALL TABLES IN SCHEMA {} TO {}",
                privileges_joined(&self.privileges),
                self.schema,
                self.grantee
            ))
            .with_database(db.clone()),
        ));
        Ok(vec![Statement::transaction(inner, db)])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Text(
            TextStatement::new(format!(
                "REVOKE {} ON ALL TABLES IN SCHEMA {} FROM {}",
                privileges_joined(&self.privileges),
                self.schema,
                self.grantee
            ))
            .with_database(Routing::Named(self.database.clone())),
        )])
    }

    /// Builds the `GRANT|REVOKE ... ON TABLES TO|FROM <grantee>` clause a
    /// [`super::default_privilege::DefaultPrivilege`] wraps in
    /// `ALTER DEFAULT PRIVILEGES`.
    ///
    /// Pass an explicit `privileges`/`present` override to emit the
    /// revoke-all leg, which must name the full privilege set and REVOKE
    /// regardless of this object's own `present` flag.
    pub fn default_privilege_clause(
        &self,
        privileges: Option<&BTreeSet<privilege::SchemaTablesPrivilege>>,
        present: Option<bool>,
    ) -> String {
        let present = present.unwrap_or(self.present);
        let privileges = privileges.unwrap_or(&self.privileges);
        let verb = if present { "GRANT" } else { "REVOKE" };
        let prep = if present { "TO" } else { "FROM" };
        format!(
            "{verb} {} ON TABLES {prep} {}",
            privileges_joined(privileges),
            self.grantee
        )
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
    use privilege::SchemaTablesPrivilege as STP;

    #[test]
    fn test_schema_routed_to_database() {
        let s = Schema { database: "sales".into(), name: "private".into(), owner: None, present: true };
        let stmts = s.stmts_to_create().unwrap();
        assert_eq!(*stmts[0].database(), Routing::Named("sales".into()));
    }

    #[test]
    fn test_schema_tables_privilege_applies_to_all_tables() {
        let mut privileges = BTreeSet::new();
        privileges.insert(STP::Select);
        let p = SchemaTablesPrivilege {
            database: "sales".into(),
            schema: "private".into(),
            grantee: "datascience".into(),
            privileges,
            present: true,
        };
        let stmts = p.stmts_to_create().unwrap();
        match &stmts[0] {
            Statement::Transaction(inner, _) => {
                assert!(matches!(&inner.last().unwrap(), Statement::Text(t) if t.query.contains("ALL TABLES")));
            }
            _ => panic!(),
        }
    }

    #[test]
    fn test_default_privilege_clause_grant_vs_revoke() {
        let p = SchemaTablesPrivilege {
            database: "sales".into(),
            schema: "private".into(),
            grantee: "datascience".into(),
            privileges: SchemaTablesPrivilege::all(),
            present: true,
        };
        let grant = p.default_privilege_clause(None, None);
        assert!(grant.starts_with("GRANT"));
        assert!(grant.contains("TO datascience"));

        let revoke = p.default_privilege_clause(Some(&SchemaTablesPrivilege::all()), Some(false));
        assert!(revoke.starts_with("REVOKE"));
        assert!(revoke.contains("FROM datascience"));
    }
}
