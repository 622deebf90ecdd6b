//! Default privileges: a rule that future objects a grantor creates in a
//! schema automatically receive a privilege set for a grantee.
//!
//! Grounded on `pg_objects/objects/default_privilege.py`. The original
//! stores a direct reference to the target `SchemaTablesPrivilege`
//! instance; here the target is addressed by its registry key and
//! resolved through the [`crate::objects::Registry`] at emission time,
//! since the tagged-union object model has no place for an object to
//! hold a live reference to another.

use crate::error::ReconcileError;
use crate::objects::base::EmitResult;
use crate::objects::schema::SchemaTablesPrivilege;
use crate::statement::{Database as Routing, Statement, TextStatement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultPrivilege {
    /// Key of the registered [`SchemaTablesPrivilege`] this rule projects.
    pub target_key: String,
    pub grantor: String,
    pub present: bool,
}

impl DefaultPrivilege {
    pub fn key(&self) -> String {
        format!("DefaultPrivilege({}:{})", self.grantor, self.target_key)
    }

    fn revoke_all_stmt(&self, target: &SchemaTablesPrivilege) -> crate::error::Result<Statement> {
        let schema_sql = Self::schema_clause(target)?;
        let clause = target.default_privilege_clause(Some(&SchemaTablesPrivilege::all_privileges()), Some(false));
        Ok(Statement::Text(
            TextStatement::new(format!(
                "ALTER DEFAULT PRIVILEGES FOR ROLE {} {schema_sql} {clause}",
                self.grantor
            ))
            .with_database(Routing::Named(target.database.clone())),
        ))
    }

    fn schema_clause(target: &SchemaTablesPrivilege) -> crate::error::Result<String> {
        if target.schema.is_empty() {
            // Global default privileges (no schema) are not supported yet;
            // see the design notes' unsupported-configuration error.
            return Err(ReconcileError::UnsupportedState(
                "global default privileges are not supported; a schema is required".to_string(),
            ));
        }
        Ok(format!("IN SCHEMA {}", target.schema))
    }

    /// First revokes all matching default privileges for the grantor in
    /// the schema, then grants the configured set. Wrapped in a
    /// transaction so the clean slate and the new grant apply atomically.
    pub fn stmts_to_maintain(&self, target: &SchemaTablesPrivilege) -> EmitResult {
        let revoke_all = self.revoke_all_stmt(target)?;
        let schema_sql = Self::schema_clause(target)?;
        let grant = Statement::Text(
            TextStatement::new(format!(
                "ALTER DEFAULT PRIVILEGES FOR ROLE {} {schema_sql} {}",
                self.grantor,
                target.default_privilege_clause(None, None)
            ))
            .with_database(Routing::Named(target.database.clone())),
        );
        Ok(vec![Statement::transaction(
            vec![revoke_all, grant],
            Routing::Named(target.database.clone()),
        )])
    }

    pub fn stmts_to_drop(&self, target: &SchemaTablesPrivilege) -> EmitResult {
        Ok(vec![self.revoke_all_stmt(target)?])
    }
}

impl SchemaTablesPrivilege {
    fn all_privileges() -> std::collections::BTreeSet<crate::privilege::SchemaTablesPrivilege> {
        use crate::privilege::PrivilegeKind;
        crate::privilege::SchemaTablesPrivilege::all().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn target(schema: &str) -> SchemaTablesPrivilege {
        let mut privileges = BTreeSet::new();
        privileges.insert(crate::privilege::SchemaTablesPrivilege::Select);
        SchemaTablesPrivilege {
            database: "sales".into(),
            schema: schema.into(),
            grantee: "datascience".into(),
            privileges,
            present: true,
        }
    }

    #[test]
    fn test_maintain_wraps_revoke_then_grant() {
        let dp = DefaultPrivilege { target_key: target("private").key(), grantor: "devops".into(), present: true };
        let t = target("private");
        let stmts = dp.stmts_to_maintain(&t).unwrap();
        match &stmts[0] {
            Statement::Transaction(inner, _) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(&inner[0], Statement::Text(s) if s.query.contains("REVOKE")));
                assert!(matches!(&inner[1], Statement::Text(s) if s.query.contains("GRANT")));
            }
            _ => panic!("expected transaction"),
        }
    }

    #[test]
    fn test_missing_schema_is_unsupported() {
        let dp = DefaultPrivilege { target_key: "x".into(), grantor: "devops".into(), present: true };
        let t = target("");
        let err = dp.stmts_to_maintain(&t).unwrap_err();
        assert!(matches!(err, ReconcileError::UnsupportedState(_)));
    }

    #[test]
    fn test_drop_emits_only_revoke_all() {
        let dp = DefaultPrivilege { target_key: target("private").key(), grantor: "devops".into(), present: false };
        let t = target("private");
        let stmts = dp.stmts_to_drop(&t).unwrap();
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0], Statement::Text(s) if s.query.contains("REVOKE")));
    }
}
