//! Groups, users, and group membership.
//!
//! Grounded on `pg_objects/objects/role.py`.

use crate::objects::base::{is_managed_role, EmitCtx, EmitResult};
use crate::password;
use crate::statement::{CreateStatement, Database as Routing, DropStatement, ObjectKind, Statement, TextStatement};

/// A managed group role. `CREATE GROUP` / `DROP GROUP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub present: bool,
}

impl Group {
    pub fn key(&self) -> String {
        format!("Group({})", self.name)
    }
}

/// A managed login role, optionally belonging to one or more [`Group`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub present: bool,
    pub password: Option<String>,
    pub groups: Vec<String>,
    pub inherit: bool,
    /// Databases this user should implicitly get `CONNECT` on.
    ///
    /// Supplemental to the base object model (open question in the design
    /// notes): declaring an empty list adds no implicit object, so this is
    /// strictly additive over the minimal form.
    pub databases: Vec<String>,
}

impl User {
    pub fn key(&self) -> String {
        format!("User({})", self.name)
    }
}

fn stmts_to_create_role(name: &str, kind: ObjectKind, present: bool, ctx: &EmitCtx) -> Vec<Statement> {
    if !present || !is_managed_role(name, ctx.master_user) {
        return Vec::new();
    }
    vec![Statement::Create(CreateStatement {
        kind,
        name: name.to_string(),
        database: Routing::Master,
    })]
}

fn stmts_to_drop_role(name: &str, kind: ObjectKind, ctx: &EmitCtx) -> Vec<Statement> {
    if !is_managed_role(name, ctx.master_user) {
        return Vec::new();
    }
    vec![
        Statement::Text(
            TextStatement::new(format!(
                "REASSIGN OWNED BY {name} TO {}",
                ctx.master_user
            ))
            .with_database(Routing::AllDatabases),
        ),
        Statement::Text(
            TextStatement::new(format!("REVOKE ALL ON SCHEMA public FROM {name}"))
                .with_database(Routing::AllDatabases),
        ),
        Statement::Text(
            TextStatement::new(format!("REVOKE ALL ON SCHEMA public FROM {name}"))
                .with_database(Routing::Named(ctx.master_database.to_string())),
        ),
        Statement::Drop(DropStatement {
            kind,
            name: name.to_string(),
            database: Routing::Master,
        }),
    ]
}

impl Group {
    pub fn stmts_to_create(&self, ctx: &EmitCtx) -> EmitResult {
        Ok(stmts_to_create_role(&self.name, ObjectKind::Group, self.present, ctx))
    }

    pub fn stmts_to_drop(&self, ctx: &EmitCtx) -> EmitResult {
        Ok(stmts_to_drop_role(&self.name, ObjectKind::Group, ctx))
    }
}

impl User {
    pub fn stmts_to_create(&self, ctx: &EmitCtx) -> EmitResult {
        Ok(stmts_to_create_role(&self.name, ObjectKind::User, self.present, ctx))
    }

    pub fn stmts_to_drop(&self, ctx: &EmitCtx) -> EmitResult {
        Ok(stmts_to_drop_role(&self.name, ObjectKind::User, ctx))
    }

    /// `ALTER USER <name> WITH NOCREATEDB NOSUPERUSER INHERIT|NOINHERIT
    /// <password-clause>`, run on every pass while the user is present.
    pub fn stmts_to_maintain(&self, ctx: &EmitCtx) -> EmitResult {
        if !self.present || !is_managed_role(&self.name, ctx.master_user) {
            return Ok(Vec::new());
        }
        let inherit_sql = if self.inherit { "INHERIT" } else { "NOINHERIT" };
        let password_sql = self.password_clause();
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "ALTER USER {} WITH NOCREATEDB NOSUPERUSER {inherit_sql} {password_sql}",
            self.name
        )))])
    }

    fn password_clause(&self) -> String {
        match &self.password {
            None => "LOGIN".to_string(),
            Some(pw) => {
                let hash = password::normalize_password(&self.name, pw);
                format!("LOGIN PASSWORD '{hash}'")
            }
        }
    }
}

/// The implicit `CONNECT` grant a [`User`]'s `databases` list introduces:
/// supplemental to the base object model (richer form of the open
/// question over whether `User.databases` materializes a grant), kept
/// strictly additive since an empty list introduces no link child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserDatabaseConnect {
    pub user: String,
    pub database: String,
    pub present: bool,
}

impl UserDatabaseConnect {
    pub fn key(&self) -> String {
        format!("UserDatabaseConnect({}@{})", self.user, self.database)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "GRANT CONNECT ON DATABASE {} TO {}",
            self.database, self.user
        ))
        .with_database(Routing::Named(self.database.clone())))])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "REVOKE CONNECT ON DATABASE {} FROM {}",
            self.database, self.user
        ))
        .with_database(Routing::Named(self.database.clone())))])
    }
}

/// The link between a [`Group`] and a [`User`] it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupUser {
    pub group: String,
    pub user: String,
    pub present: bool,
}

impl GroupUser {
    pub fn key(&self) -> String {
        format!("GroupUser({}+{})", self.group, self.user)
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "ALTER GROUP {} ADD USER {}",
            self.group, self.user
        )))])
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        Ok(vec![Statement::Text(TextStatement::new(format!(
            "ALTER GROUP {} DROP USER {}",
            self.group, self.user
        )))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>() -> EmitCtx<'a> {
        EmitCtx {
            master_user: "admin",
            master_database: "postgres",
        }
    }

    #[test]
    fn test_group_create_statement() {
        let g = Group { name: "devops".into(), present: true };
        let stmts = g.stmts_to_create(&ctx()).unwrap();
        assert_eq!(stmts.len(), 1);
        match &stmts[0] {
            Statement::Create(c) => assert_eq!(c.query(), "CREATE GROUP devops"),
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_forbidden_group_yields_nothing() {
        let g = Group { name: "postgres".into(), present: true };
        assert!(g.stmts_to_create(&ctx()).unwrap().is_empty());
        assert!(g.stmts_to_drop(&ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_role_drop_sequence() {
        let u = User {
            name: "johnny".into(),
            present: false,
            password: None,
            groups: vec!["analyst".into()],
            inherit: false,
            databases: vec![],
        };
        let stmts = u.stmts_to_drop(&ctx()).unwrap();
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[0].database(), Routing::AllDatabases));
        assert!(matches!(stmts[1].database(), Routing::AllDatabases));
        assert_eq!(*stmts[2].database(), Routing::Named("postgres".into()));
        assert!(matches!(&stmts[3], Statement::Drop(d) if d.name == "johnny"));
    }

    #[test]
    fn test_user_maintain_password_clause_unset() {
        let u = User {
            name: "peter".into(),
            present: true,
            password: None,
            groups: vec![],
            inherit: true,
            databases: vec![],
        };
        let stmts = u.stmts_to_maintain(&ctx()).unwrap();
        match &stmts[0] {
            Statement::Text(t) => assert!(t.query.contains("LOGIN") && !t.query.contains("PASSWORD")),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_user_maintain_password_clause_set() {
        let u = User {
            name: "peter".into(),
            present: true,
            password: Some("secret".into()),
            groups: vec![],
            inherit: false,
            databases: vec![],
        };
        let stmts = u.stmts_to_maintain(&ctx()).unwrap();
        match &stmts[0] {
            Statement::Text(t) => {
                assert!(t.query.contains("LOGIN PASSWORD 'md5"));
                assert!(t.query.contains("NOINHERIT"));
            }
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_user_database_connect_statements() {
        let c = UserDatabaseConnect { user: "peter".into(), database: "sales".into(), present: true };
        assert_eq!(c.key(), "UserDatabaseConnect(peter@sales)");
        match &c.stmts_to_create().unwrap()[0] {
            Statement::Text(t) => {
                assert_eq!(t.query, "GRANT CONNECT ON DATABASE sales TO peter");
                assert_eq!(*t.database, Routing::Named("sales".into()));
            }
            _ => panic!("expected text"),
        }
        match &c.stmts_to_drop().unwrap()[0] {
            Statement::Text(t) => assert_eq!(t.query, "REVOKE CONNECT ON DATABASE sales FROM peter"),
            _ => panic!("expected text"),
        }
    }

    #[test]
    fn test_group_user_statements() {
        let gu = GroupUser { group: "devops".into(), user: "peter".into(), present: true };
        assert_eq!(gu.key(), "GroupUser(devops+peter)");
        match &gu.stmts_to_create().unwrap()[0] {
            Statement::Text(t) => assert_eq!(t.query, "ALTER GROUP devops ADD USER peter"),
            _ => panic!("expected text"),
        }
    }
}
