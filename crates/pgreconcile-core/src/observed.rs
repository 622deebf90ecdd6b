//! Loads a snapshot of the cluster's actual state and classifies desired
//! objects against it.
//!
//! Grounded on `pg_objects/state.py` and the `StateProviderAbc` mixins in
//! `objects/database.py`, `objects/schema.py`, `objects/role.py`.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::acl;
use crate::connection::ConnectionManager;
use crate::error::Result;
use crate::objects::{LinkObject, ManagedObject, Node, Registry};
use crate::privilege::{self, PrivilegeKind};
use crate::objects::ObjectState;

#[derive(Debug, Clone, Default)]
pub struct DatabaseInfo {
    pub owner: String,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaInfo {
    pub owner: String,
}

#[derive(Debug, Clone, Default)]
pub struct TableInfo {
    pub owner: String,
}

/// An immutable snapshot of the cluster, loaded once per reconciliation
/// run (§5 "Shared-resource policy").
#[derive(Debug, Clone, Default)]
pub struct ObservedState {
    pub databases: HashMap<String, DatabaseInfo>,
    pub groups: HashSet<String>,
    pub users: HashSet<String>,
    pub group_users: HashMap<String, Vec<String>>,
    pub user_groups: HashMap<String, Vec<String>>,
    pub schemas: HashMap<String, HashMap<String, SchemaInfo>>,
    pub database_privileges: HashMap<String, HashMap<String, BTreeSet<privilege::DatabasePrivilege>>>,
    pub schema_privileges: HashMap<String, HashMap<String, HashMap<String, BTreeSet<privilege::SchemaPrivilege>>>>,
    pub schema_tables: HashMap<String, HashMap<String, HashMap<String, TableInfo>>>,
    pub schema_tables_privileges:
        HashMap<String, HashMap<String, HashMap<String, HashMap<String, BTreeSet<privilege::SchemaTablesPrivilege>>>>>,
}

impl ObservedState {
    /// Loads every section of observed state, connecting to the master
    /// database first and then, for every name in `managed_databases`, a
    /// per-database connection (opened lazily and cached by
    /// `ConnectionManager`).
    pub fn load(manager: &mut ConnectionManager, managed_databases: &[String]) -> Result<Self> {
        let mut state = ObservedState::default();
        state.load_databases(manager)?;
        state.load_roles(manager)?;
        state.load_database_privileges(manager)?;
        for datname in managed_databases {
            state.load_schemas(manager, datname)?;
            state.load_schema_privileges(manager, datname)?;
            state.load_schema_tables(manager, datname)?;
            state.load_schema_tables_privileges(manager, datname)?;
        }
        Ok(state)
    }

    fn load_databases(&mut self, manager: &mut ConnectionManager) -> Result<()> {
        let result = manager.master().execute(
            "SELECT d.datname as name, pg_catalog.pg_get_userbyid(d.datdba) as owner \
             FROM pg_catalog.pg_database d \
             WHERE d.datname NOT LIKE 'template%' AND d.datname != 'postgres'",
        )?;
        for row in result.get_all(&["name", "owner"]) {
            let name = value_to_string(&row[0]);
            let owner = value_to_string(&row[1]);
            self.databases.insert(name, DatabaseInfo { owner });
        }
        Ok(())
    }

    fn load_roles(&mut self, manager: &mut ConnectionManager) -> Result<()> {
        let groups_result = manager.master().execute("SELECT groname AS name FROM pg_group")?;
        for row in groups_result.get_all(&["name"]) {
            let name = value_to_string(&row[0]);
            if !name.starts_with("pg_") {
                self.groups.insert(name);
            }
        }
        // The public pseudo-group is always present even though it never
        // appears in pg_group.
        self.groups.insert("public".to_string());

        let roles_result = manager.master().execute("SELECT rolname AS name FROM pg_roles")?;
        for row in roles_result.get_all(&["name"]) {
            let name = value_to_string(&row[0]);
            if name.starts_with("pg_") || self.groups.contains(&name) {
                continue;
            }
            self.users.insert(name);
        }

        let membership_result = manager.master().execute(
            "SELECT pg_group.groname, pg_roles.rolname \
             FROM pg_group \
             LEFT JOIN pg_roles ON pg_roles.oid = ANY(pg_group.grolist) \
             WHERE pg_group.groname NOT LIKE 'pg_%' \
             ORDER BY pg_group.groname, pg_roles.rolname",
        )?;
        for row in membership_result.get_all(&["groname", "rolname"]) {
            let group = value_to_string(&row[0]);
            if let Some(user) = row[1].as_str() {
                self.group_users.entry(group.clone()).or_default().push(user.to_string());
                self.user_groups.entry(user.to_string()).or_default().push(group);
            }
        }
        Ok(())
    }

    fn load_database_privileges(&mut self, manager: &mut ConnectionManager) -> Result<()> {
        let result = manager
            .master()
            .execute("SELECT datname, datacl FROM pg_database WHERE datname NOT LIKE 'template%'")?;
        for row in result.get_all(&["datname", "datacl"]) {
            let datname = value_to_string(&row[0]);
            let datacl = row[1].as_str().map(|s| s.to_string());
            for entry in acl::parse_acl(datacl.as_deref())? {
                let privs = self.database_privileges.entry(datname.clone()).or_default();
                let set = privs.entry(entry.grantee).or_default();
                for code in entry.privileges.chars() {
                    if let Some(p) = privilege::database_privilege_from_acl_code(code) {
                        set.insert(p);
                    }
                }
            }
        }
        Ok(())
    }

    fn load_schemas(&mut self, manager: &mut ConnectionManager, datname: &str) -> Result<()> {
        let conn = manager.database(datname)?;
        let result = conn.execute(
            "SELECT pg_namespace.nspname AS name, pg_roles.rolname AS owner \
             FROM pg_namespace \
             LEFT JOIN pg_roles ON pg_namespace.nspowner = pg_roles.oid \
             WHERE pg_namespace.nspname != 'information_schema' \
             AND pg_namespace.nspname NOT LIKE 'pg_%' \
             ORDER BY pg_namespace.nspname",
        )?;
        let entry = self.schemas.entry(datname.to_string()).or_default();
        for row in result.get_all(&["name", "owner"]) {
            let name = value_to_string(&row[0]);
            let owner = value_to_string(&row[1]);
            entry.insert(name, SchemaInfo { owner });
        }
        Ok(())
    }

    fn load_schema_privileges(&mut self, manager: &mut ConnectionManager, datname: &str) -> Result<()> {
        let conn = manager.database(datname)?;
        for priv_type in privilege::SchemaPrivilege::all() {
            let result = conn.execute(&format!(
                "SELECT r.rolname, \
                 (SELECT STRING_AGG(s.nspname, ',' ORDER BY s.nspname) \
                  FROM pg_namespace s \
                  WHERE HAS_SCHEMA_PRIVILEGE(r.rolname, s.nspname, '{priv_type}') \
                  AND s.nspname != 'information_schema' AND NOT s.nspname LIKE 'pg_%') AS schemas \
                 FROM pg_roles r \
                 WHERE NOT r.rolcanlogin AND NOT (r.rolname LIKE 'pg_%') \
                 ORDER BY r.rolname"
            ))?;
            for row in result.get_all(&["rolname", "schemas"]) {
                let rolname = value_to_string(&row[0]);
                let Some(schemas) = row[1].as_str() else { continue };
                if schemas.is_empty() {
                    continue;
                }
                for schemaname in schemas.split(',') {
                    self.schema_privileges
                        .entry(datname.to_string())
                        .or_default()
                        .entry(schemaname.to_string())
                        .or_default()
                        .entry(rolname.clone())
                        .or_default()
                        .insert(*priv_type);
                }
            }
        }
        Ok(())
    }

    fn load_schema_tables(&mut self, manager: &mut ConnectionManager, datname: &str) -> Result<()> {
        let conn = manager.database(datname)?;
        let result = conn.execute(
            "SELECT schemaname, tablename, tableowner FROM pg_tables \
             WHERE schemaname != 'information_schema' AND NOT schemaname LIKE 'pg_%'",
        )?;
        for row in result.get_all(&["schemaname", "tablename", "tableowner"]) {
            let schema = value_to_string(&row[0]);
            let table = value_to_string(&row[1]);
            let owner = value_to_string(&row[2]);
            self.schema_tables
                .entry(datname.to_string())
                .or_default()
                .entry(schema)
                .or_default()
                .insert(table, TableInfo { owner });
        }
        Ok(())
    }

    fn load_schema_tables_privileges(&mut self, manager: &mut ConnectionManager, datname: &str) -> Result<()> {
        let conn = manager.database(datname)?;
        let result = conn.execute(
            "SELECT grantee, table_schema, table_name, STRING_AGG(privilege_type, ',') AS privileges \
             FROM information_schema.role_table_grants \
             WHERE table_schema != 'information_schema' AND NOT table_schema LIKE 'pg_%' \
             GROUP BY grantee, table_schema, table_name",
        )?;
        for row in result.get_all(&["grantee", "table_schema", "table_name", "privileges"]) {
            let grantee = value_to_string(&row[0]);
            let schema = value_to_string(&row[1]);
            let table = value_to_string(&row[2]);
            let Some(privileges) = row[3].as_str() else { continue };
            if privileges.is_empty() {
                continue;
            }
            let mut set = BTreeSet::new();
            for name in privileges.split(',') {
                if let Some(p) = privilege::SchemaTablesPrivilege::parse_one(name) {
                    set.insert(p);
                }
            }
            self.schema_tables_privileges
                .entry(datname.to_string())
                .or_default()
                .entry(schema)
                .or_default()
                .entry(grantee)
                .or_default()
                .extend(set);
        }
        Ok(())
    }

    /// Classifies a desired node against this snapshot (§4.5, §9 "dynamic
    /// type dispatch ... becomes an explicit tagged-variant dispatch").
    pub fn classify(&self, node: &Node, registry: &Registry) -> ObjectState {
        match node {
            Node::Managed(ManagedObject::Group(o)) => self.classify_role(&o.name),
            Node::Managed(ManagedObject::User(o)) => self.classify_role(&o.name),
            Node::Managed(ManagedObject::Database(o)) => {
                if self.databases.contains_key(&o.name) {
                    ObjectState::Present
                } else {
                    ObjectState::Absent
                }
            }
            Node::Managed(ManagedObject::Schema(o)) => {
                if self.schemas.get(&o.database).is_some_and(|s| s.contains_key(&o.name)) {
                    ObjectState::Present
                } else {
                    ObjectState::Absent
                }
            }
            Node::Managed(ManagedObject::DatabasePrivilege(o)) => {
                match self.database_privileges.get(&o.database).and_then(|m| m.get(&o.grantee)) {
                    None => ObjectState::Absent,
                    Some(observed) if observed.is_empty() => ObjectState::Absent,
                    Some(observed) if *observed == o.privileges => ObjectState::Present,
                    Some(_) => ObjectState::Different,
                }
            }
            Node::Managed(ManagedObject::SchemaPrivilege(o)) => {
                match self
                    .schema_privileges
                    .get(&o.database)
                    .and_then(|s| s.get(&o.schema))
                    .and_then(|g| g.get(&o.grantee))
                {
                    None => ObjectState::Absent,
                    Some(observed) if *observed == o.privileges => ObjectState::Present,
                    Some(_) => ObjectState::Different,
                }
            }
            Node::Managed(ManagedObject::SchemaTablesPrivilege(o)) => self.classify_schema_tables_privilege(o),
            Node::Managed(ManagedObject::DefaultPrivilege(o)) => {
                let grantor_known = self.groups.contains(&o.grantor) || self.users.contains(&o.grantor);
                if !grantor_known {
                    return ObjectState::Absent;
                }
                match registry.get(&o.target_key) {
                    Some(Node::Managed(ManagedObject::SchemaTablesPrivilege(target))) => {
                        if self
                            .schemas
                            .get(&target.database)
                            .is_some_and(|s| s.contains_key(&target.schema))
                        {
                            ObjectState::Unknown
                        } else {
                            ObjectState::Absent
                        }
                    }
                    _ => ObjectState::Absent,
                }
            }
            Node::Link(LinkObject::GroupUser(o)) => {
                let is_member = self
                    .group_users
                    .get(&o.group)
                    .is_some_and(|users| users.contains(&o.user));
                if is_member {
                    ObjectState::Present
                } else {
                    ObjectState::Absent
                }
            }
            Node::Link(LinkObject::UserDatabaseConnect(o)) => {
                match self.database_privileges.get(&o.database).and_then(|m| m.get(&o.user)) {
                    Some(observed) if observed.contains(&privilege::DatabasePrivilege::Connect) => {
                        ObjectState::Present
                    }
                    _ => ObjectState::Absent,
                }
            }
            Node::Link(LinkObject::DatabaseOwner(o)) => match self.databases.get(&o.database) {
                None => ObjectState::Absent,
                // Deliberately collapses DIFFERENT to ABSENT: the engine
                // does not yet reconcile owner changes directly, and
                // downgrading to ABSENT causes the create pass to
                // re-issue the ALTER ... OWNER TO statement. See the
                // design notes' open question; preserved intentionally.
                Some(info) if info.owner == o.owner => ObjectState::Present,
                Some(_) => ObjectState::Absent,
            },
            Node::Link(LinkObject::SchemaOwner(o)) => {
                match self.schemas.get(&o.database).and_then(|s| s.get(&o.schema)) {
                    None => ObjectState::Absent,
                    Some(info) if info.owner == o.owner => ObjectState::Present,
                    Some(_) => ObjectState::Absent,
                }
            }
        }
    }

    fn classify_role(&self, name: &str) -> ObjectState {
        if self.groups.contains(name) || self.users.contains(name) {
            ObjectState::Present
        } else {
            ObjectState::Absent
        }
    }

    fn classify_schema_tables_privilege(
        &self,
        o: &crate::objects::schema::SchemaTablesPrivilege,
    ) -> ObjectState {
        let Some(by_grantee) = self
            .schema_tables_privileges
            .get(&o.database)
            .and_then(|s| s.get(&o.schema))
            .and_then(|g| g.get(&o.grantee))
        else {
            return ObjectState::Absent;
        };

        let tables = self
            .schema_tables
            .get(&o.database)
            .and_then(|s| s.get(&o.schema))
            .map(|t| t.keys().collect::<Vec<_>>())
            .unwrap_or_default();

        if tables.iter().all(|t| by_grantee.get(*t) == Some(&o.privileges)) {
            ObjectState::Present
        } else {
            ObjectState::Different
        }
    }
}

fn value_to_string(value: &serde_json::Value) -> String {
    value.as_str().map(str::to_string).unwrap_or_default()
}
