//! The object model: every entity type the engine can reconcile, folded
//! into two closed tagged unions so the registry can never accidentally
//! hold a link entity (§9 design notes).

pub mod base;
pub mod database;
pub mod default_privilege;
pub mod role;
pub mod schema;

pub use base::{is_managed_role, EmitCtx, EmitResult, ObjectKey, ObjectState};

use std::collections::BTreeSet;

use crate::error::{ReconcileError, Result};
use crate::privilege::{self, PrivilegeKind};

/// A primary, registrable desired object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagedObject {
    Group(role::Group),
    User(role::User),
    Database(database::Database),
    Schema(schema::Schema),
    DatabasePrivilege(database::DatabasePrivilege),
    SchemaPrivilege(schema::SchemaPrivilege),
    SchemaTablesPrivilege(schema::SchemaTablesPrivilege),
    DefaultPrivilege(default_privilege::DefaultPrivilege),
}

/// A link entity: introduced only by its parent's `link_children`, never
/// registered directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkObject {
    GroupUser(role::GroupUser),
    UserDatabaseConnect(role::UserDatabaseConnect),
    DatabaseOwner(database::DatabaseOwner),
    SchemaOwner(schema::SchemaOwner),
}

/// A graph vertex: either a registered object or a link entity introduced
/// on its behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Managed(ManagedObject),
    Link(LinkObject),
}

/// The Setup's desired-object registry: key to node, used to resolve
/// `DefaultPrivilege` targets and to drive classification/emission.
pub type Registry = std::collections::HashMap<ObjectKey, Node>;

impl ManagedObject {
    pub fn key(&self) -> ObjectKey {
        match self {
            ManagedObject::Group(o) => o.key(),
            ManagedObject::User(o) => o.key(),
            ManagedObject::Database(o) => o.key(),
            ManagedObject::Schema(o) => o.key(),
            ManagedObject::DatabasePrivilege(o) => o.key(),
            ManagedObject::SchemaPrivilege(o) => o.key(),
            ManagedObject::SchemaTablesPrivilege(o) => o.key(),
            ManagedObject::DefaultPrivilege(o) => o.key(),
        }
    }

    pub fn present(&self) -> bool {
        match self {
            ManagedObject::Group(o) => o.present,
            ManagedObject::User(o) => o.present,
            ManagedObject::Database(o) => o.present,
            ManagedObject::Schema(o) => o.present,
            ManagedObject::DatabasePrivilege(o) => o.present,
            ManagedObject::SchemaPrivilege(o) => o.present,
            ManagedObject::SchemaTablesPrivilege(o) => o.present,
            ManagedObject::DefaultPrivilege(o) => o.present,
        }
    }

    /// Other objects this object requires to exist. A role-shaped
    /// dependency is named by role rather than by key: whether it
    /// resolves to a `Group` or a `User` key is decided by whichever was
    /// registered, which only the [`crate::setup::Setup`] holding the
    /// full registry can determine (`resolve_role`, grounded on
    /// `setup.py::Setup.resolve_role`).
    pub fn dependencies(&self) -> Vec<DependencyRef> {
        match self {
            ManagedObject::Group(_) => Vec::new(),
            ManagedObject::User(o) => o
                .groups
                .iter()
                .map(|g| DependencyRef::Key(role::Group { name: g.clone(), present: true }.key()))
                .chain(o.databases.iter().map(|d| {
                    DependencyRef::Key(database::Database { name: d.clone(), owner: None, present: true }.key())
                }))
                .collect(),
            ManagedObject::Database(o) => o
                .owner
                .iter()
                .map(|owner| DependencyRef::Role(owner.clone()))
                .collect(),
            ManagedObject::Schema(o) => {
                let mut deps = vec![DependencyRef::Key(
                    database::Database { name: o.database.clone(), owner: None, present: true }.key(),
                )];
                deps.extend(o.owner.iter().map(|owner| DependencyRef::Role(owner.clone())));
                deps
            }
            ManagedObject::DatabasePrivilege(o) => vec![
                DependencyRef::Key(database::Database { name: o.database.clone(), owner: None, present: true }.key()),
                DependencyRef::Role(o.grantee.clone()),
            ],
            ManagedObject::SchemaPrivilege(o) => vec![
                DependencyRef::Key(database::Database { name: o.database.clone(), owner: None, present: true }.key()),
                DependencyRef::Key(
                    schema::Schema { database: o.database.clone(), name: o.schema.clone(), owner: None, present: true }.key(),
                ),
                DependencyRef::Role(o.grantee.clone()),
            ],
            ManagedObject::SchemaTablesPrivilege(o) => vec![
                DependencyRef::Key(database::Database { name: o.database.clone(), owner: None, present: true }.key()),
                DependencyRef::Key(
                    schema::Schema { database: o.database.clone(), name: o.schema.clone(), owner: None, present: true }.key(),
                ),
                DependencyRef::Role(o.grantee.clone()),
            ],
            ManagedObject::DefaultPrivilege(o) => vec![
                DependencyRef::Key(o.target_key.clone()),
                DependencyRef::Role(o.grantor.clone()),
            ],
        }
    }

    /// Link entities this object introduces into the graph on its own
    /// behalf (§3 "Ownership / lifecycle").
    pub fn link_children(&self) -> Vec<LinkObject> {
        match self {
            ManagedObject::User(o) => o
                .groups
                .iter()
                .map(|g| {
                    LinkObject::GroupUser(role::GroupUser {
                        group: g.clone(),
                        user: o.name.clone(),
                        present: o.present,
                    })
                })
                .chain(o.databases.iter().map(|d| {
                    LinkObject::UserDatabaseConnect(role::UserDatabaseConnect {
                        user: o.name.clone(),
                        database: d.clone(),
                        present: o.present,
                    })
                }))
                .collect(),
            ManagedObject::Database(o) => o
                .owner
                .iter()
                .map(|owner| {
                    LinkObject::DatabaseOwner(database::DatabaseOwner {
                        database: o.name.clone(),
                        owner: owner.clone(),
                        present: o.present,
                    })
                })
                .collect(),
            ManagedObject::Schema(o) => o
                .owner
                .iter()
                .map(|owner| {
                    LinkObject::SchemaOwner(schema::SchemaOwner {
                        database: o.database.clone(),
                        schema: o.name.clone(),
                        owner: owner.clone(),
                        present: o.present,
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn stmts_to_create(&self, ctx: &base::EmitCtx) -> EmitResult {
        match self {
            ManagedObject::Group(o) => o.stmts_to_create(ctx),
            ManagedObject::User(o) => o.stmts_to_create(ctx),
            ManagedObject::Database(o) => o.stmts_to_create(),
            ManagedObject::Schema(o) => o.stmts_to_create(),
            ManagedObject::DatabasePrivilege(o) => o.stmts_to_create(),
            ManagedObject::SchemaPrivilege(o) => o.stmts_to_create(),
            ManagedObject::SchemaTablesPrivilege(o) => o.stmts_to_create(),
            // DefaultPrivilege has no create-only path; it is only ever
            // maintained (its target state is UNKNOWN, see classify()).
            ManagedObject::DefaultPrivilege(_) => Ok(Vec::new()),
        }
    }

    pub fn stmts_to_update(&self, ctx: &base::EmitCtx) -> EmitResult {
        // Default to stmts_to_create, per §4.3; no object overrides it.
        self.stmts_to_create(ctx)
    }

    pub fn stmts_to_drop(&self, ctx: &base::EmitCtx) -> EmitResult {
        match self {
            ManagedObject::Group(o) => o.stmts_to_drop(ctx),
            ManagedObject::User(o) => o.stmts_to_drop(ctx),
            ManagedObject::Database(o) => o.stmts_to_drop(),
            ManagedObject::Schema(o) => o.stmts_to_drop(),
            ManagedObject::DatabasePrivilege(o) => o.stmts_to_drop(),
            ManagedObject::SchemaPrivilege(o) => o.stmts_to_drop(),
            ManagedObject::SchemaTablesPrivilege(o) => o.stmts_to_drop(),
            ManagedObject::DefaultPrivilege(_) => Ok(Vec::new()),
        }
    }

    /// Maintain-pass statements. `registry` is needed only by
    /// `DefaultPrivilege`, to resolve its target `SchemaTablesPrivilege`.
    pub fn stmts_to_maintain(&self, ctx: &base::EmitCtx, registry: &Registry) -> EmitResult {
        match self {
            ManagedObject::User(o) => o.stmts_to_maintain(ctx),
            ManagedObject::Database(o) => o.stmts_to_maintain(),
            ManagedObject::DefaultPrivilege(o) => {
                let target = resolve_schema_tables_privilege(registry, &o.target_key)?;
                o.stmts_to_maintain(target)
            }
            _ => Ok(Vec::new()),
        }
    }
}

impl LinkObject {
    pub fn key(&self) -> ObjectKey {
        match self {
            LinkObject::GroupUser(o) => o.key(),
            LinkObject::UserDatabaseConnect(o) => o.key(),
            LinkObject::DatabaseOwner(o) => o.key(),
            LinkObject::SchemaOwner(o) => o.key(),
        }
    }

    pub fn present(&self) -> bool {
        match self {
            LinkObject::GroupUser(o) => o.present,
            LinkObject::UserDatabaseConnect(o) => o.present,
            LinkObject::DatabaseOwner(o) => o.present,
            LinkObject::SchemaOwner(o) => o.present,
        }
    }

    pub fn dependencies(&self) -> Vec<DependencyRef> {
        match self {
            LinkObject::GroupUser(o) => vec![
                DependencyRef::Key(role::Group { name: o.group.clone(), present: true }.key()),
                DependencyRef::Key(
                    role::User {
                        name: o.user.clone(),
                        present: true,
                        password: None,
                        groups: vec![],
                        inherit: false,
                        databases: vec![],
                    }
                    .key(),
                ),
            ],
            LinkObject::UserDatabaseConnect(o) => vec![
                DependencyRef::Key(database::Database { name: o.database.clone(), owner: None, present: true }.key()),
                DependencyRef::Key(
                    role::User {
                        name: o.user.clone(),
                        present: true,
                        password: None,
                        groups: vec![],
                        inherit: false,
                        databases: vec![],
                    }
                    .key(),
                ),
            ],
            LinkObject::DatabaseOwner(o) => vec![
                DependencyRef::Key(database::Database { name: o.database.clone(), owner: None, present: true }.key()),
                DependencyRef::Role(o.owner.clone()),
            ],
            LinkObject::SchemaOwner(o) => vec![
                DependencyRef::Key(
                    schema::Schema { database: o.database.clone(), name: o.schema.clone(), owner: None, present: true }.key(),
                ),
                DependencyRef::Role(o.owner.clone()),
            ],
        }
    }

    pub fn stmts_to_create(&self) -> EmitResult {
        match self {
            LinkObject::GroupUser(o) => o.stmts_to_create(),
            LinkObject::UserDatabaseConnect(o) => o.stmts_to_create(),
            LinkObject::DatabaseOwner(o) => o.stmts_to_create(),
            LinkObject::SchemaOwner(o) => o.stmts_to_create(),
        }
    }

    pub fn stmts_to_drop(&self) -> EmitResult {
        match self {
            LinkObject::GroupUser(o) => o.stmts_to_drop(),
            LinkObject::UserDatabaseConnect(o) => o.stmts_to_drop(),
            // DatabaseOwner/SchemaOwner are never individually dropped:
            // dropping the owner-assignment happens implicitly when the
            // database/schema itself is dropped.
            LinkObject::DatabaseOwner(_) => Ok(Vec::new()),
            LinkObject::SchemaOwner(_) => Ok(Vec::new()),
        }
    }
}

impl Node {
    pub fn key(&self) -> ObjectKey {
        match self {
            Node::Managed(o) => o.key(),
            Node::Link(o) => o.key(),
        }
    }

    pub fn present(&self) -> bool {
        match self {
            Node::Managed(o) => o.present(),
            Node::Link(o) => o.present(),
        }
    }

    pub fn dependencies(&self) -> Vec<DependencyRef> {
        match self {
            Node::Managed(o) => o.dependencies(),
            Node::Link(o) => o.dependencies(),
        }
    }
}

/// A dependency named by an object being registered: either a concrete
/// key (another object of a known, specific type) or a bare role name
/// that must be resolved against whichever of `Group`/`User` was
/// actually registered under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyRef {
    Key(ObjectKey),
    Role(String),
}

/// Resolves a role name to the key of whichever of `Group`/`User` is
/// registered under it, special-casing the implicit `public` group and
/// the master user the way `setup.py::Setup.resolve_role` does.
///
/// Returns `AmbiguousRole` if neither is registered — the caller must
/// declare a role before referencing it from another object (§3).
pub fn resolve_role_key(registry: &Registry, rolname: &str, master_user: &str) -> Result<ObjectKey> {
    let group_key = role::Group { name: rolname.to_string(), present: true }.key();
    if registry.contains_key(&group_key) {
        return Ok(group_key);
    }
    let user_key = role::User {
        name: rolname.to_string(),
        present: true,
        password: None,
        groups: vec![],
        inherit: false,
        databases: vec![],
    }
    .key();
    if registry.contains_key(&user_key) {
        return Ok(user_key);
    }
    if rolname.eq_ignore_ascii_case("public") {
        return Ok(role::Group { name: "public".to_string(), present: true }.key());
    }
    if rolname == master_user {
        return Ok(role::User {
            name: rolname.to_string(),
            present: true,
            password: None,
            groups: vec![],
            inherit: false,
            databases: vec![],
        }
        .key());
    }
    Err(ReconcileError::AmbiguousRole { rolename: rolname.to_string() })
}

fn resolve_schema_tables_privilege<'a>(
    registry: &'a Registry,
    key: &str,
) -> Result<&'a schema::SchemaTablesPrivilege> {
    match registry.get(key) {
        Some(Node::Managed(ManagedObject::SchemaTablesPrivilege(p))) => Ok(p),
        _ => Err(ReconcileError::MissingDependency {
            object: format!("DefaultPrivilege(...:{key})"),
            dependency: key.to_string(),
        }),
    }
}

/// Parses a raw collection of privilege name strings into the closed
/// [`privilege::DatabasePrivilege`] set, surfacing unknown names as
/// [`ReconcileError::UnknownPrivilege`].
pub fn parse_database_privileges(raw: &[String]) -> Result<BTreeSet<privilege::DatabasePrivilege>> {
    privilege::parse_privileges(raw)
}

pub fn parse_schema_privileges(raw: &[String]) -> Result<BTreeSet<privilege::SchemaPrivilege>> {
    privilege::parse_privileges(raw)
}

pub fn parse_schema_tables_privileges(raw: &[String]) -> Result<BTreeSet<privilege::SchemaTablesPrivilege>> {
    privilege::parse_privileges(raw)
}
