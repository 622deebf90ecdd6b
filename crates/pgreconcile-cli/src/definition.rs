//! Loads a JSON object definition into a [`pgreconcile_core::Setup`].
//!
//! Grounded on `pg_objects/registry.py`'s `deserialise_object`/`get_types`
//! and `setup.py::Setup.from_definition`: a flat list of `{ "type": ..., ...
//! }` records, dispatched on `type` to the matching constructor and
//! registered in declaration order so that later entries can depend on
//! earlier ones.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use pgreconcile_core::objects::database::{Database, DatabasePrivilege};
use pgreconcile_core::objects::default_privilege::DefaultPrivilege;
use pgreconcile_core::objects::role::{Group, User};
use pgreconcile_core::objects::schema::{Schema, SchemaPrivilege, SchemaTablesPrivilege};
use pgreconcile_core::objects::{
    parse_database_privileges, parse_schema_privileges, parse_schema_tables_privileges, ManagedObject,
};
use pgreconcile_core::Setup;

/// One entry of the `"objects"` array. Unknown fields are rejected by
/// `serde`'s default (non-`deny_unknown_fields`) behaviour, i.e. silently
/// ignored, matching the original's `**raw` kwargs splat, which only ever
/// consumes the keys the target constructor declares.
#[derive(Debug, Deserialize)]
struct RawObject {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default = "default_present")]
    present: bool,
    name: Option<String>,
    owner: Option<String>,
    database: Option<String>,
    schema: Option<String>,
    grantee: Option<String>,
    grantor: Option<String>,
    password: Option<String>,
    #[serde(default)]
    inherit: bool,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    databases: Vec<String>,
    #[serde(default)]
    privileges: Vec<String>,
}

fn default_present() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct Definition {
    objects: Vec<RawObject>,
}

/// Parses `definition_json` and registers every object it names, in order,
/// against `setup`.
pub fn load_definition(setup: &mut Setup, definition_json: &str) -> Result<()> {
    let definition: Definition =
        serde_json::from_str(definition_json).context("failed to parse definition JSON")?;
    for raw in definition.objects {
        let obj = to_managed_object(raw)?;
        setup.register(obj).with_context(|| "failed to register object from definition".to_string())?;
    }
    Ok(())
}

fn require<'a>(field: &'a Option<String>, name: &str, type_name: &str) -> Result<&'a str> {
    field
        .as_deref()
        .ok_or_else(|| anyhow!("{type_name} definition is missing required field {name:?}"))
}

fn to_managed_object(raw: RawObject) -> Result<ManagedObject> {
    match raw.type_name.as_str() {
        "Group" => Ok(ManagedObject::Group(Group {
            name: require(&raw.name, "name", "Group")?.to_string(),
            present: raw.present,
        })),
        "User" => Ok(ManagedObject::User(User {
            name: require(&raw.name, "name", "User")?.to_string(),
            present: raw.present,
            password: raw.password,
            groups: raw.groups,
            inherit: raw.inherit,
            databases: raw.databases,
        })),
        "Database" => Ok(ManagedObject::Database(Database {
            name: require(&raw.name, "name", "Database")?.to_string(),
            owner: raw.owner,
            present: raw.present,
        })),
        "Schema" => Ok(ManagedObject::Schema(Schema {
            database: require(&raw.database, "database", "Schema")?.to_string(),
            name: require(&raw.name, "name", "Schema")?.to_string(),
            owner: raw.owner,
            present: raw.present,
        })),
        "DatabasePrivilege" => Ok(ManagedObject::DatabasePrivilege(DatabasePrivilege {
            database: require(&raw.database, "database", "DatabasePrivilege")?.to_string(),
            grantee: require(&raw.grantee, "grantee", "DatabasePrivilege")?.to_string(),
            privileges: parse_database_privileges(&raw.privileges)?,
            present: raw.present,
        })),
        "SchemaPrivilege" => Ok(ManagedObject::SchemaPrivilege(SchemaPrivilege {
            database: require(&raw.database, "database", "SchemaPrivilege")?.to_string(),
            schema: require(&raw.schema, "schema", "SchemaPrivilege")?.to_string(),
            grantee: require(&raw.grantee, "grantee", "SchemaPrivilege")?.to_string(),
            privileges: parse_schema_privileges(&raw.privileges)?,
            present: raw.present,
        })),
        "SchemaTablesPrivilege" => Ok(ManagedObject::SchemaTablesPrivilege(SchemaTablesPrivilege {
            database: require(&raw.database, "database", "SchemaTablesPrivilege")?.to_string(),
            schema: require(&raw.schema, "schema", "SchemaTablesPrivilege")?.to_string(),
            grantee: require(&raw.grantee, "grantee", "SchemaTablesPrivilege")?.to_string(),
            privileges: parse_schema_tables_privileges(&raw.privileges)?,
            present: raw.present,
        })),
        "DefaultPrivilege" => {
            // The target SchemaTablesPrivilege is addressed by key, not by
            // live reference (the tagged-union object model has no place
            // to hold one): the definition repeats that privilege's
            // database/schema/grantee/privileges fields so its key can be
            // recomputed and must match an already-registered
            // SchemaTablesPrivilege entry earlier in the same definition.
            let target = SchemaTablesPrivilege {
                database: require(&raw.database, "database", "DefaultPrivilege")?.to_string(),
                schema: require(&raw.schema, "schema", "DefaultPrivilege")?.to_string(),
                grantee: require(&raw.grantee, "grantee", "DefaultPrivilege")?.to_string(),
                privileges: parse_schema_tables_privileges(&raw.privileges)?,
                present: true,
            };
            Ok(ManagedObject::DefaultPrivilege(DefaultPrivilege {
                target_key: target.key(),
                grantor: require(&raw.grantor, "grantor", "DefaultPrivilege")?.to_string(),
                present: raw.present,
            }))
        }
        other => bail!("unknown object type {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pgreconcile_core::connection::{Connection, ConnectionManager, QueryResult};

    struct NullConnection {
        database: String,
    }

    impl Connection for NullConnection {
        fn database(&self) -> &str {
            &self.database
        }
        fn username(&self) -> &str {
            "admin"
        }
        fn host(&self) -> &str {
            "localhost"
        }
        fn execute(&mut self, _query: &str) -> pgreconcile_core::Result<QueryResult> {
            Ok(QueryResult::default())
        }
        fn begin(&mut self) -> pgreconcile_core::Result<()> {
            Ok(())
        }
        fn commit(&mut self) -> pgreconcile_core::Result<()> {
            Ok(())
        }
        fn rollback(&mut self) -> pgreconcile_core::Result<()> {
            Ok(())
        }
        fn close(&mut self) {}
        fn clone_for_database(&self, database: &str) -> pgreconcile_core::Result<Box<dyn Connection>> {
            Ok(Box::new(NullConnection { database: database.to_string() }))
        }
    }

    fn setup() -> Setup {
        let master = Box::new(NullConnection { database: "postgres".to_string() });
        Setup::new(ConnectionManager::new(master))
    }

    #[test]
    fn test_load_group_and_user() {
        let mut setup = setup();
        let json = r#"{
            "objects": [
                {"type": "Group", "name": "devops"},
                {"type": "User", "name": "peter", "groups": ["devops"]}
            ]
        }"#;
        load_definition(&mut setup, json).unwrap();
        assert!(setup.contains("Group(devops)"));
        assert!(setup.contains("User(peter)"));
    }

    #[test]
    fn test_unknown_type_errors() {
        let mut setup = setup();
        let json = r#"{"objects": [{"type": "Nonsense", "name": "x"}]}"#;
        assert!(load_definition(&mut setup, json).is_err());
    }

    #[test]
    fn test_missing_required_field_errors() {
        let mut setup = setup();
        let json = r#"{"objects": [{"type": "Database"}]}"#;
        assert!(load_definition(&mut setup, json).is_err());
    }

    #[test]
    fn test_default_privilege_resolves_target_by_recomputed_key() {
        let mut setup = setup();
        let json = r#"{
            "objects": [
                {"type": "Group", "name": "devops"},
                {"type": "Database", "name": "sales"},
                {"type": "Schema", "database": "sales", "name": "private"},
                {"type": "SchemaTablesPrivilege", "database": "sales", "schema": "private", "grantee": "devops", "privileges": ["SELECT"]},
                {"type": "DefaultPrivilege", "database": "sales", "schema": "private", "grantee": "devops", "privileges": ["SELECT"], "grantor": "devops"}
            ]
        }"#;
        load_definition(&mut setup, json).unwrap();
        assert!(setup.contains("DefaultPrivilege(devops:SchemaTablesPrivilege(devops@sales.private:SELECT))"));
    }
}
