//! Typed privilege sets for the objects that grant them.
//!
//! The original object model keeps privileges as free-form strings
//! validated against a per-class `ALL` set (`objects/base.py::parse_privileges`).
//! Here each grantable resource gets its own closed enum instead, so an
//! invalid privilege name is rejected at parse time by the type checker's
//! cousin, `match`, rather than at runtime string comparison.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::{ReconcileError, Result};

/// A closed set of privilege names for one grantable resource kind.
pub trait PrivilegeKind: Copy + Eq + Ord + fmt::Display + Sized + 'static {
    /// Name used in [`ReconcileError::UnknownPrivilege`].
    const CLASS_NAME: &'static str;

    /// Every member, in the order `ALL` should be expanded.
    fn all() -> &'static [Self];

    /// Parses one already-uppercased, alias-resolved token.
    fn parse_one(token: &str) -> Option<Self>;

    /// Resolves a known alias to its canonical uppercase spelling.
    /// Default: no aliases.
    fn resolve_alias(token: &str) -> &str {
        token
    }
}

/// Parses a collection of privilege names (from JSON definitions or ACL
/// data) into the closed set `P`, expanding the `"ALL"` pseudo-privilege.
pub fn parse_privileges<P: PrivilegeKind>(raw: &[String]) -> Result<BTreeSet<P>> {
    let mut parsed = BTreeSet::new();
    for token in raw {
        let upper = token.to_uppercase();
        if upper == "ALL" {
            parsed.extend(P::all().iter().copied());
            continue;
        }
        let resolved = P::resolve_alias(&upper);
        match P::parse_one(resolved) {
            Some(p) => {
                parsed.insert(p);
            }
            None => {
                return Err(ReconcileError::UnknownPrivilege {
                    privilege: token.clone(),
                    class: P::CLASS_NAME,
                })
            }
        }
    }
    Ok(parsed)
}

macro_rules! privilege_kind {
    ($name:ident, $class_name:expr, { $($variant:ident => $sql:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let s = match self {
                    $($name::$variant => $sql),+
                };
                write!(f, "{s}")
            }
        }

        impl PrivilegeKind for $name {
            const CLASS_NAME: &'static str = $class_name;

            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn parse_one(token: &str) -> Option<Self> {
                match token {
                    $($sql => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

/// Privileges grantable `ON DATABASE` (`objects/database.py::DatabasePrivilege`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DatabasePrivilege {
    Connect,
    Create,
    Temporary,
}

impl fmt::Display for DatabasePrivilege {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DatabasePrivilege::Connect => "CONNECT",
            DatabasePrivilege::Create => "CREATE",
            DatabasePrivilege::Temporary => "TEMPORARY",
        };
        write!(f, "{s}")
    }
}

impl PrivilegeKind for DatabasePrivilege {
    const CLASS_NAME: &'static str = "DatabasePrivilege";

    fn all() -> &'static [Self] {
        &[
            DatabasePrivilege::Connect,
            DatabasePrivilege::Create,
            DatabasePrivilege::Temporary,
        ]
    }

    fn parse_one(token: &str) -> Option<Self> {
        match token {
            "CONNECT" => Some(DatabasePrivilege::Connect),
            "CREATE" => Some(DatabasePrivilege::Create),
            "TEMPORARY" => Some(DatabasePrivilege::Temporary),
            _ => None,
        }
    }

    // "TEMP" is the PostgreSQL-documented alias for TEMPORARY.
    fn resolve_alias(token: &str) -> &str {
        if token == "TEMP" {
            "TEMPORARY"
        } else {
            token
        }
    }
}

privilege_kind!(SchemaPrivilege, "SchemaPrivilege", {
    Create => "CREATE",
    Usage => "USAGE",
});

privilege_kind!(SchemaTablesPrivilege, "SchemaTablesPrivilege", {
    Select => "SELECT",
    Insert => "INSERT",
    Update => "UPDATE",
    Delete => "DELETE",
    Truncate => "TRUNCATE",
    References => "REFERENCES",
    Trigger => "TRIGGER",
});

/// Maps a single-letter `datacl`/`defaclacl` ACL code to its privilege.
pub fn database_privilege_from_acl_code(code: char) -> Option<DatabasePrivilege> {
    match code {
        'c' => Some(DatabasePrivilege::Connect),
        'C' => Some(DatabasePrivilege::Create),
        'T' => Some(DatabasePrivilege::Temporary),
        _ => None,
    }
}

/// Maps a single-letter ACL code for `ALTER DEFAULT PRIVILEGES ... ON TABLES`.
pub fn schema_tables_privilege_from_acl_code(code: char) -> Option<SchemaTablesPrivilege> {
    match code {
        'r' => Some(SchemaTablesPrivilege::Select),
        'a' => Some(SchemaTablesPrivilege::Insert),
        'w' => Some(SchemaTablesPrivilege::Update),
        'd' => Some(SchemaTablesPrivilege::Delete),
        'D' => Some(SchemaTablesPrivilege::Truncate),
        'x' => Some(SchemaTablesPrivilege::References),
        't' => Some(SchemaTablesPrivilege::Trigger),
        _ => None,
    }
}
