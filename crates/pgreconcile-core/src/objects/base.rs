//! Shared vocabulary for the object model: the four-valued state a desired
//! object can classify to, the key type used as a graph vertex, and the
//! forbidden-role check every role-shaped object consults.
//!
//! Grounded on `pg_objects/objects/base.py`.

use std::fmt;

use crate::statement::Statement;

/// The classification of a desired object against the observed snapshot.
///
/// Matches `objects/base.py::ObjectState`'s four sentinel values exactly;
/// represented here as a closed enum instead of a tagged string so the
/// statement generator's pass logic (§4.6) is a `match`, not a string
/// comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectState {
    /// The object currently exists and matches the desired configuration.
    Present,
    /// The object does not currently exist.
    Absent,
    /// The object currently exists but does not match the desired
    /// configuration (privileges, owner, ...).
    Different,
    /// State detection is not supported for this object; treat as if a
    /// create/maintain pass is always warranted.
    Unknown,
}

impl ObjectState {
    pub fn is_present(self) -> bool {
        matches!(self, ObjectState::Present)
    }

    pub fn is_absent(self) -> bool {
        matches!(self, ObjectState::Absent)
    }

    pub fn is_different(self) -> bool {
        matches!(self, ObjectState::Different)
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, ObjectState::Unknown)
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectState::Present => "PRESENT",
            ObjectState::Absent => "ABSENT",
            ObjectState::Different => "DIFFERENT",
            ObjectState::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// The stable string key that identifies an object, of the form
/// `<TypeName>(<attributes>)` (§3). Used as the graph vertex type so that
/// the registry, the graph, and statement routing all agree on identity
/// without needing a shared reference to the object itself.
pub type ObjectKey = String;

/// Roles that are always externally managed and never touched by
/// `stmts_to_create`/`stmts_to_drop`, beyond the per-run master user.
///
/// Grounded on `objects/role.py::Role.FORBIDDEN_ROLES`.
const FORBIDDEN_ROLES: &[&str] = &["public", "postgres"];

/// Whether a role named `name` may be created or dropped by this engine.
///
/// `public`, `postgres`, any `pg_`-prefixed role, and the role the master
/// connection itself authenticates as are all externally managed.
pub fn is_managed_role(name: &str, master_user: &str) -> bool {
    let lower = name.to_lowercase();
    if FORBIDDEN_ROLES.contains(&lower.as_str()) {
        return false;
    }
    if lower.starts_with("pg_") {
        return false;
    }
    if name == master_user {
        return false;
    }
    true
}

/// Context every emission method needs: identity of the master connection,
/// used to build `REASSIGN OWNED BY ... TO <master_user>` and to route
/// statements to the master database.
#[derive(Debug, Clone, Copy)]
pub struct EmitCtx<'a> {
    pub master_user: &'a str,
    pub master_database: &'a str,
}

/// Shorthand for the `Vec<Statement>` most emission methods produce; a few
/// (`DefaultPrivilege`) can fail at emission time (§7.6), so all emission
/// methods return this uniformly.
pub type EmitResult = crate::error::Result<Vec<Statement>>;
