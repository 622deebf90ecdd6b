//! Error types for the reconciliation engine.
//!
//! # Error Handling Strategy
//!
//! Every failure mode the engine can produce is represented by one
//! [`ReconcileError`] variant, matching the error-kind catalogue in the
//! specification: registration errors, parse errors, graph errors,
//! observed-state load errors, statement execution errors, and
//! unsupported-state errors. All of them are fatal: the caller is expected
//! to stop the run, not retry or partially recover.

use crate::graph::GraphError;

/// The result type used throughout the engine.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// A failure raised anywhere in the reconciliation engine.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A desired object was registered twice under the same key.
    #[error("object {key} is already registered")]
    DuplicateRegistration { key: String },

    /// Code attempted to register a link entity directly (`GroupMembership`,
    /// `DatabaseOwner`, `SchemaOwner`); link entities are only ever
    /// introduced by their parent object during graph construction.
    #[error("{kind} is a link entity and cannot be registered directly")]
    LinkEntityRegistration { kind: &'static str },

    /// A dependency named by a newly registered object is not itself
    /// registered.
    #[error("{object} depends on {dependency} but it is not registered")]
    MissingDependency { object: String, dependency: String },

    /// A dependency named by a newly registered, `present` object is
    /// registered but marked absent.
    #[error("{object} depends on {dependency} but it is marked absent")]
    AbsentDependency { object: String, dependency: String },

    /// A role name could not be resolved to a registered `Group` or `User`.
    #[error(
        "ambiguous role {rolename:?} - declare it as a Group or User before \
         referencing it in another object"
    )]
    AmbiguousRole { rolename: String },

    /// An unknown privilege name was passed to the privilege parser.
    #[error("unsupported privilege {privilege:?} for {class}")]
    UnknownPrivilege { privilege: String, class: &'static str },

    /// An unknown object `type` was named in a JSON definition.
    #[error("unknown object type {type_name:?}")]
    UnknownObjectType { type_name: String },

    /// A database ACL string was not well-formed.
    #[error("malformed ACL entry: {0}")]
    MalformedAcl(String),

    /// The dependency graph contains a cycle.
    #[error("dependency graph has at least one cycle")]
    Cycle,

    /// The dependency graph has no vertex without outgoing dependency edges.
    #[error("dependency graph has no vertex with no dependencies (every vertex depends on something)")]
    NoRoot,

    /// Observed-state loading failed against the driver.
    #[error("failed to load observed state: {0}")]
    ObservedStateLoad(String),

    /// A statement failed to execute against the driver.
    #[error("statement execution failed on {database}: {message} (query: {query})")]
    StatementExecution {
        database: String,
        query: String,
        message: String,
    },

    /// A query returned more rows than `get_one` allows.
    #[error("expected at most one row, got {count}")]
    MultipleRows { count: usize },

    /// An operation the engine explicitly refuses, detected at statement
    /// generation time, before any statement is dispatched.
    #[error("unsupported configuration: {0}")]
    UnsupportedState(String),
}

impl From<GraphError> for ReconcileError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::Cycle => ReconcileError::Cycle,
            GraphError::NoRoot => ReconcileError::NoRoot,
        }
    }
}
