pub mod acl;
pub mod connection;
pub mod error;
pub mod graph;
pub mod objects;
pub mod observed;
pub mod password;
pub mod privilege;
pub mod setup;
pub mod statement;

pub use connection::{Connection, ConnectionManager, QueryResult};
pub use error::{ReconcileError, Result};
pub use graph::{Graph, GraphError};
pub use objects::{EmitCtx, LinkObject, ManagedObject, Node, ObjectKey, ObjectState, Registry};
pub use observed::ObservedState;
pub use setup::Setup;
pub use statement::{Database, Statement};
