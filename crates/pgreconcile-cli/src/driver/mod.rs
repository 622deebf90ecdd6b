//! The concrete driver that backs `pgreconcile_core::Connection` with a
//! real PostgreSQL connection.

pub mod sqlx_connection;

pub use sqlx_connection::SqlxConnection;
