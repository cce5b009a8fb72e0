//! Database module for PostgreSQL connection and operations
//!
//! Schema introspection feeds the generator; the executor runs reviewed
//! statements under a server-side timeout and a row cap.

pub mod connection;
pub mod executor;
pub mod schema_provider;

pub use connection::{init_pool, test_connection, ConnectionReport, ConnectionStatus, DbPool};
pub use executor::{PgQueryExecutor, QueryExecution, QueryExecutor};
pub use schema_provider::{PgSchemaProvider, SchemaProvider};
