//! Natural-language to SQL generation.
//!
//! The pipeline renders a live schema and a user question into a prompt, asks a
//! language model for a statement, then classifies it, flags safety concerns and
//! sizes the expected result. Database access (schema introspection, guarded
//! execution) lives in [`db`]; the model call lives behind [`llm::CompletionClient`].

pub mod classifier;
pub mod config;
pub mod error;
pub mod estimator;
pub mod generator;
pub mod llm;
pub mod prompt;
pub mod response_parser;
pub mod safety;
pub mod schema;
pub mod suggestions;

// Database module for PostgreSQL
pub mod db;

pub use classifier::OperationKind;
pub use error::{Nl2SqlError, Result};
pub use generator::{GeneratedQuery, QueryGenerator};
pub use schema::{ColumnModel, RelationshipModel, SchemaModel, TableModel};
