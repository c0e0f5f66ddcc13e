//! Database layer for salescope
//!
//! SQLite storage behind a thin repository:
//! - Schema migrations for the fixed sales star schema
//! - Read-only parameterized query execution returning result tables
//!
//! Loading data into the schema (ETL) is an external collaborator's
//! responsibility; this layer only guarantees the schema exists.

pub mod repo;
pub mod schema;

pub use repo::Database;
