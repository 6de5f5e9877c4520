//! Persistence layer — libSQL-backed storage for accounts, transcripts,
//! and extracted variables.

pub mod libsql_backend;
pub mod migrations;
pub mod model;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::Database;
