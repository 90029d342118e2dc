//! # adminkit-db-backends
//!
//! Concrete [`DbExecutor`](adminkit_db::DbExecutor) implementations.
//!
//! Supported backends:
//! - `SQLite` (feature `sqlite`, on by default)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
