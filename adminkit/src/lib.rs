//! # adminkit
//!
//! Building blocks for shop admin-panel modules.
//!
//! This is the meta-crate that re-exports all sub-crates. Depend on
//! `adminkit` to get everything, or on individual crates for finer-grained
//! control.

/// Error types, settings, logging, the request context, version comparison.
pub use adminkit_core as core;

/// Database executor, values, rows, transactions, entity definitions.
#[cfg(feature = "db")]
pub use adminkit_db as db;

/// Database backends (`SQLite`).
pub use adminkit_db_backends as db_backends;

/// Position ordering, controllers, settings pages, module metadata, images.
#[cfg(feature = "admin")]
pub use adminkit_admin as admin;

/// Re-exports of the commonly used third-party crates.
pub mod reexports {
    pub use async_trait;
    pub use axum;
    pub use serde;
    pub use serde_json;
    pub use tokio;
    pub use tracing;
}
