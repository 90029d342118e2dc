//! # adminkit-db
//!
//! Database plumbing for adminkit: backend-agnostic [`Value`]s and [`Row`]s,
//! the async [`DbExecutor`] trait that backends implement, transactions via
//! [`atomic`], and [`EntityDefinition`] table metadata.

pub mod entity;
pub mod executor;
pub mod row;
pub mod transactions;
pub mod value;

pub use entity::EntityDefinition;
pub use executor::{DatabaseBackendType, DbExecutor};
pub use row::{FromValue, Row};
pub use transactions::{atomic, TransactionManager};
pub use value::Value;
