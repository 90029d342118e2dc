//! The async database executor trait.
//!
//! [`DbExecutor`] is the bridge between the admin layer and concrete database
//! backends. Admin operations accept `&dyn DbExecutor`; backends in
//! `adminkit-db-backends` implement it.

use adminkit_core::{AdminKitError, AdminKitResult};

use crate::row::Row;
use crate::value::Value;

/// The SQL dialects admin statements are written for.
///
/// Both use `?` placeholders; they differ in how a write transaction is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    /// SQLite.
    SQLite,
    /// MySQL / MariaDB.
    MySQL,
}

impl DatabaseBackendType {
    /// The statement that opens an outermost write transaction.
    ///
    /// SQLite takes the write lock up front so that a read-then-write inside
    /// the transaction cannot interleave with another writer.
    pub const fn begin_sql(self) -> &'static str {
        match self {
            Self::SQLite => "BEGIN IMMEDIATE",
            Self::MySQL => "START TRANSACTION",
        }
    }
}

/// Minimal async database executor.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend dialect.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a statement that does not return rows. Returns the number of
    /// rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> AdminKitResult<u64>;

    /// Runs a query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>>;

    /// Runs a query and returns exactly one row.
    ///
    /// Returns `DoesNotExist` if no rows, `MultipleObjectsReturned` if more
    /// than one.
    async fn query_one(&self, sql: &str, params: &[Value]) -> AdminKitResult<Row> {
        let mut rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(AdminKitError::DoesNotExist(
                "Query returned no rows".to_string(),
            )),
            1 => Ok(rows.remove(0)),
            n => Err(AdminKitError::MultipleObjectsReturned(format!(
                "Query returned {n} rows"
            ))),
        }
    }

    /// Reserves the executor for one transaction.
    ///
    /// A backend that multiplexes callers over one connection returns a
    /// session executor: every other caller waits until the session is
    /// dropped, and the statements of the transaction go through the
    /// session. `None` (the default) runs the transaction on `self`.
    async fn reserve(&self) -> AdminKitResult<Option<Box<dyn DbExecutor>>> {
        Ok(None)
    }

    /// Executes an INSERT and returns the id of the inserted row.
    ///
    /// The default issues `SELECT last_insert_rowid()`; backends override it
    /// with their native mechanism.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> AdminKitResult<i64> {
        self.execute_sql(sql, params).await?;
        let row = self
            .query_one("SELECT last_insert_rowid() AS id", &[])
            .await?;
        row.get::<i64>("id")
    }
}
