//! Transaction support.
//!
//! The [`atomic()`] function runs a closure inside a transaction: `Ok`
//! commits, `Err` rolls back. Nested `begin` calls on the same
//! [`TransactionManager`] create savepoints instead of nested transactions.
//!
//! `atomic()` first [reserves](DbExecutor::reserve) the executor, so a
//! backend shared by several callers runs one transaction at a time and
//! keeps plain statements from other callers out of it.
//!
//! ```ignore
//! use adminkit_db::transactions::atomic;
//!
//! atomic(db, |txn| async move {
//!     txn.execute_sql("UPDATE slide SET position = ? WHERE id_slide = ?", &params).await?;
//!     Ok(())
//! })
//! .await?;
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use adminkit_core::{AdminKitError, AdminKitResult};
use tokio::sync::Mutex;

use crate::executor::{DatabaseBackendType, DbExecutor};
use crate::row::Row;
use crate::value::Value;

static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_savepoint_name() -> String {
    format!("sp_{}", SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Tracks transaction state for one executor.
pub struct TransactionManager<'a> {
    db: &'a dyn DbExecutor,
    session: Option<Box<dyn DbExecutor>>,
    /// 0 = no transaction, 1 = outermost, 2+ = inside a savepoint.
    depth: Mutex<u32>,
    savepoints: Mutex<Vec<String>>,
}

impl<'a> TransactionManager<'a> {
    /// Creates a manager running its statements directly on `db`.
    pub fn new(db: &'a dyn DbExecutor) -> Self {
        Self {
            db,
            session: None,
            depth: Mutex::new(0),
            savepoints: Mutex::new(Vec::new()),
        }
    }

    /// Creates a manager holding a reservation of `db` until it is dropped.
    ///
    /// # Errors
    ///
    /// Propagates a failure of the backend to hand out its session.
    pub async fn reserve(db: &'a dyn DbExecutor) -> AdminKitResult<Self> {
        let session = db.reserve().await?;
        Ok(Self {
            session,
            ..Self::new(db)
        })
    }

    /// Returns the current nesting depth.
    pub async fn depth(&self) -> u32 {
        *self.depth.lock().await
    }

    /// Returns the executor the statements of the transaction run on.
    pub fn executor(&self) -> &dyn DbExecutor {
        match &self.session {
            Some(session) => &**session,
            None => self.db,
        }
    }

    /// Begins a transaction, or a savepoint when one is already open.
    pub async fn begin(&self) -> AdminKitResult<()> {
        let mut depth = self.depth.lock().await;
        if *depth == 0 {
            let conn = self.executor();
            conn.execute_sql(conn.backend_type().begin_sql(), &[])
                .await?;
        } else {
            let name = next_savepoint_name();
            self.executor().execute_sql(&format!("SAVEPOINT {name}"), &[]).await?;
            self.savepoints.lock().await.push(name);
        }
        *depth += 1;
        Ok(())
    }

    /// Commits the transaction or releases the innermost savepoint.
    pub async fn commit(&self) -> AdminKitResult<()> {
        let mut depth = self.depth.lock().await;
        match *depth {
            0 => Err(AdminKitError::DatabaseError(
                "Cannot commit: not in a transaction".to_string(),
            )),
            1 => {
                self.executor().execute_sql("COMMIT", &[]).await?;
                *depth = 0;
                Ok(())
            }
            _ => {
                if let Some(name) = self.savepoints.lock().await.pop() {
                    self.executor()
                        .execute_sql(&format!("RELEASE SAVEPOINT {name}"), &[])
                        .await?;
                }
                *depth -= 1;
                Ok(())
            }
        }
    }

    /// Rolls back the transaction or the innermost savepoint.
    pub async fn rollback(&self) -> AdminKitResult<()> {
        let mut depth = self.depth.lock().await;
        match *depth {
            0 => Err(AdminKitError::DatabaseError(
                "Cannot rollback: not in a transaction".to_string(),
            )),
            1 => {
                *depth = 0;
                self.executor().execute_sql("ROLLBACK", &[]).await?;
                Ok(())
            }
            _ => {
                if let Some(name) = self.savepoints.lock().await.pop() {
                    self.executor()
                        .execute_sql(&format!("ROLLBACK TO SAVEPOINT {name}"), &[])
                        .await?;
                }
                *depth -= 1;
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl DbExecutor for TransactionManager<'_> {
    fn backend_type(&self) -> DatabaseBackendType {
        self.db.backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> AdminKitResult<u64> {
        self.executor().execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
        self.executor().query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> AdminKitResult<Row> {
        self.executor().query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> AdminKitResult<i64> {
        self.executor().insert_returning_id(sql, params).await
    }
}

/// Runs `f` inside a transaction on a reservation of `db`.
///
/// Commits when `f` returns `Ok`, rolls back when it returns `Err`. A failed
/// rollback is logged and the original error is returned.
pub async fn atomic<'a, F, Fut, T>(db: &'a dyn DbExecutor, f: F) -> AdminKitResult<T>
where
    F: FnOnce(Arc<TransactionManager<'a>>) -> Fut,
    Fut: std::future::Future<Output = AdminKitResult<T>>,
{
    let txn = Arc::new(TransactionManager::reserve(db).await?);
    txn.begin().await?;

    match f(Arc::clone(&txn)).await {
        Ok(result) => {
            txn.commit().await?;
            Ok(result)
        }
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(e)
        }
    }
}
