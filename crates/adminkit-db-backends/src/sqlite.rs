//! SQLite backend using `rusqlite`.
//!
//! [`SqliteBackend`] implements [`DbExecutor`] over a single connection
//! guarded by an async mutex. Every call runs inside
//! `tokio::task::spawn_blocking`.
//!
//! Transactions take a second lock, the gate, for their whole duration
//! through [`DbExecutor::reserve`]. Plain statements pass the gate too, so
//! they never land inside another caller's open transaction.
//!
//! File databases use WAL journaling. `:memory:` opens a private in-memory
//! database, which is what the test suites use.

use std::path::PathBuf;
use std::sync::Arc;

use adminkit_core::settings::DatabaseSettings;
use adminkit_core::{AdminKitError, AdminKitResult};
use adminkit_db::{DatabaseBackendType, DbExecutor, Row, Value};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Connection = Arc<Mutex<rusqlite::Connection>>;

/// A SQLite database backend.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Connection,
    gate: Arc<Mutex<()>>,
}

impl SqliteBackend {
    /// Opens the database at `path` (`:memory:` for an in-memory database).
    ///
    /// # Errors
    ///
    /// Returns `OperationalError` if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> AdminKitResult<Self> {
        let path = path.into();
        let in_memory = path.to_str() == Some(":memory:");
        let conn = if in_memory {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| AdminKitError::OperationalError(format!("SQLite open failed: {e}")))?;

        let pragmas = if in_memory {
            "PRAGMA foreign_keys=ON;"
        } else {
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;"
        };
        conn.execute_batch(pragmas).map_err(|e| {
            AdminKitError::OperationalError(format!("Failed to set pragmas: {e}"))
        })?;

        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
            gate: Arc::new(Mutex::new(())),
        })
    }

    /// Opens an in-memory database.
    pub fn memory() -> AdminKitResult<Self> {
        Self::open(":memory:")
    }

    /// Opens the database named by the settings.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` if the engine is not `sqlite`.
    pub fn from_settings(settings: &DatabaseSettings) -> AdminKitResult<Self> {
        if settings.engine != "sqlite" {
            return Err(AdminKitError::ImproperlyConfigured(format!(
                "Unsupported database engine '{}'",
                settings.engine
            )));
        }
        Self::open(&settings.name)
    }

    /// Returns the database path.
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Runs several `;`-separated statements without parameters (schema
    /// setup, fixtures).
    pub async fn execute_batch(&self, sql: &str) -> AdminKitResult<()> {
        let _gate = self.gate.lock().await;
        let sql = sql.to_string();
        blocking(&self.conn, move |conn| {
            conn.execute_batch(&sql)
                .map_err(|e| AdminKitError::DatabaseError(e.to_string()))
        })
        .await
    }
}

/// Runs `f` on the connection in a blocking task.
async fn blocking<T, F>(conn: &Connection, f: F) -> AdminKitResult<T>
where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Connection) -> AdminKitResult<T> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        f(&conn)
    })
    .await
    .map_err(|e| AdminKitError::DatabaseError(format!("Task join error: {e}")))?
}

fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> AdminKitResult<()> {
    for (i, param) in params.iter().enumerate() {
        let idx = i + 1;
        match param {
            Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
            Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
            Value::Int(v) => stmt.raw_bind_parameter(idx, v),
            Value::Float(v) => stmt.raw_bind_parameter(idx, v),
            Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
            Value::Bytes(b) => stmt.raw_bind_parameter(idx, b.as_slice()),
            Value::DateTime(dt) => {
                stmt.raw_bind_parameter(idx, dt.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            Value::Json(j) => stmt.raw_bind_parameter(idx, j.to_string()),
        }
        .map_err(|e| AdminKitError::DatabaseError(format!("Bind error: {e}")))?;
    }
    Ok(())
}

fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> AdminKitResult<Row> {
    let mut values = Vec::with_capacity(column_names.len());
    for i in 0..column_names.len() {
        let value = match sqlite_row
            .get_ref(i)
            .map_err(|e| AdminKitError::DatabaseError(e.to_string()))?
        {
            rusqlite::types::ValueRef::Null => Value::Null,
            rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
            rusqlite::types::ValueRef::Real(v) => Value::Float(v),
            rusqlite::types::ValueRef::Text(b) => {
                Value::String(String::from_utf8_lossy(b).into_owned())
            }
            rusqlite::types::ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
        };
        values.push(value);
    }
    Ok(Row::new(column_names.to_vec(), values))
}

fn run_execute(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> AdminKitResult<usize> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AdminKitError::DatabaseError(e.to_string()))?;
    bind_params(&mut stmt, params)?;
    stmt.raw_execute()
        .map_err(|e| AdminKitError::DatabaseError(e.to_string()))
}

fn run_query(conn: &rusqlite::Connection, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| AdminKitError::DatabaseError(e.to_string()))?;
    let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    bind_params(&mut stmt, params)?;

    let mut raw_rows = stmt.raw_query();
    let mut rows = Vec::new();
    while let Some(row) = raw_rows
        .next()
        .map_err(|e| AdminKitError::DatabaseError(e.to_string()))?
    {
        rows.push(convert_row(row, &column_names)?);
    }
    Ok(rows)
}

async fn execute_on(conn: &Connection, sql: &str, params: &[Value]) -> AdminKitResult<u64> {
    tracing::debug!(sql, params = params.len(), "execute");
    let sql = sql.to_string();
    let params = params.to_vec();
    blocking(conn, move |conn| {
        let count = run_execute(conn, &sql, &params)?;
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    })
    .await
}

async fn query_on(conn: &Connection, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
    tracing::debug!(sql, params = params.len(), "query");
    let sql = sql.to_string();
    let params = params.to_vec();
    blocking(conn, move |conn| run_query(conn, &sql, &params)).await
}

async fn insert_on(conn: &Connection, sql: &str, params: &[Value]) -> AdminKitResult<i64> {
    tracing::debug!(sql, params = params.len(), "insert");
    let sql = sql.to_string();
    let params = params.to_vec();
    blocking(conn, move |conn| {
        run_execute(conn, &sql, &params)?;
        Ok(conn.last_insert_rowid())
    })
    .await
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> AdminKitResult<u64> {
        let _gate = self.gate.lock().await;
        execute_on(&self.conn, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
        let _gate = self.gate.lock().await;
        query_on(&self.conn, sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> AdminKitResult<i64> {
        let _gate = self.gate.lock().await;
        insert_on(&self.conn, sql, params).await
    }

    async fn reserve(&self) -> AdminKitResult<Option<Box<dyn DbExecutor>>> {
        let gate = Arc::clone(&self.gate).lock_owned().await;

        // A transaction whose future was dropped before COMMIT or ROLLBACK
        // leaves the connection outside autocommit.
        blocking(&self.conn, |conn| {
            if !conn.is_autocommit() {
                tracing::warn!("rolling back a transaction left open");
                conn.execute_batch("ROLLBACK")
                    .map_err(|e| AdminKitError::DatabaseError(e.to_string()))?;
            }
            Ok(())
        })
        .await?;

        Ok(Some(Box::new(SqliteSession {
            conn: Arc::clone(&self.conn),
            _gate: gate,
        })))
    }
}

/// The connection reserved for one transaction. Dropping it lets the
/// other callers in.
struct SqliteSession {
    conn: Connection,
    _gate: OwnedMutexGuard<()>,
}

#[async_trait::async_trait]
impl DbExecutor for SqliteSession {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> AdminKitResult<u64> {
        execute_on(&self.conn, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
        query_on(&self.conn, sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> AdminKitResult<i64> {
        insert_on(&self.conn, sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend_with_table() -> SqliteBackend {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_batch(
                "CREATE TABLE slide (
                    id_slide INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT,
                    position INTEGER NOT NULL DEFAULT 0
                );",
            )
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.backend_type(), DatabaseBackendType::SQLite);
        assert_eq!(backend.path(), &PathBuf::from(":memory:"));
    }

    #[tokio::test]
    async fn test_from_settings_rejects_other_engines() {
        let settings = DatabaseSettings {
            engine: "postgres".to_string(),
            ..DatabaseSettings::default()
        };
        let err = SqliteBackend::from_settings(&settings).err().unwrap();
        assert!(matches!(err, AdminKitError::ImproperlyConfigured(_)));
    }

    #[tokio::test]
    async fn test_insert_and_query() {
        let db = backend_with_table().await;
        let id = db
            .insert_returning_id(
                "INSERT INTO slide (title, position) VALUES (?, ?)",
                &[Value::from("Summer"), Value::Int(0)],
            )
            .await
            .unwrap();
        assert_eq!(id, 1);

        let rows = db
            .query("SELECT id_slide, title, position FROM slide", &[])
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("title").unwrap(), "Summer");
        assert_eq!(rows[0].get::<i64>("position").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_execute_returns_affected_rows() {
        let db = backend_with_table().await;
        for i in 0..3 {
            db.execute_sql(
                "INSERT INTO slide (title, position) VALUES (?, ?)",
                &[Value::from(format!("s{i}")), Value::Int(i)],
            )
            .await
            .unwrap();
        }
        let affected = db
            .execute_sql(
                "UPDATE slide SET position = position + 1 WHERE position >= ?",
                &[Value::Int(1)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let none = db
            .execute_sql("DELETE FROM slide WHERE id_slide = ?", &[Value::Int(99)])
            .await
            .unwrap();
        assert_eq!(none, 0);
    }

    #[tokio::test]
    async fn test_query_one_errors() {
        let db = backend_with_table().await;
        let err = db
            .query_one("SELECT * FROM slide WHERE id_slide = ?", &[Value::Int(1)])
            .await
            .unwrap_err();
        assert!(matches!(err, AdminKitError::DoesNotExist(_)));

        db.execute_batch("INSERT INTO slide (title) VALUES ('a'); INSERT INTO slide (title) VALUES ('b');")
            .await
            .unwrap();
        let err = db.query_one("SELECT * FROM slide", &[]).await.unwrap_err();
        assert!(matches!(err, AdminKitError::MultipleObjectsReturned(_)));
    }

    #[tokio::test]
    async fn test_null_and_blob_values() {
        let db = SqliteBackend::memory().unwrap();
        db.execute_batch("CREATE TABLE t (a TEXT, b BLOB, c REAL);")
            .await
            .unwrap();
        db.execute_sql(
            "INSERT INTO t (a, b, c) VALUES (?, ?, ?)",
            &[Value::Null, Value::Bytes(vec![1, 2, 3]), Value::Float(1.5)],
        )
        .await
        .unwrap();
        let row = db.query_one("SELECT a, b, c FROM t", &[]).await.unwrap();
        assert_eq!(row.get::<Option<String>>("a").unwrap(), None);
        assert_eq!(row.get::<Value>("b").unwrap(), Value::Bytes(vec![1, 2, 3]));
        assert!((row.get::<f64>("c").unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_plain_statement_waits_for_reservation() {
        let db = Arc::new(backend_with_table().await);
        let session = db.reserve().await.unwrap().unwrap();
        session.execute_sql("BEGIN IMMEDIATE", &[]).await.unwrap();
        session
            .execute_sql("INSERT INTO slide (title) VALUES ('pending')", &[])
            .await
            .unwrap();

        let outside = {
            let db = Arc::clone(&db);
            tokio::spawn(async move {
                db.execute_sql("INSERT INTO slide (title) VALUES ('outside')", &[])
                    .await
            })
        };
        tokio::task::yield_now().await;

        session.execute_sql("ROLLBACK", &[]).await.unwrap();
        drop(session);
        outside.await.unwrap().unwrap();

        let rows = db.query("SELECT title FROM slide", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("title").unwrap(), "outside");
    }

    #[tokio::test]
    async fn test_reserve_rolls_back_abandoned_transaction() {
        let db = backend_with_table().await;
        let session = db.reserve().await.unwrap().unwrap();
        session.execute_sql("BEGIN IMMEDIATE", &[]).await.unwrap();
        session
            .execute_sql("INSERT INTO slide (title) VALUES ('lost')", &[])
            .await
            .unwrap();
        drop(session);

        let session = db.reserve().await.unwrap().unwrap();
        session.execute_sql("BEGIN IMMEDIATE", &[]).await.unwrap();
        session.execute_sql("COMMIT", &[]).await.unwrap();
        drop(session);

        let rows = db.query("SELECT title FROM slide", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_bad_sql_is_database_error() {
        let db = SqliteBackend::memory().unwrap();
        let err = db.execute_sql("UPDATE nowhere SET x = 1", &[]).await.unwrap_err();
        assert!(matches!(err, AdminKitError::DatabaseError(_)));
    }
}
