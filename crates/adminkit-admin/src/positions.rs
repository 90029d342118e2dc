//! Drag-and-drop ordering of admin list rows.
//!
//! The [`PositionManager`] keeps the position column of one entity table
//! dense: after every operation the rows of a scope hold exactly the
//! positions `0..N`. Every multi-statement operation runs inside one
//! transaction. Isolation between callers sharing a connection comes from the
//! executor's reservation (see `adminkit_db::atomic`); the manager's own
//! mutex additionally keeps work spanning two transactions, such as a delete
//! followed by a renormalize, from interleaving with its other operations.

use std::sync::Arc;

use adminkit_core::{AdminKitError, AdminKitResult};
use adminkit_db::{atomic, DbExecutor, EntityDefinition, Value};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

/// Which way a row is dragged in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Toward a lower index (`way = 0`).
    Up,
    /// Toward a higher index (`way = 1`).
    Down,
}

impl Direction {
    /// The wire value of the direction.
    pub const fn way(self) -> i64 {
        match self {
            Self::Up => 0,
            Self::Down => 1,
        }
    }
}

impl TryFrom<i64> for Direction {
    type Error = AdminKitError;

    fn try_from(way: i64) -> Result<Self, Self::Error> {
        match way {
            0 => Ok(Self::Up),
            1 => Ok(Self::Down),
            other => Err(AdminKitError::BadRequest(format!(
                "Invalid direction {other}, expected 0 or 1"
            ))),
        }
    }
}

/// Position and scope of one row, as loaded before a move.
#[derive(Debug, Clone, PartialEq)]
struct Placement {
    position: i64,
    scope: Option<Value>,
}

/// Keeps the positions of one entity table dense.
pub struct PositionManager {
    def: EntityDefinition,
    db: Arc<dyn DbExecutor>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionManager")
            .field("table", &self.def.table)
            .field("position_column", &self.def.position_column)
            .field("scope_column", &self.def.scope_column)
            .finish_non_exhaustive()
    }
}

impl PositionManager {
    /// Creates a manager for the given entity.
    ///
    /// # Errors
    ///
    /// Returns `ImproperlyConfigured` if the definition holds an identifier
    /// that is not a plain SQL name.
    pub fn new(def: EntityDefinition, db: Arc<dyn DbExecutor>) -> AdminKitResult<Self> {
        def.validate()?;
        Ok(Self {
            def,
            db,
            lock: Mutex::new(()),
        })
    }

    /// Returns the entity definition.
    pub const fn definition(&self) -> &EntityDefinition {
        &self.def
    }

    /// Returns the executor.
    pub fn executor(&self) -> &dyn DbExecutor {
        self.db.as_ref()
    }

    /// Serializes a caller's multi-step work with the manager's own
    /// operations.
    pub(crate) async fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }

    /// Moves `object_id` to `target_position`, shifting the rows between its
    /// old and new position by one.
    ///
    /// The target is clamped to the last position of the scope. A move to
    /// the current position is a no-op. Returns the position the row holds
    /// afterwards.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for a negative target.
    /// - `NotFound` if the row does not exist (nothing is mutated).
    /// - `UpdateFailed` if a statement fails; the transaction is rolled back.
    pub async fn reorder(
        &self,
        direction: Direction,
        target_position: i64,
        object_id: i64,
    ) -> AdminKitResult<i64> {
        if target_position < 0 {
            return Err(AdminKitError::BadRequest(format!(
                "Invalid position {target_position}"
            )));
        }

        let _guard = self.guard().await;
        let (from, to) = atomic(self.db.as_ref(), |txn| async move {
            let conn: &dyn DbExecutor = &*txn;
            let current = self.load(conn, object_id).await?;
            let count = self.count(conn, current.scope.as_ref()).await?;
            let target = target_position.min(count - 1);

            if target == current.position {
                return Ok((current.position, target));
            }

            let effective = if target < current.position {
                Direction::Up
            } else {
                Direction::Down
            };
            if effective != direction {
                tracing::warn!(
                    table = %self.def.table,
                    object_id,
                    requested = ?direction,
                    applied = ?effective,
                    "direction does not match the move, using the move"
                );
            }

            let t = &self.def.table;
            let p = &self.def.position_column;
            let pk = &self.def.primary;
            let (scope_sql, scope_params) = self.scope_clause(current.scope.as_ref(), "");
            let (shift_sql, low, high) = match effective {
                Direction::Up => (
                    format!(
                        "UPDATE {t} SET {p} = {p} + 1 WHERE {p} >= ? AND {p} < ? AND {pk} <> ?{scope_sql}"
                    ),
                    target,
                    current.position,
                ),
                Direction::Down => (
                    format!(
                        "UPDATE {t} SET {p} = {p} - 1 WHERE {p} > ? AND {p} <= ? AND {pk} <> ?{scope_sql}"
                    ),
                    current.position,
                    target,
                ),
            };
            let mut shift_params = vec![Value::Int(low), Value::Int(high), Value::Int(object_id)];
            shift_params.extend(scope_params);

            conn.execute_sql(&shift_sql, &shift_params).await?;
            conn.execute_sql(
                &format!("UPDATE {t} SET {p} = ? WHERE {pk} = ?"),
                &[Value::Int(target), Value::Int(object_id)],
            )
            .await?;
            Ok((current.position, target))
        })
        .await
        .map_err(|e| {
            self.update_failed(e, &format!("item {object_id} to position {target_position}"))
        })?;

        if from == to {
            tracing::debug!(table = %self.def.table, object_id, "row already in place");
        } else {
            tracing::info!(table = %self.def.table, object_id, from, to, "row moved");
        }
        Ok(to)
    }

    /// Puts `object_id` after every other row of its scope and returns the
    /// assigned position (`0` for a scope with no other row).
    ///
    /// The position is computed by a sub-select inside the `UPDATE`, so two
    /// sessions appending at once cannot both read the same maximum.
    pub async fn append_at_end(&self, object_id: i64) -> AdminKitResult<i64> {
        let _guard = self.guard().await;
        let position = atomic(self.db.as_ref(), |txn| async move {
            let conn: &dyn DbExecutor = &*txn;
            let current = self.load(conn, object_id).await?;

            let t = &self.def.table;
            let p = &self.def.position_column;
            let pk = &self.def.primary;
            let scope_col = self
                .def
                .scope_column
                .as_ref()
                .map_or_else(String::new, |c| format!(", {c}"));
            let (scope_sql, scope_params) = self.scope_clause(current.scope.as_ref(), "o.");
            let sql = format!(
                "UPDATE {t} SET {p} = (SELECT COALESCE(MAX(o.{p}), -1) + 1 \
                 FROM (SELECT {pk}, {p}{scope_col} FROM {t}) AS o \
                 WHERE o.{pk} <> ?{scope_sql}) \
                 WHERE {pk} = ?"
            );
            let mut params = vec![Value::Int(object_id)];
            params.extend(scope_params);
            params.push(Value::Int(object_id));
            conn.execute_sql(&sql, &params).await?;

            Ok(self.load(conn, object_id).await?.position)
        })
        .await
        .map_err(|e| self.update_failed(e, &format!("item {object_id} to the end")))?;

        tracing::info!(table = %self.def.table, object_id, position, "row appended");
        Ok(position)
    }

    /// Returns the position [`append_at_end`](Self::append_at_end) would
    /// assign to a new row of `scope`.
    pub async fn next_position(&self, scope: Option<&Value>) -> AdminKitResult<i64> {
        let (scope_sql, params) = self.scope_clause(scope, "");
        let sql = format!(
            "SELECT COALESCE(MAX({p}), -1) + 1 AS next_position FROM {t} WHERE 1 = 1{scope_sql}",
            p = self.def.position_column,
            t = self.def.table,
        );
        self.db
            .query_one(&sql, &params)
            .await?
            .get::<i64>("next_position")
    }

    /// Inserts a row at the end of `scope` and returns its identifier.
    pub async fn insert_at_end(
        &self,
        columns: &[(String, Value)],
        scope: Option<&Value>,
    ) -> AdminKitResult<i64> {
        let _guard = self.guard().await;
        let (sql, params) = self.append_insert_sql(columns, scope);
        atomic(self.db.as_ref(), |txn| async move {
            txn.insert_returning_id(&sql, &params).await
        })
        .await
    }

    /// Makes room at `position` for a row about to be inserted into `scope`
    /// and returns the position to insert at.
    ///
    /// The position is clamped to `0..=N` for a scope of `N` rows, and the
    /// rows at or after it move down by one. Runs on `conn` so the caller's
    /// insert lands in the same transaction.
    pub(crate) async fn open_slot(
        &self,
        conn: &dyn DbExecutor,
        position: i64,
        scope: Option<&Value>,
    ) -> AdminKitResult<i64> {
        let count = self.count(conn, scope).await?;
        let slot = position.clamp(0, count);
        let (scope_sql, scope_params) = self.scope_clause(scope, "");
        let mut params = vec![Value::Int(slot)];
        params.extend(scope_params);
        conn.execute_sql(
            &format!(
                "UPDATE {t} SET {p} = {p} + 1 WHERE {p} >= ?{scope_sql}",
                t = self.def.table,
                p = self.def.position_column,
            ),
            &params,
        )
        .await?;
        Ok(slot)
    }

    /// Builds an `INSERT ... SELECT` whose position is the next free one of
    /// `scope`.
    pub(crate) fn append_insert_sql(
        &self,
        columns: &[(String, Value)],
        scope: Option<&Value>,
    ) -> (String, Vec<Value>) {
        let t = &self.def.table;
        let p = &self.def.position_column;
        let names: Vec<&str> = columns.iter().map(|(c, _)| c.as_str()).collect();
        let sep = if columns.is_empty() { "" } else { ", " };
        let (scope_sql, scope_params) = self.scope_clause(scope, "");

        let sql = format!(
            "INSERT INTO {t} ({names}{sep}{p}) SELECT {placeholders}{sep}COALESCE(MAX({p}), -1) + 1 \
             FROM {t} WHERE 1 = 1{scope_sql}",
            names = names.join(", "),
            placeholders = vec!["?"; columns.len()].join(", "),
        );
        let mut params: Vec<Value> = columns.iter().map(|(_, v)| v.clone()).collect();
        params.extend(scope_params);
        (sql, params)
    }

    /// Reassigns positions `0..N` to the rows of `scope`, keeping their
    /// relative order. `None` renormalizes every scope of the table.
    ///
    /// Returns the number of rows whose position changed.
    pub async fn renormalize(&self, scope: Option<&Value>) -> AdminKitResult<u64> {
        let _guard = self.guard().await;
        self.renormalize_locked(scope).await
    }

    /// Renormalizes every scope of the table.
    pub async fn renormalize_all(&self) -> AdminKitResult<u64> {
        self.renormalize(None).await
    }

    /// [`renormalize`](Self::renormalize) for callers already holding the
    /// guard.
    pub(crate) async fn renormalize_locked(&self, scope: Option<&Value>) -> AdminKitResult<u64> {
        let changed = atomic(self.db.as_ref(), |txn| async move {
            let conn: &dyn DbExecutor = &*txn;
            match (&self.def.scope_column, scope) {
                (Some(_), None) => {
                    let mut changed = 0;
                    for value in self.scopes(conn).await? {
                        changed += self.renormalize_scope(conn, Some(&value)).await?;
                    }
                    Ok(changed)
                }
                _ => self.renormalize_scope(conn, scope).await,
            }
        })
        .await
        .map_err(|e| {
            tracing::warn!(table = %self.def.table, error = %e, "renormalize rolled back");
            AdminKitError::UpdateFailed(format!(
                "Can not renormalize positions of {}: {e}",
                self.def.table
            ))
        })?;

        tracing::info!(table = %self.def.table, changed, "positions renormalized");
        Ok(changed)
    }

    async fn renormalize_scope(
        &self,
        conn: &dyn DbExecutor,
        scope: Option<&Value>,
    ) -> AdminKitResult<u64> {
        let t = &self.def.table;
        let p = &self.def.position_column;
        let pk = &self.def.primary;
        let (scope_sql, params) = self.scope_clause(scope, "");
        let rows = conn
            .query(
                &format!(
                    "SELECT {pk} AS id, {p} AS position FROM {t} WHERE 1 = 1{scope_sql} \
                     ORDER BY {p} ASC, {pk} ASC"
                ),
                &params,
            )
            .await?;

        let update = format!("UPDATE {t} SET {p} = ? WHERE {pk} = ?");
        let mut changed = 0;
        for (expected, row) in (0_i64..).zip(rows.iter()) {
            let position = row.get::<Option<i64>>("position")?;
            if position != Some(expected) {
                let id = row.get::<i64>("id")?;
                conn.execute_sql(&update, &[Value::Int(expected), Value::Int(id)])
                    .await?;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Loads the position and scope of a row.
    async fn load(&self, conn: &dyn DbExecutor, object_id: i64) -> AdminKitResult<Placement> {
        let scope_select = self
            .def
            .scope_column
            .as_ref()
            .map_or_else(String::new, |c| format!(", {c} AS scope"));
        let sql = format!(
            "SELECT {p} AS position{scope_select} FROM {t} WHERE {pk} = ?",
            p = self.def.position_column,
            t = self.def.table,
            pk = self.def.primary,
        );
        let row = conn
            .query(&sql, &[Value::Int(object_id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                tracing::warn!(table = %self.def.table, object_id, "row not found");
                AdminKitError::NotFound(format!("{} ({object_id}) not found", self.def.class_name))
            })?;

        let position = row.get::<Option<i64>>("position")?.unwrap_or_default();
        let scope = match self.def.scope_column {
            Some(_) => Some(row.get::<Value>("scope")?),
            None => None,
        };
        Ok(Placement { position, scope })
    }

    async fn count(&self, conn: &dyn DbExecutor, scope: Option<&Value>) -> AdminKitResult<i64> {
        let (scope_sql, params) = self.scope_clause(scope, "");
        let sql = format!(
            "SELECT COUNT(*) AS n FROM {t} WHERE 1 = 1{scope_sql}",
            t = self.def.table
        );
        conn.query_one(&sql, &params).await?.get::<i64>("n")
    }

    async fn scopes(&self, conn: &dyn DbExecutor) -> AdminKitResult<Vec<Value>> {
        let Some(col) = &self.def.scope_column else {
            return Ok(Vec::new());
        };
        let sql = format!("SELECT DISTINCT {col} AS scope FROM {t}", t = self.def.table);
        conn.query(&sql, &[])
            .await?
            .iter()
            .map(|row| row.get::<Value>("scope"))
            .collect()
    }

    /// The `AND <scope> = ?` filter for a scope value, qualified with
    /// `qualifier` (e.g. `"o."`). Empty when the entity is unscoped or no
    /// value is given.
    pub(crate) fn scope_clause(&self, scope: Option<&Value>, qualifier: &str) -> (String, Vec<Value>) {
        match (&self.def.scope_column, scope) {
            (Some(col), Some(Value::Null)) => (format!(" AND {qualifier}{col} IS NULL"), vec![]),
            (Some(col), Some(value)) => (format!(" AND {qualifier}{col} = ?"), vec![value.clone()]),
            _ => (String::new(), vec![]),
        }
    }

    fn update_failed(&self, err: AdminKitError, what: &str) -> AdminKitError {
        match err {
            AdminKitError::NotFound(_) | AdminKitError::BadRequest(_) => err,
            other => {
                tracing::warn!(
                    table = %self.def.table,
                    error = %other,
                    "position update rolled back"
                );
                AdminKitError::UpdateFailed(format!("Can not move {what}: {other}"))
            }
        }
    }
}
