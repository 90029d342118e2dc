//! Position management against in-memory SQLite.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use adminkit_admin::positions::{Direction, PositionManager};
use adminkit_core::{AdminKitError, AdminKitResult};
use adminkit_db::{DatabaseBackendType, DbExecutor, EntityDefinition, Row, Value};
use adminkit_db_backends::SqliteBackend;
use async_trait::async_trait;

fn slide() -> EntityDefinition {
    EntityDefinition::new("HomeSlide", "slide", "id_slide")
}

/// Five slides, ids 1..=5 at positions 0..=4.
async fn dense_slides() -> Arc<SqliteBackend> {
    let db = SqliteBackend::memory().unwrap();
    db.execute_batch(
        "CREATE TABLE slide (
            id_slide INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL DEFAULT '',
            id_parent INTEGER NULL,
            position INTEGER NOT NULL DEFAULT 0
        );
        INSERT INTO slide (title, position) VALUES
            ('a', 0), ('b', 1), ('c', 2), ('d', 3), ('e', 4);",
    )
    .await
    .unwrap();
    Arc::new(db)
}

/// `(id, position)` pairs ordered by id.
async fn snapshot(db: &dyn DbExecutor) -> Vec<(i64, i64)> {
    db.query("SELECT id_slide, position FROM slide ORDER BY id_slide", &[])
        .await
        .unwrap()
        .iter()
        .map(|r| (r.get::<i64>("id_slide").unwrap(), r.get::<i64>("position").unwrap()))
        .collect()
}

/// Ids ordered by position.
async fn order(db: &dyn DbExecutor) -> Vec<i64> {
    db.query("SELECT id_slide FROM slide ORDER BY position, id_slide", &[])
        .await
        .unwrap()
        .iter()
        .map(|r| r.get::<i64>("id_slide").unwrap())
        .collect()
}

async fn sorted_positions(db: &dyn DbExecutor) -> Vec<i64> {
    let mut positions: Vec<i64> = snapshot(db).await.into_iter().map(|(_, p)| p).collect();
    positions.sort_unstable();
    positions
}

#[tokio::test]
async fn test_move_up() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    // Row at position 3 (id 4) moves to 1; rows at 1 and 2 shift down.
    assert_eq!(manager.reorder(Direction::Up, 1, 4).await.unwrap(), 1);

    assert_eq!(
        snapshot(db.as_ref()).await,
        vec![(1, 0), (2, 2), (3, 3), (4, 1), (5, 4)]
    );
    assert_eq!(sorted_positions(db.as_ref()).await, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_move_down() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    // Row at position 1 (id 2) moves to 3; rows at 2 and 3 shift up.
    manager.reorder(Direction::Down, 3, 2).await.unwrap();

    assert_eq!(
        snapshot(db.as_ref()).await,
        vec![(1, 0), (2, 3), (3, 1), (4, 2), (5, 4)]
    );
    assert_eq!(order(db.as_ref()).await, vec![1, 3, 4, 2, 5]);
}

#[tokio::test]
async fn test_move_to_same_position_is_noop() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();
    let before = snapshot(db.as_ref()).await;

    assert_eq!(manager.reorder(Direction::Up, 2, 3).await.unwrap(), 2);
    assert_eq!(manager.reorder(Direction::Down, 2, 3).await.unwrap(), 2);

    assert_eq!(snapshot(db.as_ref()).await, before);
}

#[tokio::test]
async fn test_target_past_end_is_clamped() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    assert_eq!(manager.reorder(Direction::Down, 99, 1).await.unwrap(), 4);
    // Already last: the clamped target is the current position.
    assert_eq!(manager.reorder(Direction::Down, 99, 1).await.unwrap(), 4);

    assert_eq!(order(db.as_ref()).await, vec![2, 3, 4, 5, 1]);
    assert_eq!(sorted_positions(db.as_ref()).await, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_mismatched_direction_follows_the_move() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    manager.reorder(Direction::Down, 0, 5).await.unwrap();

    assert_eq!(order(db.as_ref()).await, vec![5, 1, 2, 3, 4]);
    assert_eq!(sorted_positions(db.as_ref()).await, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_sequence_of_moves_stays_dense() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    for (direction, target, id) in [
        (Direction::Up, 0, 5),
        (Direction::Down, 4, 1),
        (Direction::Up, 2, 4),
        (Direction::Down, 3, 5),
    ] {
        manager.reorder(direction, target, id).await.unwrap();
        assert_eq!(sorted_positions(db.as_ref()).await, vec![0, 1, 2, 3, 4]);
    }
}

#[tokio::test]
async fn test_missing_row_is_not_found() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();
    let before = snapshot(db.as_ref()).await;

    let err = manager.reorder(Direction::Up, 0, 42).await.unwrap_err();

    assert!(matches!(err, AdminKitError::NotFound(_)));
    assert_eq!(snapshot(db.as_ref()).await, before);
}

#[tokio::test]
async fn test_renormalize_after_delete() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    db.execute_sql("DELETE FROM slide WHERE position = 2", &[])
        .await
        .unwrap();
    let changed = manager.renormalize(None).await.unwrap();

    assert_eq!(changed, 2);
    assert_eq!(snapshot(db.as_ref()).await, vec![(1, 0), (2, 1), (4, 2), (5, 3)]);
}

#[tokio::test]
async fn test_renormalize_dense_changes_nothing() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();
    assert_eq!(manager.renormalize_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_append_at_end() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    // Row 1 goes after every other row.
    assert_eq!(manager.append_at_end(1).await.unwrap(), 5);
    assert_eq!(manager.next_position(None).await.unwrap(), 6);
}

#[tokio::test]
async fn test_append_on_empty_scope() {
    let db = dense_slides().await;
    let def = slide().with_scope_column("id_parent");
    let manager = PositionManager::new(def, db.clone()).unwrap();

    db.execute_sql(
        "INSERT INTO slide (title, id_parent, position) VALUES ('child', 7, 99)",
        &[],
    )
    .await
    .unwrap();

    assert_eq!(manager.append_at_end(6).await.unwrap(), 0);
    assert_eq!(manager.next_position(Some(&Value::Int(8))).await.unwrap(), 0);
}

#[tokio::test]
async fn test_insert_at_end() {
    let db = dense_slides().await;
    let manager = PositionManager::new(slide(), db.clone()).unwrap();

    let id = manager
        .insert_at_end(&[("title".to_string(), Value::from("f"))], None)
        .await
        .unwrap();

    assert_eq!(id, 6);
    assert_eq!(snapshot(db.as_ref()).await.last(), Some(&(6, 5)));
}

#[tokio::test]
async fn test_scoped_reorder_leaves_other_scopes() {
    let db = dense_slides().await;
    db.execute_batch(
        "UPDATE slide SET id_parent = 1;
         INSERT INTO slide (title, id_parent, position) VALUES
            ('x', 2, 0), ('y', 2, 1), ('z', 2, 2);",
    )
    .await
    .unwrap();
    let manager =
        PositionManager::new(slide().with_scope_column("id_parent"), db.clone()).unwrap();

    manager.reorder(Direction::Up, 0, 8).await.unwrap();

    let other: Vec<(i64, i64)> = snapshot(db.as_ref()).await.into_iter().take(5).collect();
    assert_eq!(other, vec![(1, 0), (2, 1), (3, 2), (4, 3), (5, 4)]);
    let moved: Vec<(i64, i64)> = snapshot(db.as_ref()).await.into_iter().skip(5).collect();
    assert_eq!(moved, vec![(6, 1), (7, 2), (8, 0)]);
}

#[tokio::test]
async fn test_scoped_renormalize_all() {
    let db = dense_slides().await;
    db.execute_batch(
        "UPDATE slide SET id_parent = 1, position = position * 10;
         INSERT INTO slide (title, id_parent, position) VALUES ('x', 2, 5), ('y', 2, 9);",
    )
    .await
    .unwrap();
    let manager =
        PositionManager::new(slide().with_scope_column("id_parent"), db.clone()).unwrap();

    manager.renormalize(None).await.unwrap();

    assert_eq!(
        snapshot(db.as_ref()).await,
        vec![(1, 0), (2, 1), (3, 2), (4, 3), (5, 4), (6, 0), (7, 1)]
    );
}

/// Delegates to SQLite but fails the `fail_at`-th `UPDATE`.
struct FailingExecutor {
    inner: Arc<SqliteBackend>,
    updates: AtomicUsize,
    fail_at: usize,
}

#[async_trait]
impl DbExecutor for FailingExecutor {
    fn backend_type(&self) -> DatabaseBackendType {
        self.inner.backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> AdminKitResult<u64> {
        if sql.starts_with("UPDATE") {
            let n = self.updates.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.fail_at {
                return Err(AdminKitError::DatabaseError("injected failure".to_string()));
            }
        }
        self.inner.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> AdminKitResult<Vec<Row>> {
        self.inner.query(sql, params).await
    }
}

#[tokio::test]
async fn test_failed_second_statement_rolls_back_first() {
    let db = dense_slides().await;
    let failing = Arc::new(FailingExecutor {
        inner: db.clone(),
        updates: AtomicUsize::new(0),
        fail_at: 2,
    });
    let manager = PositionManager::new(slide(), failing.clone()).unwrap();
    let before = snapshot(db.as_ref()).await;

    let err = manager.reorder(Direction::Up, 1, 4).await.unwrap_err();

    assert!(matches!(err, AdminKitError::UpdateFailed(_)));
    assert!(err.to_string().contains("Can not move item 4 to position 1"));
    assert_eq!(failing.updates.load(Ordering::SeqCst), 2);
    assert_eq!(snapshot(db.as_ref()).await, before);
}

#[tokio::test]
async fn test_concurrent_appends_get_distinct_positions() {
    let db = dense_slides().await;
    let manager = Arc::new(PositionManager::new(slide(), db.clone()).unwrap());

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .insert_at_end(&[("title".to_string(), Value::from(format!("n{i}")))], None)
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(sorted_positions(db.as_ref()).await, (0..13).collect::<Vec<_>>());
}
