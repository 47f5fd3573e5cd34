//! Pool for unit tests of the SQLite-backed key/value store

use sqlx::SqlitePool;

use super::Database;

/// In-memory pool with the `kv_entries` table already migrated
pub async fn test_pool() -> SqlitePool {
    let db = Database::new(None)
        .await
        .expect("in-memory kv database");
    db.pool().clone()
}
