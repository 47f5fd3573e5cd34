//! SQLite-backed key/value store

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use super::{KvEntry, KvError, KvStore};

/// Key/value store persisted in the `kv_entries` table
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    /// Create a store over an already-migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    async fn get_with_metadata(&self, key: &str) -> Result<Option<KvEntry>, KvError> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT value, metadata FROM kv_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        let Some((value, metadata)) = row else {
            return Ok(None);
        };

        let metadata = metadata
            .map(|m| serde_json::from_str::<serde_json::Value>(&m))
            .transpose()?;

        Ok(Some(KvEntry { value, metadata }))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        metadata: Option<&serde_json::Value>,
    ) -> Result<(), KvError> {
        let metadata = metadata.map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO kv_entries (key, value, metadata, updated_at) VALUES (?, ?, ?, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, metadata = excluded.metadata, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(metadata)
        .execute(&self.pool)
        .await?;

        debug!("Stored kv entry {}", key);
        Ok(())
    }
}
