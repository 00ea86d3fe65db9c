//! Repository layer for database operations
//!
//! Whole-value reads and writes against the `kv` table. Callers own the
//! encoding of each value; the repository only moves strings.

use crate::error::Result;
use sqlx::SqlitePool;

/// Repository for key-value storage
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Read the raw value stored under `key`
    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(value)
    }

    /// Replace the value stored under `key`
    pub async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    /// Close the underlying pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
