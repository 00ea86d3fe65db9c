//! Schema versioning
//!
//! Migrations are numbered SQL scripts applied in order, each inside its
//! own transaction. The `migrations` table records which ones have run.

use crate::error::Result;
use sqlx::sqlite::SqlitePool;

/// Numbered migration scripts, oldest first
const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("migrations/001_initial_schema.sql"))];

/// Bring the database up to the latest schema version
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    let from = schema_version(pool).await?;
    let mut applied = 0;

    for &(version, script) in MIGRATIONS.iter().filter(|(v, _)| *v > from) {
        let mut tx = pool.begin().await?;
        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO migrations (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::debug!("Applied schema migration {}", version);
        applied += 1;
    }

    if applied > 0 {
        tracing::info!("Schema upgraded from version {} ({} migrations)", from, applied);
    }
    Ok(())
}

/// Highest applied migration, 0 for a fresh database
pub async fn schema_version(pool: &SqlitePool) -> Result<i64> {
    let version: i64 = sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?;
    Ok(version)
}
