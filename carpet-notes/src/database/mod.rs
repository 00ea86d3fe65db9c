//! Persistence layer
//!
//! A small SQLite database holding a single key-value table. Settings and
//! the record collection are each stored as one JSON document under their
//! own key, so the layout matches what the mobile app keeps on device.

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::{initialize_database, schema_version};

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Options for a file-backed database in WAL mode
fn connect_options(db_path: &Path) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5))
        .journal_mode(SqliteJournalMode::Wal)
}

/// Open the database at `db_path`, creating it and its parent directory
/// as needed, and migrate it to the latest schema before handing out a pool.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening database {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let setup = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(db_path))
        .await?;

    initialize_database(&setup).await?;
    setup.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(connect_options(db_path))
        .await?;

    tracing::debug!("Database ready");

    Ok(pool)
}

/// In-memory pool for tests. One connection, since every SQLite memory
/// connection is its own database.
#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    initialize_database(&pool).await.unwrap();
    pool
}
