//! SQLite connection pool.
//!
//! The pool is shared by ingestion (one write transaction per upload) and
//! the answer path (cache lookups and answer inserts). WAL lets those reads
//! proceed during a write; the busy timeout makes a second writer wait for
//! the lock instead of failing with `SQLITE_BUSY`.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::time::Duration;

use crate::config::{Config, DbConfig};

fn connect_options(db: &DbConfig) -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .filename(&db.path)
        .create_if_missing(true)
        // Deleting a document cascades to its chunks.
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(db.busy_timeout_ms))
}

/// Open the pool for `[db].path`, creating the file and its directory on
/// first use.
pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db = &config.db;

    if let Some(parent) = db.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(db.max_connections)
        .connect_with(connect_options(db))
        .await
        .with_context(|| format!("Failed to open database {}", db.path.display()))?;

    tracing::debug!(
        path = %db.path.display(),
        max_connections = db.max_connections,
        "opened database"
    );
    Ok(pool)
}
