//! SQLite-backed durable store: connection pool, migrations, health check.
//!
//! Mirrors the engine's queue into `queue_state` and appends lifecycle
//! metrics to `metrics`. WAL mode so readers never block the snapshot writer.

pub mod metrics;
pub mod snapshot;

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::Result;
use crate::storage::{DurableStore, QueueSnapshot};

/// Database handle. Owns the connection pool.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (or create) the database file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Private in-memory database (for testing). Pinned to one connection,
    /// since every SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Run all pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Simple health check: run a SELECT 1.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl DurableStore for Db {
    async fn save_snapshot(&self, snapshot: &QueueSnapshot) -> Result<()> {
        self.replace_queue_state(snapshot).await
    }

    async fn load_snapshot(&self) -> Result<QueueSnapshot> {
        self.load_queue_state().await
    }

    async fn append_metric(&self, kind: &str, value: f64) -> Result<()> {
        self.insert_metric(kind, value).await
    }
}
