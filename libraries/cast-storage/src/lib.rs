//! Castaway Storage
//!
//! `SQLite` persistence for episodes, podcasts and playback records, plus an
//! in-memory store with the same contract for tests and tooling.
//!
//! # Architecture
//!
//! - **Vertical Slicing**: each table owns its own queries (`episodes`, `podcasts`, `records`)
//! - **Transactional batches**: [`SqliteStore::save`](cast_core::PlaybackStore::save)
//!   applies a whole [`WriteBatch`](cast_core::WriteBatch) in one transaction
//! - **Pooled connections**: every call checks out its own connection, so
//!   background writes never block foreground reads
//!
//! # Example
//!
//! ```rust,no_run
//! use cast_core::{EpisodeId, PlaybackStore, WriteBatch};
//! use cast_storage::{create_pool, run_migrations, SqliteStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = create_pool("sqlite://castaway.db").await?;
//! run_migrations(&pool).await?;
//!
//! let store = SqliteStore::new(pool);
//! let episode = EpisodeId::new("ep-1");
//!
//! let mut batch = WriteBatch::new();
//! batch.set_position(&episode, 42.0);
//! store.save(batch).await?;
//! # Ok(())
//! # }
//! ```

mod context;
mod error;
mod memory;

// Vertical slices
pub mod episodes;
pub mod podcasts;
pub mod records;

pub use context::SqliteStore;
pub use error::{Result, StorageError};
pub use memory::MemoryStore;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// Call once at startup, before handing the pool to a [`SqliteStore`].
pub async fn run_migrations(pool: &SqlitePool) -> std::result::Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://castaway.db>`)
pub async fn create_pool(database_url: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!(url = %database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    tracing::info!("SQLite pool ready");

    Ok(pool)
}

/// Decode a Unix timestamp column
pub(crate) fn from_timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| StorageError::InvalidValue(format!("timestamp out of range: {secs}")))
}
