//! JobScout Database Layer
//!
//! `SQLite` persistence for scraped postings. Uses `SQLx` with embedded
//! migrations.
//!
//! # Example
//!
//! ```ignore
//! use jobscout_db::{Database, SqlitePostingStore};
//!
//! let db = Database::open_default().await?;
//! db.run_migrations().await?;
//! let service = service.with_store(Arc::new(db.posting_store()));
//! ```
//!
//! Postings are keyed by `(source, external_id)`, so a job that scrapes the
//! same listing twice leaves a single row.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod migrations;
pub mod postings;
pub mod store;

pub use error::{DatabaseError, Result};
pub use store::SqlitePostingStore;

use jobscout_core::AppConfig;
use std::path::Path;

const DEFAULT_FILE_NAME: &str = "jobscout.db";

/// Database handle wrapping the connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open the database at `path` (or `:memory:`).
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Open `jobscout.db` in the platform data directory.
    pub async fn open_default() -> Result<Self> {
        let dir = AppConfig::data_dir().map_err(|e| DatabaseError::Open(e.to_string()))?;
        Self::new(dir.join(DEFAULT_FILE_NAME)).await
    }

    /// Run all pending migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Number of the latest applied migration.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Underlying pool, for custom queries.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// A [`SqlitePostingStore`] sharing this pool.
    #[must_use]
    pub fn posting_store(&self) -> SqlitePostingStore {
        SqlitePostingStore::new(self.pool.clone())
    }

    /// Close all connections.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
