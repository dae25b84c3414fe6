//! [`PostingStore`] backed by the `job_postings` table.

use crate::postings;
use async_trait::async_trait;
use jobscout_boards::ScrapedPosting;
use jobscout_orchestrator::PostingStore;
use sqlx::{Pool, Sqlite};

/// Persists completed scrape results through [`postings::upsert_postings`].
#[derive(Debug, Clone)]
pub struct SqlitePostingStore {
    pool: Pool<Sqlite>,
}

impl SqlitePostingStore {
    /// Wrap an open, migrated pool.
    #[must_use]
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostingStore for SqlitePostingStore {
    async fn upsert_postings(
        &self,
        postings: &[ScrapedPosting],
    ) -> jobscout_orchestrator::Result<usize> {
        Ok(postings::upsert_postings(&self.pool, postings).await?)
    }
}
