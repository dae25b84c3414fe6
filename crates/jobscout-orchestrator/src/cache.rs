//! Short-term result cache collaborator.

use crate::error::Result;
use async_trait::async_trait;
use jobscout_boards::ScrapingResult;
use jobscout_core::JobId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Stores finished results for a limited time, keyed by job id.
///
/// The service treats the cache as optional: failures are logged and never
/// fail the job.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// Store `result` for `ttl`.
    async fn set(&self, job_id: &JobId, result: &ScrapingResult, ttl: Duration) -> Result<()>;

    /// Cached result, if present and not expired.
    async fn get(&self, job_id: &JobId) -> Result<Option<ScrapingResult>>;

    /// Check the cache backend is reachable.
    async fn ping(&self) -> Result<()>;
}

/// In-process [`ResultCache`] holding JSON-encoded results.
#[derive(Debug, Default)]
pub struct InMemoryResultCache {
    entries: Mutex<HashMap<JobId, (Instant, String)>>,
}

impl InMemoryResultCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries not yet expired.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .expect("acquire cache lock")
            .values()
            .filter(|(expires, _)| *expires > now)
            .count()
    }

    /// Whether every entry has expired.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn set(&self, job_id: &JobId, result: &ScrapingResult, ttl: Duration) -> Result<()> {
        let encoded = serde_json::to_string(result)?;
        let mut entries = self.entries.lock().expect("acquire cache lock");
        let now = Instant::now();
        entries.retain(|_, (expires, _)| *expires > now);
        entries.insert(job_id.clone(), (now + ttl, encoded));
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Result<Option<ScrapingResult>> {
        let encoded = {
            let mut entries = self.entries.lock().expect("acquire cache lock");
            match entries.get(job_id) {
                Some((expires, _)) if *expires <= Instant::now() => {
                    entries.remove(job_id);
                    None
                }
                Some((_, encoded)) => Some(encoded.clone()),
                None => None,
            }
        };

        Ok(encoded.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
