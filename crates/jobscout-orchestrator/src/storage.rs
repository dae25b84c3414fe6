//! Posting storage collaborator.

use crate::error::Result;
use async_trait::async_trait;
use jobscout_boards::ScrapedPosting;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Durable home for extracted postings.
///
/// `upsert_postings` must be idempotent on `(source, external_id)`: storing
/// the same posting twice leaves exactly one record.
#[async_trait]
pub trait PostingStore: Send + Sync {
    /// Insert or update `postings`. Returns how many records were written.
    async fn upsert_postings(&self, postings: &[ScrapedPosting]) -> Result<usize>;
}

/// [`PostingStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryPostingStore {
    postings: RwLock<BTreeMap<(String, String), ScrapedPosting>>,
}

impl InMemoryPostingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct postings stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.postings.read().expect("acquire read lock on postings").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored posting for `source` and `external_id`.
    #[must_use]
    pub fn get(&self, source: &str, external_id: &str) -> Option<ScrapedPosting> {
        self.postings
            .read()
            .expect("acquire read lock on postings")
            .get(&(source.to_string(), external_id.to_string()))
            .cloned()
    }

    /// Every stored posting, ordered by source then external id.
    #[must_use]
    pub fn all(&self) -> Vec<ScrapedPosting> {
        self.postings
            .read()
            .expect("acquire read lock on postings")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PostingStore for InMemoryPostingStore {
    async fn upsert_postings(&self, postings: &[ScrapedPosting]) -> Result<usize> {
        let mut stored = self.postings.write().expect("acquire write lock on postings");
        for posting in postings {
            let (source, external_id) = posting.dedup_key();
            stored.insert(
                (source.to_string(), external_id.to_string()),
                posting.clone(),
            );
        }
        Ok(postings.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobscout_core::BoardId;

    fn posting(id: &str, title: &str) -> ScrapedPosting {
        let mut posting = ScrapedPosting::new(
            BoardId::new("indeed").unwrap(),
            id,
            format!("https://www.indeed.com/viewjob?jk={id}"),
        );
        posting.title = title.to_string();
        posting
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = InMemoryPostingStore::new();
        let first = posting("abc123", "Rust Engineer");

        store.upsert_postings(&[first.clone()]).await.unwrap();
        store.upsert_postings(&[first]).await.unwrap();
        assert_eq!(store.len(), 1);

        store
            .upsert_postings(&[posting("abc123", "Senior Rust Engineer")])
            .await
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.get("indeed", "abc123").unwrap().title,
            "Senior Rust Engineer"
        );
    }

    #[tokio::test]
    async fn test_distinct_keys_are_kept() {
        let store = InMemoryPostingStore::new();
        let written = store
            .upsert_postings(&[posting("a", "One"), posting("b", "Two")])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.all().len(), 2);
    }
}
