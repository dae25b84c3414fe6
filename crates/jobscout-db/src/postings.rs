//! Posting persistence for the `job_postings` table.
//!
//! Rows are keyed by `(source, external_id)`; writing a posting that is
//! already stored replaces its data and keeps `first_seen_at`.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use jobscout_boards::ScrapedPosting;
use sqlx::{Pool, Row, Sqlite};

const UPSERT_SQL: &str = r"
INSERT INTO job_postings (source, external_id, url, title, company, location, quality_score,
                          posted_at, scraped_at, scraper_version, data, first_seen_at, updated_at)
VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(source, external_id) DO UPDATE SET
    url = excluded.url,
    title = excluded.title,
    company = excluded.company,
    location = excluded.location,
    quality_score = excluded.quality_score,
    posted_at = excluded.posted_at,
    scraped_at = excluded.scraped_at,
    scraper_version = excluded.scraper_version,
    data = excluded.data,
    updated_at = excluded.updated_at";

/// Insert or update `postings` in one transaction. Returns how many rows
/// were written.
pub async fn upsert_postings(pool: &Pool<Sqlite>, postings: &[ScrapedPosting]) -> Result<usize> {
    if postings.is_empty() {
        return Ok(0);
    }

    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;
    for posting in postings {
        let data = serde_json::to_string(posting)?;
        sqlx::query(UPSERT_SQL)
            .bind(posting.source.as_str())
            .bind(&posting.external_id)
            .bind(&posting.url)
            .bind(&posting.title)
            .bind(&posting.company)
            .bind(&posting.location)
            .bind(i64::from(posting.data_quality.score))
            .bind(posting.posted_at.map(|at| at.to_rfc3339()))
            .bind(posting.scraped_at.to_rfc3339())
            .bind(&posting.scraper_version)
            .bind(data)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    tracing::debug!(count = postings.len(), "postings upserted");
    Ok(postings.len())
}

/// Stored posting for `source` and `external_id`.
pub async fn get_posting(
    pool: &Pool<Sqlite>,
    source: &str,
    external_id: &str,
) -> Result<Option<ScrapedPosting>> {
    let data: Option<String> =
        sqlx::query_scalar("SELECT data FROM job_postings WHERE source = ? AND external_id = ?")
            .bind(source)
            .bind(external_id)
            .fetch_optional(pool)
            .await?;

    data.map(|json| decode(&json)).transpose()
}

/// Most recently scraped postings, optionally for one source.
pub async fn list_postings(
    pool: &Pool<Sqlite>,
    source: Option<&str>,
    limit: u32,
) -> Result<Vec<ScrapedPosting>> {
    let rows = sqlx::query(
        "SELECT data FROM job_postings
         WHERE (?1 IS NULL OR source = ?1)
         ORDER BY scraped_at DESC, external_id
         LIMIT ?2",
    )
    .bind(source)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| decode(&row.try_get::<String, _>("data")?))
        .collect()
}

/// Number of stored postings.
pub async fn count_postings(pool: &Pool<Sqlite>) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM job_postings")
        .fetch_one(pool)
        .await?)
}

/// When the posting was first stored, as an RFC 3339 timestamp.
pub async fn first_seen_at(
    pool: &Pool<Sqlite>,
    source: &str,
    external_id: &str,
) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = sqlx::query_scalar(
        "SELECT first_seen_at FROM job_postings WHERE source = ? AND external_id = ?",
    )
    .bind(source)
    .bind(external_id)
    .fetch_optional(pool)
    .await?;

    raw.map(|value| {
        DateTime::parse_from_rfc3339(&value)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|e| DatabaseError::Decode(format!("invalid first_seen_at '{value}': {e}")))
    })
    .transpose()
}

/// Delete postings last scraped before `cutoff`. Returns the number removed.
pub async fn delete_scraped_before(pool: &Pool<Sqlite>, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query("DELETE FROM job_postings WHERE scraped_at < ?")
        .bind(cutoff.to_rfc3339())
        .execute(pool)
        .await?;

    tracing::info!(removed = result.rows_affected(), %cutoff, "pruned old postings");
    Ok(result.rows_affected())
}

fn decode(json: &str) -> Result<ScrapedPosting> {
    serde_json::from_str(json)
        .map_err(|e| DatabaseError::Decode(format!("invalid posting data: {e}")))
}
