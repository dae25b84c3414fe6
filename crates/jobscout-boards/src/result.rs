//! Outcome of one scrape run.

use crate::error::{ErrorKind, ScrapeError};
use crate::posting::ScrapedPosting;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A fault absorbed during a run and reported as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScrapeIssue {
    pub kind: ErrorKind,
    pub message: String,
    /// Page the fault happened on
    pub url: Option<String>,
}

impl ScrapeIssue {
    /// Build an issue of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>, url: Option<&str>) -> Self {
        Self {
            kind,
            message: message.into(),
            url: url.map(ToString::to_string),
        }
    }

    /// Record an error that did not abort the run.
    #[must_use]
    pub fn from_error(err: &ScrapeError, url: Option<&str>) -> Self {
        Self::new(err.kind(), err.to_string(), url)
    }
}

/// Result of [`crate::BoardScraper::scrape_jobs`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScrapingResult {
    pub success: bool,
    pub postings: Vec<ScrapedPosting>,
    /// Listings found on fetched pages, before truncation
    pub total_jobs: usize,
    /// Postings returned
    pub scraped_jobs: usize,
    /// Listings that could not be parsed
    pub failed_jobs: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// `end_time - start_time`, in milliseconds
    pub duration_ms: i64,
    pub errors: Vec<ScrapeIssue>,
    pub warnings: Vec<String>,
    pub robots_txt_respected: bool,
    pub rate_limit_respected: bool,
    pub terms_of_service_respected: bool,
}

impl ScrapingResult {
    /// Empty result for a run starting now.
    #[must_use]
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            success: false,
            postings: Vec::new(),
            total_jobs: 0,
            scraped_jobs: 0,
            failed_jobs: 0,
            start_time: now,
            end_time: now,
            duration_ms: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            robots_txt_respected: false,
            rate_limit_respected: true,
            terms_of_service_respected: true,
        }
    }

    /// Stamp the end time and derived counters.
    pub fn finish(&mut self, success: bool) {
        self.success = success;
        self.end_time = Utc::now();
        self.duration_ms = (self.end_time - self.start_time).num_milliseconds();
        self.scraped_jobs = self.postings.len();
        self.total_jobs = self.total_jobs.max(self.scraped_jobs);
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end_time - self.start_time
    }
}
