//! Board-specific half of the scraper contract.

use crate::definition::ScrapeConfiguration;
use crate::posting::ScrapedPosting;
use crate::result::ScrapeIssue;
use crate::search::SearchParams;
use chrono::{DateTime, Utc};
use jobscout_core::BoardId;

/// State a parser needs beyond the page itself.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Policy of the current run
    pub config: &'a ScrapeConfiguration,
    /// Reference time for relative dates and `scraped_at`
    pub scraped_at: DateTime<Utc>,
}

impl<'a> ParseContext<'a> {
    /// Context for a parse happening now.
    #[must_use]
    pub fn now(config: &'a ScrapeConfiguration) -> Self {
        Self {
            config,
            scraped_at: Utc::now(),
        }
    }
}

/// Postings recovered from one search results page.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Postings parsed from the page, in page order
    pub postings: Vec<ScrapedPosting>,
    /// Listings that were found but could not be parsed
    pub failures: Vec<ScrapeIssue>,
}

impl ListingPage {
    /// Listings seen on the page, parsed or not.
    #[must_use]
    pub fn found(&self) -> usize {
        self.postings.len() + self.failures.len()
    }
}

/// What one job board contributes: URLs and parsers.
///
/// Navigation, detection, pacing and teardown are shared and live in
/// [`crate::BoardScraper`]; implementations stay pure functions of the page
/// HTML so they can be tested without a browser.
pub trait JobBoard: Send + Sync {
    /// Registry key.
    fn board_id(&self) -> &BoardId;

    /// Name for logs and stats.
    fn display_name(&self) -> &str;

    /// Built-in policy for this board.
    fn default_config(&self) -> ScrapeConfiguration;

    /// Search URL for the zero-based `page_index`.
    fn build_search_url(
        &self,
        params: &SearchParams,
        page_index: u32,
        config: &ScrapeConfiguration,
    ) -> String;

    /// Parse a search results page.
    fn parse_job_listings(&self, html: &str, page_url: &str, ctx: &ParseContext<'_>)
        -> ListingPage;

    /// Parse a posting's detail page; `None` when title or company cannot
    /// be recovered.
    fn parse_job_page(
        &self,
        html: &str,
        url: &str,
        ctx: &ParseContext<'_>,
    ) -> Option<ScrapedPosting>;

    /// Selector whose presence means the listing page has rendered.
    fn listing_ready_selector(&self) -> Option<&str> {
        None
    }

    /// Selector whose presence means the detail page has rendered.
    fn detail_ready_selector(&self) -> Option<&str> {
        None
    }
}
