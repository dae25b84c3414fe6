//! Shared scrape driver: session lifecycle, navigation, detection, pacing.

use crate::contract::{JobBoard, ParseContext};
use crate::definition::ScrapeConfiguration;
use crate::detection::{detect_throttling, DetectionReport};
use crate::error::{ErrorKind, Result, ScrapeError};
use crate::extract::redact_contacts;
use crate::posting::{CompanyInfo, SalaryRange, ScrapedPosting};
use crate::result::{ScrapeIssue, ScrapingResult};
use crate::robots::RobotsPolicy;
use crate::search::SearchParams;
use crate::throttle::RequestThrottle;
use jobscout_browser::actions::extract_origin;
use jobscout_browser::{
    BrowserDriver, BrowserError, BrowserSession, SessionIdentity, SessionOptions, TeardownReport,
};
use scraper::Html;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Holder for the one browser session a scraper may own.
///
/// The factory keeps a weak handle to every slot it issues so
/// `cleanup_all` can close sessions that are still open.
#[derive(Default)]
pub struct SessionSlot {
    session: Mutex<Option<Box<dyn BrowserSession>>>,
    live: AtomicBool,
}

impl SessionSlot {
    /// Whether a session is currently installed.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) async fn install(&self, session: Box<dyn BrowserSession>) {
        let mut guard = self.session.lock().await;
        *guard = Some(session);
        self.live.store(true, Ordering::SeqCst);
    }

    /// Close the installed session, if any.
    pub async fn release(&self) -> Option<TeardownReport> {
        let session = {
            let mut guard = self.session.lock().await;
            self.live.store(false, Ordering::SeqCst);
            guard.take()
        }?;
        Some(session.close().await)
    }

    async fn navigate(&self, url: &str, timeout: Duration) -> jobscout_browser::Result<()> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BrowserError::SessionClosed)?;
        session.navigate(url, timeout).await
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> jobscout_browser::Result<()> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BrowserError::SessionClosed)?;
        session.wait_for_selector(selector, timeout).await
    }

    async fn evaluate(&self, script: &str) -> jobscout_browser::Result<serde_json::Value> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BrowserError::SessionClosed)?;
        session.evaluate(script).await
    }

    async fn content(&self) -> jobscout_browser::Result<String> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BrowserError::SessionClosed)?;
        session.content().await
    }

    async fn current_url(&self) -> jobscout_browser::Result<String> {
        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or(BrowserError::SessionClosed)?;
        session.current_url().await
    }
}

/// A board bound to a policy, an identity and a browser driver.
///
/// Built by [`crate::ScraperFactory::create_scraper`]. Each call to
/// [`Self::scrape_jobs`] or [`Self::scrape_job_details`] opens one session
/// and always closes it before returning.
pub struct BoardScraper {
    board: Arc<dyn JobBoard>,
    config: ScrapeConfiguration,
    identity: SessionIdentity,
    options: SessionOptions,
    driver: Arc<dyn BrowserDriver>,
    slot: Arc<SessionSlot>,
    scraper_version: String,
}

impl std::fmt::Debug for BoardScraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardScraper")
            .field("board", &self.board.board_id())
            .field("driver", &self.driver.name())
            .field("live", &self.slot.is_live())
            .finish_non_exhaustive()
    }
}

impl BoardScraper {
    /// Bind `board` to a policy and session.
    #[must_use]
    pub fn new(
        board: Arc<dyn JobBoard>,
        config: ScrapeConfiguration,
        identity: SessionIdentity,
        options: SessionOptions,
        driver: Arc<dyn BrowserDriver>,
        scraper_version: impl Into<String>,
    ) -> Self {
        Self {
            board,
            config,
            identity,
            options,
            driver,
            slot: Arc::new(SessionSlot::default()),
            scraper_version: scraper_version.into(),
        }
    }

    /// Board this scraper drives.
    #[must_use]
    pub fn board(&self) -> &dyn JobBoard {
        self.board.as_ref()
    }

    /// Effective policy.
    #[must_use]
    pub fn config(&self) -> &ScrapeConfiguration {
        &self.config
    }

    /// Identity sessions are opened with.
    #[must_use]
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// Launch options sessions are opened with.
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether a browser session is open right now.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.slot.is_live()
    }

    /// Close the session if one is still open. Returns whether one was.
    pub async fn close_session(&self) -> bool {
        let live = self.slot.is_live();
        self.teardown().await;
        live
    }

    pub(crate) fn slot(&self) -> &Arc<SessionSlot> {
        &self.slot
    }

    /// Run a search: paginate, optionally expand details, normalise.
    ///
    /// Per-page failures after the first fetched page are recorded in the
    /// result. A failure before any page was fetched is returned as the
    /// error.
    pub async fn scrape_jobs(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> Result<ScrapingResult> {
        params.validate()?;
        let mut result = ScrapingResult::started();

        self.open_session().await?;
        let outcome = self.run_search(params, cancel, &mut result).await;
        self.teardown().await;
        outcome?;

        result.finish(true);
        info!(
            board_id = %self.board.board_id(),
            scraped = result.scraped_jobs,
            total = result.total_jobs,
            errors = result.errors.len(),
            duration_ms = result.duration_ms,
            "scrape run finished"
        );
        Ok(result)
    }

    /// Fetch and parse one posting's detail page.
    pub async fn scrape_job_details(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ScrapedPosting>> {
        self.open_session().await?;
        let outcome = self.run_detail(url, cancel).await;
        self.teardown().await;
        outcome
    }

    async fn run_search(
        &self,
        params: &SearchParams,
        cancel: &CancellationToken,
        result: &mut ScrapingResult,
    ) -> Result<()> {
        let board_id = self.board.board_id();
        let ctx = ParseContext {
            config: &self.config,
            scraped_at: result.start_time,
        };
        let mut throttle = RequestThrottle::from_config(&self.config);

        let first_url = self.board.build_search_url(params, 0, &self.config);
        let robots = if self.config.respect_robots_txt {
            Some(self.fetch_robots(&first_url, &mut throttle, cancel).await?)
        } else {
            None
        };
        result.robots_txt_respected = robots.is_some();

        let mut postings: Vec<ScrapedPosting> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages_fetched = 0u32;
        let per_page = self.config.max_jobs_per_page as usize;

        for page_index in 0..self.config.max_pages_per_search {
            let url = if page_index == 0 {
                first_url.clone()
            } else {
                self.board.build_search_url(params, page_index, &self.config)
            };

            if robots.as_ref().is_some_and(|policy| !policy.is_url_allowed(&url)) {
                warn!(board_id = %board_id, url = %url, "robots.txt disallows search page");
                result
                    .warnings
                    .push(format!("robots.txt disallows {url}; pagination stopped"));
                break;
            }

            let page = match self.fetch_listing(&url, &mut throttle, cancel, &ctx).await {
                Ok(page) => page,
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(err) if pages_fetched == 0 => return Err(err),
                Err(err) => {
                    warn!(board_id = %board_id, page = page_index, error = %err, "listing page failed");
                    result.errors.push(ScrapeIssue::from_error(&err, Some(&url)));
                    if err.is_pushback() {
                        if matches!(err, ScrapeError::RateLimited { .. }) {
                            result.rate_limit_respected = false;
                        }
                        break;
                    }
                    continue;
                }
            };
            pages_fetched += 1;

            let found = page.found();
            debug!(board_id = %board_id, page = page_index, found, "listing page parsed");
            result.total_jobs += found;
            result.failed_jobs += page.failures.len();
            result.errors.extend(page.failures);
            if page.postings.is_empty() {
                break;
            }

            for posting in page.postings.into_iter().take(per_page) {
                if seen.insert(posting.external_id.clone()) {
                    postings.push(posting);
                }
            }
        }

        if self.config.extract_full_description {
            self.expand_details(&mut postings, robots.as_ref(), &mut throttle, cancel, &ctx, result)
                .await?;
        }

        for posting in &mut postings {
            self.finalize(posting);
        }
        result.postings = postings;
        Ok(())
    }

    async fn expand_details(
        &self,
        postings: &mut [ScrapedPosting],
        robots: Option<&RobotsPolicy>,
        throttle: &mut RequestThrottle,
        cancel: &CancellationToken,
        ctx: &ParseContext<'_>,
        result: &mut ScrapingResult,
    ) -> Result<()> {
        let board_id = self.board.board_id();
        for posting in postings.iter_mut() {
            let url = posting.url.clone();
            if robots.is_some_and(|policy| !policy.is_url_allowed(&url)) {
                result
                    .warnings
                    .push(format!("robots.txt disallows {url}; detail skipped"));
                continue;
            }

            match self.fetch_detail(&url, throttle, cancel, ctx).await {
                Ok(Some(detail)) => posting.merge_detail(detail),
                Ok(None) => {
                    debug!(board_id = %board_id, url = %url, "detail page missing title or company");
                    result.errors.push(ScrapeIssue::new(
                        ErrorKind::Extraction,
                        "detail page missing title or company",
                        Some(&url),
                    ));
                }
                Err(ScrapeError::Cancelled) => return Err(ScrapeError::Cancelled),
                Err(err) => {
                    warn!(board_id = %board_id, url = %url, error = %err, "detail fetch failed");
                    result.errors.push(ScrapeIssue::from_error(&err, Some(&url)));
                    if err.is_pushback() {
                        if matches!(err, ScrapeError::RateLimited { .. }) {
                            result.rate_limit_respected = false;
                        }
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    async fn run_detail(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ScrapedPosting>> {
        let mut throttle = RequestThrottle::from_config(&self.config);
        if self.config.respect_robots_txt {
            let policy = self.fetch_robots(url, &mut throttle, cancel).await?;
            if !policy.is_url_allowed(url) {
                warn!(board_id = %self.board.board_id(), url = %url, "robots.txt disallows detail page");
                return Ok(None);
            }
        }

        let config = &self.config;
        let ctx = ParseContext::now(config);
        let detail = self.fetch_detail(url, &mut throttle, cancel, &ctx).await?;
        Ok(detail.map(|mut posting| {
            self.finalize(&mut posting);
            posting
        }))
    }

    async fn fetch_listing(
        &self,
        url: &str,
        throttle: &mut RequestThrottle,
        cancel: &CancellationToken,
        ctx: &ParseContext<'_>,
    ) -> Result<crate::contract::ListingPage> {
        throttle.acquire(cancel).await?;
        let (html, final_url) = self
            .load_page(url, self.board.listing_ready_selector(), cancel)
            .await?;
        self.check_countermeasures(&html, &final_url)?;
        Ok(self.board.parse_job_listings(&html, &final_url, ctx))
    }

    async fn fetch_detail(
        &self,
        url: &str,
        throttle: &mut RequestThrottle,
        cancel: &CancellationToken,
        ctx: &ParseContext<'_>,
    ) -> Result<Option<ScrapedPosting>> {
        throttle.acquire(cancel).await?;
        let (html, final_url) = self
            .load_page(url, self.board.detail_ready_selector(), cancel)
            .await?;
        self.check_countermeasures(&html, &final_url)?;
        Ok(self.board.parse_job_page(&html, url, ctx))
    }

    fn check_countermeasures(&self, html: &str, final_url: &str) -> Result<()> {
        let board_id = self.board.board_id().as_str();
        if let Some(signal) = detect_throttling(html) {
            warn!(
                board_id = %board_id,
                indicator = signal.indicator,
                retry_after = ?signal.retry_after,
                "throttling detected"
            );
            return Err(ScrapeError::RateLimited {
                board: board_id.to_string(),
                retry_after: signal.retry_after,
            });
        }

        let report = DetectionReport::scan(html, Some(final_url));
        if report.is_blocked() {
            warn!(
                board_id = %board_id,
                confidence = report.confidence(),
                hits = report.indicators.len(),
                "countermeasure detected"
            );
            return Err(report.into_error(board_id));
        }
        Ok(())
    }

    /// Navigate, wait for readiness, settle, and return `(html, final_url)`.
    async fn load_page(
        &self,
        url: &str,
        ready_selector: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<(String, String)> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        debug!(board_id = %self.board.board_id(), url = %url, "navigating");

        tokio::select! {
            () = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            navigated = self.slot.navigate(url, self.config.navigation_timeout()) => navigated?,
        }

        if let Some(selector) = ready_selector {
            // Block pages never render the selector; detection decides
            if let Err(err) = self
                .slot
                .wait_for_selector(selector, self.config.element_timeout())
                .await
            {
                debug!(url = %url, selector, error = %err, "readiness selector not found");
            }
        }

        if self.config.simulate_human_behavior {
            self.simulate_reading(cancel).await?;
        }

        let html = self.slot.content().await?;
        let final_url = self
            .slot
            .current_url()
            .await
            .unwrap_or_else(|_| url.to_string());
        Ok((html, final_url))
    }

    /// Scroll down in steps, then back to the top, pausing between steps.
    async fn simulate_reading(&self, cancel: &CancellationToken) -> Result<()> {
        let behavior = self.identity.behavior;
        for _ in 0..behavior.scroll_steps {
            let script = format!("window.scrollBy(0, {})", behavior.scroll_step_px);
            if let Err(err) = self.slot.evaluate(&script).await {
                debug!(error = %err, "scroll step failed");
            }
            pause(behavior.random_pause_ms(), cancel).await?;
        }
        if let Err(err) = self.slot.evaluate("window.scrollTo(0, 0)").await {
            debug!(error = %err, "scroll reset failed");
        }
        pause(behavior.random_pause_ms(), cancel).await
    }

    /// robots.txt for the origin of `url`; missing or unreadable means allow all.
    async fn fetch_robots(
        &self,
        url: &str,
        throttle: &mut RequestThrottle,
        cancel: &CancellationToken,
    ) -> Result<RobotsPolicy> {
        let Ok(origin) = extract_origin(url) else {
            return Ok(RobotsPolicy::allow_all());
        };
        let robots_url = format!("{origin}/robots.txt");
        throttle.acquire(cancel).await?;

        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        let fetched = tokio::select! {
            () = cancel.cancelled() => return Err(ScrapeError::Cancelled),
            navigated = self.slot.navigate(&robots_url, self.config.navigation_timeout()) => navigated,
        };
        let content = match fetched {
            Ok(()) => self.slot.content().await,
            Err(err) => Err(err),
        };

        match content {
            Ok(html) => {
                // Browsers wrap plain text in a <pre> document
                let text: String = Html::parse_document(&html)
                    .root_element()
                    .text()
                    .collect();
                let policy = RobotsPolicy::parse(&text);
                if let Some(delay) = policy.crawl_delay() {
                    throttle.raise_delay(Duration::from_secs(delay));
                }
                debug!(url = %robots_url, rules = policy.rule_count(), "robots.txt loaded");
                Ok(policy)
            }
            Err(err) => {
                warn!(url = %robots_url, error = %err, "robots.txt unavailable, allowing all");
                Ok(RobotsPolicy::allow_all())
            }
        }
    }

    /// Apply extraction toggles, anonymisation, version and quality score.
    fn finalize(&self, posting: &mut ScrapedPosting) {
        if !self.config.extract_salary {
            posting.salary = SalaryRange::default();
        }
        if !self.config.extract_company_info {
            posting.company_info = CompanyInfo::default();
        }
        if self.config.anonymize_data {
            redact_contacts(&mut posting.description);
            for item in posting
                .requirements
                .iter_mut()
                .chain(posting.responsibilities.iter_mut())
                .chain(posting.benefits.iter_mut())
            {
                redact_contacts(item);
            }
            posting.anonymized = true;
        }
        posting.scraper_version.clone_from(&self.scraper_version);
        posting.assess_quality();
    }

    async fn open_session(&self) -> Result<()> {
        if self.slot.is_live() {
            return Err(ScrapeError::Configuration(format!(
                "scraper for {} already has a live session",
                self.board.board_id()
            )));
        }
        let session = self
            .driver
            .open_session(&self.identity, &self.options)
            .await
            .map_err(|e| ScrapeError::Network(format!("session initialisation failed: {e}")))?;
        self.slot.install(session).await;
        debug!(board_id = %self.board.board_id(), driver = self.driver.name(), "session opened");
        Ok(())
    }

    async fn teardown(&self) {
        if let Some(report) = self.slot.release().await {
            for step in &report.failed_steps {
                warn!(board_id = %self.board.board_id(), step = %step, "teardown step failed");
            }
        }
    }
}

async fn pause(ms: u64, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        () = cancel.cancelled() => Err(ScrapeError::Cancelled),
        () = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
    }
}
