use async_trait::async_trait;
use jobscout_boards::{
    ConfigOverrides, ErrorKind, JobBoard, ListingPage, ParseContext, ScrapeConfiguration,
    ScrapedPosting, ScraperFactory, SearchParams,
};
use jobscout_browser::FixtureDriver;
use jobscout_core::{AppConfig, BoardId, JobId, ScrapingConfig};
use jobscout_orchestrator::{
    CircuitState, HealthStatus, InMemoryPostingStore, InMemoryResultCache, JobStatus, JobType,
    PostingStore, ScrapeJob, ScrapingService,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

const SEARCH_PREFIX: &str = "https://www.linkedin.com/jobs/search/";
const PAGE_0: &str = "https://www.linkedin.com/jobs/search/?keywords=rust";

fn card(id: u64, title: &str) -> String {
    format!(
        r#"<li><div class="base-card" data-entity-urn="urn:li:jobPosting:{id}">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/{id}/"></a>
            <h3 class="base-search-card__title">{title}</h3>
            <h4 class="base-search-card__subtitle">Acme</h4>
            <span class="job-search-card__location">Mumbai</span>
        </div></li>"#
    )
}

fn listing(count: u64) -> String {
    let cards: String = (1..=count)
        .map(|i| card(1000 + i, &format!("Software Engineer {i}")))
        .collect();
    format!(r#"<html><body><ul class="jobs-search__results-list">{cards}</ul></body></html>"#)
}

fn fast() -> ConfigOverrides {
    ConfigOverrides {
        delay_between_requests_ms: Some(0),
        requests_per_minute: Some(100),
        requests_per_hour: Some(1000),
        simulate_human_behavior: Some(false),
        respect_robots_txt: Some(false),
        max_pages_per_search: Some(1),
        max_jobs_per_page: Some(5),
        retry_delay_ms: Some(10),
        ..ConfigOverrides::default()
    }
}

fn scraping_config(max_concurrent_sessions: usize) -> ScrapingConfig {
    ScrapingConfig {
        max_concurrent_sessions,
        inter_query_delay_ms: 0,
        result_cache_ttl_secs: 60,
        finished_job_retention_secs: 3600,
        scraper_version: "test".to_string(),
    }
}

fn service(driver: &FixtureDriver, max_concurrent_sessions: usize) -> ScrapingService {
    service_with(driver, &scraping_config(max_concurrent_sessions))
}

fn service_with(driver: &FixtureDriver, config: &ScrapingConfig) -> ScrapingService {
    let factory = ScraperFactory::new(Arc::new(driver.clone()), &AppConfig::default()).unwrap();
    ScrapingService::new(Arc::new(factory), config)
}

fn linkedin() -> BoardId {
    BoardId::new("linkedin").unwrap()
}

async fn wait_for(
    service: &ScrapingService,
    job_id: &JobId,
    done: impl Fn(&ScrapeJob) -> bool,
) -> ScrapeJob {
    for _ in 0..500 {
        if let Some(job) = service.get_job_status(job_id) {
            if done(&job) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach the expected state");
}

fn status_is(status: JobStatus) -> impl Fn(&ScrapeJob) -> bool {
    move |job| job.status == status
}

#[tokio::test]
async fn test_job_completes_and_stores_postings() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(7));
    let store = Arc::new(InMemoryPostingStore::new());
    let cache = Arc::new(InMemoryResultCache::new());
    let service = service(&driver, 2)
        .with_store(store.clone())
        .with_cache(cache.clone());

    let params = SearchParams::new("software engineer").with_location("Mumbai");
    let job_id = tokio_test::assert_ok!(service.start_scraping_job(&linkedin(), params, Some(&fast())));

    let job = wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;
    let result = job.result.clone().unwrap();

    assert!(result.success);
    assert_eq!(result.scraped_jobs, 5);
    assert!(result.total_jobs >= result.scraped_jobs);
    assert_eq!(
        result.duration_ms,
        (result.end_time - result.start_time).num_milliseconds()
    );
    assert_eq!(job.attempts, 1);
    assert_eq!(
        job.status_history,
        vec![JobStatus::Pending, JobStatus::Running, JobStatus::Completed]
    );
    assert_eq!(job.job_type, JobType::Search);

    assert_eq!(job.stored_postings, Some(5));
    assert_eq!(store.len(), 5);
    assert_eq!(service.get_cached_result(&job_id).await, Some(result));
    assert_eq!(driver.open_sessions(), 0);
}

#[tokio::test]
async fn test_submission_returns_unique_ids() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);

    let first = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let second = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    assert_ne!(first, second);

    wait_for(&service, &first, status_is(JobStatus::Completed)).await;
    wait_for(&service, &second, status_is(JobStatus::Completed)).await;
}

#[tokio::test]
async fn test_blocked_page_moves_job_to_retrying() {
    let driver = FixtureDriver::new().with_page(
        PAGE_0,
        "<html><body><h1>Security check</h1><p>Please complete the CAPTCHA to continue.</p></body></html>",
    );
    let service = service(&driver, 1);
    let overrides = ConfigOverrides {
        retry_delay_ms: Some(60_000),
        max_retries: Some(2),
        ..fast()
    };

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&overrides))
        .unwrap();
    let job = wait_for(&service, &job_id, status_is(JobStatus::Retrying)).await;

    assert_eq!(job.attempts, 1);
    assert_eq!(job.max_attempts, 3);
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::AntiBot);
    assert!(job.next_retry_at.is_some());
    assert_eq!(
        job.status_history,
        vec![
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Failed,
            JobStatus::Retrying
        ]
    );
    assert_eq!(service.get_active_jobs().len(), 1);

    assert!(service.cancel_job(&job_id));
    let job = service.get_job_status(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(!service.cancel_job(&job_id));
}

#[tokio::test]
async fn test_retry_budget_exhaustion_is_terminal() {
    let driver = FixtureDriver::new().with_failure(PAGE_0, "net::ERR_CONNECTION_RESET");
    let service = service(&driver, 1);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let job = wait_for(&service, &job_id, |job| {
        job.status == JobStatus::Failed && job.attempts == job.max_attempts
    })
    .await;

    assert_eq!(job.attempts, 4);
    assert!(job.is_finished());
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::Network);
    assert_eq!(job.error.as_ref().unwrap().attempt, 4);
    assert_eq!(job.status_history.first(), Some(&JobStatus::Pending));
    assert_eq!(job.status_history.last(), Some(&JobStatus::Failed));
    for pair in job.status_history.windows(2) {
        assert!(pair[0].can_transition_to(pair[1]), "{pair:?}");
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let later = service.get_job_status(&job_id).unwrap();
    assert_eq!(later.status, JobStatus::Failed);
    assert_eq!(later.attempts, 4);

    let stats = service.get_stats();
    assert_eq!(stats.jobs.failed, 1);
    assert!(stats.success_rate.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_rate_limit_hint_extends_retry_delay() {
    let driver = FixtureDriver::new().with_page(
        PAGE_0,
        "<html><body><h1>Too Many Requests</h1><p>Please try again in 2 minutes.</p></body></html>",
    );
    let service = service(&driver, 1);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let job = wait_for(&service, &job_id, status_is(JobStatus::Retrying)).await;

    let error = job.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::RateLimited);
    let wait = job.next_retry_at.unwrap() - error.occurred_at;
    assert!(wait >= chrono::Duration::seconds(119), "waited {wait}");

    service.shutdown().await;
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let driver = FixtureDriver::new()
        .fail_next_sessions(1)
        .with_prefix(SEARCH_PREFIX, listing(2));
    let service = service(&driver, 1);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let job = wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;

    assert_eq!(job.attempts, 2);
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::Network);
    assert_eq!(
        job.status_history,
        vec![
            JobStatus::Pending,
            JobStatus::Running,
            JobStatus::Failed,
            JobStatus::Retrying,
            JobStatus::Running,
            JobStatus::Completed
        ]
    );
    assert_eq!(job.result.unwrap().scraped_jobs, 2);
}

#[tokio::test]
async fn test_detail_failures_do_not_fail_the_job() {
    let driver = FixtureDriver::new()
        .with_prefix(SEARCH_PREFIX, listing(2))
        .with_failure("https://www.linkedin.com/jobs/view/1002/", "net::ERR_FAILED");
    let service = service(&driver, 1);
    let overrides = ConfigOverrides {
        extract_full_description: Some(true),
        ..fast()
    };

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&overrides))
        .unwrap();
    let job = wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;

    let result = job.result.unwrap();
    assert_eq!(result.scraped_jobs, 2);
    assert!(result
        .errors
        .iter()
        .any(|issue| issue.kind == ErrorKind::Network));
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn test_cancelled_pending_job_never_runs() {
    let driver = FixtureDriver::new()
        .with_latency(Duration::from_millis(300))
        .with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);

    let running = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    wait_for(&service, &running, status_is(JobStatus::Running)).await;

    let queued = service
        .start_scraping_job(&linkedin(), SearchParams::new("golang"), Some(&fast()))
        .unwrap();
    assert_eq!(
        service.get_job_status(&queued).unwrap().status,
        JobStatus::Pending
    );
    assert!(service.cancel_job(&queued));

    wait_for(&service, &running, status_is(JobStatus::Completed)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let queued = service.get_job_status(&queued).unwrap();
    assert_eq!(queued.status, JobStatus::Cancelled);
    assert_eq!(queued.attempts, 0);
    assert_eq!(
        queued.status_history,
        vec![JobStatus::Pending, JobStatus::Cancelled]
    );
    assert_eq!(driver.sessions_opened(), 1);
}

#[tokio::test]
async fn test_cancelling_running_job_stops_the_scraper() {
    let driver = FixtureDriver::new()
        .with_latency(Duration::from_millis(500))
        .with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    wait_for(&service, &job_id, status_is(JobStatus::Running)).await;
    assert!(service.cancel_job(&job_id));

    for _ in 0..100 {
        if driver.sessions_opened() == 1 && driver.open_sessions() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(driver.open_sessions(), 0);

    let job = service.get_job_status(&job_id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.result.is_none());
}

#[tokio::test]
async fn test_cancel_unknown_or_finished_job() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);
    assert!(!service.cancel_job(&JobId::generate()));

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;
    assert!(!service.cancel_job(&job_id));
    assert_eq!(
        service.get_job_status(&job_id).unwrap().status,
        JobStatus::Completed
    );
}

#[tokio::test]
async fn test_circuit_breaker_fails_fast_once_open() {
    let driver = FixtureDriver::new().with_failure(PAGE_0, "net::ERR_CONNECTION_RESET");
    let service = service(&driver, 1);
    let overrides = ConfigOverrides {
        max_retries: Some(0),
        circuit_breaker_threshold: Some(1),
        circuit_breaker_cooldown_ms: Some(60_000),
        ..fast()
    };

    let first = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&overrides))
        .unwrap();
    wait_for(&service, &first, status_is(JobStatus::Failed)).await;

    let second = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&overrides))
        .unwrap();
    let job = wait_for(&service, &second, status_is(JobStatus::Failed)).await;

    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::CircuitOpen);
    assert_eq!(driver.sessions_opened(), 1);

    let stats = service.get_stats();
    assert_eq!(stats.boards["linkedin"].circuit, CircuitState::Open);
    assert_eq!(stats.boards["indeed"].circuit, CircuitState::Closed);

    let health = service.health_check().await;
    assert_eq!(health.tripped_boards, vec!["linkedin".to_string()]);
    assert_eq!(health.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn test_continuous_scraping_skips_unknown_boards() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 2);

    service
        .start_continuous_scraping(
            vec![BoardId::new("monster").unwrap(), linkedin()],
            vec!["rust".to_string(), "golang".to_string()],
            60,
        )
        .unwrap();
    assert!(service.is_continuous_scraping());

    for _ in 0..200 {
        if service.get_all_jobs().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let jobs = service.get_all_jobs();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|job| job.job_type == JobType::Continuous));
    assert!(jobs.iter().all(|job| job.board_id == linkedin()));
    assert!(service.get_stats().continuous_scraping);

    assert!(service.stop_continuous_scraping().await);
    assert!(!service.is_continuous_scraping());
    assert!(!service.stop_continuous_scraping().await);

    service.shutdown().await;
}

#[tokio::test]
async fn test_stats_and_health_after_success() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(3));
    let store = Arc::new(InMemoryPostingStore::new());
    let service = service(&driver, 2)
        .with_cache(Arc::new(InMemoryResultCache::new()))
        .with_store(store);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;

    let stats = service.get_stats();
    assert_eq!(stats.total_jobs, 1);
    assert_eq!(stats.jobs.completed, 1);
    assert_eq!(stats.active_jobs, 0);
    assert!((stats.success_rate - 1.0).abs() < f64::EPSILON);
    assert_eq!(stats.postings_stored, 3);
    assert_eq!(stats.max_concurrent_sessions, 2);
    assert_eq!(stats.available_sessions, 2);
    assert_eq!(stats.boards["linkedin"].stats.issued, 1);
    assert!(stats.boards["linkedin"].available);

    let health = service.health_check().await;
    assert_eq!(health.status, HealthStatus::Healthy);
    assert_eq!(health.available_boards, 2);
    assert!(health.tripped_boards.is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_active_jobs() {
    let driver = FixtureDriver::new()
        .with_latency(Duration::from_millis(500))
        .with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);

    let first = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let second = service
        .start_scraping_job(&linkedin(), SearchParams::new("golang"), Some(&fast()))
        .unwrap();
    wait_for(&service, &first, status_is(JobStatus::Running)).await;

    assert_eq!(service.shutdown().await, 2);
    assert_eq!(
        service.get_job_status(&first).unwrap().status,
        JobStatus::Cancelled
    );
    assert_eq!(
        service.get_job_status(&second).unwrap().status,
        JobStatus::Cancelled
    );
    assert_eq!(driver.open_sessions(), 0);
    assert!(service.get_active_jobs().is_empty());
}

const BROKEN_SEARCH: &str = "https://jobs.broken.test/search";

/// Board whose listing parser panics on every page.
struct BrokenBoard {
    id: BoardId,
}

impl JobBoard for BrokenBoard {
    fn board_id(&self) -> &BoardId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Broken"
    }

    fn default_config(&self) -> ScrapeConfiguration {
        ScrapeConfiguration::default()
    }

    fn build_search_url(
        &self,
        params: &SearchParams,
        _page_index: u32,
        _config: &ScrapeConfiguration,
    ) -> String {
        format!("{BROKEN_SEARCH}?q={}", params.query)
    }

    fn parse_job_listings(
        &self,
        _html: &str,
        _page_url: &str,
        _ctx: &ParseContext<'_>,
    ) -> ListingPage {
        panic!("listing parser bug");
    }

    fn parse_job_page(
        &self,
        _html: &str,
        _url: &str,
        _ctx: &ParseContext<'_>,
    ) -> Option<ScrapedPosting> {
        None
    }
}

#[tokio::test]
async fn test_crashing_scraper_fails_job_and_closes_session() {
    let driver = FixtureDriver::new().with_prefix(
        BROKEN_SEARCH,
        "<html><body><ul><li>Job</li></ul></body></html>",
    );
    let service = service(&driver, 1);
    let broken = BoardId::new("broken").unwrap();
    service
        .factory()
        .register(Arc::new(BrokenBoard { id: broken.clone() }))
        .unwrap();

    let job_id = service
        .start_scraping_job(&broken, SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let job = wait_for(&service, &job_id, |job| job.is_finished()).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::Internal);
    assert_eq!(driver.open_sessions(), 0);
    assert_eq!(service.get_stats().available_sessions, 1);
}

#[tokio::test]
async fn test_out_of_range_posted_date_is_ignored() {
    let page = r#"<html><body><ul class="jobs-search__results-list">
        <li><div class="base-card" data-entity-urn="urn:li:jobPosting:4001">
            <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/4001/"></a>
            <h3 class="base-search-card__title">Rust Engineer</h3>
            <h4 class="base-search-card__subtitle">Acme</h4>
            <time>99999999 years ago</time>
        </div></li>
    </ul></body></html>"#;
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, page);
    let service = service(&driver, 1);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    let job = wait_for(&service, &job_id, |job| job.is_finished()).await;

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result.postings.len(), 1);
    assert_eq!(result.postings[0].posted_at, None);
    assert_eq!(driver.open_sessions(), 0);
}

#[tokio::test]
async fn test_huge_retry_hint_is_capped() {
    let driver = FixtureDriver::new().with_page(
        PAGE_0,
        "<html><body><h1>Too Many Requests</h1><p>Try again in 5124095576030432 hours.</p></body></html>",
    );
    let service = service(&driver, 1);
    let overrides = ConfigOverrides {
        max_retries: Some(1),
        ..fast()
    };

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&overrides))
        .unwrap();
    let job = wait_for(&service, &job_id, status_is(JobStatus::Retrying)).await;

    assert_eq!(job.error.as_ref().unwrap().kind, ErrorKind::RateLimited);
    let next = job.next_retry_at.expect("retry scheduled");
    assert!(next <= chrono::Utc::now() + chrono::Duration::hours(25));
    assert_eq!(driver.open_sessions(), 0);
    assert!(service.cancel_job(&job_id));
}

#[tokio::test]
async fn test_out_of_range_start_offset_is_rejected() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(1));
    let service = service(&driver, 1);
    let params = SearchParams {
        start: u32::MAX - 5,
        ..SearchParams::new("rust")
    };

    let err = service
        .start_scraping_job(&linkedin(), params, Some(&fast()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert_eq!(service.get_stats().total_jobs, 0);
    assert_eq!(driver.open_sessions(), 0);
}

#[tokio::test]
async fn test_finished_jobs_are_evicted_after_retention() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(2));
    let config = ScrapingConfig {
        finished_job_retention_secs: 0,
        ..scraping_config(1)
    };
    let service = service_with(&driver, &config).with_cache(Arc::new(InMemoryResultCache::new()));

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    wait_for(&service, &job_id, status_is(JobStatus::Completed)).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(service.prune_finished_jobs(), 1);
    assert!(service.get_job_status(&job_id).is_none());
    assert_eq!(service.get_stats().total_jobs, 0);
    assert!(service.get_cached_result(&job_id).await.is_some());
}

#[tokio::test]
async fn test_active_jobs_survive_pruning() {
    let driver = FixtureDriver::new()
        .with_latency(Duration::from_millis(300))
        .with_prefix(SEARCH_PREFIX, listing(1));
    let config = ScrapingConfig {
        finished_job_retention_secs: 0,
        ..scraping_config(1)
    };
    let service = service_with(&driver, &config);

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    assert_eq!(service.prune_finished_jobs(), 0);
    assert!(service.get_job_status(&job_id).is_some());
    service.shutdown().await;
}

/// Store that signals when a write starts and takes a while to finish.
struct SlowStore {
    started: Arc<Notify>,
    inner: InMemoryPostingStore,
}

#[async_trait]
impl PostingStore for SlowStore {
    async fn upsert_postings(
        &self,
        postings: &[ScrapedPosting],
    ) -> jobscout_orchestrator::Result<usize> {
        self.started.notify_one();
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.inner.upsert_postings(postings).await
    }
}

#[tokio::test]
async fn test_job_storing_its_result_completes_instead_of_cancelling() {
    let driver = FixtureDriver::new().with_prefix(SEARCH_PREFIX, listing(3));
    let started = Arc::new(Notify::new());
    let store = Arc::new(SlowStore {
        started: Arc::clone(&started),
        inner: InMemoryPostingStore::new(),
    });
    let service = service(&driver, 1).with_store(store.clone());

    let job_id = service
        .start_scraping_job(&linkedin(), SearchParams::new("rust"), Some(&fast()))
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), started.notified())
        .await
        .expect("store write started");

    assert!(!service.cancel_job(&job_id));
    let job = wait_for(&service, &job_id, |job| job.is_finished()).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.stored_postings, Some(3));
    assert_eq!(store.inner.len(), 3);
}
