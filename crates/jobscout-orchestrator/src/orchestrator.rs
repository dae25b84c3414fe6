//! Scraping service: job table, execution, retries and continuous scraping.
//!
//! [`ScrapingService`] accepts scrape requests, runs each one as a background
//! task and tracks it through the [`JobStatus`] state machine. Browser
//! sessions are bounded by a semaphore sized from
//! `scraping.max_concurrent_sessions`; queued jobs stay `Pending` (or
//! `Retrying`) until they hold a permit.

use crate::cache::ResultCache;
use crate::circuit::{CircuitBreaker, CircuitState};
use crate::error::{OrchestratorError, Result};
use crate::job::{JobStatus, JobType, ScrapeJob};
use crate::stats::{BoardHealth, CacheHealth, HealthReport, ServiceStats, StatusCounts};
use crate::storage::PostingStore;
use chrono::Utc;
use futures::future::join_all;
use jobscout_boards::{
    ConfigOverrides, ErrorKind, ScrapeConfiguration, ScrapeError, ScrapeIssue, ScraperFactory,
    ScrapingResult, SearchParams,
};
use jobscout_core::{BoardId, JobId, ScrapingConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

struct JobEntry {
    job: ScrapeJob,
    cancel: CancellationToken,
    /// Result accepted and being stored; the job can no longer be cancelled
    finalizing: bool,
}

struct ContinuousLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
struct ServiceSettings {
    max_concurrent_sessions: usize,
    inter_query_delay: Duration,
    cache_ttl: Duration,
    job_retention: Duration,
}

/// Coordinates scrape jobs over a shared [`ScraperFactory`].
///
/// Cloning is cheap; clones share the same job table, session pool and
/// continuous loop.
#[derive(Clone)]
pub struct ScrapingService {
    factory: Arc<ScraperFactory>,
    cache: Option<Arc<dyn ResultCache>>,
    store: Option<Arc<dyn PostingStore>>,
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
    sessions: Arc<Semaphore>,
    breakers: Arc<Mutex<HashMap<BoardId, CircuitBreaker>>>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
    continuous: Arc<Mutex<Option<ContinuousLoop>>>,
    shutdown: CancellationToken,
    settings: ServiceSettings,
}

impl ScrapingService {
    /// Create a service without cache or storage collaborators.
    #[must_use]
    pub fn new(factory: Arc<ScraperFactory>, config: &ScrapingConfig) -> Self {
        let max_concurrent_sessions = config.max_concurrent_sessions.max(1);
        Self {
            factory,
            cache: None,
            store: None,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(Semaphore::new(max_concurrent_sessions)),
            breakers: Arc::new(Mutex::new(HashMap::new())),
            tasks: Arc::new(Mutex::new(Vec::new())),
            continuous: Arc::new(Mutex::new(None)),
            shutdown: CancellationToken::new(),
            settings: ServiceSettings {
                max_concurrent_sessions,
                inter_query_delay: Duration::from_millis(config.inter_query_delay_ms),
                cache_ttl: Duration::from_secs(config.result_cache_ttl_secs),
                job_retention: Duration::from_secs(config.finished_job_retention_secs),
            },
        }
    }

    /// Cache completed results in `cache`.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Hand extracted postings to `store`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn PostingStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Factory the service builds scrapers from.
    #[must_use]
    pub fn factory(&self) -> &Arc<ScraperFactory> {
        &self.factory
    }

    /// Queue a scrape of `board_id` and return its job id without waiting
    /// for it to run.
    ///
    /// Unknown or disabled boards, invalid overrides and invalid search
    /// parameters are rejected here and never become jobs.
    pub fn start_scraping_job(
        &self,
        board_id: &BoardId,
        params: SearchParams,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<JobId> {
        self.submit(board_id, params, overrides, JobType::Search)
    }

    /// Snapshot of one job.
    #[must_use]
    pub fn get_job_status(&self, job_id: &JobId) -> Option<ScrapeJob> {
        self.jobs
            .read()
            .expect("acquire read lock on jobs")
            .get(job_id)
            .map(|entry| entry.job.clone())
    }

    /// Pending, running and retrying jobs, oldest first.
    #[must_use]
    pub fn get_active_jobs(&self) -> Vec<ScrapeJob> {
        let mut active: Vec<ScrapeJob> = self
            .jobs
            .read()
            .expect("acquire read lock on jobs")
            .values()
            .filter(|entry| entry.job.status.is_active())
            .map(|entry| entry.job.clone())
            .collect();
        active.sort_by_key(|job| job.created_at);
        active
    }

    /// Every job the service knows about, oldest first.
    #[must_use]
    pub fn get_all_jobs(&self) -> Vec<ScrapeJob> {
        let mut all: Vec<ScrapeJob> = self
            .jobs
            .read()
            .expect("acquire read lock on jobs")
            .values()
            .map(|entry| entry.job.clone())
            .collect();
        all.sort_by_key(|job| job.created_at);
        all
    }

    /// Cancel a job. Returns `false` for unknown or already finished jobs.
    ///
    /// A pending or retrying job never runs again. A running job is marked
    /// cancelled and its scraper stops at the next suspension point. A job
    /// whose result is already being stored completes instead.
    pub fn cancel_job(&self, job_id: &JobId) -> bool {
        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let Some(entry) = jobs.get_mut(job_id) else {
            return false;
        };
        if entry.finalizing {
            debug!(job_id = %job_id, "job is storing its result, not cancelled");
            return false;
        }

        let previous = entry.job.status;
        if entry.job.transition(JobStatus::Cancelled).is_err() {
            debug!(job_id = %job_id, status = %previous, "job can no longer be cancelled");
            return false;
        }
        entry.cancel.cancel();
        info!(job_id = %job_id, from = %previous, "scrape job cancelled");
        true
    }

    /// Drop finished jobs older than `scraping.finished_job_retention_secs`.
    /// Returns how many were removed.
    ///
    /// Runs on every submission; results of evicted jobs stay reachable
    /// through [`Self::get_cached_result`] while the cache holds them.
    pub fn prune_finished_jobs(&self) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(self.settings.job_retention)
            .ok()
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
        else {
            return 0;
        };

        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let before = jobs.len();
        jobs.retain(|_, entry| {
            !entry.job.is_finished()
                || entry.job.completed_at.is_some_and(|finished| finished > cutoff)
        });
        let removed = before - jobs.len();
        if removed > 0 {
            debug!(removed, retained = jobs.len(), "evicted finished jobs");
        }
        removed
    }

    /// Cached result of a completed job, if the cache still holds it.
    pub async fn get_cached_result(&self, job_id: &JobId) -> Option<ScrapingResult> {
        let cache = self.cache.as_ref()?;
        match cache.get(job_id).await {
            Ok(result) => result,
            Err(err) => {
                warn!(job_id = %job_id, error = %err, "result cache lookup failed");
                None
            }
        }
    }

    /// Run one sweep over `board_ids` x `queries` now and repeat it every
    /// `interval_minutes` until [`Self::stop_continuous_scraping`].
    ///
    /// Boards that are unknown or disabled are skipped with a warning. A
    /// loop that is already running is replaced.
    pub fn start_continuous_scraping(
        &self,
        board_ids: Vec<BoardId>,
        queries: Vec<String>,
        interval_minutes: u64,
    ) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShutDown);
        }
        if interval_minutes == 0 {
            return Err(OrchestratorError::InvalidSchedule(
                "interval must be at least one minute".to_string(),
            ));
        }
        let queries: Vec<String> = queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if board_ids.is_empty() || queries.is_empty() {
            return Err(OrchestratorError::InvalidSchedule(
                "at least one board and one query are required".to_string(),
            ));
        }

        let interval = Duration::from_secs(interval_minutes.saturating_mul(60));
        info!(
            boards = board_ids.len(),
            queries = queries.len(),
            interval_minutes,
            "starting continuous scraping"
        );

        let cancel = self.shutdown.child_token();
        let service = self.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            service
                .continuous_loop(board_ids, queries, interval, loop_cancel)
                .await;
        });

        let previous = self
            .continuous
            .lock()
            .expect("acquire continuous lock")
            .replace(ContinuousLoop { cancel, handle });
        if let Some(previous) = previous {
            warn!("replacing running continuous scraping loop");
            previous.cancel.cancel();
        }
        Ok(())
    }

    /// Stop the continuous loop. Returns whether one was running. Jobs it
    /// already queued keep running.
    pub async fn stop_continuous_scraping(&self) -> bool {
        let running = self
            .continuous
            .lock()
            .expect("acquire continuous lock")
            .take();
        let Some(running) = running else {
            return false;
        };

        running.cancel.cancel();
        if let Err(err) = running.handle.await {
            warn!(error = %err, "continuous scraping loop ended abnormally");
        }
        info!("continuous scraping stopped");
        true
    }

    /// Whether a continuous loop is running.
    #[must_use]
    pub fn is_continuous_scraping(&self) -> bool {
        self.continuous
            .lock()
            .expect("acquire continuous lock")
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Job counters, success rate and per-board health.
    #[must_use]
    pub fn get_stats(&self) -> ServiceStats {
        let (jobs, postings_stored) = {
            let table = self.jobs.read().expect("acquire read lock on jobs");
            (
                StatusCounts::tally(table.values().map(|entry| &entry.job)),
                table
                    .values()
                    .filter_map(|entry| entry.job.stored_postings)
                    .sum(),
            )
        };

        let now = Instant::now();
        let boards = {
            let breakers = self.breakers.lock().expect("acquire breaker lock");
            self.factory
                .get_scraper_stats()
                .into_iter()
                .map(|(id, stats)| {
                    let breaker = id
                        .parse::<BoardId>()
                        .ok()
                        .and_then(|board_id| breakers.get(&board_id));
                    let health = BoardHealth {
                        available: stats.enabled,
                        circuit: breaker.map_or(CircuitState::Closed, |b| b.state(now)),
                        consecutive_failures: breaker
                            .map_or(0, CircuitBreaker::consecutive_failures),
                        stats,
                    };
                    (id, health)
                })
                .collect()
        };

        ServiceStats {
            total_jobs: jobs.total(),
            active_jobs: jobs.active(),
            success_rate: jobs.success_rate(),
            jobs,
            postings_stored,
            max_concurrent_sessions: self.settings.max_concurrent_sessions,
            available_sessions: self.sessions.available_permits(),
            continuous_scraping: self.is_continuous_scraping(),
            boards,
        }
    }

    /// Overall status plus result cache reachability.
    pub async fn health_check(&self) -> HealthReport {
        let cache = match &self.cache {
            None => CacheHealth::Disabled,
            Some(cache) => match cache.ping().await {
                Ok(()) => CacheHealth::Connected,
                Err(err) => {
                    warn!(error = %err, "result cache unreachable");
                    CacheHealth::Disconnected(err.to_string())
                }
            },
        };

        let available_boards = self.factory.get_available_scrapers().len();
        let now = Instant::now();
        let mut tripped_boards: Vec<String> = self
            .breakers
            .lock()
            .expect("acquire breaker lock")
            .iter()
            .filter(|(_, breaker)| breaker.state(now) != CircuitState::Closed)
            .map(|(id, _)| id.to_string())
            .collect();
        tripped_boards.sort();

        let active_jobs = self
            .jobs
            .read()
            .expect("acquire read lock on jobs")
            .values()
            .filter(|entry| entry.job.status.is_active())
            .count();

        HealthReport {
            status: HealthReport::status_for(&cache, available_boards, tripped_boards.len()),
            cache,
            available_boards,
            tripped_boards,
            active_jobs,
            checked_at: Utc::now(),
        }
    }

    /// Stop the continuous loop, cancel every active job, wait for job
    /// tasks to wind down and close any browser session still open.
    ///
    /// Returns how many jobs were cancelled. New submissions are rejected
    /// afterwards.
    pub async fn shutdown(&self) -> usize {
        self.stop_continuous_scraping().await;

        let cancelled = {
            let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
            let mut cancelled = 0;
            for entry in jobs.values_mut() {
                if entry.finalizing || !entry.job.status.is_active() {
                    continue;
                }
                if entry.job.transition(JobStatus::Cancelled).is_ok() {
                    cancelled += 1;
                }
            }
            cancelled
        };
        self.shutdown.cancel();

        let handles = std::mem::take(&mut *self.tasks.lock().expect("acquire task lock"));
        for outcome in join_all(handles).await {
            if let Err(err) = outcome {
                warn!(error = %err, "scrape task ended abnormally");
            }
        }

        let closed = self.factory.cleanup_all().await;
        info!(cancelled, closed_sessions = closed, "scraping service shut down");
        cancelled
    }

    fn submit(
        &self,
        board_id: &BoardId,
        params: SearchParams,
        overrides: Option<&ConfigOverrides>,
        job_type: JobType,
    ) -> Result<JobId> {
        if self.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShutDown);
        }
        params.validate()?;
        let config = self.factory.resolve_config(board_id, overrides)?;
        if !config.enabled {
            return Err(ScrapeError::Configuration(format!("board {board_id} is disabled")).into());
        }

        self.prune_finished_jobs();
        let job = ScrapeJob::new(board_id.clone(), params, config, job_type);
        let job_id = job.id.clone();
        let cancel = self.shutdown.child_token();
        self.jobs.write().expect("acquire write lock on jobs").insert(
            job_id.clone(),
            JobEntry {
                job,
                cancel: cancel.clone(),
                finalizing: false,
            },
        );
        info!(job_id = %job_id, board_id = %board_id, ?job_type, "scrape job queued");

        let service = self.clone();
        let task_job_id = job_id.clone();
        let handle = tokio::spawn(async move {
            service.run_job(task_job_id, cancel).await;
        });

        let mut tasks = self.tasks.lock().expect("acquire task lock");
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);

        Ok(job_id)
    }

    async fn run_job(self, job_id: JobId, cancel: CancellationToken) {
        loop {
            let permit = tokio::select! {
                () = cancel.cancelled() => return,
                permit = Arc::clone(&self.sessions).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return,
                },
            };

            let Some((board_id, config, params)) = self.begin_attempt(&job_id) else {
                return;
            };
            let outcome = self.attempt(&board_id, config, &params, &cancel).await;
            drop(permit);

            let Some(delay) = self.finish_attempt(&job_id, outcome).await else {
                return;
            };
            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn begin_attempt(
        &self,
        job_id: &JobId,
    ) -> Option<(BoardId, ScrapeConfiguration, SearchParams)> {
        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let job = &mut jobs.get_mut(job_id)?.job;
        if let Err(err) = job.transition(JobStatus::Running) {
            debug!(job_id = %job_id, error = %err, "job not started");
            return None;
        }

        info!(
            job_id = %job_id,
            board_id = %job.board_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "scrape job running"
        );
        Some((job.board_id.clone(), job.config.clone(), job.params.clone()))
    }

    async fn attempt(
        &self,
        board_id: &BoardId,
        config: ScrapeConfiguration,
        params: &SearchParams,
        cancel: &CancellationToken,
    ) -> std::result::Result<ScrapingResult, ScrapeError> {
        self.acquire_circuit(board_id, &config)?;

        let scraper = match self.factory.build_scraper(board_id, config, None) {
            Ok(scraper) => scraper,
            Err(err) => {
                self.settle_circuit(board_id, None);
                return Err(err);
            }
        };

        let scraper = Arc::new(scraper);
        let task_scraper = Arc::clone(&scraper);
        let task_params = params.clone();
        let task_cancel = cancel.clone();
        let run = tokio::spawn(async move {
            task_scraper.scrape_jobs(&task_params, &task_cancel).await
        });

        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(err) => {
                let closed = scraper.close_session().await;
                error!(
                    board_id = %board_id,
                    error = %err,
                    closed_session = closed,
                    "scraper task crashed"
                );
                Err(ScrapeError::Internal(err.to_string()))
            }
        };
        self.settle_circuit(board_id, Some(&outcome));
        outcome
    }

    fn acquire_circuit(
        &self,
        board_id: &BoardId,
        config: &ScrapeConfiguration,
    ) -> std::result::Result<(), ScrapeError> {
        let mut breakers = self.breakers.lock().expect("acquire breaker lock");
        let breaker = breakers.entry(board_id.clone()).or_insert_with(|| {
            CircuitBreaker::new(
                config.circuit_breaker_threshold,
                config.circuit_breaker_cooldown(),
            )
        });

        breaker.try_acquire(Instant::now()).map_err(|retry_after| {
            warn!(board_id = %board_id, ?retry_after, "circuit open, attempt rejected");
            ScrapeError::CircuitOpen {
                board: board_id.to_string(),
                retry_after,
            }
        })
    }

    fn settle_circuit(
        &self,
        board_id: &BoardId,
        outcome: Option<&std::result::Result<ScrapingResult, ScrapeError>>,
    ) {
        let mut breakers = self.breakers.lock().expect("acquire breaker lock");
        let Some(breaker) = breakers.get_mut(board_id) else {
            return;
        };

        match outcome {
            Some(Ok(_)) => breaker.record_success(),
            Some(Err(err)) if err.is_retryable() => {
                let was_closed = breaker.state(Instant::now()) == CircuitState::Closed;
                breaker.record_failure(Instant::now());
                if was_closed && breaker.state(Instant::now()) == CircuitState::Open {
                    warn!(
                        board_id = %board_id,
                        failures = breaker.consecutive_failures(),
                        "circuit opened"
                    );
                }
            }
            _ => breaker.release_trial(),
        }
    }

    async fn finish_attempt(
        &self,
        job_id: &JobId,
        outcome: std::result::Result<ScrapingResult, ScrapeError>,
    ) -> Option<Duration> {
        match outcome {
            Ok(result) => {
                self.complete(job_id, result).await;
                None
            }
            Err(err) => self.fail(job_id, &err),
        }
    }

    async fn complete(&self, job_id: &JobId, mut result: ScrapingResult) {
        {
            let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
            let Some(entry) = jobs.get_mut(job_id) else {
                return;
            };
            if entry.job.status != JobStatus::Running {
                debug!(job_id = %job_id, "discarding result of cancelled job");
                return;
            }
            entry.finalizing = true;
        }

        let stored = self.persist(job_id, &mut result).await;
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set(job_id, &result, self.settings.cache_ttl).await {
                warn!(job_id = %job_id, error = %err, "failed to cache result");
            }
        }

        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let Some(entry) = jobs.get_mut(job_id) else {
            return;
        };
        entry.finalizing = false;
        if entry.job.transition(JobStatus::Completed).is_err() {
            return;
        }

        info!(
            job_id = %job_id,
            board_id = %entry.job.board_id,
            scraped = result.scraped_jobs,
            total = result.total_jobs,
            issues = result.errors.len(),
            duration_ms = result.duration_ms,
            "scrape job completed"
        );
        entry.job.stored_postings = stored;
        entry.job.result = Some(result);
    }

    async fn persist(&self, job_id: &JobId, result: &mut ScrapingResult) -> Option<usize> {
        let store = self.store.as_ref()?;
        if result.postings.is_empty() {
            return Some(0);
        }

        match store.upsert_postings(&result.postings).await {
            Ok(written) => {
                debug!(job_id = %job_id, written, "postings stored");
                Some(written)
            }
            Err(err) => {
                error!(job_id = %job_id, error = %err, "failed to store postings");
                result
                    .errors
                    .push(ScrapeIssue::new(ErrorKind::Storage, err.to_string(), None));
                None
            }
        }
    }

    fn fail(&self, job_id: &JobId, err: &ScrapeError) -> Option<Duration> {
        let mut jobs = self.jobs.write().expect("acquire write lock on jobs");
        let job = &mut jobs.get_mut(job_id)?.job;
        if job.status != JobStatus::Running {
            return None;
        }

        job.record_error(err);
        job.transition(JobStatus::Failed).ok()?;
        if !err.is_retryable() || !job.has_attempts_left() {
            error!(
                job_id = %job_id,
                board_id = %job.board_id,
                attempts = job.attempts,
                error = %err,
                "scrape job failed"
            );
            return None;
        }

        let base = job.config.retry_delay();
        let delay = err.retry_after().map_or(base, |hint| hint.max(base));
        job.transition(JobStatus::Retrying).ok()?;
        job.next_retry_at = chrono::Duration::from_std(delay)
            .ok()
            .map(|wait| Utc::now() + wait);

        warn!(
            job_id = %job_id,
            board_id = %job.board_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            retry_in = ?delay,
            error = %err,
            "scrape attempt failed, retrying"
        );
        Some(delay)
    }

    async fn continuous_loop(
        self,
        board_ids: Vec<BoardId>,
        queries: Vec<String>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        let mut sweep = 0u64;
        loop {
            sweep += 1;
            let queued = self.sweep(&board_ids, &queries, &cancel).await;
            info!(sweep, queued, "continuous sweep finished");

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }
        debug!(sweeps = sweep, "continuous scraping loop exited");
    }

    async fn sweep(
        &self,
        board_ids: &[BoardId],
        queries: &[String],
        cancel: &CancellationToken,
    ) -> usize {
        let mut queued = 0;
        let mut first = true;

        for board_id in board_ids {
            if !self.factory.is_scraper_available(board_id) {
                warn!(board_id = %board_id, "board unavailable, skipped in continuous sweep");
                continue;
            }

            for query in queries {
                if !first {
                    tokio::select! {
                        () = cancel.cancelled() => return queued,
                        () = tokio::time::sleep(self.settings.inter_query_delay) => {}
                    }
                }
                first = false;
                if cancel.is_cancelled() {
                    return queued;
                }

                let params = SearchParams::new(query.clone());
                match self.submit(board_id, params, None, JobType::Continuous) {
                    Ok(job_id) => {
                        queued += 1;
                        debug!(job_id = %job_id, board_id = %board_id, query = %query, "continuous job queued");
                    }
                    Err(err) => {
                        warn!(board_id = %board_id, query = %query, error = %err, "continuous job rejected");
                    }
                }
            }
        }
        queued
    }
}

impl std::fmt::Debug for ScrapingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapingService")
            .field("factory", &self.factory)
            .field("has_cache", &self.cache.is_some())
            .field("has_store", &self.store.is_some())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
