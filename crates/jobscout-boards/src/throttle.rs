//! Per-run request pacing.

use crate::definition::ScrapeConfiguration;
use crate::error::{Result, ScrapeError};
use rand::Rng;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// Spaces navigations within one scrape run.
///
/// Every request after the first waits `delay_between_requests` plus up to
/// half of it again as jitter, and no request is issued while the rolling
/// minute or hour window is full.
#[derive(Debug)]
pub struct RequestThrottle {
    base_delay: Duration,
    per_minute: usize,
    per_hour: usize,
    history: VecDeque<Instant>,
    total_wait: Duration,
}

impl RequestThrottle {
    /// Build from a board policy.
    #[must_use]
    pub fn from_config(config: &ScrapeConfiguration) -> Self {
        Self {
            base_delay: config.delay_between_requests(),
            per_minute: config.requests_per_minute as usize,
            per_hour: config.requests_per_hour as usize,
            history: VecDeque::new(),
            total_wait: Duration::ZERO,
        }
    }

    /// Wait until the next request may go out, then record it.
    pub async fn acquire(&mut self, cancel: &CancellationToken) -> Result<()> {
        let wait = self.required_wait(Instant::now());
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "throttling before next request");
            self.total_wait += wait;
            tokio::select! {
                () = cancel.cancelled() => return Err(ScrapeError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
        self.history.push_back(Instant::now());
        Ok(())
    }

    /// Raise the base delay to at least `floor`, e.g. a robots.txt crawl delay.
    pub fn raise_delay(&mut self, floor: Duration) {
        self.base_delay = self.base_delay.max(floor);
    }

    /// Requests issued so far in this run.
    #[must_use]
    pub fn requests_made(&self) -> usize {
        self.history.len()
    }

    /// Time spent waiting so far.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    fn required_wait(&self, now: Instant) -> Duration {
        let Some(&last) = self.history.back() else {
            return Duration::ZERO;
        };

        let jitter_ms = if self.base_delay.is_zero() {
            0
        } else {
            let max = u64::try_from(self.base_delay.as_millis() / 2).unwrap_or(u64::MAX);
            rand::thread_rng().gen_range(0..=max)
        };
        let spacing = (last + self.base_delay + Duration::from_millis(jitter_ms))
            .saturating_duration_since(now);

        let window_wait = |window: Duration, limit: usize| -> Duration {
            let in_window: Vec<&Instant> = self
                .history
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < window)
                .collect();
            if in_window.len() < limit {
                return Duration::ZERO;
            }
            // The window frees up when the oldest request that keeps it full ages out
            let oldest = in_window[in_window.len() - limit];
            (*oldest + window).saturating_duration_since(now)
        };

        spacing
            .max(window_wait(MINUTE, self.per_minute))
            .max(window_wait(HOUR, self.per_hour))
    }
}
