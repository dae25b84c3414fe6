//! Aggregate counters and health reports exposed by the scraping service.

use crate::circuit::CircuitState;
use crate::job::{JobStatus, ScrapeJob};
use chrono::{DateTime, Utc};
use jobscout_boards::BoardStats;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of jobs in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct StatusCounts {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub retrying: usize,
    pub cancelled: usize,
}

impl StatusCounts {
    /// Count `jobs` by status.
    pub fn tally<'a>(jobs: impl IntoIterator<Item = &'a ScrapeJob>) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            let slot = match job.status {
                JobStatus::Pending => &mut counts.pending,
                JobStatus::Running => &mut counts.running,
                JobStatus::Completed => &mut counts.completed,
                JobStatus::Failed => &mut counts.failed,
                JobStatus::Retrying => &mut counts.retrying,
                JobStatus::Cancelled => &mut counts.cancelled,
            };
            *slot += 1;
        }
        counts
    }

    /// Jobs in any status.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed + self.failed + self.retrying + self.cancelled
    }

    /// Pending, running or retrying.
    #[must_use]
    pub fn active(&self) -> usize {
        self.pending + self.running + self.retrying
    }

    /// Completed jobs over completed plus failed ones, or `0.0` when none
    /// has finished.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.completed as f64 / finished as f64
        }
    }
}

/// Factory counters plus service-side state for one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardHealth {
    /// Registry counters
    #[serde(flatten)]
    pub stats: BoardStats,
    /// Registered and enabled
    pub available: bool,
    /// Breaker state
    pub circuit: CircuitState,
    /// Consecutive session-level failures
    pub consecutive_failures: u32,
}

/// Snapshot returned by [`crate::ScrapingService::get_stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ServiceStats {
    pub jobs: StatusCounts,
    pub total_jobs: usize,
    pub active_jobs: usize,
    pub success_rate: f64,
    /// Postings handed to the storage collaborator by completed jobs
    pub postings_stored: usize,
    pub max_concurrent_sessions: usize,
    /// Session permits not currently held
    pub available_sessions: usize,
    pub continuous_scraping: bool,
    pub boards: BTreeMap<String, BoardHealth>,
}

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Boards available and cache reachable
    Healthy,
    /// Scraping works but something is impaired
    Degraded,
    /// No board can be scraped
    Unhealthy,
}

/// Reachability of the result cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum CacheHealth {
    /// Ping succeeded
    Connected,
    /// Ping failed
    Disconnected(String),
    /// No cache configured
    Disabled,
}

/// Result of [`crate::ScrapingService::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub cache: CacheHealth,
    pub available_boards: usize,
    /// Boards whose breaker is not closed
    pub tripped_boards: Vec<String>,
    pub active_jobs: usize,
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Derive the overall status from its parts.
    #[must_use]
    pub fn status_for(
        cache: &CacheHealth,
        available_boards: usize,
        tripped: usize,
    ) -> HealthStatus {
        if available_boards == 0 {
            HealthStatus::Unhealthy
        } else if tripped > 0 || !matches!(cache, CacheHealth::Connected) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}
