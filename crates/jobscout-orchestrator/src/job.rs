//! Scrape job records and their state machine.

use crate::error::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use jobscout_boards::{ErrorKind, ScrapeConfiguration, ScrapeError, ScrapingResult, SearchParams};
use jobscout_core::{BoardId, JobId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a [`ScrapeJob`].
///
/// `Pending -> Running -> {Completed | Failed}`, `Failed -> Retrying -> Running`
/// while attempts remain, and any non-terminal state may move to `Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Registered, waiting for a browser session
    Pending,
    /// Scraper is running
    Running,
    /// Scrape finished without a session-level fault
    Completed,
    /// Last attempt failed
    Failed,
    /// Waiting for the next attempt
    Retrying,
    /// Cancelled on request
    Cancelled,
}

impl JobStatus {
    /// Whether the state machine allows `self -> next`.
    ///
    /// `Failed -> Retrying` is allowed here; whether the job still has
    /// attempts left is checked by [`ScrapeJob::transition`].
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use JobStatus::{Cancelled, Completed, Failed, Pending, Retrying, Running};
        matches!(
            (self, next),
            (Pending, Running | Cancelled)
                | (Running, Completed | Failed | Cancelled)
                | (Failed, Retrying)
                | (Retrying, Running | Cancelled)
        )
    }

    /// Pending, running or waiting to retry.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Retrying)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Retrying => "retrying",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// How a job was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum JobType {
    /// Submitted directly by a caller
    Search,
    /// Submitted by the continuous scraping loop
    Continuous,
}

/// Failure recorded on a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Classification of the failure
    pub kind: ErrorKind,
    /// Human-readable message
    pub message: String,
    /// Attempt that failed, starting at 1
    pub attempt: u32,
    /// When the failure was recorded
    pub occurred_at: DateTime<Utc>,
}

/// One tracked unit of scraping work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScrapeJob {
    pub id: JobId,
    pub board_id: BoardId,
    pub job_type: JobType,
    pub params: SearchParams,
    pub config: ScrapeConfiguration,
    pub status: JobStatus,
    /// Every status the job has been in, oldest first
    pub status_history: Vec<JobStatus>,
    /// Attempts started so far
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub result: Option<ScrapingResult>,
    /// Most recent failure
    pub error: Option<JobError>,
    /// Postings accepted by the storage collaborator
    pub stored_postings: Option<usize>,
}

impl ScrapeJob {
    /// New `Pending` job.
    #[must_use]
    pub fn new(
        board_id: BoardId,
        params: SearchParams,
        config: ScrapeConfiguration,
        job_type: JobType,
    ) -> Self {
        Self {
            id: JobId::generate(),
            board_id,
            job_type,
            params,
            max_attempts: config.max_attempts(),
            config,
            status: JobStatus::Pending,
            status_history: vec![JobStatus::Pending],
            attempts: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            next_retry_at: None,
            result: None,
            error: None,
            stored_postings: None,
        }
    }

    /// Move to `next`, stamping attempt counters and timestamps.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        let allowed = self.status.can_transition_to(next)
            && (next != JobStatus::Retrying || self.has_attempts_left());
        if !allowed {
            return Err(OrchestratorError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        let now = Utc::now();
        match next {
            JobStatus::Running => {
                self.attempts += 1;
                self.started_at.get_or_insert(now);
                self.next_retry_at = None;
            }
            JobStatus::Completed | JobStatus::Cancelled => {
                self.completed_at = Some(now);
                self.next_retry_at = None;
            }
            JobStatus::Failed => self.completed_at = Some(now),
            JobStatus::Retrying => self.completed_at = None,
            JobStatus::Pending => {}
        }

        self.status = next;
        self.status_history.push(next);
        Ok(())
    }

    /// Whether another attempt may be started.
    #[must_use]
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Completed, cancelled, or failed with no retry pending.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        match self.status {
            JobStatus::Completed | JobStatus::Cancelled => true,
            JobStatus::Failed => !self.retry_possible(),
            _ => false,
        }
    }

    /// Record `err` against the current attempt.
    pub fn record_error(&mut self, err: &ScrapeError) {
        self.error = Some(JobError {
            kind: err.kind(),
            message: err.to_string(),
            attempt: self.attempts,
            occurred_at: Utc::now(),
        });
    }

    fn retry_possible(&self) -> bool {
        self.has_attempts_left() && self.error.as_ref().is_some_and(|e| e.kind.is_retryable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(max_retries: u32) -> ScrapeJob {
        let config = ScrapeConfiguration {
            max_retries,
            ..ScrapeConfiguration::default()
        };
        ScrapeJob::new(
            BoardId::new("linkedin").unwrap(),
            SearchParams::new("rust"),
            config,
            JobType::Search,
        )
    }

    #[test]
    fn test_transition_table() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Retrying));
        assert!(!Failed.can_transition_to(Running));
        assert!(Retrying.can_transition_to(Running));
        assert!(Retrying.can_transition_to(Cancelled));

        for next in [Pending, Running, Completed, Failed, Retrying, Cancelled] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_retry_loop_is_bounded_by_max_attempts() {
        let mut job = job(1);
        assert_eq!(job.max_attempts, 2);

        job.transition(JobStatus::Running).unwrap();
        job.record_error(&ScrapeError::Network("reset".to_string()));
        job.transition(JobStatus::Failed).unwrap();
        assert!(!job.is_finished());
        job.transition(JobStatus::Retrying).unwrap();
        job.transition(JobStatus::Running).unwrap();
        assert_eq!(job.attempts, 2);

        job.transition(JobStatus::Failed).unwrap();
        assert!(job.is_finished());
        let err = job.transition(JobStatus::Retrying).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition { .. }));
        assert_eq!(
            job.status_history,
            vec![
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Failed,
                JobStatus::Retrying,
                JobStatus::Running,
                JobStatus::Failed,
            ]
        );
    }

    #[test]
    fn test_non_retryable_failure_is_final() {
        let mut job = job(3);
        job.transition(JobStatus::Running).unwrap();
        job.record_error(&ScrapeError::Configuration("disabled".to_string()));
        job.transition(JobStatus::Failed).unwrap();
        assert!(job.is_finished());
        assert_eq!(job.error.as_ref().unwrap().attempt, 1);
    }

    #[test]
    fn test_cancelled_job_is_absorbing() {
        let mut job = job(0);
        job.transition(JobStatus::Cancelled).unwrap();
        assert!(job.is_finished());
        assert!(job.completed_at.is_some());
        assert!(job.transition(JobStatus::Running).is_err());
        assert_eq!(job.attempts, 0);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Retrying).unwrap(),
            "\"retrying\""
        );
        assert_eq!(
            serde_json::to_string(&JobType::Continuous).unwrap(),
            "\"Continuous\""
        );
    }
}
