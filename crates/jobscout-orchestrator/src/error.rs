use crate::job::JobStatus;
use jobscout_boards::{ErrorKind, ScrapeError};
use jobscout_core::JobId;
use thiserror::Error;

/// Errors raised by the scraping service and its collaborators.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid job transition {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("scraping service is shut down")]
    ShutDown,
}

impl OrchestratorError {
    /// Failure classification for job records and stats.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Scrape(err) => err.kind(),
            Self::Storage(_) => ErrorKind::Storage,
            _ => ErrorKind::Configuration,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_errors_keep_their_kind() {
        let err: OrchestratorError = ScrapeError::UnknownBoard("monster".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::UnknownBoard);
        assert_eq!(err.to_string(), "unknown board: monster");
        assert_eq!(
            OrchestratorError::Storage("disk full".to_string()).kind(),
            ErrorKind::Storage
        );
    }
}
