//! Error types for board scraping.

use jobscout_browser::BrowserError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while configuring or running a board scraper.
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Navigation, session initialisation or timeout failure
    #[error("network error: {0}")]
    Network(String),

    /// The page showed CAPTCHA, verification or blocking indicators
    #[error("blocked by {board}: {indicators:?} (confidence {confidence:.2})")]
    AntiBot {
        /// Board that served the page
        board: String,
        /// Lexicon words or selectors that matched
        indicators: Vec<String>,
        /// Heuristic confidence in `0.0..=1.0`
        confidence: f32,
    },

    /// The board signalled throttling
    #[error("rate limited by {board}")]
    RateLimited {
        /// Board that throttled us
        board: String,
        /// Retry-after hint found in the page, if any
        retry_after: Option<Duration>,
    },

    /// The board's circuit breaker is open
    #[error("circuit open for {board}, retry in {retry_after:?}")]
    CircuitOpen {
        /// Board whose breaker is open
        board: String,
        /// Remaining cooldown
        retry_after: Duration,
    },

    /// One listing or detail page could not be parsed
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Invalid configuration or override
    #[error("configuration error: {0}")]
    Configuration(String),

    /// No scraper is registered for the board
    #[error("unknown board: {0}")]
    UnknownBoard(String),

    /// The cancellation token fired
    #[error("scrape cancelled")]
    Cancelled,

    /// The scraper task aborted unexpectedly
    #[error("scraper crashed: {0}")]
    Internal(String),
}

impl ScrapeError {
    /// Classification used by retry policy and reporting.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) => ErrorKind::Network,
            Self::AntiBot { .. } => ErrorKind::AntiBot,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::UnknownBoard(_) => ErrorKind::UnknownBoard,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a job failing with this error may be attempted again.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Minimum wait the board asked for before the next attempt.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            Self::CircuitOpen { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// Whether this failure signals the board is pushing back on us.
    #[must_use]
    pub fn is_pushback(&self) -> bool {
        matches!(self, Self::AntiBot { .. } | Self::RateLimited { .. })
    }
}

impl From<BrowserError> for ScrapeError {
    fn from(err: BrowserError) -> Self {
        Self::Network(err.to_string())
    }
}

/// Failure classification shared by results, jobs and stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Navigation, session or timeout failure
    Network,
    /// Countermeasure detected
    AntiBot,
    /// Throttling detected
    RateLimited,
    /// Board breaker open
    CircuitOpen,
    /// One listing or detail failed to parse
    Extraction,
    /// Invalid configuration
    Configuration,
    /// Unregistered board
    UnknownBoard,
    /// Cancelled on request
    Cancelled,
    /// Storage collaborator failure
    Storage,
    /// Scraper task crashed
    Internal,
}

impl ErrorKind {
    /// Retry policy per kind.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::AntiBot | Self::RateLimited | Self::CircuitOpen
        )
    }
}

/// Result type for board operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy() {
        assert!(ScrapeError::Network("reset".to_string()).is_retryable());
        assert!(ScrapeError::AntiBot {
            board: "linkedin".to_string(),
            indicators: vec!["captcha".to_string()],
            confidence: 0.5,
        }
        .is_retryable());
        assert!(!ScrapeError::Configuration("bad".to_string()).is_retryable());
        assert!(!ScrapeError::UnknownBoard("monster".to_string()).is_retryable());
        assert!(!ScrapeError::Cancelled.is_retryable());
        assert!(!ErrorKind::Extraction.is_retryable());
        assert!(!ErrorKind::Storage.is_retryable());
        assert!(!ScrapeError::Internal("panicked".to_string()).is_retryable());
    }

    #[test]
    fn test_browser_errors_are_network_faults() {
        let err: ScrapeError = BrowserError::Timeout("navigation after 30s".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("30s"));
    }

    #[test]
    fn test_retry_after_hint() {
        let err = ScrapeError::RateLimited {
            board: "indeed".to_string(),
            retry_after: Some(Duration::from_secs(120)),
        };
        assert_eq!(err.retry_after(), Some(Duration::from_secs(120)));
        assert!(err.is_pushback());
        assert_eq!(ScrapeError::Network("x".to_string()).retry_after(), None);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::AntiBot).unwrap();
        assert_eq!(json, "\"anti_bot\"");
    }
}
