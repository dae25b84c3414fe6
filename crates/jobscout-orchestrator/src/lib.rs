//! JobScout Orchestrator - scrape job lifecycle and scheduling.
//!
//! This crate turns board scrapers into tracked, retryable background jobs.
//! It coordinates the scraper factory, a bounded pool of browser sessions,
//! per-board circuit breakers and the cache and storage collaborators.
//!
//! # Features
//!
//! - Fire-and-continue job submission with status polling and cancellation
//! - Retry scheduling that honours the board's retry-after hints
//! - Semaphore-bounded browser sessions
//! - Circuit breakers that pause boards after repeated session failures
//! - Continuous scraping over boards x queries on a fixed interval
//!
//! # Example
//!
//! ```rust,no_run
//! use jobscout_boards::{ScraperFactory, SearchParams};
//! use jobscout_browser::ChromiumDriver;
//! use jobscout_core::{AppConfig, BoardId};
//! use jobscout_orchestrator::{InMemoryPostingStore, InMemoryResultCache, ScrapingService};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let factory = ScraperFactory::new(Arc::new(ChromiumDriver::new()), &config)?;
//! let service = ScrapingService::new(Arc::new(factory), &config.scraping)
//!     .with_cache(Arc::new(InMemoryResultCache::new()))
//!     .with_store(Arc::new(InMemoryPostingStore::new()));
//!
//! let job_id = service.start_scraping_job(
//!     &BoardId::new("indeed")?,
//!     SearchParams::new("software engineer").with_location("Mumbai"),
//!     None,
//! )?;
//! println!("queued {job_id}: {:?}", service.get_job_status(&job_id).map(|j| j.status));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cache;
pub mod circuit;
#[allow(missing_docs)]
pub mod error;
pub mod job;
pub mod orchestrator;
pub mod stats;
pub mod storage;

// Re-export commonly used types
pub use cache::{InMemoryResultCache, ResultCache};
pub use circuit::{CircuitBreaker, CircuitState};
pub use error::{OrchestratorError, Result};
pub use job::{JobError, JobStatus, JobType, ScrapeJob};
pub use orchestrator::ScrapingService;
pub use stats::{BoardHealth, CacheHealth, HealthReport, HealthStatus, ServiceStats, StatusCounts};
pub use storage::{InMemoryPostingStore, PostingStore};
