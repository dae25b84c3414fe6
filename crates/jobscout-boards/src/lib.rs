//! JobScout Boards - job-board scrapers and the factory that issues them.
//!
//! A board ([`JobBoard`]) only knows how to build search URLs and parse
//! pages. [`BoardScraper`] wraps a board with a [`ScrapeConfiguration`], a
//! session identity and a browser driver, and runs the fixed lifecycle:
//! open a session, navigate, check for countermeasures, extract, close.
//!
//! # Architecture
//!
//! - **Policy** ([`definition`]): per-board configuration and overrides
//! - **Records** ([`posting`], [`search`], [`result`]): postings, search filters, run results
//! - **Contract** ([`contract`], [`scraper`]): board trait and shared driver
//! - **Countermeasures** ([`detection`], [`throttle`], [`robots`]): blocking and
//!   throttling detection, request pacing, robots.txt
//! - **Boards** ([`boards`]): LinkedIn and Indeed
//! - **Factory** ([`registry`]): board registry and scraper construction
//!
//! # Example
//!
//! ```rust,no_run
//! use jobscout_boards::{ScraperFactory, SearchParams};
//! use jobscout_browser::ChromiumDriver;
//! use jobscout_core::{AppConfig, BoardId};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = ScraperFactory::new(Arc::new(ChromiumDriver::new()), &AppConfig::default())?;
//! let scraper = factory.create_scraper(&BoardId::new("linkedin")?, None, None)?;
//!
//! let params = SearchParams::new("rust developer").with_location("Remote");
//! let result = scraper.scrape_jobs(&params, &CancellationToken::new()).await?;
//! println!("{} postings", result.scraped_jobs);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod boards;
pub mod contract;
pub mod definition;
pub mod detection;
pub mod error;
pub mod extract;
pub mod posting;
pub mod registry;
pub mod result;
pub mod robots;
pub mod scraper;
pub mod search;
pub mod throttle;

// Re-export commonly used types
pub use boards::{IndeedBoard, LinkedInBoard};
pub use contract::{JobBoard, ListingPage, ParseContext};
pub use definition::{ConfigOverrides, Priority, ScrapeConfiguration};
pub use detection::{DetectionReport, Indicator};
pub use error::{ErrorKind, Result, ScrapeError};
pub use posting::{
    CompanyInfo, DataQuality, EmploymentType, QualityLabel, SalaryPeriod, SalaryRange,
    ScrapedPosting, SeniorityLevel,
};
pub use registry::{BoardStats, ScraperFactory};
pub use result::{ScrapeIssue, ScrapingResult};
pub use robots::RobotsPolicy;
pub use scraper::{BoardScraper, SessionSlot};
pub use search::{PostedWithin, SearchParams};
