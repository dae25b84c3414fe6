//! JobScout Core - Foundation crate for the JobScout scraping engine.
//!
//! This crate provides shared types, error handling, configuration management,
//! and logging setup that all other JobScout crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes (`BoardId`, `JobId`)
//! - [`logging`] - `tracing-subscriber` initialisation
//!
//! # Example
//!
//! ```rust
//! use jobscout_core::{AppConfig, BoardId};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert!(config.browser.headless);
//!
//! let board = BoardId::new("linkedin")?;
//! println!("Scraping {board}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, LoggingConfig, ScrapingConfig};
pub use error::{ConfigError, ConfigResult, JobscoutError, Result};
pub use logging::init_tracing;
pub use types::{BoardId, JobId};
