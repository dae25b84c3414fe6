//! Configuration management for JobScout.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration.
///
/// This is loaded from `~/.config/jobscout/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Orchestration and scraping behavior settings
    pub scraping: ScrapingConfig,
    /// Log output settings
    pub logging: LoggingConfig,
    /// Per-board policy overrides, keyed by board ID.
    ///
    /// Each table is interpreted by the board factory; unknown keys are rejected there.
    pub boards: BTreeMap<String, toml::Table>,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `JOBSCOUT_HEADLESS`: Override browser headless mode (true/false)
    /// - `JOBSCOUT_MAX_SESSIONS`: Override the concurrent browser session cap
    /// - `JOBSCOUT_LOG`: Override the tracing filter directive
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `JOBSCOUT_*` environment overrides in place.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("JOBSCOUT_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("JOBSCOUT_MAX_SESSIONS") {
            if let Ok(max) = val.parse() {
                self.scraping.max_concurrent_sessions = max;
                tracing::debug!("Override scraping.max_concurrent_sessions from env: {}", max);
            }
        }

        if let Ok(val) = std::env::var("JOBSCOUT_LOG") {
            if !val.trim().is_empty() {
                tracing::debug!("Override logging.filter from env: {}", val);
                self.logging.filter = val;
            }
        }
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scraping.max_concurrent_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scraping.max_concurrent_sessions".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser.window_width/window_height".to_string(),
                reason: "window dimensions must be positive".to_string(),
            });
        }

        if self.browser.navigation_timeout_secs == 0 || self.browser.element_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser.navigation_timeout_secs/element_timeout_secs".to_string(),
                reason: "timeouts must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/jobscout/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "jobscout", "jobscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/jobscout`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "jobscout", "jobscout").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Page navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Element (selector) wait timeout in seconds
    pub element_timeout_secs: u64,
    /// Explicit Chrome/Chromium executable; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// Extra command-line flags appended after the built-in stealth flags
    pub extra_args: Vec<String>,
    /// Proxy servers used when a board enables `use_proxy`
    pub proxies: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            element_timeout_secs: 10,
            chrome_executable: None,
            extra_args: Vec::new(),
            proxies: Vec::new(),
        }
    }
}

/// Orchestration and scraping behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapingConfig {
    /// Maximum number of browser sessions open at the same time
    pub max_concurrent_sessions: usize,
    /// Delay inserted between queries of a continuous sweep, in milliseconds
    pub inter_query_delay_ms: u64,
    /// How long completed results stay in the result cache, in seconds
    pub result_cache_ttl_secs: u64,
    /// How long finished jobs stay queryable before they are evicted, in seconds
    pub finished_job_retention_secs: u64,
    /// Version string stamped onto every scraped posting
    pub scraper_version: String,
}

impl Default for ScrapingConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 3,
            inter_query_delay_ms: 5000,
            result_cache_ttl_secs: 3600,
            finished_job_retention_secs: 3600,
            scraper_version: "1.0.0".to_string(),
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,
    /// Include the event target (module path) in each line
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,jobscout=debug".to_string(),
            with_target: true,
        }
    }
}
