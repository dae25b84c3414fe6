//! Per-board scraping policy.
//!
//! A [`ScrapeConfiguration`] is created from a board's registered defaults,
//! optionally layered with [`ConfigOverrides`] from the application config
//! and from the request, validated, and then never mutated.

use crate::error::{Result, ScrapeError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Scheduling priority of a board or job.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Background work
    Low,
    /// Default priority
    #[default]
    Normal,
    /// Preferred boards
    High,
    /// Run before everything else
    Urgent,
}

/// Immutable scraping policy for one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfiguration {
    /// Whether the board may be scraped at all
    pub enabled: bool,
    /// Board priority
    pub priority: Priority,

    /// Ceiling on navigations per rolling minute
    pub requests_per_minute: u32,
    /// Ceiling on navigations per rolling hour
    pub requests_per_hour: u32,
    /// Base delay between consecutive navigations, before jitter
    pub delay_between_requests_ms: u64,

    /// Route the session through one of the configured proxies
    pub use_proxy: bool,
    /// Draw a fresh randomized identity per job
    pub rotate_user_agent: bool,
    /// Scroll and pause on every page before extraction
    pub simulate_human_behavior: bool,

    /// Maximum number of result pages per search
    pub max_pages_per_search: u32,
    /// Maximum number of postings kept per result page
    pub max_jobs_per_page: u32,

    /// Fetch each posting's detail page
    pub extract_full_description: bool,
    /// Keep company metadata found on detail pages
    pub extract_company_info: bool,
    /// Parse salary text into a structured range
    pub extract_salary: bool,

    /// Attempts after the first one
    pub max_retries: u32,
    /// Minimum delay before a retry
    pub retry_delay_ms: u64,

    /// Consecutive failures that open the board's circuit breaker
    pub circuit_breaker_threshold: u32,
    /// How long an open breaker rejects attempts
    pub circuit_breaker_cooldown_ms: u64,

    /// Page navigation timeout
    pub navigation_timeout_ms: u64,
    /// Readiness selector timeout
    pub element_timeout_ms: u64,

    /// Honour the board's robots.txt
    pub respect_robots_txt: bool,
    /// Redact e-mail addresses and phone numbers from free text
    pub anonymize_data: bool,
}

impl Default for ScrapeConfiguration {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: Priority::Normal,
            requests_per_minute: 10,
            requests_per_hour: 200,
            delay_between_requests_ms: 3_000,
            use_proxy: false,
            rotate_user_agent: true,
            simulate_human_behavior: true,
            max_pages_per_search: 5,
            max_jobs_per_page: 25,
            extract_full_description: false,
            extract_company_info: true,
            extract_salary: true,
            max_retries: 3,
            retry_delay_ms: 60_000,
            circuit_breaker_threshold: 5,
            circuit_breaker_cooldown_ms: 300_000,
            navigation_timeout_ms: 30_000,
            element_timeout_ms: 10_000,
            respect_robots_txt: true,
            anonymize_data: false,
        }
    }
}

impl ScrapeConfiguration {
    /// Apply `overrides` field by field and validate the result.
    pub fn with_overrides(&self, overrides: &ConfigOverrides) -> Result<Self> {
        let mut merged = self.clone();
        overrides.apply_to(&mut merged);
        merged.validate()?;
        Ok(merged)
    }

    /// Reject policies that can never scrape anything.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(ScrapeError::Configuration(reason.to_string()));

        if self.max_pages_per_search == 0 {
            return invalid("max_pages_per_search must be at least 1");
        }
        if self.max_jobs_per_page == 0 {
            return invalid("max_jobs_per_page must be at least 1");
        }
        if self.requests_per_minute == 0 || self.requests_per_hour == 0 {
            return invalid("request ceilings must be at least 1");
        }
        if self.navigation_timeout_ms == 0 || self.element_timeout_ms == 0 {
            return invalid("timeouts must be greater than zero");
        }
        if self.circuit_breaker_threshold == 0 {
            return invalid("circuit_breaker_threshold must be at least 1");
        }
        Ok(())
    }

    /// One initial attempt plus the retry budget.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Base inter-request delay.
    #[must_use]
    pub fn delay_between_requests(&self) -> Duration {
        Duration::from_millis(self.delay_between_requests_ms)
    }

    /// Minimum delay before a retry.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Open-breaker cooldown.
    #[must_use]
    pub fn circuit_breaker_cooldown(&self) -> Duration {
        Duration::from_millis(self.circuit_breaker_cooldown_ms)
    }

    /// Page navigation timeout.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    /// Readiness selector timeout.
    #[must_use]
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }
}

/// Partial [`ScrapeConfiguration`]; every set field wins over the base.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
#[allow(missing_docs)]
pub struct ConfigOverrides {
    pub enabled: Option<bool>,
    pub priority: Option<Priority>,
    pub requests_per_minute: Option<u32>,
    pub requests_per_hour: Option<u32>,
    pub delay_between_requests_ms: Option<u64>,
    pub use_proxy: Option<bool>,
    pub rotate_user_agent: Option<bool>,
    pub simulate_human_behavior: Option<bool>,
    pub max_pages_per_search: Option<u32>,
    pub max_jobs_per_page: Option<u32>,
    pub extract_full_description: Option<bool>,
    pub extract_company_info: Option<bool>,
    pub extract_salary: Option<bool>,
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub circuit_breaker_threshold: Option<u32>,
    pub circuit_breaker_cooldown_ms: Option<u64>,
    pub navigation_timeout_ms: Option<u64>,
    pub element_timeout_ms: Option<u64>,
    pub respect_robots_txt: Option<bool>,
    pub anonymize_data: Option<bool>,
}

macro_rules! apply_fields {
    ($src:expr, $dst:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $src.$field.clone() {
                $dst.$field = value;
            }
        )+
    };
}

macro_rules! layer_fields {
    ($low:expr, $high:expr, $($field:ident),+ $(,)?) => {
        ConfigOverrides {
            $($field: $high.$field.clone().or_else(|| $low.$field.clone()),)+
        }
    };
}

impl ConfigOverrides {
    /// Parse a `[boards.<id>]` table from the application config.
    pub fn from_table(table: &toml::Table) -> Result<Self> {
        toml::Value::Table(table.clone())
            .try_into()
            .map_err(|e: toml::de::Error| ScrapeError::Configuration(e.to_string()))
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Combine two override sets; fields set in `higher` win.
    #[must_use]
    pub fn layered_under(&self, higher: &ConfigOverrides) -> ConfigOverrides {
        layer_fields!(
            self,
            higher,
            enabled,
            priority,
            requests_per_minute,
            requests_per_hour,
            delay_between_requests_ms,
            use_proxy,
            rotate_user_agent,
            simulate_human_behavior,
            max_pages_per_search,
            max_jobs_per_page,
            extract_full_description,
            extract_company_info,
            extract_salary,
            max_retries,
            retry_delay_ms,
            circuit_breaker_threshold,
            circuit_breaker_cooldown_ms,
            navigation_timeout_ms,
            element_timeout_ms,
            respect_robots_txt,
            anonymize_data,
        )
    }

    fn apply_to(&self, config: &mut ScrapeConfiguration) {
        apply_fields!(
            self,
            config,
            enabled,
            priority,
            requests_per_minute,
            requests_per_hour,
            delay_between_requests_ms,
            use_proxy,
            rotate_user_agent,
            simulate_human_behavior,
            max_pages_per_search,
            max_jobs_per_page,
            extract_full_description,
            extract_company_info,
            extract_salary,
            max_retries,
            retry_delay_ms,
            circuit_breaker_threshold,
            circuit_breaker_cooldown_ms,
            navigation_timeout_ms,
            element_timeout_ms,
            respect_robots_txt,
            anonymize_data,
        );
    }
}
