//! Search request parameters.

use crate::error::{Result, ScrapeError};
use crate::posting::{EmploymentType, SeniorityLevel};
use serde::{Deserialize, Serialize};

/// Largest accepted result offset. Boards stop serving results long before it.
pub const MAX_START_OFFSET: u32 = 10_000;

/// How recently a posting must have been published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostedWithin {
    /// Last 24 hours
    Past24Hours,
    /// Last 7 days
    PastWeek,
    /// Last 30 days
    PastMonth,
    /// No restriction
    #[default]
    AnyTime,
}

/// Board-independent search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
#[allow(missing_docs)]
pub struct SearchParams {
    /// Keywords
    pub query: String,
    /// Free-text location
    pub location: Option<String>,
    /// Search radius around `location`, in kilometres
    pub radius_km: Option<u32>,
    pub employment_types: Vec<EmploymentType>,
    pub seniority_levels: Vec<SeniorityLevel>,
    /// Minimum yearly salary
    pub salary_min: Option<u64>,
    /// Maximum yearly salary
    pub salary_max: Option<u64>,
    pub remote_only: bool,
    pub easy_apply: bool,
    pub posted_within: PostedWithin,
    /// Result offset of the first page
    pub start: u32,
}

impl SearchParams {
    /// Keyword search with no other filters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    /// Restrict to a location.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Reject searches that cannot be expressed on any board.
    pub fn validate(&self) -> Result<()> {
        let has_location = self
            .location
            .as_deref()
            .is_some_and(|l| !l.trim().is_empty());
        if self.query.trim().is_empty() && !has_location {
            return Err(ScrapeError::Configuration(
                "search needs a query or a location".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.salary_min, self.salary_max) {
            if min > max {
                return Err(ScrapeError::Configuration(format!(
                    "salary_min {min} exceeds salary_max {max}"
                )));
            }
        }
        if self.start > MAX_START_OFFSET {
            return Err(ScrapeError::Configuration(format!(
                "start offset {} exceeds {MAX_START_OFFSET}",
                self.start
            )));
        }
        Ok(())
    }
}
