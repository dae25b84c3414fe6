//! Shared types used across the JobScout workspace.
//!
//! This module defines common newtypes that provide type safety
//! and clear domain modeling.

use crate::error::JobscoutError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for job board identifiers with validation.
///
/// Board IDs must be lowercase alphanumeric with hyphens, 3-50 characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardId(String);

impl BoardId {
    /// Create a new `BoardId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, JobscoutError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate board ID format: lowercase alphanumeric with hyphens, 3-50 chars.
    fn validate(id: &str) -> Result<(), JobscoutError> {
        static BOARD_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = BOARD_REGEX
            .get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9-]{1,48}[a-z0-9]$").expect("valid regex"));

        if id.len() < 3 || id.len() > 50 {
            return Err(JobscoutError::Validation(format!(
                "invalid board ID: must be 3-50 characters, got {} characters",
                id.len()
            )));
        }

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(JobscoutError::Validation(format!(
                "invalid board ID: must be lowercase alphanumeric with hyphens, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BoardId {
    type Err = JobscoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for BoardId {
    type Error = JobscoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BoardId> for String {
    fn from(id: BoardId) -> Self {
        id.0
    }
}

/// Identifier of one orchestrated scrape job.
///
/// Job IDs are random UUID v4 values, unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Allocate a fresh random job ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing identifier, e.g. one received from the API layer.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID.
    pub fn parse(id: &str) -> Result<Self, JobscoutError> {
        uuid::Uuid::parse_str(id)
            .map(|uuid| Self(uuid.to_string()))
            .map_err(|e| JobscoutError::Validation(format!("invalid job ID '{id}': {e}")))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_id_valid() {
        let valid_ids = vec!["linkedin", "indeed", "naukri-com", "abc"];

        for id in valid_ids {
            assert!(BoardId::new(id).is_ok(), "Failed for: {id}");
        }
    }

    #[test]
    fn test_board_id_invalid() {
        let too_long = "a".repeat(51);
        let invalid_ids = vec![
            "ab",              // Too short
            "LinkedIn",        // Uppercase
            "linked_in",       // Underscore
            "linked in",       // Space
            "-indeed",         // Starts with hyphen
            "indeed-",         // Ends with hyphen
            too_long.as_str(), // Too long
        ];

        for id in invalid_ids {
            assert!(BoardId::new(id).is_err(), "Should fail for: {id}");
        }
    }

    #[test]
    fn test_board_id_deserialize_validates() {
        let ok: BoardId = serde_json::from_str("\"linkedin\"").expect("deserialize board ID");
        assert_eq!(ok.as_str(), "linkedin");

        let bad: Result<BoardId, _> = serde_json::from_str("\"Not Valid\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_job_id_generate_unique() {
        let id1 = JobId::generate();
        let id2 = JobId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_job_id_parse() {
        let id = JobId::generate();
        let parsed = JobId::parse(id.as_str()).expect("parse generated job ID");
        assert_eq!(parsed, id);

        assert!(JobId::parse("not-a-uuid").is_err());
    }
}
