//! Normalized job posting record.

use chrono::{DateTime, Utc};
use jobscout_core::BoardId;
use serde::{Deserialize, Serialize};

/// Neutral default for title, company and location.
pub const UNKNOWN: &str = "Unknown";

/// Neutral default for salary text.
pub const NOT_SPECIFIED: &str = "Not specified";

/// Contract type of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Temporary,
    Internship,
    Volunteer,
    Other,
}

impl EmploymentType {
    /// Every variant, in display order.
    pub const ALL: [Self; 7] = [
        Self::FullTime,
        Self::PartTime,
        Self::Contract,
        Self::Temporary,
        Self::Internship,
        Self::Volunteer,
        Self::Other,
    ];

    /// Infer from free text such as "Full-time" or "Contract · Remote".
    #[must_use]
    pub fn infer(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let table = [
            ("full-time", Self::FullTime),
            ("full time", Self::FullTime),
            ("permanent", Self::FullTime),
            ("part-time", Self::PartTime),
            ("part time", Self::PartTime),
            ("contract", Self::Contract),
            ("freelance", Self::Contract),
            ("temporary", Self::Temporary),
            ("internship", Self::Internship),
            ("intern", Self::Internship),
            ("volunteer", Self::Volunteer),
        ];
        table
            .iter()
            .find(|(needle, _)| contains_word(&text, needle))
            .map(|(_, kind)| *kind)
    }
}

/// Seniority of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[allow(missing_docs)]
pub enum SeniorityLevel {
    Internship,
    Entry,
    Associate,
    MidSenior,
    Director,
    Executive,
}

impl SeniorityLevel {
    /// Infer from free text such as "Mid-Senior level" or "Entry level".
    #[must_use]
    pub fn infer(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let table = [
            ("executive", Self::Executive),
            ("director", Self::Director),
            ("internship", Self::Internship),
            ("intern", Self::Internship),
            ("entry", Self::Entry),
            ("junior", Self::Entry),
            ("associate", Self::Associate),
            ("mid-senior", Self::MidSenior),
            ("senior", Self::MidSenior),
        ];
        table
            .iter()
            .find(|(needle, _)| contains_word(&text, needle))
            .map(|(_, level)| *level)
    }
}

/// Whether `needle` occurs in `text` as a whole word.
fn contains_word(text: &str, needle: &str) -> bool {
    text.match_indices(needle).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Pay period of a salary range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum SalaryPeriod {
    Hourly,
    Daily,
    Monthly,
    Yearly,
}

/// Salary as advertised plus whatever could be parsed out of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct SalaryRange {
    /// Raw text, or [`NOT_SPECIFIED`]
    pub text: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// ISO 4217 code
    pub currency: Option<String>,
    pub period: Option<SalaryPeriod>,
}

impl Default for SalaryRange {
    fn default() -> Self {
        Self {
            text: NOT_SPECIFIED.to_string(),
            min: None,
            max: None,
            currency: None,
            period: None,
        }
    }
}

impl SalaryRange {
    /// True when the board advertised no salary.
    #[must_use]
    pub fn is_unspecified(&self) -> bool {
        self.text == NOT_SPECIFIED && self.min.is_none() && self.max.is_none()
    }
}

/// Company metadata from detail pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct CompanyInfo {
    pub size: Option<String>,
    pub industry: Option<String>,
    pub website: Option<String>,
    pub logo_url: Option<String>,
}

/// Five-level completeness label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[allow(missing_docs)]
pub enum QualityLabel {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl QualityLabel {
    /// Map a 0-100 score to a label.
    #[must_use]
    pub fn from_score(score: u8) -> Self {
        match score {
            95.. => Self::Excellent,
            80..=94 => Self::Good,
            60..=79 => Self::Fair,
            _ => Self::Poor,
        }
    }
}

/// Completeness score of a posting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    /// 0-100
    pub score: u8,
    /// Label derived from `score`
    pub label: QualityLabel,
}

impl DataQuality {
    /// Score a posting from field presence alone.
    ///
    /// Fields holding their neutral default count as absent.
    #[must_use]
    pub fn assess(posting: &ScrapedPosting) -> Self {
        let present = |value: &str| {
            let value = value.trim();
            !value.is_empty() && value != UNKNOWN && value != NOT_SPECIFIED
        };

        let mut score = 0u8;
        if present(&posting.title) {
            score += 20;
        }
        if present(&posting.company) {
            score += 20;
        }
        if present(&posting.location) {
            score += 15;
        }
        if present(&posting.description) {
            score += 20;
        }
        if !posting.requirements.is_empty() {
            score += 15;
        }
        if !posting.benefits.is_empty() {
            score += 10;
        }

        Self {
            score,
            label: QualityLabel::from_score(score),
        }
    }
}

/// One normalized job listing.
///
/// `(source, external_id)` identifies a posting across scrapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct ScrapedPosting {
    pub source: BoardId,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub employment_type: Option<EmploymentType>,
    pub seniority_level: Option<SeniorityLevel>,
    pub salary: SalaryRange,
    pub description: String,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub responsibilities: Vec<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub company_info: CompanyInfo,
    pub data_quality: DataQuality,
    pub scraped_at: DateTime<Utc>,
    pub scraper_version: String,
    pub anonymized: bool,
    pub encrypted: bool,
}

impl ScrapedPosting {
    /// A posting with every field at its neutral default.
    #[must_use]
    pub fn new(source: BoardId, external_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source,
            external_id: external_id.into(),
            url: url.into(),
            title: UNKNOWN.to_string(),
            company: UNKNOWN.to_string(),
            location: UNKNOWN.to_string(),
            employment_type: None,
            seniority_level: None,
            salary: SalaryRange::default(),
            description: String::new(),
            requirements: Vec::new(),
            benefits: Vec::new(),
            responsibilities: Vec::new(),
            posted_at: None,
            deadline: None,
            company_info: CompanyInfo::default(),
            data_quality: DataQuality::default(),
            scraped_at: Utc::now(),
            scraper_version: String::new(),
            anonymized: false,
            encrypted: false,
        }
    }

    /// Natural dedup key.
    #[must_use]
    pub fn dedup_key(&self) -> (&str, &str) {
        (self.source.as_str(), &self.external_id)
    }

    /// Recompute [`Self::data_quality`].
    pub fn assess_quality(&mut self) {
        self.data_quality = DataQuality::assess(self);
    }

    /// Fill fields from a detail-page parse; detail values win unless neutral.
    pub fn merge_detail(&mut self, detail: ScrapedPosting) {
        fn take(dst: &mut String, src: String) {
            let src_trimmed = src.trim();
            if !src_trimmed.is_empty() && src_trimmed != UNKNOWN {
                *dst = src;
            }
        }

        take(&mut self.title, detail.title);
        take(&mut self.company, detail.company);
        take(&mut self.location, detail.location);
        if !detail.description.trim().is_empty() {
            self.description = detail.description;
        }
        if detail.employment_type.is_some() {
            self.employment_type = detail.employment_type;
        }
        if detail.seniority_level.is_some() {
            self.seniority_level = detail.seniority_level;
        }
        if !detail.salary.is_unspecified() {
            self.salary = detail.salary;
        }
        if !detail.requirements.is_empty() {
            self.requirements = detail.requirements;
        }
        if !detail.benefits.is_empty() {
            self.benefits = detail.benefits;
        }
        if !detail.responsibilities.is_empty() {
            self.responsibilities = detail.responsibilities;
        }
        self.posted_at = self.posted_at.or(detail.posted_at);
        self.deadline = self.deadline.or(detail.deadline);
        if detail.company_info != CompanyInfo::default() {
            self.company_info = detail.company_info;
        }
    }
}
