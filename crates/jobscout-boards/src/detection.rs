//! Heuristic detection of CAPTCHA, blocking and throttling pages.
//!
//! Detection scans the rendered page's visible text for a fixed lexicon and
//! the DOM for known CAPTCHA widgets. False negatives are expected and pages
//! that merely mention a lexicon word will be flagged; the [`DetectionReport`]
//! carries a confidence value so callers can tell a widget hit from a stray
//! keyword, but any hit counts as blocked.

use crate::error::ScrapeError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Node, Selector};
use std::time::Duration;

/// Blocking and verification phrases, matched case-insensitively.
const BLOCK_LEXICON: &[&str] = &[
    "captcha",
    "verify you are human",
    "verify you're human",
    "are you a robot",
    "i'm not a robot",
    "unusual traffic",
    "unusual activity",
    "access denied",
    "security check",
    "checking your browser",
    "press and hold",
    "you have been blocked",
    "request blocked",
    "bot detection",
];

/// Known CAPTCHA and challenge widgets.
const CAPTCHA_SELECTORS: &[&str] = &[
    "iframe[src*='recaptcha']",
    "iframe[src*='hcaptcha']",
    "iframe[src*='challenges.cloudflare.com']",
    ".g-recaptcha",
    ".h-captcha",
    ".cf-turnstile",
    "#captcha",
    "#px-captcha",
    "#challenge-form",
    "#cf-challenge-running",
    "form[action*='captcha']",
];

/// URL fragments of login walls and challenge redirects.
const BLOCK_REDIRECTS: &[&str] = &["/authwall", "/checkpoint/", "/uas/login", "/sorry/", "captcha"];

const THROTTLE_LEXICON: &[&str] = &[
    "too many requests",
    "rate limit exceeded",
    "you are being rate limited",
    "you have been rate limited",
    "slow down",
    "error 429",
    "http 429",
];

/// Longest retry hint taken from a page.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(24 * 60 * 60);

static RETRY_TEXT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:try again|retry)\s+(?:in|after)\s+(\d+)\s*(seconds?|secs?|s\b|minutes?|mins?|hours?|hrs?)",
    )
    .expect("valid retry-after regex")
});

static RETRY_META_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+http-equiv=["']?retry-after["']?[^>]*content=["']?(\d+)"#)
        .expect("valid retry-after meta regex")
});

/// What tripped the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indicator {
    /// Lexicon phrase found in visible text
    Keyword(&'static str),
    /// CAPTCHA widget selector matched
    Selector(&'static str),
    /// The page landed on a login wall or challenge URL
    Redirect(String),
}

impl std::fmt::Display for Indicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keyword(k) => write!(f, "keyword '{k}'"),
            Self::Selector(s) => write!(f, "selector {s}"),
            Self::Redirect(url) => write!(f, "redirect to {url}"),
        }
    }
}

/// Outcome of a countermeasure scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionReport {
    /// Every hit, in scan order
    pub indicators: Vec<Indicator>,
}

impl DetectionReport {
    /// Scan a rendered page. `final_url` is the URL after redirects.
    #[must_use]
    pub fn scan(html: &str, final_url: Option<&str>) -> Self {
        let document = Html::parse_document(html);
        let text = visible_text(&document).to_lowercase();
        let mut indicators = Vec::new();

        for &selector_str in CAPTCHA_SELECTORS {
            if let Ok(selector) = Selector::parse(selector_str) {
                if document.select(&selector).next().is_some() {
                    indicators.push(Indicator::Selector(selector_str));
                }
            }
        }

        for &phrase in BLOCK_LEXICON {
            if text.contains(phrase) {
                indicators.push(Indicator::Keyword(phrase));
            }
        }

        if let Some(url) = final_url {
            let lower = url.to_lowercase();
            if BLOCK_REDIRECTS.iter().any(|fragment| lower.contains(fragment)) {
                indicators.push(Indicator::Redirect(url.to_string()));
            }
        }

        Self { indicators }
    }

    /// Any hit at all.
    #[must_use]
    pub fn is_blocked(&self) -> bool {
        !self.indicators.is_empty()
    }

    /// Heuristic confidence in `0.0..=1.0`; widgets weigh more than keywords.
    #[must_use]
    pub fn confidence(&self) -> f32 {
        let total: f32 = self
            .indicators
            .iter()
            .map(|indicator| match indicator {
                Indicator::Selector(_) => 0.6,
                Indicator::Redirect(_) => 0.5,
                Indicator::Keyword(_) => 0.25,
            })
            .sum();
        total.min(1.0)
    }

    /// Convert a blocked report into the error raised by scrapers.
    #[must_use]
    pub fn into_error(self, board: &str) -> ScrapeError {
        let confidence = self.confidence();
        ScrapeError::AntiBot {
            board: board.to_string(),
            indicators: self.indicators.iter().map(ToString::to_string).collect(),
            confidence,
        }
    }
}

/// A throttling page and the wait it asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrottleSignal {
    /// Phrase that matched
    pub indicator: &'static str,
    /// Parsed retry-after hint
    pub retry_after: Option<Duration>,
}

/// Look for throttling indicators and any retry-after hint.
#[must_use]
pub fn detect_throttling(html: &str) -> Option<ThrottleSignal> {
    let document = Html::parse_document(html);
    let text = visible_text(&document).to_lowercase();

    let indicator = THROTTLE_LEXICON
        .iter()
        .find(|phrase| text.contains(*phrase))
        .copied()?;

    let retry_after = RETRY_META_REGEX
        .captures(html)
        .and_then(|caps| caps[1].parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| parse_retry_text(&text))
        .map(|hint| hint.min(MAX_RETRY_AFTER));

    Some(ThrottleSignal {
        indicator,
        retry_after,
    })
}

fn parse_retry_text(text: &str) -> Option<Duration> {
    let caps = RETRY_TEXT_REGEX.captures(text)?;
    let amount: u64 = caps[1].parse().ok()?;
    let unit = caps[2].to_lowercase();
    let secs = if unit.starts_with('h') {
        amount.checked_mul(3600)
    } else if unit.starts_with('m') {
        amount.checked_mul(60)
    } else {
        Some(amount)
    };
    Some(secs.map_or(MAX_RETRY_AFTER, Duration::from_secs))
}

/// Text a user would see: every text node outside script, style and template.
#[must_use]
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor.value().as_element().is_some_and(|el| {
                matches!(el.name(), "script" | "style" | "noscript" | "template" | "head")
            })
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    out
}
