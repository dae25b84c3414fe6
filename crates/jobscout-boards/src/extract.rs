//! Extraction primitives shared by board parsers.

use crate::posting::{SalaryPeriod, SalaryRange};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[-.\s]?)?(?:\(\d{2,4}\)|\d{2,4})[-.\s]?\d{3,4}[-.\s]?\d{4}\b")
        .expect("valid phone regex")
});

static AMOUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(k|lpa|lakhs?|l\b|cr)?").expect("valid amount regex")
});

static RELATIVE_DATE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\+?\s*(minute|min|hour|hr|day|week|month|year)s?\s+ago")
        .expect("valid relative date regex")
});

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Collapse runs of whitespace and trim.
#[must_use]
pub fn clean_text(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text.trim(), " ").into_owned()
}

/// Text of `element`, whitespace-collapsed.
#[must_use]
pub fn element_text(element: &ElementRef) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// First selector that yields non-empty text wins.
#[must_use]
pub fn first_text(scope: &ElementRef, selectors: &[&str]) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in scope.select(&selector) {
            let text = element_text(&element);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// First selector whose element carries a non-empty `attr`.
#[must_use]
pub fn first_attr(scope: &ElementRef, selectors: &[&str], attr: &str) -> Option<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        for element in scope.select(&selector) {
            if let Some(value) = element.value().attr(attr) {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

/// Texts of every match of the first selector that yields any.
#[must_use]
pub fn all_texts(scope: &ElementRef, selectors: &[&str]) -> Vec<String> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let texts: Vec<String> = scope
            .select(&selector)
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
            .collect();
        if !texts.is_empty() {
            return texts;
        }
    }
    Vec::new()
}

/// Matches of the first selector that yields any element.
#[must_use]
pub fn select_all<'a>(scope: &ElementRef<'a>, selectors: &[&str]) -> Vec<ElementRef<'a>> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        let found: Vec<ElementRef<'a>> = scope.select(&selector).collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// First element with non-empty text across the fallback selectors.
#[must_use]
pub fn first_element<'a>(scope: &ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    for selector_str in selectors {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = scope
            .select(&selector)
            .find(|el| !element_text(el).is_empty())
        {
            return Some(element);
        }
    }
    None
}

/// Resolve `href` against the page URL.
#[must_use]
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if let Ok(url) = url::Url::parse(href) {
        return Some(url.to_string());
    }
    url::Url::parse(base)
        .and_then(|base| base.join(href))
        .ok()
        .map(|u| u.to_string())
}

/// Drop query and fragment so the same posting always has one URL.
#[must_use]
pub fn canonical_url(url: &str) -> String {
    match url::Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.to_string(),
    }
}

/// Parse advertised salary text such as `$120,000 - $150,000/yr` or
/// `₹12 - 18 LPA`.
#[must_use]
pub fn parse_salary(text: &str) -> SalaryRange {
    let cleaned = clean_text(text);
    if cleaned.is_empty() {
        return SalaryRange::default();
    }
    let lower = cleaned.to_lowercase();

    let currency = if cleaned.contains('₹') || lower.contains("inr") || lower.contains("lpa") {
        Some("INR")
    } else if cleaned.contains('€') || lower.contains("eur") {
        Some("EUR")
    } else if cleaned.contains('£') || lower.contains("gbp") {
        Some("GBP")
    } else if cleaned.contains('$') || lower.contains("usd") {
        Some("USD")
    } else {
        None
    };

    let mut period = if lower.contains("hour") || lower.contains("/hr") {
        Some(SalaryPeriod::Hourly)
    } else if lower.contains("day") {
        Some(SalaryPeriod::Daily)
    } else if lower.contains("month") || lower.contains("/mo") {
        Some(SalaryPeriod::Monthly)
    } else if lower.contains("year")
        || lower.contains("/yr")
        || lower.contains("annum")
        || lower.contains("lpa")
    {
        Some(SalaryPeriod::Yearly)
    } else {
        None
    };

    let amounts: Vec<f64> = AMOUNT_REGEX
        .captures_iter(&cleaned)
        .filter_map(|caps| {
            let value: f64 = caps[1].replace(',', "").parse().ok()?;
            let multiplier = match caps.get(2).map(|m| m.as_str().to_lowercase()) {
                Some(ref s) if s == "k" => 1_000.0,
                Some(ref s) if s.starts_with('l') => 100_000.0,
                Some(ref s) if s == "cr" => 10_000_000.0,
                _ => 1.0,
            };
            Some(value * multiplier)
        })
        .filter(|v| *v > 0.0)
        .collect();

    // "₹12 - 18 LPA": the unit trails only the upper bound
    let amounts = match (amounts.as_slice(), lower.contains("lpa") || lower.contains("lakh")) {
        ([low, high], true) if *low < 1_000.0 && *high >= 100_000.0 => vec![low * 100_000.0, *high],
        _ => amounts,
    };

    let (min, max) = match amounts.as_slice() {
        [] => (None, None),
        [only] => (Some(*only), Some(*only)),
        [low, high, ..] => (Some(low.min(*high)), Some(low.max(*high))),
    };

    if period.is_none() && min.is_some_and(|v| v >= 10_000.0) {
        period = Some(SalaryPeriod::Yearly);
    }

    SalaryRange {
        text: cleaned,
        min,
        max,
        currency: currency.map(ToString::to_string),
        period,
    }
}

/// Resolve "3 days ago", "30+ days ago", "just posted", "today" or an ISO
/// date against `now`.
#[must_use]
pub fn parse_posted_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = clean_text(text).to_lowercase();
    if lower.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(&lower, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text.trim()) {
        return Some(dt.with_timezone(&Utc));
    }

    if lower.contains("just posted")
        || lower.contains("just now")
        || lower.contains("today")
        || lower.contains("active today")
    {
        return Some(now);
    }
    if lower.contains("yesterday") {
        return now.checked_sub_signed(Duration::try_days(1)?);
    }

    let caps = RELATIVE_DATE_REGEX.captures(&lower)?;
    let amount: i64 = caps[1].parse().ok()?;
    let delta = match &caps[2] {
        "minute" | "min" => Duration::try_minutes(amount),
        "hour" | "hr" => Duration::try_hours(amount),
        "day" => Duration::try_days(amount),
        "week" => Duration::try_weeks(amount),
        "month" => amount.checked_mul(30).and_then(Duration::try_days),
        "year" => amount.checked_mul(365).and_then(Duration::try_days),
        _ => return None,
    }?;
    now.checked_sub_signed(delta)
}

/// Redact e-mail addresses and phone numbers. Returns whether anything changed.
pub fn redact_contacts(text: &mut String) -> bool {
    let redacted = {
        let emails = EMAIL_REGEX.replace_all(text, "[email redacted]");
        PHONE_REGEX
            .replace_all(&emails, "[phone redacted]")
            .into_owned()
    };
    if redacted == *text {
        return false;
    }
    *text = redacted;
    true
}

/// Bullet lists of a description, bucketed by the heading above them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Sections {
    pub requirements: Vec<String>,
    pub responsibilities: Vec<String>,
    pub benefits: Vec<String>,
}

#[derive(Clone, Copy)]
enum Section {
    Requirements,
    Responsibilities,
    Benefits,
}

const RESPONSIBILITY_HEADINGS: &[&str] = &[
    "responsibilit",
    "what you'll do",
    "what you will do",
    "duties",
    "the role",
    "your role",
];
const REQUIREMENT_HEADINGS: &[&str] = &[
    "requirement",
    "qualification",
    "skills",
    "what you'll bring",
    "what you bring",
    "must have",
    "you have",
    "experience",
];
const BENEFIT_HEADINGS: &[&str] = &["benefit", "perks", "we offer", "compensation", "why join"];

fn classify_heading(text: &str) -> Option<Section> {
    let lower = text.to_lowercase();
    if RESPONSIBILITY_HEADINGS.iter().any(|k| lower.contains(k)) {
        Some(Section::Responsibilities)
    } else if BENEFIT_HEADINGS.iter().any(|k| lower.contains(k)) {
        Some(Section::Benefits)
    } else if REQUIREMENT_HEADINGS.iter().any(|k| lower.contains(k)) {
        Some(Section::Requirements)
    } else {
        None
    }
}

/// Walk a description body and assign every `<li>` to the section named by
/// the closest preceding heading. Items before any heading count as
/// requirements.
#[must_use]
pub fn split_sections(body: &ElementRef) -> Sections {
    let mut sections = Sections::default();
    let mut current = Section::Requirements;

    for node in body.descendants() {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let in_list_item = element
            .ancestors()
            .any(|a| a.value().as_element().is_some_and(|el| el.name() == "li"));

        match element.value().name() {
            "li" => {
                let text = element_text(&element);
                if text.is_empty() {
                    continue;
                }
                match current {
                    Section::Requirements => sections.requirements.push(text),
                    Section::Responsibilities => sections.responsibilities.push(text),
                    Section::Benefits => sections.benefits.push(text),
                }
            }
            "h1" | "h2" | "h3" | "h4" | "strong" | "b" | "u" if !in_list_item => {
                if let Some(section) = classify_heading(&element_text(&element)) {
                    current = section;
                }
            }
            "p" if !in_list_item => {
                let text = element_text(&element);
                if text.ends_with(':') && text.len() < 80 {
                    if let Some(section) = classify_heading(&text) {
                        current = section;
                    }
                }
            }
            _ => {}
        }
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use scraper::Html;

    const CARD: &str = r#"
        <div class="card">
            <h3 class="title">  Senior   Rust Engineer </h3>
            <h4 class="company"></h4>
            <a class="company-link" href="/company/acme">Acme Corp</a>
            <ul class="reqs"><li>Rust</li><li>Tokio</li><li> </li></ul>
        </div>
    "#;

    #[test]
    fn test_first_text_falls_back() {
        let doc = Html::parse_fragment(CARD);
        let root = doc.root_element();
        assert_eq!(
            first_text(&root, &[".missing", "h3.title"]),
            Some("Senior Rust Engineer".to_string())
        );
        // Empty match is skipped in favour of the next selector
        assert_eq!(
            first_text(&root, &["h4.company", "a.company-link"]),
            Some("Acme Corp".to_string())
        );
        assert_eq!(first_text(&root, &[".nope"]), None);
        assert_eq!(
            first_attr(&root, &["a.company-link"], "href"),
            Some("/company/acme".to_string())
        );
        assert_eq!(all_texts(&root, &["ul.reqs li"]), vec!["Rust", "Tokio"]);
    }

    #[test]
    fn test_absolutize_and_canonical() {
        assert_eq!(
            absolutize("https://in.indeed.com/jobs?q=rust", "/viewjob?jk=abc").as_deref(),
            Some("https://in.indeed.com/viewjob?jk=abc")
        );
        assert_eq!(
            canonical_url("https://www.linkedin.com/jobs/view/123/?refId=x&trk=y"),
            "https://www.linkedin.com/jobs/view/123/"
        );
    }

    #[test]
    fn test_parse_salary_usd_range() {
        let salary = parse_salary("$120,000 - $150,000/yr");
        assert_eq!(salary.min, Some(120_000.0));
        assert_eq!(salary.max, Some(150_000.0));
        assert_eq!(salary.currency.as_deref(), Some("USD"));
        assert_eq!(salary.period, Some(SalaryPeriod::Yearly));
    }

    #[test]
    fn test_parse_salary_lpa() {
        let salary = parse_salary("₹12 - 18 LPA");
        assert_eq!(salary.min, Some(1_200_000.0));
        assert_eq!(salary.max, Some(1_800_000.0));
        assert_eq!(salary.currency.as_deref(), Some("INR"));
        assert_eq!(salary.period, Some(SalaryPeriod::Yearly));
    }

    #[test]
    fn test_parse_salary_hourly_and_k() {
        let hourly = parse_salary("$45 an hour");
        assert_eq!(hourly.min, Some(45.0));
        assert_eq!(hourly.period, Some(SalaryPeriod::Hourly));

        let k = parse_salary("£60k-£70k");
        assert_eq!(k.min, Some(60_000.0));
        assert_eq!(k.max, Some(70_000.0));
        assert_eq!(k.currency.as_deref(), Some("GBP"));
    }

    #[test]
    fn test_parse_salary_empty() {
        assert!(parse_salary("   ").is_unspecified());
    }

    #[test]
    fn test_parse_posted_date() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(
            parse_posted_date("3 days ago", now),
            Some(now - Duration::days(3))
        );
        assert_eq!(
            parse_posted_date("30+ days ago", now),
            Some(now - Duration::days(30))
        );
        assert_eq!(
            parse_posted_date("Posted 2 weeks ago", now),
            Some(now - Duration::weeks(2))
        );
        assert_eq!(parse_posted_date("Just posted", now), Some(now));
        assert_eq!(
            parse_posted_date("2026-03-01", now),
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_posted_date("sometime", now), None);
    }

    #[test]
    fn test_parse_posted_date_out_of_range() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        assert_eq!(parse_posted_date("99999999 years ago", now), None);
        assert_eq!(parse_posted_date("9223372036854775807 months ago", now), None);
        assert_eq!(parse_posted_date("9223372036854775807 minutes ago", now), None);
    }

    #[test]
    fn test_split_sections() {
        let doc = Html::parse_fragment(
            r"<div class='desc'>
                <ul><li>Ship fast</li></ul>
                <p><strong>Responsibilities</strong></p>
                <ul><li>Own the <strong>crawler</strong></li><li>Review code</li></ul>
                <p>What we offer:</p>
                <ul><li>Remote work</li></ul>
                <h3>Qualifications</h3>
                <ul><li>3+ years of Rust</li></ul>
            </div>",
        );
        let root = doc.root_element();
        let sections = split_sections(&root);
        assert_eq!(sections.requirements, vec!["Ship fast", "3+ years of Rust"]);
        assert_eq!(
            sections.responsibilities,
            vec!["Own the crawler", "Review code"]
        );
        assert_eq!(sections.benefits, vec!["Remote work"]);
    }

    #[test]
    fn test_redact_contacts() {
        let mut text = "Send CVs to hiring@acme.example or call +1 415-555-0134.".to_string();
        assert!(redact_contacts(&mut text));
        assert!(!text.contains("hiring@acme.example"));
        assert!(text.contains("[email redacted]"));
        assert!(text.contains("[phone redacted]"));

        let mut clean = "No contact details here".to_string();
        assert!(!redact_contacts(&mut clean));
    }
}
