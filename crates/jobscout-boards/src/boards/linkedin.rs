//! LinkedIn public job search.

use super::builtin_id;
use crate::contract::{JobBoard, ListingPage, ParseContext};
use crate::definition::{Priority, ScrapeConfiguration};
use crate::error::{ErrorKind, Result};
use crate::extract::{
    absolutize, canonical_url, element_text, first_attr, first_element, first_text,
    parse_posted_date, parse_salary, select_all, split_sections,
};
use crate::posting::{EmploymentType, ScrapedPosting, SeniorityLevel, UNKNOWN};
use crate::result::ScrapeIssue;
use crate::search::{PostedWithin, SearchParams};
use jobscout_core::BoardId;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

const SEARCH_BASE: &str = "https://www.linkedin.com/jobs/search/";
const PAGE_SIZE: u32 = 25;

const CARD_SELECTORS: &[&str] = &[
    "ul.jobs-search__results-list > li",
    "div.base-card",
    "li.jobs-search-results__list-item",
];
const CARD_TITLE: &[&str] = &[
    "h3.base-search-card__title",
    ".job-card-list__title",
    "[class*='title']",
];
const CARD_COMPANY: &[&str] = &[
    "h4.base-search-card__subtitle",
    ".job-card-container__company-name",
    "[class*='company']",
];
const CARD_LOCATION: &[&str] = &[
    ".job-search-card__location",
    ".job-card-container__metadata-item",
    "[class*='location']",
];
const CARD_LINK: &[&str] = &[
    "a.base-card__full-link",
    "a.job-card-list__title",
    "a[href*='/jobs/view/']",
];
const CARD_SALARY: &[&str] = &[".job-search-card__salary-info", "[class*='salary']"];

const DETAIL_TITLE: &[&str] = &[
    "h1.top-card-layout__title",
    "h2.top-card-layout__title",
    ".job-details-jobs-unified-top-card__job-title",
    "h1[data-test-id='job-title']",
    ".jobs-unified-top-card__job-title",
    "h1",
];
const DETAIL_COMPANY: &[&str] = &[
    "a.topcard__org-name-link",
    ".job-details-jobs-unified-top-card__company-name",
    ".top-card-layout__card .top-card-layout__second-subline a",
    "a[data-test-id='job-poster-name']",
    ".jobs-unified-top-card__company-name",
];
const DETAIL_LOCATION: &[&str] = &[
    ".topcard__flavor--bullet",
    ".job-details-jobs-unified-top-card__bullet",
    "[data-test-id='job-location']",
    ".jobs-unified-top-card__bullet",
];
const DETAIL_DESCRIPTION: &[&str] = &[
    ".show-more-less-html__markup",
    ".jobs-box__html-content",
    ".jobs-description__container",
    ".jobs-description-content__text",
    "[data-test-id='job-description']",
];
const DETAIL_SALARY: &[&str] = &[".salary.compensation__salary", ".compensation__salary"];
const DETAIL_POSTED: &[&str] = &["span.posted-time-ago__text", ".posted-time-ago__text"];
const DETAIL_LOGO: &[&str] = &["img.artdeco-entity-image", ".top-card-layout__entity-image"];

static JOB_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:/jobs/view/(?:[^/?#]*-)?|currentJobId=)(\d+)").expect("valid job id regex")
});

/// LinkedIn guest job search (`/jobs/search`) and job view pages.
#[derive(Debug, Clone)]
pub struct LinkedInBoard {
    id: BoardId,
}

impl LinkedInBoard {
    /// Board registered as `linkedin`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            id: builtin_id("linkedin")?,
        })
    }

    fn job_url(job_id: &str) -> String {
        format!("https://www.linkedin.com/jobs/view/{job_id}/")
    }

    fn parse_card(
        &self,
        card: &ElementRef,
        page_url: &str,
        ctx: &ParseContext<'_>,
    ) -> std::result::Result<ScrapedPosting, String> {
        let title = first_text(card, CARD_TITLE).ok_or("listing card without title")?;
        let href = first_attr(card, CARD_LINK, "href").and_then(|h| absolutize(page_url, &h));
        let job_id = urn_job_id(card)
            .or_else(|| href.as_deref().and_then(job_id_from_url))
            .ok_or_else(|| format!("listing card '{title}' without job id"))?;

        let mut posting = ScrapedPosting::new(self.id.clone(), &job_id, Self::job_url(&job_id));
        posting.title = title;
        posting.company = first_text(card, CARD_COMPANY).unwrap_or_else(|| UNKNOWN.to_string());
        posting.location = first_text(card, CARD_LOCATION).unwrap_or_else(|| UNKNOWN.to_string());
        if ctx.config.extract_salary {
            if let Some(text) = first_text(card, CARD_SALARY) {
                posting.salary = parse_salary(&text);
            }
        }
        posting.posted_at = first_attr(card, &["time"], "datetime")
            .and_then(|dt| parse_posted_date(&dt, ctx.scraped_at))
            .or_else(|| {
                first_text(card, &["time"]).and_then(|t| parse_posted_date(&t, ctx.scraped_at))
            });
        posting.scraped_at = ctx.scraped_at;
        Ok(posting)
    }
}

fn urn_job_id(card: &ElementRef) -> Option<String> {
    let urn = card
        .value()
        .attr("data-entity-urn")
        .map(ToString::to_string)
        .or_else(|| first_attr(card, &["[data-entity-urn]"], "data-entity-urn"))?;
    let id = urn.rsplit(':').next()?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| id.to_string())
}

fn job_id_from_url(url: &str) -> Option<String> {
    JOB_ID_REGEX
        .captures(url)
        .map(|caps| caps[1].to_string())
}

fn employment_code(kind: EmploymentType) -> &'static str {
    match kind {
        EmploymentType::FullTime => "F",
        EmploymentType::PartTime => "P",
        EmploymentType::Contract => "C",
        EmploymentType::Temporary => "T",
        EmploymentType::Internship => "I",
        EmploymentType::Volunteer => "V",
        EmploymentType::Other => "O",
    }
}

fn seniority_code(level: SeniorityLevel) -> &'static str {
    match level {
        SeniorityLevel::Internship => "1",
        SeniorityLevel::Entry => "2",
        SeniorityLevel::Associate => "3",
        SeniorityLevel::MidSenior => "4",
        SeniorityLevel::Director => "5",
        SeniorityLevel::Executive => "6",
    }
}

fn posted_code(window: PostedWithin) -> Option<&'static str> {
    match window {
        PostedWithin::Past24Hours => Some("r86400"),
        PostedWithin::PastWeek => Some("r604800"),
        PostedWithin::PastMonth => Some("r2592000"),
        PostedWithin::AnyTime => None,
    }
}

/// `f_SB2` buckets start at 40k and step by 20k up to 200k+.
fn salary_bucket(min: u64) -> Option<u64> {
    (min >= 40_000).then(|| ((min - 20_000) / 20_000).clamp(1, 9))
}

fn join_codes<T: Copy>(items: &[T], code: fn(T) -> &'static str) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let mut codes: Vec<&str> = items.iter().map(|item| code(*item)).collect();
    codes.dedup();
    Some(codes.join(","))
}

impl JobBoard for LinkedInBoard {
    fn board_id(&self) -> &BoardId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "LinkedIn"
    }

    fn default_config(&self) -> ScrapeConfiguration {
        ScrapeConfiguration {
            priority: Priority::High,
            requests_per_minute: 6,
            requests_per_hour: 120,
            delay_between_requests_ms: 5_000,
            max_pages_per_search: 5,
            max_jobs_per_page: PAGE_SIZE,
            ..ScrapeConfiguration::default()
        }
    }

    fn build_search_url(
        &self,
        params: &SearchParams,
        page_index: u32,
        _config: &ScrapeConfiguration,
    ) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        let keywords = params.query.trim();
        if !keywords.is_empty() {
            query.append_pair("keywords", keywords);
        }
        if let Some(location) = params
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            query.append_pair("location", location);
        }
        if let Some(km) = params.radius_km {
            let miles = (f64::from(km) * 0.621_371).round() as u32;
            query.append_pair("distance", &miles.max(1).to_string());
        }
        if let Some(codes) = join_codes(&params.employment_types, employment_code) {
            query.append_pair("f_JT", &codes);
        }
        if let Some(codes) = join_codes(&params.seniority_levels, seniority_code) {
            query.append_pair("f_E", &codes);
        }
        if let Some(bucket) = params.salary_min.and_then(salary_bucket) {
            query.append_pair("f_SB2", &bucket.to_string());
        }
        if let Some(code) = posted_code(params.posted_within) {
            query.append_pair("f_TPR", code);
        }
        if params.remote_only {
            query.append_pair("f_WT", "2");
        }
        if params.easy_apply {
            query.append_pair("f_AL", "true");
        }
        let start = params.start.saturating_add(page_index.saturating_mul(PAGE_SIZE));
        if start > 0 {
            query.append_pair("start", &start.to_string());
        }
        format!("{SEARCH_BASE}?{}", query.finish())
    }

    fn parse_job_listings(
        &self,
        html: &str,
        page_url: &str,
        ctx: &ParseContext<'_>,
    ) -> ListingPage {
        let document = Html::parse_document(html);
        let root = document.root_element();
        let mut page = ListingPage::default();

        for card in select_all(&root, CARD_SELECTORS) {
            match self.parse_card(&card, page_url, ctx) {
                Ok(posting) => page.postings.push(posting),
                Err(message) => page.failures.push(ScrapeIssue::new(
                    ErrorKind::Extraction,
                    message,
                    Some(page_url),
                )),
            }
        }
        page
    }

    fn parse_job_page(
        &self,
        html: &str,
        url: &str,
        ctx: &ParseContext<'_>,
    ) -> Option<ScrapedPosting> {
        let document = Html::parse_document(html);
        let root = document.root_element();

        let title = first_text(&root, DETAIL_TITLE)?;
        let company = first_text(&root, DETAIL_COMPANY)?;
        let (external_id, canonical) = match job_id_from_url(url) {
            Some(id) => {
                let canonical = Self::job_url(&id);
                (id, canonical)
            }
            None => {
                let canonical = canonical_url(url);
                (canonical.clone(), canonical)
            }
        };

        let mut posting = ScrapedPosting::new(self.id.clone(), external_id, canonical);
        posting.title = title;
        posting.company = company;
        posting.location =
            first_text(&root, DETAIL_LOCATION).unwrap_or_else(|| UNKNOWN.to_string());
        posting.scraped_at = ctx.scraped_at;

        if let Some(body) = first_element(&root, DETAIL_DESCRIPTION) {
            posting.description = element_text(&body);
            let sections = split_sections(&body);
            posting.requirements = sections.requirements;
            posting.responsibilities = sections.responsibilities;
            posting.benefits = sections.benefits;
        }

        for item in select_all(&root, &["li.description__job-criteria-item"]) {
            let (Some(header), Some(value)) = (
                first_text(&item, &["h3", ".description__job-criteria-subheader"]),
                first_text(&item, &["span", ".description__job-criteria-text"]),
            ) else {
                continue;
            };
            let header = header.to_lowercase();
            if header.contains("seniority") {
                posting.seniority_level = SeniorityLevel::infer(&value);
            } else if header.contains("employment") {
                posting.employment_type = EmploymentType::infer(&value);
            } else if header.contains("industr") && ctx.config.extract_company_info {
                posting.company_info.industry = Some(value);
            }
        }

        if ctx.config.extract_salary {
            if let Some(text) = first_text(&root, DETAIL_SALARY) {
                posting.salary = parse_salary(&text);
            }
        }
        posting.posted_at =
            first_text(&root, DETAIL_POSTED).and_then(|t| parse_posted_date(&t, ctx.scraped_at));

        if ctx.config.extract_company_info {
            posting.company_info.logo_url = first_attr(&root, DETAIL_LOGO, "data-delayed-url")
                .or_else(|| first_attr(&root, DETAIL_LOGO, "src"));
        }
        Some(posting)
    }

    fn listing_ready_selector(&self) -> Option<&str> {
        Some("ul.jobs-search__results-list")
    }

    fn detail_ready_selector(&self) -> Option<&str> {
        Some(".top-card-layout__title")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::SalaryPeriod;
    use chrono::{Duration, TimeZone, Utc};

    const LISTING: &str = r##"
    <html><body>
    <ul class="jobs-search__results-list">
      <li>
        <div class="base-card job-search-card" data-entity-urn="urn:li:jobPosting:3812345678">
          <a class="base-card__full-link" href="https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-3812345678?refId=abc&trackingId=xyz"></a>
          <div class="base-search-card__info">
            <h3 class="base-search-card__title">Senior Rust Engineer</h3>
            <h4 class="base-search-card__subtitle"><a href="#">Acme Corp</a></h4>
            <div class="base-search-card__metadata">
              <span class="job-search-card__location">Bengaluru, Karnataka, India</span>
              <span class="job-search-card__salary-info">₹30,00,000 - ₹45,00,000/yr</span>
              <time class="job-search-card__listdate" datetime="2026-03-10">5 days ago</time>
            </div>
          </div>
        </div>
      </li>
      <li>
        <div class="base-card">
          <a class="base-card__full-link" href="/jobs/view/backend-developer-3899990000"></a>
          <h3 class="base-search-card__title">Backend Developer</h3>
          <time>2 weeks ago</time>
        </div>
      </li>
      <li>
        <div class="base-card">
          <h3 class="base-search-card__title">Mystery Role</h3>
        </div>
      </li>
    </ul>
    </body></html>
    "##;

    const DETAIL: &str = r#"
    <html><body>
      <section class="top-card-layout">
        <h1 class="top-card-layout__title">Senior Rust Engineer</h1>
        <a class="topcard__org-name-link" href="https://www.linkedin.com/company/acme">Acme Corp</a>
        <span class="topcard__flavor topcard__flavor--bullet">Bengaluru, Karnataka, India</span>
        <span class="posted-time-ago__text">3 days ago</span>
        <img class="artdeco-entity-image" data-delayed-url="https://media.licdn.com/acme.png">
      </section>
      <div class="show-more-less-html__markup">
        <p>Acme builds crawlers.</p>
        <p><strong>Responsibilities</strong></p>
        <ul><li>Design scraping pipelines</li></ul>
        <p><strong>Requirements</strong></p>
        <ul><li>5+ years of Rust</li><li>Tokio</li></ul>
        <p><strong>Benefits</strong></p>
        <ul><li>Health insurance</li></ul>
      </div>
      <ul class="description__job-criteria-list">
        <li class="description__job-criteria-item">
          <h3 class="description__job-criteria-subheader">Seniority level</h3>
          <span class="description__job-criteria-text">Mid-Senior level</span>
        </li>
        <li class="description__job-criteria-item">
          <h3 class="description__job-criteria-subheader">Employment type</h3>
          <span class="description__job-criteria-text">Full-time</span>
        </li>
        <li class="description__job-criteria-item">
          <h3 class="description__job-criteria-subheader">Industries</h3>
          <span class="description__job-criteria-text">Software Development</span>
        </li>
      </ul>
    </body></html>
    "#;

    fn board() -> LinkedInBoard {
        LinkedInBoard::new().unwrap()
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_search_url_maps_filters_in_order() {
        let params = SearchParams {
            query: "rust developer".to_string(),
            location: Some("Bengaluru".to_string()),
            radius_km: Some(40),
            employment_types: vec![EmploymentType::FullTime, EmploymentType::Contract],
            seniority_levels: vec![SeniorityLevel::MidSenior],
            salary_min: Some(100_000),
            posted_within: PostedWithin::PastWeek,
            remote_only: true,
            easy_apply: true,
            ..SearchParams::default()
        };
        let url = board().build_search_url(&params, 1, &ScrapeConfiguration::default());
        assert_eq!(
            url,
            "https://www.linkedin.com/jobs/search/?keywords=rust+developer&location=Bengaluru\
             &distance=25&f_JT=F%2CC&f_E=4&f_SB2=4&f_TPR=r604800&f_WT=2&f_AL=true&start=25"
        );
    }

    #[test]
    fn test_search_url_omits_unset_filters() {
        let url = board().build_search_url(
            &SearchParams::new("rust"),
            0,
            &ScrapeConfiguration::default(),
        );
        assert_eq!(url, "https://www.linkedin.com/jobs/search/?keywords=rust");
    }

    #[test]
    fn test_search_url_offset_saturates() {
        let params = SearchParams {
            start: u32::MAX - 5,
            ..SearchParams::new("rust")
        };
        let url = board().build_search_url(&params, 1, &ScrapeConfiguration::default());
        assert!(url.ends_with(&format!("&start={}", u32::MAX)));
    }

    #[test]
    fn test_salary_bucket() {
        assert_eq!(salary_bucket(30_000), None);
        assert_eq!(salary_bucket(40_000), Some(1));
        assert_eq!(salary_bucket(100_000), Some(4));
        assert_eq!(salary_bucket(500_000), Some(9));
    }

    #[test]
    fn test_parse_listings() {
        let config = ScrapeConfiguration::default();
        let ctx = ParseContext {
            config: &config,
            scraped_at: now(),
        };
        let page = board().parse_job_listings(
            LISTING,
            "https://www.linkedin.com/jobs/search/?keywords=rust",
            &ctx,
        );

        assert_eq!(page.postings.len(), 2);
        assert_eq!(page.failures.len(), 1);
        assert_eq!(page.found(), 3);

        let first = &page.postings[0];
        assert_eq!(first.external_id, "3812345678");
        assert_eq!(first.url, "https://www.linkedin.com/jobs/view/3812345678/");
        assert_eq!(first.title, "Senior Rust Engineer");
        assert_eq!(first.company, "Acme Corp");
        assert_eq!(first.location, "Bengaluru, Karnataka, India");
        assert_eq!(first.salary.currency.as_deref(), Some("INR"));
        assert_eq!(first.salary.min, Some(3_000_000.0));
        assert_eq!(first.salary.period, Some(SalaryPeriod::Yearly));
        assert_eq!(
            first.posted_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap())
        );

        let second = &page.postings[1];
        assert_eq!(second.external_id, "3899990000");
        assert_eq!(second.company, UNKNOWN);
        assert_eq!(second.posted_at, Some(now() - Duration::weeks(2)));
        assert!(second.salary.is_unspecified());
    }

    #[test]
    fn test_parse_listings_skips_salary_when_disabled() {
        let config = ScrapeConfiguration {
            extract_salary: false,
            ..ScrapeConfiguration::default()
        };
        let ctx = ParseContext {
            config: &config,
            scraped_at: now(),
        };
        let page = board().parse_job_listings(LISTING, SEARCH_BASE, &ctx);
        assert!(page.postings[0].salary.is_unspecified());
    }

    #[test]
    fn test_parse_detail() {
        let config = ScrapeConfiguration::default();
        let ctx = ParseContext {
            config: &config,
            scraped_at: now(),
        };
        let posting = board()
            .parse_job_page(
                DETAIL,
                "https://www.linkedin.com/jobs/view/senior-rust-engineer-at-acme-3812345678?trk=x",
                &ctx,
            )
            .unwrap();

        assert_eq!(posting.external_id, "3812345678");
        assert_eq!(posting.title, "Senior Rust Engineer");
        assert_eq!(posting.company, "Acme Corp");
        assert_eq!(posting.location, "Bengaluru, Karnataka, India");
        assert_eq!(posting.seniority_level, Some(SeniorityLevel::MidSenior));
        assert_eq!(posting.employment_type, Some(EmploymentType::FullTime));
        assert_eq!(
            posting.company_info.industry.as_deref(),
            Some("Software Development")
        );
        assert_eq!(
            posting.company_info.logo_url.as_deref(),
            Some("https://media.licdn.com/acme.png")
        );
        assert_eq!(posting.responsibilities, vec!["Design scraping pipelines"]);
        assert_eq!(posting.requirements, vec!["5+ years of Rust", "Tokio"]);
        assert_eq!(posting.benefits, vec!["Health insurance"]);
        assert!(posting.description.starts_with("Acme builds crawlers."));
        assert_eq!(posting.posted_at, Some(now() - Duration::days(3)));
    }

    #[test]
    fn test_parse_detail_without_company_is_absent() {
        let config = ScrapeConfiguration::default();
        let ctx = ParseContext::now(&config);
        let html = "<html><body><h1 class=\"top-card-layout__title\">Engineer</h1></body></html>";
        assert!(board()
            .parse_job_page(html, "https://www.linkedin.com/jobs/view/1/", &ctx)
            .is_none());
    }

    #[test]
    fn test_parse_detail_without_job_id_uses_clean_url() {
        let config = ScrapeConfiguration::default();
        let ctx = ParseContext::now(&config);
        let html = r#"<html><body>
            <h1 class="top-card-layout__title">Engineer</h1>
            <a class="topcard__org-name-link">Acme</a>
        </body></html>"#;
        let posting = board()
            .parse_job_page(
                html,
                "https://www.linkedin.com/jobs/collections/remote/?trk=abc#top",
                &ctx,
            )
            .unwrap();

        assert_eq!(posting.url, "https://www.linkedin.com/jobs/collections/remote/");
        assert_eq!(posting.external_id, posting.url);
    }
}
