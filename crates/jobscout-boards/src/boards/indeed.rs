//! Indeed job search.

use super::builtin_id;
use crate::contract::{JobBoard, ListingPage, ParseContext};
use crate::definition::ScrapeConfiguration;
use crate::error::{ErrorKind, Result};
use crate::extract::{
    absolutize, all_texts, element_text, first_attr, first_element, first_text, parse_posted_date,
    parse_salary, select_all, split_sections,
};
use crate::posting::{EmploymentType, ScrapedPosting, SeniorityLevel, UNKNOWN};
use crate::result::ScrapeIssue;
use crate::search::{PostedWithin, SearchParams};
use jobscout_core::BoardId;
use scraper::{ElementRef, Html};

const SEARCH_BASE: &str = "https://www.indeed.com/jobs";
const DEFAULT_ORIGIN: &str = "https://www.indeed.com";
const PAGE_SIZE: u32 = 10;
const REMOTE_FILTER: &str = "032b3046-06a3-4876-8dfd-474eb5e7ed11";

const CARD_SELECTORS: &[&str] = &["div.job_seen_beacon", "div.cardOutline", "td.resultContent"];
const CARD_TITLE: &[&str] = &[
    "h2.jobTitle span[title]",
    "h2.jobTitle",
    "a.jcs-JobTitle",
    "[class*='jobTitle']",
];
const CARD_KEY: &[&str] = &["a[data-jk]", "[data-jk]"];
const CARD_LINK: &[&str] = &["a.jcs-JobTitle", "h2.jobTitle a"];
const CARD_COMPANY: &[&str] = &["[data-testid='company-name']", "span.companyName"];
const CARD_LOCATION: &[&str] = &["[data-testid='text-location']", "div.companyLocation"];
const CARD_SALARY: &[&str] = &[
    ".salary-snippet-container",
    "div.metadata.salary-snippet-container",
    ".estimated-salary",
];
const CARD_ATTRIBUTES: &[&str] = &["[data-testid='attribute_snippet_testid']", "div.metadata"];
const CARD_POSTED: &[&str] = &["[data-testid='myJobsStateDate']", "span.date"];

const DETAIL_TITLE: &[&str] = &[
    "h1.jobsearch-JobInfoHeader-title",
    "[data-testid='jobsearch-JobInfoHeader-title']",
    "h1",
];
const DETAIL_COMPANY: &[&str] = &[
    "[data-testid='inlineHeader-companyName']",
    "[data-company-name='true']",
    "div.jobsearch-CompanyInfoContainer a",
];
const DETAIL_LOCATION: &[&str] = &[
    "[data-testid='inlineHeader-companyLocation']",
    "[data-testid='job-location']",
    "div.jobsearch-JobInfoHeader-subtitle > div:last-child",
];
const DETAIL_DESCRIPTION: &[&str] = &["#jobDescriptionText", ".jobsearch-jobDescriptionText"];
const DETAIL_DETAILS: &[&str] = &["#salaryInfoAndJobType span", "[aria-label='Job type'] li"];
const DETAIL_BENEFITS: &[&str] = &["#benefits li", "[data-testid='benefits-test'] li"];
const DETAIL_LOGO: &[&str] = &["img.jobsearch-CompanyAvatar-image"];

/// Indeed search (`/jobs`) and view (`/viewjob`) pages.
#[derive(Debug, Clone)]
pub struct IndeedBoard {
    id: BoardId,
}

impl IndeedBoard {
    /// Board registered as `indeed`.
    pub fn new() -> Result<Self> {
        Ok(Self {
            id: builtin_id("indeed")?,
        })
    }

    fn parse_card(
        &self,
        card: &ElementRef,
        page_url: &str,
        ctx: &ParseContext<'_>,
    ) -> std::result::Result<ScrapedPosting, String> {
        let title = first_text(card, CARD_TITLE).ok_or("listing card without title")?;
        let job_key = card
            .value()
            .attr("data-jk")
            .map(ToString::to_string)
            .or_else(|| first_attr(card, CARD_KEY, "data-jk"))
            .or_else(|| {
                first_attr(card, CARD_LINK, "href")
                    .and_then(|href| absolutize(page_url, &href))
                    .and_then(|url| job_key_from_url(&url))
            })
            .ok_or_else(|| format!("listing card '{title}' without job key"))?;

        let url = format!("{}/viewjob?jk={job_key}", origin_of(page_url));
        let mut posting = ScrapedPosting::new(self.id.clone(), job_key, url);
        posting.title = title;
        posting.company = first_text(card, CARD_COMPANY).unwrap_or_else(|| UNKNOWN.to_string());
        posting.location = first_text(card, CARD_LOCATION).unwrap_or_else(|| UNKNOWN.to_string());
        if ctx.config.extract_salary {
            if let Some(text) = first_text(card, CARD_SALARY) {
                posting.salary = parse_salary(&text);
            }
        }
        posting.employment_type = all_texts(card, CARD_ATTRIBUTES)
            .iter()
            .find_map(|text| EmploymentType::infer(text));
        posting.posted_at =
            first_text(card, CARD_POSTED).and_then(|t| parse_posted_date(&t, ctx.scraped_at));
        posting.scraped_at = ctx.scraped_at;
        Ok(posting)
    }
}

fn origin_of(page_url: &str) -> String {
    url::Url::parse(page_url)
        .ok()
        .filter(|u| u.has_host())
        .map_or_else(|| DEFAULT_ORIGIN.to_string(), |u| u.origin().ascii_serialization())
}

fn job_key_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "jk" || key == "vjk")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn employment_code(kind: EmploymentType) -> Option<&'static str> {
    match kind {
        EmploymentType::FullTime => Some("fulltime"),
        EmploymentType::PartTime => Some("parttime"),
        EmploymentType::Contract => Some("contract"),
        EmploymentType::Temporary => Some("temporary"),
        EmploymentType::Internship => Some("internship"),
        EmploymentType::Volunteer | EmploymentType::Other => None,
    }
}

fn seniority_code(level: SeniorityLevel) -> &'static str {
    match level {
        SeniorityLevel::Internship | SeniorityLevel::Entry => "entry_level",
        SeniorityLevel::Associate | SeniorityLevel::MidSenior => "mid_level",
        SeniorityLevel::Director | SeniorityLevel::Executive => "senior_level",
    }
}

fn posted_code(window: PostedWithin) -> Option<&'static str> {
    match window {
        PostedWithin::Past24Hours => Some("1"),
        PostedWithin::PastWeek => Some("7"),
        PostedWithin::PastMonth | PostedWithin::AnyTime => None,
    }
}

fn strip_title_suffix(title: String) -> String {
    match title.strip_suffix("- job post") {
        Some(stripped) => stripped.trim_end().to_string(),
        None => title,
    }
}

impl JobBoard for IndeedBoard {
    fn board_id(&self) -> &BoardId {
        &self.id
    }

    fn display_name(&self) -> &str {
        "Indeed"
    }

    fn default_config(&self) -> ScrapeConfiguration {
        ScrapeConfiguration {
            requests_per_minute: 10,
            requests_per_hour: 200,
            delay_between_requests_ms: 3_000,
            max_pages_per_search: 5,
            max_jobs_per_page: 15,
            ..ScrapeConfiguration::default()
        }
    }

    /// Indeed takes a single job type and experience level, so only the
    /// first supported value of each filter is sent.
    fn build_search_url(
        &self,
        params: &SearchParams,
        page_index: u32,
        _config: &ScrapeConfiguration,
    ) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("q", params.query.trim());
        if let Some(location) = params
            .location
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
        {
            query.append_pair("l", location);
        }
        if let Some(km) = params.radius_km {
            let miles = (f64::from(km) * 0.621_371).round() as u32;
            query.append_pair("radius", &miles.to_string());
        }
        if let Some(code) = params.employment_types.iter().find_map(|t| employment_code(*t)) {
            query.append_pair("jt", code);
        }
        if let Some(level) = params.seniority_levels.first() {
            query.append_pair("explvl", seniority_code(*level));
        }
        if let Some(days) = posted_code(params.posted_within) {
            query.append_pair("fromage", days);
        }
        if params.remote_only {
            query.append_pair("remotejob", REMOTE_FILTER);
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

        let title = strip_title_suffix(first_text(&root, DETAIL_TITLE)?);
        let company = first_text(&root, DETAIL_COMPANY)?;
        let (external_id, canonical) = match job_key_from_url(url) {
            Some(key) => {
                let canonical = format!("{}/viewjob?jk={key}", origin_of(url));
                (key, canonical)
            }
            None => (url.to_string(), url.to_string()),
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
        if posting.benefits.is_empty() {
            posting.benefits = all_texts(&root, DETAIL_BENEFITS);
        }

        let details = all_texts(&root, DETAIL_DETAILS);
        posting.employment_type = details.iter().find_map(|text| EmploymentType::infer(text));
        posting.seniority_level = SeniorityLevel::infer(&posting.title);
        if ctx.config.extract_salary {
            if let Some(pay) = details
                .iter()
                .find(|text| text.chars().any(|c| c.is_ascii_digit()))
            {
                posting.salary = parse_salary(pay);
            }
        }
        if ctx.config.extract_company_info {
            posting.company_info.logo_url = first_attr(&root, DETAIL_LOGO, "src");
        }
        Some(posting)
    }

    fn listing_ready_selector(&self) -> Option<&str> {
        Some("#mosaic-provider-jobcards")
    }

    fn detail_ready_selector(&self) -> Option<&str> {
        Some("#jobDescriptionText")
    }
}
