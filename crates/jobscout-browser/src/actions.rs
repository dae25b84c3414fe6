use crate::error::{BrowserError, Result};
use crate::fingerprint::SessionIdentity;
use std::path::PathBuf;
use std::time::Duration;

/// Launch-time options that are not part of the browser identity.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Proxy server, e.g. `socks5://127.0.0.1:1080`
    pub proxy: Option<String>,
    /// Inject the stealth scripts before the first navigation
    pub stealth: bool,
    /// Explicit browser executable
    pub executable: Option<PathBuf>,
    /// Extra command-line flags appended after the fingerprint flags
    pub extra_args: Vec<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy: None,
            stealth: true,
            executable: None,
            extra_args: Vec::new(),
        }
    }
}

impl SessionOptions {
    /// Options from the `[browser]` config section. Proxy selection is left
    /// to the caller since it rotates per session.
    #[must_use]
    pub fn from_config(config: &jobscout_core::BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            proxy: None,
            stealth: true,
            executable: config.chrome_executable.clone(),
            extra_args: config.extra_args.clone(),
        }
    }
}

/// Outcome of tearing a session down.
///
/// Teardown never fails as a whole; each step that failed is listed here
/// so callers can log it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Human-readable description of every failed teardown step
    pub failed_steps: Vec<String>,
}

impl TeardownReport {
    /// True when page, context and browser all closed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_steps.is_empty()
    }
}

/// Launches browser sessions.
///
/// This is the seam between the scraping engine and a concrete automation
/// backend (Chromium over CDP, recorded fixtures, ...).
#[async_trait::async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Open a fresh, isolated session configured from `identity`.
    async fn open_session(
        &self,
        identity: &SessionIdentity,
        options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>>;

    /// Short backend name for logs and stats.
    fn name(&self) -> &str;
}

/// Browser actions for automation
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL, failing with [`BrowserError::Timeout`] after `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Serialized HTML of the current document
    async fn content(&self) -> Result<String>;

    /// URL of the current document after redirects
    async fn current_url(&self) -> Result<String>;

    /// Extract text from an element
    async fn extract_text(&self, selector: &str) -> Result<String>;

    /// Read an attribute from the first element matching `selector`
    async fn extract_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Take a screenshot
    async fn screenshot(&self) -> Result<Vec<u8>>;

    /// Close page, then context, then browser.
    async fn close(self: Box<Self>) -> TeardownReport;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

/// Origin (`scheme://host[:port]`) of a URL, used to locate `robots.txt`.
pub fn extract_origin(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    if url.host_str().is_none() {
        return Err(BrowserError::NavigationError("No host in URL".to_string()));
    }

    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.linkedin.com/jobs/search").unwrap(),
            "www.linkedin.com"
        );
        assert_eq!(
            extract_domain("http://subdomain.example.com:8080/path").unwrap(),
            "subdomain.example.com"
        );
    }

    #[test]
    fn test_extract_domain_invalid() {
        assert!(extract_domain("not-a-url").is_err());
    }

    #[test]
    fn test_extract_origin() {
        assert_eq!(
            extract_origin("https://in.indeed.com/jobs?q=rust").unwrap(),
            "https://in.indeed.com"
        );
        assert_eq!(
            extract_origin("http://localhost:8080/a/b").unwrap(),
            "http://localhost:8080"
        );
    }

    #[test]
    fn test_options_from_config() {
        let config = jobscout_core::BrowserConfig {
            headless: false,
            extra_args: vec!["--mute-audio".to_string()],
            ..Default::default()
        };
        let options = SessionOptions::from_config(&config);
        assert!(!options.headless);
        assert!(options.stealth);
        assert!(options.proxy.is_none());
        assert_eq!(options.extra_args, vec!["--mute-audio".to_string()]);
    }

    #[test]
    fn test_teardown_report_clean() {
        assert!(TeardownReport::default().is_clean());
        let report = TeardownReport {
            failed_steps: vec!["page: already closed".to_string()],
        };
        assert!(!report.is_clean());
    }
}
