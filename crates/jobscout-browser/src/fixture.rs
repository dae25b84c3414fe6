//! Offline driver that replays recorded HTML.
//!
//! [`FixtureDriver`] implements [`BrowserDriver`] without launching a
//! browser. Pages are registered by exact URL or URL prefix; anything else
//! renders as an empty document. Selector queries run against the recorded
//! HTML with the `scraper` crate, so board parsers see the same markup they
//! would see in a live page.

use crate::actions::{BrowserDriver, BrowserSession, SessionOptions, TeardownReport};
use crate::error::{BrowserError, Result};
use crate::fingerprint::SessionIdentity;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const EMPTY_PAGE: &str = "<html><head></head><body></body></html>";

#[derive(Debug, Default)]
struct FixtureState {
    pages: HashMap<String, String>,
    prefixes: Vec<(String, String)>,
    redirects: HashMap<String, String>,
    failures: HashMap<String, String>,
    timeouts: HashSet<String>,
    failing_sessions: usize,
    latency: Duration,
    navigations: Vec<String>,
    identities: Vec<SessionIdentity>,
    sessions_opened: usize,
    open_sessions: usize,
}

impl FixtureState {
    fn resolve(&self, url: &str) -> String {
        if let Some(html) = self.pages.get(url) {
            return html.clone();
        }
        self.prefixes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or_else(|| EMPTY_PAGE.to_string(), |(_, html)| html.clone())
    }
}

/// Replays registered pages instead of driving a real browser.
#[derive(Debug, Clone, Default)]
pub struct FixtureDriver {
    state: Arc<Mutex<FixtureState>>,
}

impl FixtureDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for exactly `url`.
    #[must_use]
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.lock().pages.insert(url.into(), html.into());
        self
    }

    /// Serve `html` for every URL starting with `prefix`; longest prefix wins.
    #[must_use]
    pub fn with_prefix(self, prefix: impl Into<String>, html: impl Into<String>) -> Self {
        self.lock().prefixes.push((prefix.into(), html.into()));
        self
    }

    /// Report `to` as the final URL after navigating to `from`.
    #[must_use]
    pub fn with_redirect(self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.lock().redirects.insert(from.into(), to.into());
        self
    }

    /// Fail navigation to `url` with a network error.
    #[must_use]
    pub fn with_failure(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        self.lock().failures.insert(url.into(), message.into());
        self
    }

    /// Fail navigation to `url` with a timeout.
    #[must_use]
    pub fn with_timeout(self, url: impl Into<String>) -> Self {
        self.lock().timeouts.insert(url.into());
        self
    }

    /// Make the next `count` session launches fail.
    #[must_use]
    pub fn fail_next_sessions(self, count: usize) -> Self {
        self.lock().failing_sessions = count;
        self
    }

    /// Delay every navigation by `latency`.
    #[must_use]
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Replace the page served for `url` on an existing driver.
    pub fn set_page(&self, url: impl Into<String>, html: impl Into<String>) {
        self.lock().pages.insert(url.into(), html.into());
    }

    /// Every URL navigated to, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Identities passed to each session launch, in order.
    pub fn identities(&self) -> Vec<SessionIdentity> {
        self.lock().identities.clone()
    }

    /// Number of sessions launched so far.
    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    /// Number of sessions launched and not yet closed.
    pub fn open_sessions(&self) -> usize {
        self.lock().open_sessions
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FixtureState> {
        self.state.lock().expect("fixture state poisoned")
    }
}

#[async_trait::async_trait]
impl BrowserDriver for FixtureDriver {
    async fn open_session(
        &self,
        identity: &SessionIdentity,
        _options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>> {
        let mut state = self.lock();
        if state.failing_sessions > 0 {
            state.failing_sessions -= 1;
            return Err(BrowserError::LaunchError(
                "fixture launch failure".to_string(),
            ));
        }
        state.identities.push(identity.clone());
        state.sessions_opened += 1;
        state.open_sessions += 1;

        Ok(Box::new(FixtureSession {
            state: Arc::clone(&self.state),
            current: Mutex::new(Current {
                url: "about:blank".to_string(),
                html: EMPTY_PAGE.to_string(),
                closed: false,
            }),
        }))
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

struct Current {
    url: String,
    html: String,
    closed: bool,
}

/// Session handed out by [`FixtureDriver`].
pub struct FixtureSession {
    state: Arc<Mutex<FixtureState>>,
    current: Mutex<Current>,
}

impl FixtureSession {
    fn with_document<T>(&self, f: impl FnOnce(&Html) -> T) -> Result<T> {
        let current = self.current.lock().expect("fixture session poisoned");
        if current.closed {
            return Err(BrowserError::SessionClosed);
        }
        let document = Html::parse_document(&current.html);
        Ok(f(&document))
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| BrowserError::ScriptError(format!("{selector}: {e:?}")))
}

#[async_trait::async_trait]
impl BrowserSession for FixtureSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let latency = self.state.lock().expect("fixture state poisoned").latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let (html, final_url) = {
            let mut state = self.state.lock().expect("fixture state poisoned");
            state.navigations.push(url.to_string());

            if let Some(message) = state.failures.get(url) {
                return Err(BrowserError::NavigationError(message.clone()));
            }
            if state.timeouts.contains(url) {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} after {timeout:?}"
                )));
            }
            let final_url = state
                .redirects
                .get(url)
                .cloned()
                .unwrap_or_else(|| url.to_string());
            (state.resolve(url), final_url)
        };

        let mut current = self.current.lock().expect("fixture session poisoned");
        if current.closed {
            return Err(BrowserError::SessionClosed);
        }
        current.url = final_url;
        current.html = html;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let selector_parsed = parse_selector(selector)?;
        let found = self.with_document(|doc| doc.select(&selector_parsed).next().is_some())?;
        if found {
            Ok(())
        } else {
            Err(BrowserError::Timeout(format!(
                "selector {selector} after {timeout:?}"
            )))
        }
    }

    async fn content(&self) -> Result<String> {
        let current = self.current.lock().expect("fixture session poisoned");
        if current.closed {
            return Err(BrowserError::SessionClosed);
        }
        Ok(current.html.clone())
    }

    async fn current_url(&self) -> Result<String> {
        let current = self.current.lock().expect("fixture session poisoned");
        if current.closed {
            return Err(BrowserError::SessionClosed);
        }
        Ok(current.url.clone())
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        let selector_parsed = parse_selector(selector)?;
        self.with_document(|doc| {
            doc.select(&selector_parsed)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
        })?
        .ok_or_else(|| BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn extract_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let selector_parsed = parse_selector(selector)?;
        self.with_document(|doc| {
            doc.select(&selector_parsed)
                .next()
                .map(|el| el.value().attr(attribute).map(ToString::to_string))
        })?
        .ok_or_else(|| BrowserError::SelectorNotFound(selector.to_string()))
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        self.with_document(|_| serde_json::Value::Null)
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.with_document(|_| Vec::new())
    }

    async fn close(self: Box<Self>) -> TeardownReport {
        let mut current = self.current.lock().expect("fixture session poisoned");
        if !current.closed {
            current.closed = true;
            let mut state = self.state.lock().expect("fixture state poisoned");
            state.open_sessions = state.open_sessions.saturating_sub(1);
        }
        TeardownReport::default()
    }
}
