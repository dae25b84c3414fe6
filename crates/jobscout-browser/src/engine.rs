use crate::actions::{BrowserDriver, BrowserSession, SessionOptions, TeardownReport};
use crate::error::{BrowserError, Result};
use crate::fingerprint::SessionIdentity;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{CookieParam, SetUserAgentOverrideParams};
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Launches one Chromium process per session over the DevTools protocol.
#[derive(Debug, Default)]
pub struct ChromiumDriver;

impl ChromiumDriver {
    pub fn new() -> Self {
        Self
    }

    fn launch_config(identity: &SessionIdentity, options: &SessionOptions) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(identity.viewport.width, identity.viewport.height);

        // with_head means NOT headless
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = options.executable {
            builder = builder.chrome_executable(path);
        }
        if let Some(ref proxy) = options.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        for flag in identity.launch_flags() {
            builder = builder.arg(flag);
        }
        for arg in &options.extra_args {
            builder = builder.arg(arg);
        }

        builder.build().map_err(BrowserError::LaunchError)
    }
}

#[async_trait::async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn open_session(
        &self,
        identity: &SessionIdentity,
        options: &SessionOptions,
    ) -> Result<Box<dyn BrowserSession>> {
        info!(
            "Launching browser (headless={}, proxy={})",
            options.headless,
            options.proxy.is_some()
        );
        let config = Self::launch_config(identity, options)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        match prepare_page(&mut browser, identity, options).await {
            Ok((context_id, page)) => Ok(Box::new(ChromiumSession {
                browser: Mutex::new(Some(browser)),
                context_id,
                page: Mutex::new(Some(page)),
                handler,
            })),
            Err(e) => {
                warn!("Session setup failed, closing browser: {}", e);
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler.abort();
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        "chromium"
    }
}

/// Create an isolated context and apply the identity before any navigation.
async fn prepare_page(
    browser: &mut Browser,
    identity: &SessionIdentity,
    options: &SessionOptions,
) -> Result<(
    chromiumoxide::cdp::browser_protocol::browser::BrowserContextId,
    Page,
)> {
    let context_id = browser
        .create_browser_context(Default::default())
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

    let target = CreateTargetParams::builder()
        .url("about:blank")
        .browser_context_id(context_id.clone())
        .build()
        .map_err(BrowserError::ChromiumError)?;
    let page = browser
        .new_page(target)
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

    let user_agent = SetUserAgentOverrideParams::builder()
        .user_agent(identity.user_agent.clone())
        .accept_language(identity.accept_language())
        .build()
        .map_err(BrowserError::ChromiumError)?;
    page.execute(user_agent)
        .await
        .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;

    if let Err(e) = page
        .execute(SetTimezoneOverrideParams::new(identity.timezone.clone()))
        .await
    {
        warn!("Failed to override timezone {}: {}", identity.timezone, e);
    }

    for cookie in &identity.cookies {
        let param = CookieParam::builder()
            .name(cookie.name.clone())
            .value(cookie.value.clone())
            .domain(cookie.domain.clone())
            .path(cookie.path.clone())
            .secure(cookie.secure)
            .http_only(cookie.http_only)
            .build();
        match param {
            Ok(param) => {
                if let Err(e) = page.set_cookie(param).await {
                    warn!("Failed to set cookie {}: {}", cookie.name, e);
                }
            }
            Err(e) => warn!("Failed to build cookie {}: {}", cookie.name, e),
        }
    }

    if options.stealth {
        for script in identity.stealth_scripts() {
            if let Err(e) = page
                .execute(AddScriptToEvaluateOnNewDocumentParams::new(script))
                .await
            {
                debug!("Stealth script registration failed: {}", e);
            }
        }
    }

    Ok((context_id, page))
}

/// A live Chromium page in its own browser context.
pub struct ChromiumSession {
    browser: Mutex<Option<Browser>>,
    context_id: chromiumoxide::cdp::browser_protocol::browser::BrowserContextId,
    page: Mutex<Option<Page>>,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    async fn page(&self) -> Result<Page> {
        self.page
            .lock()
            .await
            .as_ref()
            .cloned()
            .ok_or(BrowserError::SessionClosed)
    }
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page().await?;
        debug!("Navigating to {}", url);

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::NavigationError(e.to_string())),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {} after {:?}",
                url, timeout
            ))),
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page().await?;
        let deadline = Instant::now() + timeout;

        loop {
            if page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "selector {} after {:?}",
                    selector, timeout
                )));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn content(&self) -> Result<String> {
        let page = self.page().await?;
        page.content()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page().await?;
        page.url()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?
            .ok_or_else(|| BrowserError::NavigationError("page has no URL".to_string()))
    }

    async fn extract_text(&self, selector: &str) -> Result<String> {
        let page = self.page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        let text = element
            .inner_text()
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn extract_attribute(&self, selector: &str, attribute: &str) -> Result<Option<String>> {
        let page = self.page().await?;
        let element = page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element
            .attribute(attribute)
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.page().await?;
        let result = page
            .evaluate(script.to_string())
            .await
            .map_err(|e| BrowserError::ScriptError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        let page = self.page().await?;
        page.screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| BrowserError::ChromiumError(e.to_string()))
    }

    async fn close(self: Box<Self>) -> TeardownReport {
        let mut report = TeardownReport::default();

        if let Some(page) = self.page.lock().await.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
                report.failed_steps.push(format!("page: {}", e));
            }
        }

        if let Some(mut browser) = self.browser.lock().await.take() {
            if let Err(e) = browser
                .dispose_browser_context(self.context_id.clone())
                .await
            {
                warn!("Failed to dispose browser context: {}", e);
                report.failed_steps.push(format!("context: {}", e));
            }
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
                report.failed_steps.push(format!("browser: {}", e));
            }
            if let Err(e) = browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
                report.failed_steps.push(format!("process: {}", e));
            }
        }

        self.handler.abort();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_config_builds() {
        let identity = SessionIdentity::default();
        let options = SessionOptions {
            proxy: Some("socks5://127.0.0.1:1080".to_string()),
            ..SessionOptions::default()
        };
        // Executable detection fails on hosts without Chrome
        match ChromiumDriver::launch_config(&identity, &options) {
            Ok(_) => {}
            Err(e) => assert!(matches!(e, BrowserError::LaunchError(_))),
        }
    }

    #[tokio::test]
    #[ignore] // Requires Chrome/Chromium installed
    async fn test_open_and_close_session() {
        let driver = ChromiumDriver::new();
        let session = driver
            .open_session(&SessionIdentity::default(), &SessionOptions::default())
            .await
            .unwrap();
        session
            .navigate("https://example.com", Duration::from_secs(30))
            .await
            .unwrap();
        let report = session.close().await;
        assert!(report.is_clean(), "{:?}", report.failed_steps);
    }
}
