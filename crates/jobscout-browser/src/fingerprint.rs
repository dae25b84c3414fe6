use rand::Rng;
use serde::{Deserialize, Serialize};

// Common desktop user agents
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

// Common viewport sizes
const VIEWPORTS: &[(u32, u32)] = &[(1920, 1080), (1366, 768), (1536, 864), (1440, 900)];

const LOCALES: &[(&str, &str)] = &[
    ("en-US", "America/New_York"),
    ("en-US", "America/Chicago"),
    ("en-GB", "Europe/London"),
    ("en-IN", "Asia/Kolkata"),
];

/// Browser viewport in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Timing parameters for simulated reading behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Pixels scrolled per step
    pub scroll_step_px: u32,
    /// Number of scroll steps in each direction
    pub scroll_steps: u32,
    /// Lower bound of the pause between steps, in milliseconds
    pub min_pause_ms: u64,
    /// Upper bound of the pause between steps, in milliseconds
    pub max_pause_ms: u64,
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            scroll_step_px: 400,
            scroll_steps: 3,
            min_pause_ms: 250,
            max_pause_ms: 900,
        }
    }
}

impl BehaviorProfile {
    /// Draw one pause duration from the configured range.
    #[must_use]
    pub fn random_pause_ms(&self) -> u64 {
        if self.max_pause_ms <= self.min_pause_ms {
            return self.min_pause_ms;
        }
        rand::thread_rng().gen_range(self.min_pause_ms..=self.max_pause_ms)
    }
}

/// Cookie restored into a session before the first navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

/// Browser fingerprint used for one scraping run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_agent: String,
    pub viewport: Viewport,
    /// BCP 47 locale, e.g. `en-US`
    pub locale: String,
    /// IANA timezone, e.g. `America/New_York`
    pub timezone: String,
    pub behavior: BehaviorProfile,
    #[serde(default)]
    pub cookies: Vec<SessionCookie>,
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENTS[0].to_string(),
            viewport: Viewport {
                width: 1920,
                height: 1080,
            },
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
            behavior: BehaviorProfile::default(),
            cookies: Vec::new(),
        }
    }
}

impl SessionIdentity {
    /// Generate a randomized fingerprint configuration
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();

        let ua_idx = rng.gen_range(0..USER_AGENTS.len());
        let vp_idx = rng.gen_range(0..VIEWPORTS.len());
        let locale_idx = rng.gen_range(0..LOCALES.len());
        let (width, height) = VIEWPORTS[vp_idx];
        let (locale, timezone) = LOCALES[locale_idx];

        Self {
            user_agent: USER_AGENTS[ua_idx].to_string(),
            viewport: Viewport { width, height },
            locale: locale.to_string(),
            timezone: timezone.to_string(),
            behavior: BehaviorProfile {
                scroll_step_px: rng.gen_range(300..=600),
                ..BehaviorProfile::default()
            },
            cookies: Vec::new(),
        }
    }

    /// `Accept-Language` header value derived from the locale.
    #[must_use]
    pub fn accept_language(&self) -> String {
        match self.locale.split_once('-') {
            Some((lang, _)) => format!("{},{};q=0.9", self.locale, lang),
            None => self.locale.clone(),
        }
    }

    /// Chrome command-line flags that reduce automation fingerprints.
    #[must_use]
    pub fn launch_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = AUTOMATION_FLAGS.iter().map(ToString::to_string).collect();
        flags.push(format!("--user-agent={}", self.user_agent));
        flags.push(format!("--lang={}", self.locale));
        flags.push(format!(
            "--window-size={},{}",
            self.viewport.width, self.viewport.height
        ));
        flags
    }

    /// Scripts injected before any page script runs.
    #[must_use]
    pub fn stealth_scripts(&self) -> Vec<String> {
        let lang = self
            .locale
            .split_once('-')
            .map_or(self.locale.as_str(), |(lang, _)| lang);
        let languages = format!(
            r#"
    Object.defineProperty(navigator, 'languages', {{
        get: () => ['{}', '{}'],
        configurable: true
    }});
    "#,
            self.locale, lang
        );

        STEALTH_SCRIPTS
            .iter()
            .map(ToString::to_string)
            .chain(std::iter::once(languages))
            .collect()
    }
}

const AUTOMATION_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-popup-blocking",
    "--disable-notifications",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--disable-translate",
    "--disable-default-apps",
    "--disable-component-update",
    "--disable-features=IsolateOrigins,site-per-process,TranslateUI",
    "--disable-ipc-flooding-protection",
    "--metrics-recording-only",
    "--safebrowsing-disable-auto-update",
    "--password-store=basic",
    "--use-mock-keychain",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-software-rasterizer",
];

const STEALTH_SCRIPTS: &[&str] = &[
    // Remove webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // Fix chrome object
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Fix permissions
    r#"
    const originalQuery = window.navigator.permissions.query;
    window.navigator.permissions.query = (parameters) => (
        parameters.name === 'notifications' ?
        Promise.resolve({ state: Notification.permission }) :
        originalQuery(parameters)
    );
    "#,
    // Fix plugins
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    Object.defineProperty(navigator, 'hardwareConcurrency', {
        get: () => 8,
        configurable: true
    });
    "#,
    // Remove automation-related properties
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
    // WebGL vendor/renderer
    r#"
    const getParameter = WebGLRenderingContext.prototype.getParameter;
    WebGLRenderingContext.prototype.getParameter = function(parameter) {
        if (parameter === 37445) {
            return 'Intel Inc.';
        }
        if (parameter === 37446) {
            return 'Intel Iris OpenGL Engine';
        }
        return getParameter.call(this, parameter);
    };
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_randomized_fingerprint() {
        let config = SessionIdentity::randomized();
        assert!(!config.user_agent.is_empty());
        assert!(config.viewport.width > 0);
        assert!(config.viewport.height > 0);
        assert!(!config.timezone.is_empty());
        assert!(config.cookies.is_empty());
    }

    #[test]
    fn test_fingerprint_variation() {
        // Probabilistic, but ten identical draws from five agents is very unlikely
        let configs: Vec<_> = (0..10).map(|_| SessionIdentity::randomized()).collect();

        let first_ua = &configs[0].user_agent;
        let all_same = configs.iter().all(|c| &c.user_agent == first_ua);
        assert!(!all_same, "Expected variation in user agents");
    }

    #[test]
    fn test_launch_flags_include_identity() {
        let identity = SessionIdentity::default();
        let flags = identity.launch_flags();
        assert!(flags.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(flags.contains(&"--window-size=1920,1080".to_string()));
        assert!(flags.iter().any(|f| f.starts_with("--user-agent=Mozilla")));
        assert!(flags.contains(&"--lang=en-US".to_string()));
    }

    #[test]
    fn test_accept_language() {
        let mut identity = SessionIdentity::default();
        assert_eq!(identity.accept_language(), "en-US,en;q=0.9");

        identity.locale = "de".to_string();
        assert_eq!(identity.accept_language(), "de");
    }

    #[test]
    fn test_stealth_scripts_spoof_languages() {
        let mut identity = SessionIdentity::default();
        identity.locale = "en-IN".to_string();
        let scripts = identity.stealth_scripts();
        assert!(scripts.iter().any(|s| s.contains("webdriver")));
        assert!(scripts.iter().any(|s| s.contains("['en-IN', 'en']")));
    }

    #[test]
    fn test_behavior_pause_in_range() {
        let profile = BehaviorProfile::default();
        for _ in 0..20 {
            let pause = profile.random_pause_ms();
            assert!((profile.min_pause_ms..=profile.max_pause_ms).contains(&pause));
        }

        let fixed = BehaviorProfile {
            min_pause_ms: 100,
            max_pause_ms: 100,
            ..BehaviorProfile::default()
        };
        assert_eq!(fixed.random_pause_ms(), 100);
    }
}
