//! robots.txt parsing for the wildcard user-agent group.

use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    allow: bool,
    pattern: String,
}

/// Allow/Disallow rules that apply to `User-agent: *`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsPolicy {
    rules: Vec<Rule>,
    crawl_delay: Option<u64>,
}

impl RobotsPolicy {
    /// Policy that allows everything, used when robots.txt is missing.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Parse robots.txt content, keeping only groups that name `*`.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let mut policy = Self::default();
        let mut group_agents: Vec<String> = Vec::new();
        let mut in_rules = false;

        for line in content.lines() {
            // Strip comments
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    // A user-agent line after rules starts a new group
                    if in_rules {
                        group_agents.clear();
                        in_rules = false;
                    }
                    group_agents.push(value.to_string());
                }
                "allow" | "disallow" => {
                    in_rules = true;
                    if !group_agents.iter().any(|agent| agent == "*") {
                        continue;
                    }
                    // An empty Disallow allows everything
                    if value.is_empty() {
                        continue;
                    }
                    policy.rules.push(Rule {
                        allow: directive == "allow",
                        pattern: value.to_string(),
                    });
                }
                "crawl-delay" => {
                    in_rules = true;
                    if group_agents.iter().any(|agent| agent == "*") {
                        policy.crawl_delay = value.parse().ok();
                    }
                }
                _ => {}
            }
        }

        debug!(rules = policy.rules.len(), "parsed robots.txt");
        policy
    }

    /// Whether `path` (path plus query) may be fetched.
    ///
    /// The longest matching pattern wins; on a tie Allow wins.
    #[must_use]
    pub fn is_allowed(&self, path: &str) -> bool {
        let mut best: Option<&Rule> = None;
        for rule in &self.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            best = match best {
                None => Some(rule),
                Some(current) => {
                    let longer = rule.pattern.len() > current.pattern.len();
                    let tie_allow =
                        rule.pattern.len() == current.pattern.len() && rule.allow && !current.allow;
                    if longer || tie_allow {
                        Some(rule)
                    } else {
                        Some(current)
                    }
                }
            };
        }
        best.map_or(true, |rule| rule.allow)
    }

    /// Whether the URL's path and query may be fetched.
    #[must_use]
    pub fn is_url_allowed(&self, url: &str) -> bool {
        match url::Url::parse(url) {
            Ok(parsed) => {
                let mut target = parsed.path().to_string();
                if let Some(query) = parsed.query() {
                    target.push('?');
                    target.push_str(query);
                }
                self.is_allowed(&target)
            }
            Err(_) => true,
        }
    }

    /// `Crawl-delay` for the wildcard group, in seconds.
    #[must_use]
    pub fn crawl_delay(&self) -> Option<u64> {
        self.crawl_delay
    }

    /// Number of rules kept.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Prefix match with `*` wildcards and an optional `$` end anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = path.strip_prefix(first) else {
        return false;
    };

    let remaining: Vec<&str> = parts.collect();
    for (i, part) in remaining.iter().enumerate() {
        let is_last = i == remaining.len() - 1;
        if is_last && anchored {
            return rest.ends_with(part);
        }
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }

    !anchored || rest.is_empty()
}
