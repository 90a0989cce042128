//! robots.txt compliance gate.
//!
//! Before any source page is fetched, its origin's robots.txt is consulted.
//! An unreachable or empty file fails open (allowed) — availability is
//! preferred over strict compliance here, since every listed source is a
//! public release-calendar page. Only the `User-agent: *` block is honored.
//! No state is retained between sources.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;
use url::Url;

/// Decides fetch/skip per source URL based on the origin's crawl policy.
pub struct ComplianceGate {
    client: reqwest::Client,
}

impl ComplianceGate {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).context("invalid user agent")?,
        );
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .default_headers(headers)
            .build()
            .context("failed to build robots client")?;
        Ok(Self { client })
    }

    /// Returns true when fetching `url` is allowed per its origin's
    /// robots.txt. Fails open on any fetch problem.
    pub async fn allows(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        let origin = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };
        let path = if parsed.path().is_empty() { "/" } else { parsed.path() };

        let robots_url = format!("{origin}/robots.txt");
        let body = match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                response.text().await.unwrap_or_default()
            }
            Ok(response) => {
                debug!("robots.txt at {robots_url} returned {}; allowing", response.status());
                return true;
            }
            Err(e) => {
                debug!("robots.txt fetch failed for {robots_url}: {e}; allowing");
                return true;
            }
        };

        robots_allows(&body, path)
    }
}

/// Evaluate a robots.txt body against a request path using the
/// `User-agent: *` block's Disallow rules. `/` blocks everything, a rule
/// ending in `*` is a path prefix, anything else requires an exact match.
pub fn robots_allows(body: &str, path: &str) -> bool {
    if body.trim().is_empty() {
        return true;
    }

    let mut in_star_block = false;
    let mut disallows: Vec<String> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if let Some(agent) = strip_directive(trimmed, "user-agent") {
            in_star_block = agent.to_lowercase() == "*";
            if in_star_block {
                disallows.clear();
            }
        } else if in_star_block {
            if let Some(rule) = strip_directive(trimmed, "disallow") {
                if !rule.is_empty() {
                    disallows.push(rule.to_string());
                }
            }
        }
    }

    for rule in &disallows {
        if rule == "/" {
            return false;
        }
        if let Some(prefix) = rule.strip_suffix('*') {
            if !prefix.is_empty() && path.starts_with(prefix) {
                return false;
            }
        } else if path == rule {
            return false;
        }
    }
    true
}

/// Case-insensitive `Directive: value` line parse.
fn strip_directive<'a>(line: &'a str, directive: &str) -> Option<&'a str> {
    let (name, value) = line.split_once(':')?;
    if name.trim().eq_ignore_ascii_case(directive) {
        Some(value.trim())
    } else {
        None
    }
}
