//! HTTP client for source fetching.
//!
//! Wraps `reqwest` with the pipeline's politeness settings: identifying user
//! agent, bounded redirects, request timeout and a direct rate limiter. No
//! retries here; a failed source is skipped for the run and retried on the
//! next cycle.

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use thiserror::Error;
use tracing::debug;

/// Fetch failure taxonomy; every variant skips the source, never the run.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} returned status {status}")]
    Status { url: String, status: StatusCode },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Client configuration for polite crawling.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_redirects: usize,
    pub max_requests_per_second: u32,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; CardIntelBot/1.0; +https://cardintel.app)"
                .to_string(),
            timeout_secs: 15,
            max_redirects: 3,
            max_requests_per_second: 2,
        }
    }
}

/// Rate-limited HTTP client shared by every fetch in a pipeline run.
pub struct HttpClient {
    client: reqwest::Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    config: HttpClientConfig,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("invalid user agent")?,
        );

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .context("failed to build HTTP client")?;

        let quota = Quota::per_second(
            NonZeroU32::new(config.max_requests_per_second)
                .context("rate limit must be greater than zero")?,
        );

        Ok(Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
            config,
        })
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Fetch a page as HTML text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_with_accept(url, "text/html").await
    }

    /// Fetch an API endpoint as JSON text.
    pub async fn get_json_text(&self, url: &str) -> Result<String, FetchError> {
        self.get_with_accept(url, "application/json").await
    }

    async fn get_with_accept(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        debug!("Fetching {url}");

        let response = self
            .client
            .get(url)
            .header(ACCEPT, accept)
            .send()
            .await
            .map_err(|e| Self::classify(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|e| Self::classify(url, e))
    }

    fn classify(url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Network {
                url: url.to_string(),
                source: error,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn client_builds_with_default_config() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = HttpClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(HttpClient::new(config).is_err());
    }
}
