//! Minimal chat-completions client for structured JSON extraction.
//!
//! Talks to any OpenAI-compatible endpoint. A missing API key disables the
//! client rather than failing startup; callers decide whether that means an
//! empty extraction or a skipped strategy.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub request_timeout_secs: u64,
}

pub struct LlmClient {
    client: reqwest::Client,
    config: LlmClientConfig,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("failed to build LLM client")?;
        Ok(Self { client, config })
    }

    /// Whether a credential is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Run one JSON-mode completion. Returns `Ok(None)` when the client is
    /// disabled or the service produced no content; transport and status
    /// failures surface as errors for the caller to downgrade.
    pub async fn complete_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
    ) -> Result<Option<String>> {
        let Some(api_key) = &self.config.api_key else {
            return Ok(None);
        };

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            temperature,
        };

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        debug!("LLM completion request to {url} (model {model})");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .context("LLM request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("LLM endpoint returned status {status}");
        }

        let parsed: ChatResponse = response.json().await.context("invalid LLM response body")?;
        Ok(parsed.choices.into_iter().next().and_then(|c| c.message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_returns_none_without_network() {
        let client = LlmClient::new(LlmClientConfig {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap();
        assert!(!client.is_enabled());
        let out = client
            .complete_json("gpt-4o-mini", "system", "user", 0.1)
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
