//! Application configuration.
//!
//! Defaults cover local development; an optional JSON config file
//! (`CARD_INTEL_CONFIG`) and a handful of environment variables override
//! individual settings. Secrets (the LLM API key) come from the environment
//! only and are never written back to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the admin/status HTTP surface binds to.
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:4100".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/card_intel.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Identifying user agent sent on every outbound request.
    pub user_agent: String,
    /// Politeness delay between consecutive sources.
    pub inter_source_delay_ms: u64,
    /// Timeout for page/API fetches.
    pub fetch_timeout_secs: u64,
    /// Timeout for robots.txt fetches.
    pub robots_timeout_secs: u64,
    pub max_redirects: usize,
    /// Upper bound on outbound request rate, enforced by the client.
    pub max_requests_per_second: u32,
    /// Scheduled-run hours (UTC). Empty disables the scheduler.
    pub scheduled_hours_utc: Vec<u32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; CardIntelBot/1.0; +https://cardintel.app)"
                .to_string(),
            inter_source_delay_ms: 1500,
            fetch_timeout_secs: 15,
            robots_timeout_secs: 8,
            max_redirects: 3,
            max_requests_per_second: 2,
            scheduled_hours_utc: vec![6, 12, 18],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Missing key disables AI extraction and strategy generation; the
    /// pipeline still runs on deterministic sources.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub extraction_model: String,
    pub strategy_model: Option<String>,
    /// Page-content budget for extraction prompts; oversized pages are
    /// truncated head-and-tail.
    pub extraction_max_input_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            extraction_model: "gpt-4o-mini".to_string(),
            strategy_model: None,
            extraction_max_input_chars: 120_000,
            request_timeout_secs: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration: defaults, then the optional JSON file named by
    /// `CARD_INTEL_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("CARD_INTEL_CONFIG") {
            Ok(path) if !path.is_empty() => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                let parsed: AppConfig = serde_json::from_str(&raw)
                    .with_context(|| format!("invalid config file {path}"))?;
                info!("Loaded configuration from {path}");
                parsed
            }
            _ => AppConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CARD_INTEL_DATABASE_URL") {
            if !url.is_empty() {
                self.database.url = url;
            }
        }
        if let Ok(addr) = std::env::var("CARD_INTEL_BIND_ADDR") {
            if !addr.is_empty() {
                self.server.bind_addr = addr;
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("OPENAI_EXTRACTION_MODEL") {
            if !model.is_empty() {
                self.llm.extraction_model = model;
            }
        }
        if let Ok(model) = std::env::var("OPENAI_STRATEGY_MODEL") {
            if !model.is_empty() {
                self.llm.strategy_model = Some(model);
            }
        }
    }

    /// Model used for strategy generation; falls back to the extraction model.
    pub fn strategy_model(&self) -> &str {
        self.llm
            .strategy_model
            .as_deref()
            .unwrap_or(&self.llm.extraction_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.inter_source_delay_ms, 1500);
        assert_eq!(config.pipeline.fetch_timeout_secs, 15);
        assert_eq!(config.pipeline.robots_timeout_secs, 8);
        assert_eq!(config.pipeline.max_redirects, 3);
        assert_eq!(config.pipeline.scheduled_hours_utc, vec![6, 12, 18]);
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn partial_config_file_keeps_defaults_elsewhere() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"bind_addr": "0.0.0.0:9000"}}}}"#).unwrap();
        let raw = std::fs::read_to_string(file.path()).unwrap();
        let parsed: AppConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.server.bind_addr, "0.0.0.0:9000");
        assert_eq!(parsed.database.url, DatabaseConfig::default().url);
    }

    #[test]
    fn strategy_model_falls_back_to_extraction_model() {
        let mut config = AppConfig::default();
        assert_eq!(config.strategy_model(), "gpt-4o-mini");
        config.llm.strategy_model = Some("gpt-4.1".to_string());
        assert_eq!(config.strategy_model(), "gpt-4.1");
    }
}
