use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use card_intel::api;
use card_intel::application::scheduler;
use card_intel::application::{EntityResolver, PipelineOrchestrator, StrategyGenerator, UpsertEngine};
use card_intel::domain::run_state::RunStateManager;
use card_intel::domain::sources::scrape_sources;
use card_intel::infrastructure::config::AppConfig;
use card_intel::infrastructure::extraction::ContentExtractor;
use card_intel::infrastructure::logging::init_logging;
use card_intel::infrastructure::{
    ComplianceGate, DatabaseConnection, HttpClient, HttpClientConfig, LlmClient, LlmClientConfig,
    ReleaseRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;
    let config = AppConfig::load()?;

    let db = DatabaseConnection::new(&config.database.url, config.database.max_connections)
        .await
        .context("failed to open database")?;
    db.migrate().await.context("migration failed")?;
    let repository = ReleaseRepository::new(db.pool().clone());

    let llm = Arc::new(LlmClient::new(LlmClientConfig {
        api_key: config.llm.api_key.clone(),
        base_url: config.llm.base_url.clone(),
        request_timeout_secs: config.llm.request_timeout_secs,
    })?);
    if !llm.is_enabled() {
        info!("No LLM API key configured; AI extraction and strategies are disabled");
    }

    let extractor = ContentExtractor::new(
        Arc::clone(&llm),
        config.llm.extraction_model.clone(),
        config.llm.extraction_max_input_chars,
    );
    let gate = ComplianceGate::new(&config.pipeline.user_agent, config.pipeline.robots_timeout_secs)?;
    let http = HttpClient::new(HttpClientConfig {
        user_agent: config.pipeline.user_agent.clone(),
        timeout_secs: config.pipeline.fetch_timeout_secs,
        max_redirects: config.pipeline.max_redirects,
        max_requests_per_second: config.pipeline.max_requests_per_second,
    })?;
    let strategy = Arc::new(StrategyGenerator::new(
        repository.clone(),
        Arc::clone(&llm),
        config.strategy_model().to_string(),
    ));

    let pipeline = Arc::new(PipelineOrchestrator::new(
        scrape_sources(),
        gate,
        http,
        extractor,
        EntityResolver::new(repository.clone()),
        UpsertEngine::new(repository, Some(strategy)),
        Arc::new(RunStateManager::new()),
        Duration::from_millis(config.pipeline.inter_source_delay_ms),
    ));

    if config.pipeline.scheduled_hours_utc.is_empty() {
        info!("Scheduler disabled; runs are manual-trigger only");
    } else {
        scheduler::spawn_scheduler(
            Arc::clone(&pipeline),
            config.pipeline.scheduled_hours_utc.clone(),
        );
    }

    let app = api::router(api::ApiState { pipeline });
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind_addr))?;
    info!("Card Intel listening on {}", config.server.bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
