//! Buy/skip strategy generation for newly ingested or changed products.
//!
//! Runs out-of-band from the pipeline: the upsert engine fires one task per
//! qualifying product and never waits on the result. A disabled LLM client
//! turns generation into a logged no-op.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{info, warn};

use crate::infrastructure::llm::LlmClient;
use crate::infrastructure::release_repository::ReleaseRepository;

const STRATEGY_SYSTEM: &str = r#"You are a trading card market analyst. Given a sealed product and its release context, output a single JSON object with this exact shape (no markdown, no code fence):

{
  "primary": "buy_msrp | buy_below_msrp | wait_for_reprint | skip | watch",
  "confidence": 0-100,
  "reasonSummary": "One or two sentences explaining the call",
  "keyFactors": ["Short bullet phrases behind the call"]
}

Rules:
- Base the call only on the provided data; do not invent market prices.
- Prefer "watch" over a strong call when the data is thin or unconfirmed.
- Output only valid JSON, no other text."#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStrategy {
    #[serde(default)]
    primary: String,
    #[serde(default)]
    confidence: i64,
    #[serde(default)]
    reason_summary: String,
    #[serde(default)]
    key_factors: Option<Vec<String>>,
}

/// Validated strategy ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedStrategy {
    pub primary: String,
    pub confidence: i64,
    pub reason_summary: String,
    pub key_factors: Vec<String>,
}

/// Parse and validate one strategy response. `None` means the model output
/// did not conform and nothing should be stored.
pub fn parse_strategy_response(content: &str) -> Option<ParsedStrategy> {
    let raw: RawStrategy = serde_json::from_str(content).ok()?;
    let primary = raw.primary.trim().to_string();
    let reason_summary = raw.reason_summary.trim().to_string();
    if primary.is_empty() || reason_summary.is_empty() {
        return None;
    }
    Some(ParsedStrategy {
        primary,
        confidence: raw.confidence.clamp(0, 100),
        reason_summary,
        key_factors: raw.key_factors.unwrap_or_default(),
    })
}

pub struct StrategyGenerator {
    repository: ReleaseRepository,
    llm: Arc<LlmClient>,
    model: String,
}

impl StrategyGenerator {
    pub fn new(repository: ReleaseRepository, llm: Arc<LlmClient>, model: String) -> Self {
        Self { repository, llm, model }
    }

    /// Generate and persist one strategy for a product. Callers run this in
    /// a detached task; errors are theirs to log.
    pub async fn generate_for_product(&self, product_id: &str) -> Result<()> {
        if !self.llm.is_enabled() {
            warn!("LLM credentials not configured; skipping strategy for product {product_id}");
            return Ok(());
        }

        let Some(product) = self.repository.find_product_by_id(product_id).await? else {
            bail!("product {product_id} disappeared before strategy generation");
        };
        let release = self.repository.find_release_by_id(&product.release_id).await?;

        let facts = serde_json::json!({
            "product": {
                "name": product.name,
                "productType": product.product_type,
                "category": product.category,
                "msrp": product.msrp,
                "estimatedResale": product.estimated_resale,
                "releaseDate": product.release_date,
                "preorderDate": product.preorder_date,
                "contentsSummary": product.contents_summary,
                "sourceTier": product.source_tier,
                "confidence": product.confidence,
            },
            "release": release.map(|r| serde_json::json!({
                "name": r.name,
                "releaseDate": r.release_date,
                "isReleased": r.is_released,
                "topChases": r.top_chases,
                "description": r.description,
            })),
        });
        let user = format!("Evaluate this sealed product:\n\n{facts}");

        let content = self
            .llm
            .complete_json(&self.model, STRATEGY_SYSTEM, &user, 0.2)
            .await
            .context("strategy completion failed")?;
        let Some(content) = content else {
            return Ok(());
        };
        let Some(strategy) = parse_strategy_response(&content) else {
            bail!("strategy response for product {product_id} did not conform");
        };

        let key_factors_json = if strategy.key_factors.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&strategy.key_factors)?)
        };
        self.repository
            .insert_strategy(
                product_id,
                &strategy.primary,
                strategy.confidence,
                &strategy.reason_summary,
                key_factors_json.as_deref(),
            )
            .await?;
        info!(
            "Stored strategy '{}' ({}) for product {product_id}",
            strategy.primary, strategy.confidence
        );
        Ok(())
    }
}
