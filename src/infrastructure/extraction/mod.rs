//! Extraction strategies: deterministic parsers for known page shapes, AI
//! extraction for everything else.

pub mod ai;
pub mod deterministic;

use std::sync::Arc;

use crate::domain::extraction::ExtractedPayload;
use crate::domain::sources::ReleaseIntelSource;
use crate::infrastructure::llm::LlmClient;

pub use ai::AiExtractor;

/// Source ids with a hand-written parser; everything else goes to the model.
const EXPANSIONS_API_SOURCE: &str = "pokemon-com-expansions";
const SET_PAGE_SOURCES: &[&str] = &["pokemon-com-mega-evolution"];

/// Routes fetched content to the right extraction strategy per source.
pub struct ContentExtractor {
    llm: Arc<LlmClient>,
    extraction_model: String,
    max_input_chars: usize,
}

impl ContentExtractor {
    pub fn new(llm: Arc<LlmClient>, extraction_model: String, max_input_chars: usize) -> Self {
        Self {
            llm,
            extraction_model,
            max_input_chars,
        }
    }

    pub async fn extract(&self, source: &ReleaseIntelSource, body: &str) -> ExtractedPayload {
        if source.id == EXPANSIONS_API_SOURCE {
            return deterministic::parse_expansions_api(body);
        }
        if SET_PAGE_SOURCES.contains(&source.id.as_str()) {
            return deterministic::parse_set_page(body, &source.url);
        }
        AiExtractor::new(&self.llm, &self.extraction_model, self.max_input_chars)
            .extract(body, &source.name, Some(source.category))
            .await
    }
}
