//! Pipeline use-cases built on the domain and infrastructure layers.

pub mod entity_resolver;
pub mod pipeline;
pub mod reconciler;
pub mod scheduler;
pub mod strategy;
pub mod upsert;

pub use entity_resolver::EntityResolver;
pub use pipeline::PipelineOrchestrator;
pub use reconciler::MergedCandidate;
pub use strategy::StrategyGenerator;
pub use upsert::UpsertEngine;
