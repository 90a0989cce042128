//! The release sync pipeline: fetch each source, extract candidates,
//! reconcile across sources and persist the result.
//!
//! Sources are processed sequentially with a politeness delay between them.
//! A single failing source never aborts the cycle; it is counted and the
//! loop moves on. Persistence failures are likewise isolated per candidate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::application::entity_resolver::EntityResolver;
use crate::application::reconciler;
use crate::application::upsert::UpsertEngine;
use crate::domain::extraction::ExtractedSetCandidate;
use crate::domain::run_state::{BeginOutcome, PipelineSummary, RunStateManager, RunTrigger};
use crate::domain::sources::ReleaseIntelSource;
use crate::infrastructure::extraction::ContentExtractor;
use crate::infrastructure::http_client::HttpClient;
use crate::infrastructure::robots::ComplianceGate;

pub struct PipelineOrchestrator {
    sources: Vec<ReleaseIntelSource>,
    gate: ComplianceGate,
    http: HttpClient,
    extractor: ContentExtractor,
    resolver: EntityResolver,
    upsert: UpsertEngine,
    run_state: Arc<RunStateManager>,
    inter_source_delay: Duration,
}

impl PipelineOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<ReleaseIntelSource>,
        gate: ComplianceGate,
        http: HttpClient,
        extractor: ContentExtractor,
        resolver: EntityResolver,
        upsert: UpsertEngine,
        run_state: Arc<RunStateManager>,
        inter_source_delay: Duration,
    ) -> Self {
        Self {
            sources,
            gate,
            http,
            extractor,
            resolver,
            upsert,
            run_state,
            inter_source_delay,
        }
    }

    pub fn run_state(&self) -> &Arc<RunStateManager> {
        &self.run_state
    }

    /// Try to start a run. On acceptance the cycle executes in a detached
    /// task and reports back through the run-state manager; the caller gets
    /// the run record immediately either way.
    pub fn trigger(self: &Arc<Self>, trigger: RunTrigger) -> BeginOutcome {
        let outcome = self.run_state.begin(trigger);
        if let BeginOutcome::Accepted(run) = &outcome {
            info!("Release sync run {} started ({trigger:?})", run.run_id);
            let pipeline = Arc::clone(self);
            let run_id = run.run_id.clone();
            tokio::spawn(async move {
                match pipeline.run_cycle().await {
                    Ok(summary) => {
                        info!(
                            "Release sync run {run_id} completed: {} candidates, \
                             {} releases created, {} products, {} changes",
                            summary.candidates,
                            summary.releases_created,
                            summary.products_upserted,
                            summary.changes_detected
                        );
                        pipeline.run_state.finish_success(&run_id, summary);
                    }
                    Err(e) => {
                        error!("Release sync run {run_id} failed: {e:#}");
                        pipeline.run_state.finish_failure(&run_id, format!("{e:#}"));
                    }
                }
            });
        }
        outcome
    }

    async fn run_cycle(&self) -> Result<PipelineSummary> {
        let mut summary = PipelineSummary {
            sources: self.sources.len(),
            ..Default::default()
        };

        let mut candidates: Vec<ExtractedSetCandidate> = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inter_source_delay).await;
            }

            if !self.gate.allows(&source.url).await {
                info!("Skipping {} per robots.txt", source.id);
                summary.sources_skipped += 1;
                continue;
            }

            let fetched = if source.wants_json() {
                self.http.get_json_text(&source.url).await
            } else {
                self.http.get_text(&source.url).await
            };
            let body = match fetched {
                Ok(body) => body,
                Err(e) => {
                    warn!("Fetch failed for {}: {e}", source.id);
                    summary.sources_failed += 1;
                    continue;
                }
            };

            let payload = self.extractor.extract(source, &body).await;
            if payload.is_empty() {
                info!("No candidates extracted from {}", source.id);
            }
            for set in payload.releases {
                candidates.push(ExtractedSetCandidate::from_set(set, source));
            }
        }

        let merged = reconciler::reconcile(candidates);
        summary.candidates = merged.len();

        for candidate in &merged {
            let resolved = match self.resolver.resolve(candidate).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!("Failed to resolve '{}': {e:#}", candidate.set_name);
                    summary.persistence_failures += 1;
                    continue;
                }
            };
            if resolved.created {
                summary.releases_created += 1;
            }
            match self.upsert.apply(&resolved.release, candidate).await {
                Ok(outcome) => {
                    summary.products_upserted += outcome.products_upserted;
                    summary.changes_detected += outcome.changes_detected;
                    summary.strategies_spawned += outcome.strategies_spawned;
                }
                Err(e) => {
                    warn!("Failed to upsert products of '{}': {e:#}", candidate.set_name);
                    summary.persistence_failures += 1;
                }
            }
        }

        Ok(summary)
    }
}
