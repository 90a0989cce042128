//! Admin HTTP surface: manual trigger, run status and a health probe.
//!
//! The trigger endpoint is fire-and-forget: both outcomes answer with the
//! same `{run_id, started_at}` shape — 202 for a newly started run, 409 for
//! the run already in flight.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::application::pipeline::PipelineOrchestrator;
use crate::domain::run_state::{BeginOutcome, RunStateSnapshot, RunTrigger};

#[derive(Clone)]
pub struct ApiState {
    pub pipeline: Arc<PipelineOrchestrator>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/admin/release-sync", post(trigger_release_sync))
        .route("/api/admin/release-sync/status", get(release_sync_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn trigger_release_sync(State(state): State<ApiState>) -> impl IntoResponse {
    match state.pipeline.trigger(RunTrigger::Manual) {
        BeginOutcome::Accepted(run) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "run_id": run.run_id,
                "started_at": run.started_at,
            })),
        ),
        BeginOutcome::AlreadyRunning(run) => (
            StatusCode::CONFLICT,
            Json(json!({
                "run_id": run.run_id,
                "started_at": run.started_at,
            })),
        ),
    }
}

async fn release_sync_status(State(state): State<ApiState>) -> Json<RunStateSnapshot> {
    Json(state.pipeline.run_state().state())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::application::entity_resolver::EntityResolver;
    use crate::application::upsert::UpsertEngine;
    use crate::domain::run_state::{RunStateManager, RunStatus};
    use crate::infrastructure::database_connection::DatabaseConnection;
    use crate::infrastructure::extraction::ContentExtractor;
    use crate::infrastructure::http_client::{HttpClient, HttpClientConfig};
    use crate::infrastructure::llm::{LlmClient, LlmClientConfig};
    use crate::infrastructure::release_repository::ReleaseRepository;
    use crate::infrastructure::robots::ComplianceGate;

    async fn test_state() -> ApiState {
        let db = DatabaseConnection::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        let repository = ReleaseRepository::new(db.pool().clone());
        let llm = Arc::new(
            LlmClient::new(LlmClientConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                request_timeout_secs: 5,
            })
            .unwrap(),
        );
        ApiState {
            pipeline: Arc::new(PipelineOrchestrator::new(
                Vec::new(),
                ComplianceGate::new("test-agent", 1).unwrap(),
                HttpClient::new(HttpClientConfig::default()).unwrap(),
                ContentExtractor::new(llm, "gpt-4o-mini".to_string(), 1000),
                EntityResolver::new(repository.clone()),
                UpsertEngine::new(repository, None),
                Arc::new(RunStateManager::new()),
                Duration::from_millis(0),
            )),
        }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn status_starts_idle() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::get("/api/admin/release-sync/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let snapshot: RunStateSnapshot = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(snapshot.status, RunStatus::Idle);
        assert!(snapshot.current_run.is_none());
    }

    #[tokio::test]
    async fn trigger_is_accepted_with_a_run_id() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::post("/api/admin/release-sync")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert!(body["run_id"].as_str().unwrap().starts_with("release_"));
    }

    #[tokio::test]
    async fn trigger_conflicts_with_the_in_flight_run_id() {
        let state = test_state().await;
        // Occupy the single-flight slot directly so the rejection is
        // deterministic regardless of cycle duration.
        let occupied = match state.pipeline.run_state().begin(RunTrigger::Scheduled) {
            BeginOutcome::Accepted(run) => run,
            BeginOutcome::AlreadyRunning(_) => panic!("fresh manager must accept"),
        };

        let app = router(state);
        let response = app
            .oneshot(
                Request::post("/api/admin/release-sync")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // Same body shape as the accepted case, carrying the existing run.
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["run_id"].as_str(), Some(occupied.run_id.as_str()));
        assert!(body["started_at"].is_string());
    }
}
