//! In-process run state for the release sync pipeline.
//!
//! Guarantees single-flight execution: at most one run per pipeline instance
//! may be `running` at any instant. The guard is an atomic check-and-set on a
//! mutex-protected record, never a blocking wait, so a manual trigger arriving
//! while a scheduled run is active gets an immediate structured rejection.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Manual,
    Scheduled,
}

/// Lifecycle of one run: idle → running → {completed, failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
}

/// Aggregate counters for one completed pipeline cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub sources: usize,
    pub sources_skipped: usize,
    pub sources_failed: usize,
    pub candidates: usize,
    pub releases_created: usize,
    pub products_upserted: usize,
    pub changes_detected: usize,
    pub strategies_spawned: usize,
    pub persistence_failures: usize,
}

/// Record of one pipeline run, kept for the lifetime of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRunRecord {
    pub run_id: String,
    pub trigger: RunTrigger,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub result: Option<PipelineSummary>,
    pub error: Option<String>,
}

/// Outcome of a trigger attempt.
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// A new run was started; the caller owns driving it to completion.
    Accepted(PipelineRunRecord),
    /// Another run is in flight; its record is returned unchanged.
    AlreadyRunning(PipelineRunRecord),
}

/// Snapshot returned by the status surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStateSnapshot {
    pub status: RunStatus,
    pub current_run: Option<PipelineRunRecord>,
    pub last_run: Option<PipelineRunRecord>,
}

#[derive(Debug, Default)]
struct RunStateInner {
    current: Option<PipelineRunRecord>,
    last: Option<PipelineRunRecord>,
}

/// Thread-safe single-flight run-state holder, one per pipeline type.
#[derive(Debug, Default)]
pub struct RunStateManager {
    inner: Mutex<RunStateInner>,
}

fn create_run_id() -> String {
    let mut suffix = String::with_capacity(6);
    for _ in 0..6 {
        suffix.push(fastrand::alphanumeric());
    }
    format!("release_{}_{}", Utc::now().timestamp_millis(), suffix)
}

impl RunStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-set trigger: rejects with the in-flight record when a run is
    /// already active, otherwise allocates a new running record.
    pub fn begin(&self, trigger: RunTrigger) -> BeginOutcome {
        let mut inner = self.inner.lock().expect("run-state mutex poisoned");
        if let Some(current) = &inner.current {
            if current.status == RunStatus::Running {
                return BeginOutcome::AlreadyRunning(current.clone());
            }
        }
        let run = PipelineRunRecord {
            run_id: create_run_id(),
            trigger,
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: None,
            result: None,
            error: None,
        };
        inner.current = Some(run.clone());
        BeginOutcome::Accepted(run)
    }

    /// Complete the current run. Completions carrying a stale run id are
    /// ignored; single-flight means they should not occur.
    pub fn finish_success(&self, run_id: &str, result: PipelineSummary) {
        self.finish(run_id, RunStatus::Completed, Some(result), None);
    }

    pub fn finish_failure(&self, run_id: &str, error: String) {
        self.finish(run_id, RunStatus::Failed, None, Some(error));
    }

    fn finish(
        &self,
        run_id: &str,
        status: RunStatus,
        result: Option<PipelineSummary>,
        error: Option<String>,
    ) {
        let mut inner = self.inner.lock().expect("run-state mutex poisoned");
        let Some(current) = inner.current.take() else {
            return;
        };
        if current.run_id != run_id {
            inner.current = Some(current);
            return;
        }
        let ended_at = Utc::now();
        let finished = PipelineRunRecord {
            status,
            ended_at: Some(ended_at),
            duration_ms: Some((ended_at - current.started_at).num_milliseconds()),
            result,
            error,
            ..current
        };
        inner.last = Some(finished);
    }

    /// Current run if any, else the last finished run, else idle.
    pub fn state(&self) -> RunStateSnapshot {
        let inner = self.inner.lock().expect("run-state mutex poisoned");
        if let Some(current) = &inner.current {
            return RunStateSnapshot {
                status: RunStatus::Running,
                current_run: Some(current.clone()),
                last_run: inner.last.clone(),
            };
        }
        if let Some(last) = &inner.last {
            return RunStateSnapshot {
                status: last.status,
                current_run: None,
                last_run: Some(last.clone()),
            };
        }
        RunStateSnapshot {
            status: RunStatus::Idle,
            current_run: None,
            last_run: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_trigger_is_rejected_while_running() {
        let manager = RunStateManager::new();
        let first = match manager.begin(RunTrigger::Scheduled) {
            BeginOutcome::Accepted(run) => run,
            BeginOutcome::AlreadyRunning(_) => panic!("fresh manager must accept"),
        };
        match manager.begin(RunTrigger::Manual) {
            BeginOutcome::AlreadyRunning(run) => assert_eq!(run.run_id, first.run_id),
            BeginOutcome::Accepted(_) => panic!("single-flight violated"),
        }
    }

    #[test]
    fn finish_transitions_to_completed_and_frees_the_slot() {
        let manager = RunStateManager::new();
        let run = match manager.begin(RunTrigger::Manual) {
            BeginOutcome::Accepted(run) => run,
            _ => unreachable!(),
        };
        manager.finish_success(&run.run_id, PipelineSummary::default());

        let state = manager.state();
        assert_eq!(state.status, RunStatus::Completed);
        assert!(state.current_run.is_none());
        let last = state.last_run.expect("last run recorded");
        assert_eq!(last.run_id, run.run_id);
        assert!(last.duration_ms.is_some());
        assert!(last.result.is_some());

        // The slot is free again.
        assert!(matches!(manager.begin(RunTrigger::Manual), BeginOutcome::Accepted(_)));
    }

    #[test]
    fn stale_completion_is_ignored() {
        let manager = RunStateManager::new();
        let run = match manager.begin(RunTrigger::Manual) {
            BeginOutcome::Accepted(run) => run,
            _ => unreachable!(),
        };
        manager.finish_success("release_0_stale", PipelineSummary::default());
        let state = manager.state();
        assert_eq!(state.status, RunStatus::Running);
        assert_eq!(state.current_run.unwrap().run_id, run.run_id);
    }

    #[test]
    fn failure_is_reported_with_error() {
        let manager = RunStateManager::new();
        let run = match manager.begin(RunTrigger::Scheduled) {
            BeginOutcome::Accepted(run) => run,
            _ => unreachable!(),
        };
        manager.finish_failure(&run.run_id, "database unavailable".to_string());
        let state = manager.state();
        assert_eq!(state.status, RunStatus::Failed);
        assert_eq!(state.last_run.unwrap().error.as_deref(), Some("database unavailable"));
    }

    #[test]
    fn idle_before_any_run() {
        let manager = RunStateManager::new();
        let state = manager.state();
        assert_eq!(state.status, RunStatus::Idle);
        assert!(state.current_run.is_none());
        assert!(state.last_run.is_none());
    }
}
