//! Fixed-hour UTC scheduler for the release sync pipeline.
//!
//! Sleeps until the next configured hour boundary and fires a scheduled
//! trigger. A rejected trigger (manual run already in flight) is logged and
//! waited out until the next slot.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::pipeline::PipelineOrchestrator;
use crate::domain::run_state::{BeginOutcome, RunTrigger};

/// Next scheduled instant strictly after `now`. Hours outside 0..24 are
/// ignored; with no valid hours the fallback is six hours out.
pub fn next_run_after(now: DateTime<Utc>, hours: &[u32]) -> DateTime<Utc> {
    let mut hours: Vec<u32> = hours.iter().copied().filter(|h| *h < 24).collect();
    hours.sort_unstable();
    hours.dedup();
    if hours.is_empty() {
        return now + Duration::hours(6);
    }

    let today = now.date_naive();
    for &hour in &hours {
        if let Some(candidate) = today.and_hms_opt(hour, 0, 0) {
            let candidate = candidate.and_utc();
            if candidate > now {
                return candidate;
            }
        }
    }
    match (today + Duration::days(1)).and_hms_opt(hours[0], 0, 0) {
        Some(tomorrow) => tomorrow.and_utc(),
        None => now + Duration::hours(6),
    }
}

/// Run the scheduler loop until the process exits.
pub fn spawn_scheduler(
    pipeline: Arc<PipelineOrchestrator>,
    hours: Vec<u32>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, &hours);
            info!("Next scheduled release sync at {next}");
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match pipeline.trigger(RunTrigger::Scheduled) {
                BeginOutcome::Accepted(run) => {
                    info!("Scheduled release sync {} accepted", run.run_id);
                }
                BeginOutcome::AlreadyRunning(run) => {
                    warn!(
                        "Scheduled release sync skipped; run {} still in flight",
                        run.run_id
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn picks_the_next_slot_later_today() {
        let next = next_run_after(at(7, 30), &[6, 12, 18]);
        assert_eq!(next, at(12, 0));
    }

    #[test]
    fn exact_slot_time_advances_to_the_following_slot() {
        let next = next_run_after(at(12, 0), &[6, 12, 18]);
        assert_eq!(next, at(18, 0));
    }

    #[test]
    fn wraps_to_the_first_slot_tomorrow() {
        let next = next_run_after(at(19, 0), &[6, 12, 18]);
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 6, 2, 6, 0, 0).unwrap());
    }

    #[test]
    fn unordered_and_invalid_hours_are_handled() {
        let next = next_run_after(at(5, 0), &[18, 99, 6, 12]);
        assert_eq!(next, at(6, 0));
    }

    #[test]
    fn no_valid_hours_falls_back() {
        let next = next_run_after(at(5, 0), &[]);
        assert_eq!(next, at(11, 0));
    }
}
