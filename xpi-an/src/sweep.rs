//! Reconciliation sweep
//!
//! Periodically runs the analysis job for every completed session that is
//! still unprocessed. Covers triggers lost while this service was down and
//! jobs whose commit failed.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db::sessions::list_pending_sessions;
use crate::jobs::run_analysis_job;
use crate::AppState;

/// Run one pass; returns the number of sessions newly processed
pub async fn sweep_once(state: &AppState, cancel: &CancellationToken) -> usize {
    let pending = match list_pending_sessions(&state.db).await {
        Ok(pending) => pending,
        Err(e) => {
            warn!(error = %e, "Sweep could not list pending sessions");
            return 0;
        }
    };

    if pending.is_empty() {
        debug!("Sweep found no pending sessions");
        return 0;
    }

    info!(count = pending.len(), "Sweep found pending sessions");

    let mut processed = 0;
    for session_id in pending {
        if cancel.is_cancelled() {
            break;
        }
        if let Ok(Some(crate::analyzer::AnalysisOutcome::Processed { .. })) =
            run_analysis_job(state, session_id).await
        {
            processed += 1;
        }
    }
    processed
}

/// Sweep every `interval` until `cancel` fires
///
/// The first pass runs immediately.
pub async fn run_sweep(state: AppState, interval: Duration, cancel: CancellationToken) {
    info!(interval_secs = interval.as_secs(), "Reconciliation sweep started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                sweep_once(&state, &cancel).await;
            }
        }
    }

    info!("Reconciliation sweep stopped");
}
