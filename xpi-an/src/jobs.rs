//! Background analysis job runner
//!
//! At most one run per session is active inside this process; a trigger for
//! a session that is already running returns without doing anything.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};
use uuid::Uuid;
use xpi_common::Result;

use crate::analyzer::AnalysisOutcome;
use crate::AppState;

/// Session ids with a job currently running
pub type InFlightSet = Arc<RwLock<HashSet<Uuid>>>;

/// Removes the session from the in-flight set when dropped
pub struct InFlightGuard {
    set: InFlightSet,
    session_id: Uuid,
}

impl InFlightGuard {
    /// Mark `session_id` as running; `None` if it already is
    pub fn acquire(set: &InFlightSet, session_id: Uuid) -> Option<Self> {
        let inserted = set
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id);

        inserted.then(|| Self {
            set: Arc::clone(set),
            session_id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.session_id);
    }
}

/// True if a job for `session_id` is running
pub fn is_in_flight(set: &InFlightSet, session_id: Uuid) -> bool {
    set.read()
        .unwrap_or_else(PoisonError::into_inner)
        .contains(&session_id)
}

/// Run the analysis job for one session
///
/// Returns `Ok(None)` when a run for the session is already in flight.
/// Failures are logged and recorded as the service's last error.
pub async fn run_analysis_job(state: &AppState, session_id: Uuid) -> Result<Option<AnalysisOutcome>> {
    let Some(_guard) = InFlightGuard::acquire(&state.in_flight, session_id) else {
        debug!(session_id = %session_id, "Analysis already running, ignoring trigger");
        return Ok(None);
    };

    match state.analyzer.analyze_session(session_id).await {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Analysis job failed");
            *state.last_error.write().await = Some(format!("Session {}: {}", session_id, e));
            Err(e)
        }
    }
}

/// Run the job on a background task
pub fn spawn_analysis_job(state: AppState, session_id: Uuid) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        // Errors were already logged and recorded by run_analysis_job
        let _ = run_analysis_job(&state, session_id).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_blocks_second_acquire_until_dropped() {
        let set: InFlightSet = Arc::default();
        let id = Uuid::new_v4();

        let guard = InFlightGuard::acquire(&set, id).expect("first acquire");
        assert!(is_in_flight(&set, id));
        assert!(InFlightGuard::acquire(&set, id).is_none());

        drop(guard);
        assert!(!is_in_flight(&set, id));
        assert!(InFlightGuard::acquire(&set, id).is_some());
    }

    #[test]
    fn test_guards_for_different_sessions_coexist() {
        let set: InFlightSet = Arc::default();
        let _a = InFlightGuard::acquire(&set, Uuid::new_v4()).unwrap();
        let _b = InFlightGuard::acquire(&set, Uuid::new_v4()).unwrap();
        assert_eq!(set.read().unwrap().len(), 2);
    }
}
