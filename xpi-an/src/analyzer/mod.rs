//! Session analysis job
//!
//! Steps for one session:
//! 1. Load the session; stop early if it is already processed
//! 2. Load its step records joined with the question pairs, in question order
//! 3. Judge each record with the chat model, sequentially (fallback per record)
//! 4. Summarize across records (model synthesis, statistical fallback)
//! 5. Commit artifacts, summary and the processed flag in one transaction
//!
//! Model calls all happen before the write transaction opens.

pub mod prompts;
pub mod step;
pub mod summary;

pub use step::{analyze_step, AnalysisResult, StepInput};
pub use summary::{summarize, SummaryDraft, SummarySource};

use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use xpi_common::db::SessionStatus;
use xpi_common::{Error, Result};

use crate::db::analysis::{commit_analysis, CommitOutcome};
use crate::db::sessions;
use crate::llm::ChatModel;

/// What a job run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Artifacts and summary were written and the session marked processed
    Processed {
        artifact_count: usize,
        summary_source: SummarySource,
    },
    /// Session was processed before this run (or by a concurrent one)
    AlreadyProcessed,
}

/// Runs the analysis job against the shared database
#[derive(Clone)]
pub struct SessionAnalyzer {
    db: SqlitePool,
    model: Arc<dyn ChatModel>,
}

impl SessionAnalyzer {
    pub fn new(db: SqlitePool, model: Arc<dyn ChatModel>) -> Self {
        Self { db, model }
    }

    /// Analyze one completed session
    ///
    /// Errors: `NotFound` for an unknown session, `Conflict` for a session
    /// that is not completed yet, database errors from the final commit.
    pub async fn analyze_session(&self, session_id: Uuid) -> Result<AnalysisOutcome> {
        let session = sessions::get_session(&self.db, session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Interview session {}", session_id)))?;

        if session.processed {
            info!(session_id = %session_id, "Session already processed, skipping");
            return Ok(AnalysisOutcome::AlreadyProcessed);
        }

        if session.status != SessionStatus::Completed {
            return Err(Error::Conflict(format!(
                "Interview session {} is not completed",
                session_id
            )));
        }

        let inputs = sessions::load_step_inputs(&self.db, session_id).await?;
        if inputs.is_empty() {
            warn!(session_id = %session_id, "No step records found for session");
        }
        info!(session_id = %session_id, steps = inputs.len(), "Analyzing session");

        let mut artifacts = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let result = analyze_step(self.model.as_ref(), input).await;
            artifacts.push((input.question_pair_id, result));
        }

        let results: Vec<AnalysisResult> = artifacts.iter().map(|(_, r)| r.clone()).collect();
        let summary = summarize(self.model.as_ref(), &results).await;

        match commit_analysis(&self.db, session_id, &artifacts, &summary).await? {
            CommitOutcome::Committed => {
                info!(
                    session_id = %session_id,
                    artifacts = artifacts.len(),
                    summary_source = ?summary.source,
                    average_severity = summary.insights.average_severity_score,
                    "Session analysis complete"
                );
                Ok(AnalysisOutcome::Processed {
                    artifact_count: artifacts.len(),
                    summary_source: summary.source,
                })
            }
            CommitOutcome::AlreadyProcessed => {
                info!(session_id = %session_id, "Session processed concurrently, results discarded");
                Ok(AnalysisOutcome::AlreadyProcessed)
            }
        }
    }
}
