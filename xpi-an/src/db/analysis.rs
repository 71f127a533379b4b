//! Persisting analysis results
//!
//! Artifacts, the summary and the `processed` flag are written in one
//! transaction. The flag is claimed first with a check-and-set so a second
//! writer for the same session rolls back without inserting anything.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;
use xpi_common::db::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use xpi_common::{ids, Result};

use crate::analyzer::{AnalysisResult, SummaryDraft};

/// Result of a commit attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Another run already marked the session processed; nothing written
    AlreadyProcessed,
}

/// Atomically claim the session and store its artifacts and summary
///
/// `artifacts` pairs each question pair id with its judgment.
pub async fn commit_analysis(
    pool: &SqlitePool,
    session_id: Uuid,
    artifacts: &[(Uuid, AnalysisResult)],
    summary: &SummaryDraft,
) -> Result<CommitOutcome> {
    retry_on_lock("commit_analysis", DEFAULT_MAX_LOCK_WAIT_MS, || {
        commit_once(pool, session_id, artifacts, summary)
    })
    .await
}

async fn commit_once(
    pool: &SqlitePool,
    session_id: Uuid,
    artifacts: &[(Uuid, AnalysisResult)],
    summary: &SummaryDraft,
) -> Result<CommitOutcome> {
    let mut tx = pool.begin().await?;

    match write_results(&mut tx, session_id, artifacts, summary).await {
        Ok(CommitOutcome::Committed) => {
            tx.commit().await?;
            debug!(session_id = %session_id, artifacts = artifacts.len(), "Analysis committed");
            Ok(CommitOutcome::Committed)
        }
        Ok(CommitOutcome::AlreadyProcessed) => {
            tx.rollback().await?;
            Ok(CommitOutcome::AlreadyProcessed)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(session_id = %session_id, error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn write_results(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: Uuid,
    artifacts: &[(Uuid, AnalysisResult)],
    summary: &SummaryDraft,
) -> Result<CommitOutcome> {
    let session_id_str = session_id.to_string();
    let now = Utc::now().to_rfc3339();

    let claimed = sqlx::query("UPDATE interview_sessions SET processed = 1 WHERE id = ? AND processed = 0")
        .bind(&session_id_str)
        .execute(&mut **tx)
        .await?
        .rows_affected();

    if claimed == 0 {
        return Ok(CommitOutcome::AlreadyProcessed);
    }

    for (question_pair_id, result) in artifacts {
        sqlx::query(
            r#"
            INSERT INTO analysis_artifacts (
                id, session_id, question_pair_id, winner_flag, severity_score,
                rationale_digest, knowledge_gaps, prompt_suggestions, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ids::generate().to_string())
        .bind(&session_id_str)
        .bind(question_pair_id.to_string())
        .bind(result.winner_flag.as_str())
        .bind(result.severity_score)
        .bind(&result.rationale_digest)
        .bind(serde_json::to_string(&result.knowledge_gaps)?)
        .bind(serde_json::to_string(&result.prompt_suggestions)?)
        .bind(&now)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO session_summaries (id, session_id, aggregated_insights, overall_feedback, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(ids::generate().to_string())
    .bind(&session_id_str)
    .bind(serde_json::to_string(&summary.insights)?)
    .bind(&summary.overall_feedback)
    .bind(&now)
    .execute(&mut **tx)
    .await?;

    Ok(CommitOutcome::Committed)
}
