//! Project export as CSV
//!
//! One row per step record across all sessions of a project, joined with the
//! question pair, the analysis artifact (if any) and the session summary (if
//! any). Missing values are empty cells.

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use xpi_common::csv::write_csv;
use xpi_common::Result;

use crate::db::projects::require_project;

pub const EXPORT_COLUMNS: [&str; 18] = [
    "SessionID",
    "IntervieweeName",
    "StartTime",
    "CompletionTime",
    "Status",
    "Processed",
    "QuestionID",
    "QuestionText",
    "AnswerA",
    "AnswerB",
    "PreferredAnswer",
    "WinnerFlag",
    "SeverityScore",
    "RationaleDigest",
    "KnowledgeGaps",
    "PromptSuggestions",
    "SessionSummaryInsights",
    "SessionSummaryFeedback",
];

/// Build the export rows (cells in `EXPORT_COLUMNS` order)
pub async fn export_rows(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<Vec<String>>> {
    let rows = sqlx::query(
        r#"
        SELECT
            s.id AS session_id,
            l.interview_name,
            s.started_at,
            s.completed_at,
            s.status,
            s.processed,
            qp.question_id,
            qp.question_text,
            qp.answer_a,
            qp.answer_b,
            sr.preferred_answer,
            a.winner_flag,
            a.severity_score,
            a.rationale_digest,
            a.knowledge_gaps,
            a.prompt_suggestions,
            ss.aggregated_insights,
            ss.overall_feedback
        FROM interview_sessions s
        JOIN interview_links l ON s.interview_link_id = l.id
        JOIN step_records sr ON sr.session_id = s.id
        JOIN question_pairs qp ON sr.question_pair_id = qp.id
        LEFT JOIN analysis_artifacts a
            ON a.session_id = s.id AND a.question_pair_id = sr.question_pair_id
        LEFT JOIN session_summaries ss ON ss.session_id = s.id
        WHERE l.project_id = ?
        ORDER BY s.started_at ASC, s.id ASC, qp.sort_order ASC
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<Vec<String>> {
            let text = |column: &str| -> Result<String> {
                Ok(row.try_get::<Option<String>, _>(column)?.unwrap_or_default())
            };
            let processed: bool = row.try_get("processed")?;
            let severity: Option<f64> = row.try_get("severity_score")?;

            Ok(vec![
                text("session_id")?,
                text("interview_name")?,
                text("started_at")?,
                text("completed_at")?,
                text("status")?,
                processed.to_string(),
                text("question_id")?,
                text("question_text")?,
                text("answer_a")?,
                text("answer_b")?,
                text("preferred_answer")?,
                text("winner_flag")?,
                severity.map(|s| s.to_string()).unwrap_or_default(),
                text("rationale_digest")?,
                text("knowledge_gaps")?,
                text("prompt_suggestions")?,
                text("aggregated_insights")?,
                text("overall_feedback")?,
            ])
        })
        .collect()
}

/// Render the project export; the header is written even with no rows
pub async fn generate_project_export(pool: &SqlitePool, project_id: Uuid) -> Result<String> {
    require_project(pool, project_id).await?;
    let rows = export_rows(pool, project_id).await?;
    write_csv(&EXPORT_COLUMNS, &rows)
}
