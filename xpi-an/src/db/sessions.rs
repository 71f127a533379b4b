//! Session and step record queries

use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use xpi_common::db::{parse_uuid, AnswerChoice, InterviewSession, SessionStatus};
use xpi_common::transcript::TranscriptKind;
use xpi_common::{Result, Transcript};

use crate::analyzer::StepInput;

/// Load a session by id
pub async fn get_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<InterviewSession>> {
    let row = sqlx::query(
        r#"
        SELECT id, interview_link_id, started_at, completed_at, status, processed
        FROM interview_sessions
        WHERE id = ?
        "#,
    )
    .bind(session_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(InterviewSession::from_row).transpose()
}

/// Completed sessions that have not been analyzed yet, oldest first
pub async fn list_pending_sessions(pool: &SqlitePool) -> Result<Vec<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT id FROM interview_sessions
        WHERE status = ? AND processed = 0
        ORDER BY COALESCE(completed_at, started_at) ASC
        "#,
    )
    .bind(SessionStatus::Completed.as_str())
    .fetch_all(pool)
    .await?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}

/// Step records of a session joined with their question pairs, in question order
pub async fn load_step_inputs(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<StepInput>> {
    let rows = sqlx::query(
        r#"
        SELECT
            sr.id AS step_record_id,
            sr.preferred_answer,
            sr.transcript_kind,
            sr.transcript,
            qp.id AS question_pair_id,
            qp.question_text,
            qp.answer_a,
            qp.answer_b
        FROM step_records sr
        JOIN question_pairs qp ON sr.question_pair_id = qp.id
        WHERE sr.session_id = ?
        ORDER BY qp.sort_order ASC, sr.created_at ASC
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<StepInput> {
            let kind: TranscriptKind = row.try_get::<String, _>("transcript_kind")?.parse()?;
            let preferred: Option<String> = row.try_get("preferred_answer")?;
            let preferred_answer = preferred
                .as_deref()
                .map(str::parse::<AnswerChoice>)
                .transpose()?;

            Ok(StepInput {
                step_record_id: parse_uuid(&row.try_get::<String, _>("step_record_id")?)?,
                question_pair_id: parse_uuid(&row.try_get::<String, _>("question_pair_id")?)?,
                preferred_answer,
                transcript: Transcript::from_stored(kind, row.try_get("transcript")?)?,
                question_text: row.try_get("question_text")?,
                answer_a: row.try_get("answer_a")?,
                answer_b: row.try_get("answer_b")?,
            })
        })
        .collect()
}
