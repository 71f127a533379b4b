//! Interview sessions and their summaries

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;
use xpi_common::db::{InterviewSession, SessionStatus, SessionSummary};
use xpi_common::{ids, Result};

/// Insert a new IN_PROGRESS session for a link
pub async fn create_session(tx: &mut Transaction<'_, Sqlite>, link_id: &str) -> Result<InterviewSession> {
    let session = InterviewSession {
        id: ids::generate(),
        interview_link_id: link_id.to_string(),
        started_at: Utc::now(),
        completed_at: None,
        status: SessionStatus::InProgress,
        processed: false,
    };

    sqlx::query(
        r#"
        INSERT INTO interview_sessions (id, interview_link_id, started_at, completed_at, status, processed)
        VALUES (?, ?, ?, NULL, ?, 0)
        "#,
    )
    .bind(session.id.to_string())
    .bind(&session.interview_link_id)
    .bind(session.started_at.to_rfc3339())
    .bind(session.status.as_str())
    .execute(&mut **tx)
    .await?;

    Ok(session)
}

pub async fn get_session(pool: &SqlitePool, session_id: Uuid) -> Result<Option<InterviewSession>> {
    let row = sqlx::query("SELECT * FROM interview_sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(InterviewSession::from_row).transpose()
}

/// Most recent IN_PROGRESS session of a link, if any
pub async fn find_in_progress_session(
    tx: &mut Transaction<'_, Sqlite>,
    link_id: &str,
) -> Result<Option<InterviewSession>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM interview_sessions
        WHERE interview_link_id = ? AND status = ?
        ORDER BY started_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(link_id)
    .bind(SessionStatus::InProgress.as_str())
    .fetch_optional(&mut **tx)
    .await?;
    row.as_ref().map(InterviewSession::from_row).transpose()
}

/// Sessions of a link, newest first
pub async fn list_sessions_by_link(pool: &SqlitePool, link_id: &str) -> Result<Vec<InterviewSession>> {
    let rows = sqlx::query(
        "SELECT * FROM interview_sessions WHERE interview_link_id = ? ORDER BY started_at DESC, rowid DESC",
    )
    .bind(link_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(InterviewSession::from_row).collect()
}

/// Most recently completed session of a link
pub async fn latest_completed_session(pool: &SqlitePool, link_id: &str) -> Result<Option<InterviewSession>> {
    let row = sqlx::query(
        r#"
        SELECT * FROM interview_sessions
        WHERE interview_link_id = ? AND status = ?
        ORDER BY completed_at DESC, rowid DESC
        LIMIT 1
        "#,
    )
    .bind(link_id)
    .bind(SessionStatus::Completed.as_str())
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(InterviewSession::from_row).transpose()
}

/// IN_PROGRESS → COMPLETED; returns false if the session was not in progress
pub async fn mark_completed(tx: &mut Transaction<'_, Sqlite>, session_id: Uuid) -> Result<bool> {
    let updated = sqlx::query(
        "UPDATE interview_sessions SET status = ?, completed_at = ? WHERE id = ? AND status = ?",
    )
    .bind(SessionStatus::Completed.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(session_id.to_string())
    .bind(SessionStatus::InProgress.as_str())
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(updated > 0)
}

pub async fn get_summary(pool: &SqlitePool, session_id: Uuid) -> Result<Option<SessionSummary>> {
    let row = sqlx::query("SELECT * FROM session_summaries WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(SessionSummary::from_row).transpose()
}
