//! Interview links

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;
use xpi_common::db::{InterviewLink, LinkStatus};
use xpi_common::{ids, Result};

/// Fields for a new interview link
#[derive(Debug, Clone)]
pub struct NewLink {
    pub project_id: Uuid,
    pub name: String,
    pub interview_name: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub row_quota: i64,
}

/// Insert a link with a fresh token id; `app_url` is the public base URL
pub async fn create_link(pool: &SqlitePool, new: NewLink, app_url: &str) -> Result<InterviewLink> {
    let id = ids::link_token();
    let link = InterviewLink {
        url: format!("{}/interview/{}", app_url, id),
        id,
        project_id: new.project_id,
        name: new.name,
        interview_name: new.interview_name,
        expiry_date: new.expiry_date,
        row_quota: new.row_quota,
        status: LinkStatus::Unused,
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO interview_links
            (id, project_id, name, interview_name, url, expiry_date, row_quota, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&link.id)
    .bind(link.project_id.to_string())
    .bind(&link.name)
    .bind(&link.interview_name)
    .bind(&link.url)
    .bind(link.expiry_date.map(|d| d.to_rfc3339()))
    .bind(link.row_quota)
    .bind(link.status.as_str())
    .bind(link.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(link)
}

/// Links of a project, newest first
pub async fn list_links(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<InterviewLink>> {
    let rows = sqlx::query(
        "SELECT * FROM interview_links WHERE project_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;
    rows.iter().map(InterviewLink::from_row).collect()
}

pub async fn get_link(pool: &SqlitePool, link_id: &str) -> Result<Option<InterviewLink>> {
    let row = sqlx::query("SELECT * FROM interview_links WHERE id = ?")
        .bind(link_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(InterviewLink::from_row).transpose()
}

/// Move a link forward to `next`; earlier or equal targets are ignored
///
/// Returns true if the stored status changed.
pub async fn advance_link_status(
    tx: &mut Transaction<'_, Sqlite>,
    link_id: &str,
    next: LinkStatus,
) -> Result<bool> {
    let current: Option<String> = sqlx::query_scalar("SELECT status FROM interview_links WHERE id = ?")
        .bind(link_id)
        .fetch_optional(&mut **tx)
        .await?;

    let Some(current) = current else {
        return Ok(false);
    };
    let current: LinkStatus = current.parse()?;
    if !current.can_advance_to(next) {
        return Ok(false);
    }

    let updated = sqlx::query("UPDATE interview_links SET status = ? WHERE id = ? AND status = ?")
        .bind(next.as_str())
        .bind(link_id)
        .bind(current.as_str())
        .execute(&mut **tx)
        .await?
        .rows_affected();

    Ok(updated > 0)
}
