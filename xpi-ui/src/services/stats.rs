//! Project dashboard statistics

use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;
use xpi_common::db::{SessionStatus, WinnerFlag};
use xpi_common::Result;

use crate::db::projects::{count_question_pairs, require_project};

/// Artifact winner counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WinnerDistribution {
    #[serde(rename = "A")]
    pub a: i64,
    #[serde(rename = "B")]
    pub b: i64,
    pub tie: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub processed_sessions: i64,
    pub question_count: i64,
    pub winner_distribution: WinnerDistribution,
}

pub async fn project_stats(pool: &SqlitePool, project_id: Uuid) -> Result<ProjectStats> {
    require_project(pool, project_id).await?;
    let project_id_str = project_id.to_string();

    let session_row = sqlx::query(
        r#"
        SELECT
            COUNT(*) AS total,
            COALESCE(SUM(CASE WHEN s.status = ? THEN 1 ELSE 0 END), 0) AS completed,
            COALESCE(SUM(CASE WHEN s.processed = 1 THEN 1 ELSE 0 END), 0) AS processed
        FROM interview_sessions s
        JOIN interview_links l ON s.interview_link_id = l.id
        WHERE l.project_id = ?
        "#,
    )
    .bind(SessionStatus::Completed.as_str())
    .bind(&project_id_str)
    .fetch_one(pool)
    .await?;

    let winner_rows = sqlx::query(
        r#"
        SELECT a.winner_flag, COUNT(*) AS n
        FROM analysis_artifacts a
        JOIN interview_sessions s ON a.session_id = s.id
        JOIN interview_links l ON s.interview_link_id = l.id
        WHERE l.project_id = ?
        GROUP BY a.winner_flag
        "#,
    )
    .bind(&project_id_str)
    .fetch_all(pool)
    .await?;

    let mut winner_distribution = WinnerDistribution::default();
    for row in &winner_rows {
        let flag: WinnerFlag = row.try_get::<String, _>("winner_flag")?.parse()?;
        let count: i64 = row.try_get("n")?;
        match flag {
            WinnerFlag::A => winner_distribution.a = count,
            WinnerFlag::B => winner_distribution.b = count,
            WinnerFlag::Tied => winner_distribution.tie = count,
        }
    }

    Ok(ProjectStats {
        total_sessions: session_row.try_get("total")?,
        completed_sessions: session_row.try_get("completed")?,
        processed_sessions: session_row.try_get("processed")?,
        question_count: count_question_pairs(pool, project_id).await?,
        winner_distribution,
    })
}
