//! Database initialization
//!
//! Opens (or creates) the shared SQLite database and makes sure every table
//! and index exists. Safe to call from both services on every startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Busy timeout applied to every pooled connection
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_projects_table(pool).await?;
    create_csv_files_table(pool).await?;
    create_question_pairs_table(pool).await?;
    create_interview_links_table(pool).await?;
    create_interview_sessions_table(pool).await?;
    create_step_records_table(pool).await?;
    create_analysis_artifacts_table(pool).await?;
    create_session_summaries_table(pool).await?;

    info!("Database schema ready");
    Ok(())
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_csv_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS csv_files (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            row_count INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            uploaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_csv_files_project ON csv_files(project_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_question_pairs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS question_pairs (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            csv_file_id TEXT NOT NULL REFERENCES csv_files(id),
            question_id TEXT NOT NULL,
            question_text TEXT NOT NULL,
            answer_a TEXT NOT NULL,
            answer_b TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_question_pairs_project ON question_pairs(project_id, sort_order)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interview_links_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_links (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            interview_name TEXT NOT NULL,
            url TEXT NOT NULL,
            expiry_date TEXT,
            row_quota INTEGER NOT NULL DEFAULT 10,
            status TEXT NOT NULL DEFAULT 'unused',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_interview_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_sessions (
            id TEXT PRIMARY KEY,
            interview_link_id TEXT NOT NULL REFERENCES interview_links(id) ON DELETE CASCADE,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            status TEXT NOT NULL DEFAULT 'IN_PROGRESS',
            processed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_sessions_pending ON interview_sessions(status, processed)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_step_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS step_records (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES interview_sessions(id) ON DELETE CASCADE,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            question_pair_id TEXT NOT NULL REFERENCES question_pairs(id),
            preferred_answer TEXT NOT NULL CHECK (preferred_answer IN ('A', 'B')),
            transcript_kind TEXT NOT NULL CHECK (transcript_kind IN ('plain', 'structured')),
            transcript TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One answer per question per session
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_step_records_session_question ON step_records(session_id, question_pair_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_analysis_artifacts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_artifacts (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL REFERENCES interview_sessions(id) ON DELETE CASCADE,
            question_pair_id TEXT NOT NULL REFERENCES question_pairs(id),
            winner_flag TEXT NOT NULL CHECK (winner_flag IN ('A', 'B', 'TIED')),
            severity_score REAL NOT NULL CHECK (severity_score >= 0.0 AND severity_score <= 1.0),
            rationale_digest TEXT NOT NULL,
            knowledge_gaps TEXT NOT NULL DEFAULT '[]',
            prompt_suggestions TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_artifacts_session_question ON analysis_artifacts(session_id, question_pair_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_session_summaries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_summaries (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL UNIQUE REFERENCES interview_sessions(id) ON DELETE CASCADE,
            aggregated_insights TEXT NOT NULL,
            overall_feedback TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
