//! Projects, CSV files and question pairs

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;
use xpi_common::db::{CsvFile, Project, QuestionPair, PROJECT_STATUS_ACTIVE};
use xpi_common::{ids, Error, Result};

/// One validated CSV data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestionPair {
    pub question_id: String,
    pub question_text: String,
    pub answer_a: String,
    pub answer_b: String,
}

pub async fn create_project(pool: &SqlitePool, name: &str) -> Result<Project> {
    let project = Project {
        id: ids::generate(),
        name: name.to_string(),
        status: PROJECT_STATUS_ACTIVE.to_string(),
        created_at: Utc::now(),
    };

    sqlx::query("INSERT INTO projects (id, name, status, created_at) VALUES (?, ?, ?, ?)")
        .bind(project.id.to_string())
        .bind(&project.name)
        .bind(&project.status)
        .bind(project.created_at.to_rfc3339())
        .execute(pool)
        .await?;

    Ok(project)
}

/// All projects, newest first
pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query("SELECT * FROM projects ORDER BY created_at DESC, rowid DESC")
        .fetch_all(pool)
        .await?;
    rows.iter().map(Project::from_row).collect()
}

pub async fn get_project(pool: &SqlitePool, project_id: Uuid) -> Result<Option<Project>> {
    let row = sqlx::query("SELECT * FROM projects WHERE id = ?")
        .bind(project_id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(Project::from_row).transpose()
}

/// Load a project or fail with `NotFound`
pub async fn require_project(pool: &SqlitePool, project_id: Uuid) -> Result<Project> {
    get_project(pool, project_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Project {}", project_id)))
}

/// Question pairs of a project in sort order; `limit` caps the count
pub async fn list_question_pairs(
    pool: &SqlitePool,
    project_id: Uuid,
    limit: Option<i64>,
) -> Result<Vec<QuestionPair>> {
    let rows = sqlx::query(
        "SELECT * FROM question_pairs WHERE project_id = ? ORDER BY sort_order ASC LIMIT ?",
    )
    .bind(project_id.to_string())
    .bind(limit.unwrap_or(-1))
    .fetch_all(pool)
    .await?;
    rows.iter().map(QuestionPair::from_row).collect()
}

/// First question pair of the project with the given external key
pub async fn find_question_pair(
    pool: &SqlitePool,
    project_id: Uuid,
    question_id: &str,
) -> Result<Option<QuestionPair>> {
    let row = sqlx::query(
        "SELECT * FROM question_pairs WHERE project_id = ? AND question_id = ? ORDER BY sort_order ASC LIMIT 1",
    )
    .bind(project_id.to_string())
    .bind(question_id)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(QuestionPair::from_row).transpose()
}

pub async fn count_question_pairs(pool: &SqlitePool, project_id: Uuid) -> Result<i64> {
    let count = sqlx::query_scalar("SELECT COUNT(*) FROM question_pairs WHERE project_id = ?")
        .bind(project_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// CSV files of a project, newest first
pub async fn list_csv_files(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<CsvFile>> {
    let rows = sqlx::query("SELECT * FROM csv_files WHERE project_id = ? ORDER BY uploaded_at DESC, rowid DESC")
        .bind(project_id.to_string())
        .fetch_all(pool)
        .await?;
    rows.iter().map(CsvFile::from_row).collect()
}

/// Replace the project's question set in one transaction
///
/// Deletes existing pairs, deactivates the active CSV file, records the new
/// file and inserts `pairs` with `sort_order` equal to their index. Fails
/// with `Conflict` if any step record already answers one of the project's
/// current pairs.
pub async fn replace_question_pairs(
    pool: &SqlitePool,
    project_id: Uuid,
    filename: &str,
    pairs: &[NewQuestionPair],
) -> Result<CsvFile> {
    let mut tx = pool.begin().await?;

    match write_question_pairs(&mut tx, project_id, filename, pairs).await {
        Ok(csv_file) => {
            tx.commit().await?;
            Ok(csv_file)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(project_id = %project_id, error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}

async fn write_question_pairs(
    tx: &mut Transaction<'_, Sqlite>,
    project_id: Uuid,
    filename: &str,
    pairs: &[NewQuestionPair],
) -> Result<CsvFile> {
    let project_id_str = project_id.to_string();
    let now = Utc::now();
    let now_str = now.to_rfc3339();

    let recorded: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM step_records sr
        JOIN question_pairs qp ON sr.question_pair_id = qp.id
        WHERE qp.project_id = ?
        "#,
    )
    .bind(&project_id_str)
    .fetch_one(&mut **tx)
    .await?;

    if recorded > 0 {
        return Err(Error::Conflict(format!(
            "Project {} already has {} recorded answers; its questions cannot be replaced",
            project_id, recorded
        )));
    }

    sqlx::query("DELETE FROM question_pairs WHERE project_id = ?")
        .bind(&project_id_str)
        .execute(&mut **tx)
        .await?;

    sqlx::query("UPDATE csv_files SET is_active = 0 WHERE project_id = ? AND is_active = 1")
        .bind(&project_id_str)
        .execute(&mut **tx)
        .await?;

    let csv_file = CsvFile {
        id: ids::generate(),
        project_id,
        filename: filename.to_string(),
        row_count: pairs.len() as i64,
        is_active: true,
        uploaded_at: now,
    };

    sqlx::query(
        "INSERT INTO csv_files (id, project_id, filename, row_count, is_active, uploaded_at) VALUES (?, ?, ?, ?, 1, ?)",
    )
    .bind(csv_file.id.to_string())
    .bind(&project_id_str)
    .bind(&csv_file.filename)
    .bind(csv_file.row_count)
    .bind(&now_str)
    .execute(&mut **tx)
    .await?;

    let csv_file_id = csv_file.id.to_string();
    for (index, pair) in pairs.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO question_pairs
                (id, project_id, csv_file_id, question_id, question_text, answer_a, answer_b, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ids::generate().to_string())
        .bind(&project_id_str)
        .bind(&csv_file_id)
        .bind(&pair.question_id)
        .bind(&pair.question_text)
        .bind(&pair.answer_a)
        .bind(&pair.answer_b)
        .bind(index as i64)
        .bind(&now_str)
        .execute(&mut **tx)
        .await?;
    }

    Ok(csv_file)
}
