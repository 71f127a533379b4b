//! CSV question-pair ingestion
//!
//! Every row is validated before anything is written; the write itself is a
//! single transaction that replaces the project's question set.

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;
use xpi_common::csv::parse_csv;
use xpi_common::{Error, Result};

use crate::db::projects::{self, NewQuestionPair};

/// Required header columns, matched case-insensitively
pub const REQUIRED_COLUMNS: [&str; 4] = ["questionId", "questionText", "answerA", "answerB"];

pub const DEFAULT_FILENAME: &str = "questions.csv";

/// Outcome of a successful import
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: bool,
    pub records_created: usize,
    pub csv_file_id: Uuid,
}

/// Parse and validate CSV text into question pairs
pub fn parse_question_pairs(text: &str) -> Result<Vec<NewQuestionPair>> {
    let rows = parse_csv(text)?;
    if rows.len() < 2 {
        return Err(Error::InvalidInput(
            "CSV file must contain a header row and at least one data row".to_string(),
        ));
    }

    let header: Vec<String> = rows[0].iter().map(|cell| cell.to_lowercase()).collect();
    let mut indices = [0usize; 4];
    let mut missing = Vec::new();
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        match header.iter().position(|h| *h == column.to_lowercase()) {
            Some(index) => *slot = index,
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Missing required columns: {}",
            missing.join(", ")
        )));
    }

    rows[1..]
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let cell = |column: usize| row.get(indices[column]).map(String::as_str).unwrap_or("");
            let values = [cell(0), cell(1), cell(2), cell(3)];
            if values.iter().any(|v| v.is_empty()) {
                return Err(Error::InvalidInput(format!("Missing data in CSV row {}", index + 1)));
            }
            Ok(NewQuestionPair {
                question_id: values[0].to_string(),
                question_text: values[1].to_string(),
                answer_a: values[2].to_string(),
                answer_b: values[3].to_string(),
            })
        })
        .collect()
}

/// Validate `csv_content` and replace the project's question pairs with it
pub async fn import_csv(
    pool: &SqlitePool,
    project_id: Uuid,
    filename: Option<&str>,
    csv_content: &str,
) -> Result<ImportResult> {
    projects::require_project(pool, project_id).await?;

    let pairs = parse_question_pairs(csv_content)?;
    let filename = filename
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FILENAME);

    let csv_file = projects::replace_question_pairs(pool, project_id, filename, &pairs).await?;

    info!(
        project_id = %project_id,
        csv_file_id = %csv_file.id,
        records = pairs.len(),
        "CSV imported"
    );

    Ok(ImportResult {
        success: true,
        records_created: pairs.len(),
        csv_file_id: csv_file.id,
    })
}
