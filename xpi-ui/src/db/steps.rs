//! Step records (one expert answer per question per session)

use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;
use xpi_common::db::{parse_uuid, AnalysisArtifact, AnswerChoice, QuestionPair, StepRecord};
use xpi_common::{ids, Error, Result, Transcript};

/// Fields for a new step record
#[derive(Debug, Clone)]
pub struct NewStep {
    pub session_id: Uuid,
    pub project_id: Uuid,
    pub question_pair_id: Uuid,
    pub preferred_answer: AnswerChoice,
    pub transcript: Transcript,
}

/// Step record joined with its question pair and analysis artifact
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDetail {
    #[serde(flatten)]
    pub record: StepRecord,
    pub question_pair: QuestionPair,
    pub analysis_artifact: Option<AnalysisArtifact>,
}

/// Insert a step record; a second answer for the same question is a `Conflict`
pub async fn insert_step(pool: &SqlitePool, new: NewStep) -> Result<StepRecord> {
    let (kind, body) = new.transcript.to_stored()?;
    let record = StepRecord {
        id: ids::generate(),
        session_id: new.session_id,
        project_id: new.project_id,
        question_pair_id: new.question_pair_id,
        preferred_answer: new.preferred_answer,
        transcript: new.transcript,
        created_at: Utc::now(),
    };

    let result = sqlx::query(
        r#"
        INSERT INTO step_records
            (id, session_id, project_id, question_pair_id, preferred_answer, transcript_kind, transcript, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.session_id.to_string())
    .bind(record.project_id.to_string())
    .bind(record.question_pair_id.to_string())
    .bind(record.preferred_answer.as_str())
    .bind(kind.as_str())
    .bind(body)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await;

    match result {
        Ok(_) => Ok(record),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(Error::Conflict(format!(
            "Question pair {} was already answered in session {}",
            record.question_pair_id, record.session_id
        ))),
        Err(e) => Err(e.into()),
    }
}

/// Question pair ids already answered in a session
pub async fn answered_question_pairs(pool: &SqlitePool, session_id: Uuid) -> Result<HashSet<Uuid>> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT question_pair_id FROM step_records WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_all(pool)
        .await?;
    ids.iter().map(|id| parse_uuid(id)).collect()
}

/// Step records of a session in question order, each with its pair and artifact
pub async fn list_step_details(pool: &SqlitePool, session_id: Uuid) -> Result<Vec<StepDetail>> {
    let session_id_str = session_id.to_string();

    let record_rows = sqlx::query(
        r#"
        SELECT sr.* FROM step_records sr
        JOIN question_pairs qp ON sr.question_pair_id = qp.id
        WHERE sr.session_id = ?
        ORDER BY qp.sort_order ASC, sr.created_at ASC
        "#,
    )
    .bind(&session_id_str)
    .fetch_all(pool)
    .await?;

    let pair_rows = sqlx::query(
        r#"
        SELECT qp.* FROM question_pairs qp
        JOIN step_records sr ON sr.question_pair_id = qp.id
        WHERE sr.session_id = ?
        "#,
    )
    .bind(&session_id_str)
    .fetch_all(pool)
    .await?;

    let artifact_rows = sqlx::query("SELECT * FROM analysis_artifacts WHERE session_id = ?")
        .bind(&session_id_str)
        .fetch_all(pool)
        .await?;

    let mut pairs: HashMap<Uuid, QuestionPair> = HashMap::new();
    for row in &pair_rows {
        let pair = QuestionPair::from_row(row)?;
        pairs.insert(pair.id, pair);
    }

    let mut artifacts: HashMap<Uuid, AnalysisArtifact> = HashMap::new();
    for row in &artifact_rows {
        let artifact = AnalysisArtifact::from_row(row)?;
        artifacts.insert(artifact.question_pair_id, artifact);
    }

    record_rows
        .iter()
        .map(|row| -> Result<StepDetail> {
            let record = StepRecord::from_row(row)?;
            let question_pair = pairs.get(&record.question_pair_id).cloned().ok_or_else(|| {
                Error::Internal(format!("Question pair {} missing", record.question_pair_id))
            })?;
            let analysis_artifact = artifacts.remove(&record.question_pair_id);
            Ok(StepDetail {
                record,
                question_pair,
                analysis_artifact,
            })
        })
        .collect()
}
