//! Database models
//!
//! Ids are stored as TEXT (hyphenated UUIDs, or the base36 token for
//! interview links) and timestamps as RFC 3339 TEXT. Each model knows how to
//! decode itself from a `SqliteRow` so both services share one mapping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::transcript::{Transcript, TranscriptKind};
use crate::{Error, Result};

/// Status given to newly created projects
pub const PROJECT_STATUS_ACTIVE: &str = "ACTIVE";

/// Default number of questions served per interview link
pub const DEFAULT_ROW_QUOTA: i64 = 10;

macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Internal(format!(
                        "Unknown {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

/// Interview link lifecycle; progression is one-way
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LinkStatus {
    #[serde(rename = "unused")]
    Unused,
    #[serde(rename = "in-progress")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
}

text_enum!(LinkStatus {
    Unused => "unused",
    InProgress => "in-progress",
    Completed => "COMPLETED",
});

impl LinkStatus {
    /// True if moving to `next` keeps the progression monotonic
    pub fn can_advance_to(self, next: LinkStatus) -> bool {
        next > self
    }
}

/// Interview session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

text_enum!(SessionStatus {
    InProgress => "IN_PROGRESS",
    Completed => "COMPLETED",
});

/// Expert's pick between the two answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerChoice {
    A,
    B,
}

text_enum!(AnswerChoice {
    A => "A",
    B => "B",
});

/// Winner recorded on an analysis artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WinnerFlag {
    A,
    B,
    Tied,
}

text_enum!(WinnerFlag {
    A => "A",
    B => "B",
    Tied => "TIED",
});

impl From<AnswerChoice> for WinnerFlag {
    fn from(choice: AnswerChoice) -> Self {
        match choice {
            AnswerChoice::A => WinnerFlag::A,
            AnswerChoice::B => WinnerFlag::B,
        }
    }
}

/// Parse a stored RFC 3339 timestamp
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Parse a stored UUID column
pub fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Failed to parse id '{}': {}", value, e)))
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.try_get(column)?;
    parse_uuid(&value)
}

fn get_timestamp(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>> {
    let value: String = row.try_get(column)?;
    parse_timestamp(&value)
}

fn get_optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_timestamp).transpose()
}

fn get_enum<T: FromStr<Err = Error>>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: String = row.try_get(column)?;
    value.parse()
}

fn get_json<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let value: String = row.try_get(column)?;
    Ok(serde_json::from_str(&value)?)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            name: row.try_get("name")?,
            status: row.try_get("status")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvFile {
    pub id: Uuid,
    pub project_id: Uuid,
    pub filename: String,
    pub row_count: i64,
    pub is_active: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl CsvFile {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            project_id: get_uuid(row, "project_id")?,
            filename: row.try_get("filename")?,
            row_count: row.try_get("row_count")?,
            is_active: row.try_get("is_active")?,
            uploaded_at: get_timestamp(row, "uploaded_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPair {
    pub id: Uuid,
    pub project_id: Uuid,
    pub csv_file_id: Uuid,
    /// External key from the uploaded CSV
    pub question_id: String,
    pub question_text: String,
    pub answer_a: String,
    pub answer_b: String,
    pub order: i64,
}

impl QuestionPair {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            project_id: get_uuid(row, "project_id")?,
            csv_file_id: get_uuid(row, "csv_file_id")?,
            question_id: row.try_get("question_id")?,
            question_text: row.try_get("question_text")?,
            answer_a: row.try_get("answer_a")?,
            answer_b: row.try_get("answer_b")?,
            order: row.try_get("sort_order")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewLink {
    /// Base36 token, also the last URL segment
    pub id: String,
    pub project_id: Uuid,
    pub name: String,
    pub interview_name: String,
    pub url: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub row_quota: i64,
    pub status: LinkStatus,
    pub created_at: DateTime<Utc>,
}

impl InterviewLink {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            project_id: get_uuid(row, "project_id")?,
            name: row.try_get("name")?,
            interview_name: row.try_get("interview_name")?,
            url: row.try_get("url")?,
            expiry_date: get_optional_timestamp(row, "expiry_date")?,
            row_quota: row.try_get("row_quota")?,
            status: get_enum(row, "status")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date.map(|expiry| expiry < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewSession {
    pub id: Uuid,
    pub interview_link_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub processed: bool,
}

impl InterviewSession {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            interview_link_id: row.try_get("interview_link_id")?,
            started_at: get_timestamp(row, "started_at")?,
            completed_at: get_optional_timestamp(row, "completed_at")?,
            status: get_enum(row, "status")?,
            processed: row.try_get("processed")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub project_id: Uuid,
    pub question_pair_id: Uuid,
    pub preferred_answer: AnswerChoice,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
}

impl StepRecord {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        let kind: TranscriptKind = get_enum(row, "transcript_kind")?;
        let body: String = row.try_get("transcript")?;
        Ok(Self {
            id: get_uuid(row, "id")?,
            session_id: get_uuid(row, "session_id")?,
            project_id: get_uuid(row, "project_id")?,
            question_pair_id: get_uuid(row, "question_pair_id")?,
            preferred_answer: get_enum(row, "preferred_answer")?,
            transcript: Transcript::from_stored(kind, body)?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisArtifact {
    pub id: Uuid,
    pub session_id: Uuid,
    pub question_pair_id: Uuid,
    pub winner_flag: WinnerFlag,
    pub severity_score: f64,
    pub rationale_digest: String,
    pub knowledge_gaps: Vec<String>,
    pub prompt_suggestions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl AnalysisArtifact {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            session_id: get_uuid(row, "session_id")?,
            question_pair_id: get_uuid(row, "question_pair_id")?,
            winner_flag: get_enum(row, "winner_flag")?,
            severity_score: row.try_get("severity_score")?,
            rationale_digest: row.try_get("rationale_digest")?,
            knowledge_gaps: get_json(row, "knowledge_gaps")?,
            prompt_suggestions: get_json(row, "prompt_suggestions")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}

/// Knowledge gap with its occurrence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCount {
    pub gap: String,
    pub count: usize,
}

/// Prompt suggestion with its occurrence count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionCount {
    pub suggestion: String,
    pub count: usize,
}

/// Cross-question statistics stored on a session summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedInsights {
    pub question_count: usize,
    pub average_severity_score: f64,
    pub top_knowledge_gaps: Vec<GapCount>,
    pub top_prompt_suggestions: Vec<SuggestionCount>,
}

impl AggregatedInsights {
    pub fn empty() -> Self {
        Self {
            question_count: 0,
            average_severity_score: 0.0,
            top_knowledge_gaps: Vec::new(),
            top_prompt_suggestions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub session_id: Uuid,
    pub aggregated_insights: AggregatedInsights,
    pub overall_feedback: String,
    pub created_at: DateTime<Utc>,
}

impl SessionSummary {
    pub fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: get_uuid(row, "id")?,
            session_id: get_uuid(row, "session_id")?,
            aggregated_insights: get_json(row, "aggregated_insights")?,
            overall_feedback: row.try_get("overall_feedback")?,
            created_at: get_timestamp(row, "created_at")?,
        })
    }
}
