//! Shared test utilities for xpi-an integration tests
//!
//! Rows are seeded with raw SQL against the shared schema so these tests do
//! not depend on the xpi-ui crate.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

use xpi_an::analyzer::prompts::STEP_SCHEMA_NAME;
use xpi_an::llm::{ChatModel, ChatRequest, LlmError};

pub const STEP_REPLY: &str = r#"{
    "WINNER_FLAG": "A",
    "SEVERITY_SCORE": 0.8,
    "RATIONALE_DIGEST": "The expert prefers A because it names the failure mode.",
    "KNOWLEDGE_GAPS": ["caching", "indexing"],
    "PROMPT_SUGGESTIONS": ["ask for trade-offs"]
}"#;

pub const SUMMARY_REPLY: &str = r#"```json
{
    "TOP_KNOWLEDGE_GAPS": ["Caching", "query planning"],
    "CROSS_QUESTION_PROMPT_SUGGESTIONS": ["ask for trade-offs", "request a worked example"],
    "SUMMARY": "The expert consistently preferred concrete answers."
}
```"#;

/// Scripted chat model
///
/// Step calls are numbered from 1 in the order they arrive.
pub struct StubModel {
    step_reply: Option<String>,
    summary_reply: Option<String>,
    failing_step_calls: HashSet<usize>,
    step_calls: AtomicUsize,
    summary_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubModel {
    /// Model that answers every call successfully
    pub fn ok() -> Self {
        Self {
            step_reply: Some(STEP_REPLY.to_string()),
            summary_reply: Some(SUMMARY_REPLY.to_string()),
            failing_step_calls: HashSet::new(),
            step_calls: AtomicUsize::new(0),
            summary_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Model whose every call fails
    pub fn failing() -> Self {
        Self {
            step_reply: None,
            summary_reply: None,
            ..Self::ok()
        }
    }

    pub fn with_step_reply(mut self, reply: &str) -> Self {
        self.step_reply = Some(reply.to_string());
        self
    }

    pub fn with_failing_step_call(mut self, call: usize) -> Self {
        self.failing_step_calls.insert(call);
        self
    }

    pub fn step_calls(&self) -> usize {
        self.step_calls.load(Ordering::SeqCst)
    }

    pub fn summary_calls(&self) -> usize {
        self.summary_calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);

        if request.schema.name == STEP_SCHEMA_NAME {
            let call = self.step_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing_step_calls.contains(&call) {
                return Err(LlmError::Api {
                    status: 500,
                    message: "scripted failure".to_string(),
                });
            }
            self.step_reply.clone().ok_or(LlmError::Timeout)
        } else {
            self.summary_calls.fetch_add(1, Ordering::SeqCst);
            self.summary_reply
                .clone()
                .ok_or_else(|| LlmError::Network("scripted failure".to_string()))
        }
    }
}

/// Temporary database with the full schema
///
/// Keep the TempDir alive for the duration of the test.
pub async fn create_test_db() -> (TempDir, SqlitePool) {
    let temp_dir = TempDir::new().unwrap();
    let pool = xpi_common::db::init_database(&temp_dir.path().join("xpi_test.db"))
        .await
        .unwrap();
    (temp_dir, pool)
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

/// Project with an active CSV file and `count` question pairs
pub async fn seed_project(pool: &SqlitePool, count: usize) -> (Uuid, Vec<Uuid>) {
    let project_id = Uuid::new_v4();
    sqlx::query("INSERT INTO projects (id, name, status, created_at) VALUES (?, 'Test project', 'ACTIVE', ?)")
        .bind(project_id.to_string())
        .bind(now())
        .execute(pool)
        .await
        .unwrap();

    let csv_file_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO csv_files (id, project_id, filename, row_count, is_active, uploaded_at) VALUES (?, ?, 'q.csv', ?, 1, ?)",
    )
    .bind(csv_file_id.to_string())
    .bind(project_id.to_string())
    .bind(count as i64)
    .bind(now())
    .execute(pool)
    .await
    .unwrap();

    let mut pair_ids = Vec::with_capacity(count);
    for index in 0..count {
        let pair_id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO question_pairs
                (id, project_id, csv_file_id, question_id, question_text, answer_a, answer_b, sort_order, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(pair_id.to_string())
        .bind(project_id.to_string())
        .bind(csv_file_id.to_string())
        .bind(format!("q{}", index + 1))
        .bind(format!("Question {}?", index + 1))
        .bind(format!("Answer A{}", index + 1))
        .bind(format!("Answer B{}", index + 1))
        .bind(index as i64)
        .bind(now())
        .execute(pool)
        .await
        .unwrap();
        pair_ids.push(pair_id);
    }

    (project_id, pair_ids)
}

/// Interview link plus a session with the given status
pub async fn seed_session(pool: &SqlitePool, project_id: Uuid, status: &str) -> Uuid {
    let link_id = xpi_common::ids::link_token();
    sqlx::query(
        r#"
        INSERT INTO interview_links (id, project_id, name, interview_name, url, row_quota, status, created_at)
        VALUES (?, ?, 'Expert', 'Round 1', ?, 10, 'COMPLETED', ?)
        "#,
    )
    .bind(&link_id)
    .bind(project_id.to_string())
    .bind(format!("http://localhost:3000/interview/{}", link_id))
    .bind(now())
    .execute(pool)
    .await
    .unwrap();

    let session_id = Uuid::new_v4();
    let completed_at = (status == "COMPLETED").then(now);
    sqlx::query(
        "INSERT INTO interview_sessions (id, interview_link_id, started_at, completed_at, status, processed) VALUES (?, ?, ?, ?, ?, 0)",
    )
    .bind(session_id.to_string())
    .bind(&link_id)
    .bind(now())
    .bind(completed_at)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();

    session_id
}

/// Record an answer with a plain-text transcript
pub async fn seed_step(
    pool: &SqlitePool,
    session_id: Uuid,
    project_id: Uuid,
    question_pair_id: Uuid,
    preferred: &str,
    transcript: &str,
) {
    sqlx::query(
        r#"
        INSERT INTO step_records
            (id, session_id, project_id, question_pair_id, preferred_answer, transcript_kind, transcript, created_at)
        VALUES (?, ?, ?, ?, ?, 'plain', ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id.to_string())
    .bind(project_id.to_string())
    .bind(question_pair_id.to_string())
    .bind(preferred)
    .bind(transcript)
    .bind(now())
    .execute(pool)
    .await
    .unwrap();
}

/// Completed session with one answer per question pair
pub async fn seed_answered_session(pool: &SqlitePool, steps: usize) -> (Uuid, Vec<Uuid>) {
    let (project_id, pair_ids) = seed_project(pool, steps).await;
    let session_id = seed_session(pool, project_id, "COMPLETED").await;
    for (index, pair_id) in pair_ids.iter().enumerate() {
        let preferred = if index % 2 == 0 { "A" } else { "B" };
        seed_step(
            pool,
            session_id,
            project_id,
            *pair_id,
            preferred,
            &format!("agent: Which answer is better?\nuser: {} is better for question {}", preferred, index + 1),
        )
        .await;
    }
    (session_id, pair_ids)
}

pub async fn count_rows(pool: &SqlitePool, table: &str, session_id: Uuid) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {} WHERE session_id = ?", table))
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn is_processed(pool: &SqlitePool, session_id: Uuid) -> bool {
    sqlx::query_scalar("SELECT processed FROM interview_sessions WHERE id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap()
}
