//! Shared test utilities for xpi-ui integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

use xpi_ui::services::AnalysisTrigger;
use xpi_ui::{build_router, AppState};

pub const APP_URL: &str = "http://localhost:3000";

/// Nothing listens on the discard port, so triggers fail and are only logged
pub const UNREACHABLE_ANALYSIS_URL: &str = "http://127.0.0.1:9";

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

pub fn test_app(pool: SqlitePool, analysis_url: &str) -> Router {
    build_router(AppState::new(pool, APP_URL, AnalysisTrigger::new(analysis_url)))
}

pub fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Send one request and decode the JSON body (Null when empty)
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Should read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    };
    (status, body)
}

pub fn questions_csv(count: usize) -> String {
    let mut csv = String::from("questionId,questionText,answerA,answerB\n");
    for n in 1..=count {
        csv.push_str(&format!("q{n},Question {n}?,Answer A{n},Answer B{n}\n"));
    }
    csv
}

pub async fn create_project(app: &Router, name: &str) -> String {
    let (status, body) = send(app, json_request("POST", "/api/projects", serde_json::json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

pub async fn upload_questions(app: &Router, project_id: &str, count: usize) {
    let (status, _) = send(
        app,
        json_request(
            "POST",
            &format!("/api/projects/{}/csv", project_id),
            serde_json::json!({ "filename": "questions.csv", "csvContent": questions_csv(count) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

pub async fn create_link(app: &Router, project_id: &str, row_quota: i64) -> Value {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            &format!("/api/projects/{}/links", project_id),
            serde_json::json!({ "name": "Dr. Expert", "interviewName": "Round 1", "rowQuota": row_quota }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body
}

/// Project with `questions` pairs and a link serving `row_quota` of them; returns (project id, link id)
pub async fn project_with_link(app: &Router, questions: usize, row_quota: i64) -> (String, String) {
    let project_id = create_project(app, "Support bot").await;
    upload_questions(app, &project_id, questions).await;
    let link = create_link(app, &project_id, row_quota).await;
    (project_id, link["id"].as_str().unwrap().to_string())
}

pub async fn start_session(app: &Router, link_id: &str) -> (String, Value) {
    let (status, body) = send(app, test_request("POST", &format!("/api/interview/{}/start", link_id))).await;
    assert_eq!(status, StatusCode::OK);
    (body["session"]["id"].as_str().unwrap().to_string(), body)
}

pub async fn answer(app: &Router, session_id: &str, question_id: &str, preferred: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            &format!("/api/sessions/{}/answers", session_id),
            serde_json::json!({
                "questionId": question_id,
                "preferredAnswer": preferred,
                "transcript": "agent: Which answer is better?\nuser: The first one.",
            }),
        ),
    )
    .await
}

/// Analysis artifact written the way xpi-an would
pub async fn seed_artifact(pool: &SqlitePool, session_id: &str, question_id: &str, winner: &str, severity: f64) {
    sqlx::query(
        r#"
        INSERT INTO analysis_artifacts
            (id, session_id, question_pair_id, winner_flag, severity_score, rationale_digest,
             knowledge_gaps, prompt_suggestions, created_at)
        SELECT ?, ?, qp.id, ?, ?, 'Expert preferred the concrete answer.', '["caching"]', '["ask for trade-offs"]', ?
        FROM question_pairs qp
        JOIN interview_links l ON l.project_id = qp.project_id
        JOIN interview_sessions s ON s.interview_link_id = l.id
        WHERE s.id = ? AND qp.question_id = ?
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id)
    .bind(winner)
    .bind(severity)
    .bind(Utc::now().to_rfc3339())
    .bind(session_id)
    .bind(question_id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn seed_summary(pool: &SqlitePool, session_id: &str, feedback: &str) {
    sqlx::query(
        r#"
        INSERT INTO session_summaries (id, session_id, aggregated_insights, overall_feedback, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(session_id)
    .bind(r#"{"questionCount":1,"averageSeverityScore":0.4,"topKnowledgeGaps":[],"topPromptSuggestions":[]}"#)
    .bind(feedback)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .unwrap();

    sqlx::query("UPDATE interview_sessions SET processed = 1 WHERE id = ?")
        .bind(session_id)
        .execute(pool)
        .await
        .unwrap();
}

/// Session ids received by a stand-in analysis service
pub type ReceivedTriggers = Arc<Mutex<Vec<String>>>;

async fn record_trigger(State(received): State<ReceivedTriggers>, Path(session_id): Path<String>) -> StatusCode {
    received.lock().unwrap().push(session_id);
    StatusCode::ACCEPTED
}

/// Start a local analysis service that records triggers; returns its base URL
pub async fn spawn_trigger_recorder() -> (String, ReceivedTriggers) {
    let received = ReceivedTriggers::default();
    let app = Router::new()
        .route("/analyze/:session_id", post(record_trigger))
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), received)
}

/// Poll until the recorder has seen `count` triggers
pub async fn wait_for_triggers(received: &ReceivedTriggers, count: usize) -> bool {
    for _ in 0..100 {
        if received.lock().unwrap().len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
