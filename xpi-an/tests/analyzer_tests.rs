//! Integration tests for the session analysis job

mod helpers;

use helpers::*;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use xpi_an::analyzer::summary::{NO_RESULTS_FEEDBACK, STATISTICAL_HEADER};
use xpi_an::analyzer::{AnalysisOutcome, SessionAnalyzer, SummarySource};
use xpi_common::db::{AnalysisArtifact, SessionSummary, WinnerFlag};

async fn load_artifacts(pool: &SqlitePool, session_id: Uuid) -> Vec<AnalysisArtifact> {
    let rows = sqlx::query(
        r#"
        SELECT a.* FROM analysis_artifacts a
        JOIN question_pairs qp ON a.question_pair_id = qp.id
        WHERE a.session_id = ?
        ORDER BY qp.sort_order
        "#,
    )
    .bind(session_id.to_string())
    .fetch_all(pool)
    .await
    .unwrap();
    rows.iter().map(|r| AnalysisArtifact::from_row(r).unwrap()).collect()
}

async fn load_summary(pool: &SqlitePool, session_id: Uuid) -> SessionSummary {
    let row = sqlx::query("SELECT * FROM session_summaries WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_one(pool)
        .await
        .unwrap();
    SessionSummary::from_row(&row).unwrap()
}

fn analyzer(pool: &SqlitePool, model: &Arc<StubModel>) -> SessionAnalyzer {
    SessionAnalyzer::new(pool.clone(), model.clone())
}

#[tokio::test]
async fn test_zero_step_records_marks_processed_with_empty_summary() {
    let (_dir, pool) = create_test_db().await;
    let (project_id, _) = seed_project(&pool, 2).await;
    let session_id = seed_session(&pool, project_id, "COMPLETED").await;
    let model = Arc::new(StubModel::ok());

    let outcome = analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    assert_eq!(
        outcome,
        AnalysisOutcome::Processed {
            artifact_count: 0,
            summary_source: SummarySource::Empty,
        }
    );
    assert!(is_processed(&pool, session_id).await);
    assert_eq!(count_rows(&pool, "analysis_artifacts", session_id).await, 0);

    let summary = load_summary(&pool, session_id).await;
    assert_eq!(summary.aggregated_insights.question_count, 0);
    assert_eq!(summary.aggregated_insights.average_severity_score, 0.0);
    assert!(summary.aggregated_insights.top_knowledge_gaps.is_empty());
    assert_eq!(summary.overall_feedback, NO_RESULTS_FEEDBACK);

    assert_eq!(model.step_calls(), 0);
    assert_eq!(model.summary_calls(), 0);
}

#[tokio::test]
async fn test_k_records_produce_k_artifacts_and_one_summary() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, pair_ids) = seed_answered_session(&pool, 3).await;
    let model = Arc::new(StubModel::ok());

    let outcome = analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    assert_eq!(
        outcome,
        AnalysisOutcome::Processed {
            artifact_count: 3,
            summary_source: SummarySource::Model,
        }
    );
    assert!(is_processed(&pool, session_id).await);

    let artifacts = load_artifacts(&pool, session_id).await;
    let artifact_pairs: Vec<Uuid> = artifacts.iter().map(|a| a.question_pair_id).collect();
    assert_eq!(artifact_pairs, pair_ids);
    for artifact in &artifacts {
        assert_eq!(artifact.winner_flag, WinnerFlag::A);
        assert_eq!(artifact.severity_score, 0.8);
        assert_eq!(artifact.knowledge_gaps, vec!["caching", "indexing"]);
    }

    assert_eq!(count_rows(&pool, "session_summaries", session_id).await, 1);
    let summary = load_summary(&pool, session_id).await;
    let insights = &summary.aggregated_insights;
    assert_eq!(insights.question_count, 3);
    assert!((insights.average_severity_score - 0.8).abs() < 1e-9);
    assert_eq!(insights.top_knowledge_gaps[0].gap, "Caching");
    assert_eq!(insights.top_knowledge_gaps[0].count, 3);
    assert_eq!(insights.top_knowledge_gaps[1].count, 1);
    assert_eq!(insights.top_prompt_suggestions[0].count, 3);
    assert_eq!(summary.overall_feedback, "The expert consistently preferred concrete answers.");

    assert_eq!(model.step_calls(), 3);
    assert_eq!(model.summary_calls(), 1);
}

#[tokio::test]
async fn test_failed_step_call_gets_fallback_artifact() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 3).await;
    let model = Arc::new(StubModel::ok().with_failing_step_call(2));

    analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    let artifacts = load_artifacts(&pool, session_id).await;
    assert_eq!(artifacts.len(), 3);

    // Second question was answered "B" by the expert
    let failed = &artifacts[1];
    assert_eq!(failed.severity_score, 0.5);
    assert_eq!(failed.rationale_digest, "Analysis failed due to an error.");
    assert_eq!(failed.winner_flag, WinnerFlag::B);
    assert_eq!(failed.knowledge_gaps, vec!["Analysis error"]);
    assert_eq!(failed.prompt_suggestions, vec!["Retry analysis"]);

    assert_eq!(artifacts[0].severity_score, 0.8);
    assert_eq!(artifacts[2].severity_score, 0.8);
}

#[tokio::test]
async fn test_unparseable_step_reply_gets_fallback_artifact() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 1).await;
    let model = Arc::new(StubModel::ok().with_step_reply("I cannot answer that."));

    analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    let artifacts = load_artifacts(&pool, session_id).await;
    assert_eq!(artifacts[0].rationale_digest, "Analysis failed due to an error.");
    assert_eq!(artifacts[0].winner_flag, WinnerFlag::A);
}

#[tokio::test]
async fn test_model_failing_everywhere_uses_statistical_summary() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 4).await;
    let model = Arc::new(StubModel::failing());

    let outcome = analyzer(&pool, &model).analyze_session(session_id).await.unwrap();
    assert_eq!(
        outcome,
        AnalysisOutcome::Processed {
            artifact_count: 4,
            summary_source: SummarySource::Statistical,
        }
    );

    let summary = load_summary(&pool, session_id).await;
    let insights = &summary.aggregated_insights;
    assert_eq!(insights.question_count, 4);
    assert!((insights.average_severity_score - 0.5).abs() < 1e-9);
    assert_eq!(insights.top_knowledge_gaps.len(), 1);
    assert_eq!(insights.top_knowledge_gaps[0].gap, "Analysis error");
    assert_eq!(insights.top_knowledge_gaps[0].count, 4);
    assert_eq!(insights.top_prompt_suggestions[0].suggestion, "Retry analysis");
    assert!(summary.overall_feedback.starts_with(STATISTICAL_HEADER));
    assert!(summary.overall_feedback.contains("Average severity score: 0.50"));
}

#[tokio::test]
async fn test_forced_failure_on_last_insert_rolls_back_everything() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 3).await;
    sqlx::query(
        "CREATE TRIGGER fail_summary BEFORE INSERT ON session_summaries BEGIN SELECT RAISE(ABORT, 'forced failure'); END;",
    )
    .execute(&pool)
    .await
    .unwrap();
    let model = Arc::new(StubModel::ok());

    let result = analyzer(&pool, &model).analyze_session(session_id).await;

    assert!(result.is_err());
    assert_eq!(count_rows(&pool, "analysis_artifacts", session_id).await, 0);
    assert_eq!(count_rows(&pool, "session_summaries", session_id).await, 0);
    assert!(!is_processed(&pool, session_id).await);

    // Once the fault is gone the same session can still be analyzed
    sqlx::query("DROP TRIGGER fail_summary").execute(&pool).await.unwrap();
    analyzer(&pool, &model).analyze_session(session_id).await.unwrap();
    assert_eq!(count_rows(&pool, "analysis_artifacts", session_id).await, 3);
}

#[tokio::test]
async fn test_reinvoking_processed_session_writes_nothing() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 2).await;
    let model = Arc::new(StubModel::ok());
    let analyzer = analyzer(&pool, &model);

    analyzer.analyze_session(session_id).await.unwrap();
    let calls_after_first = model.step_calls();

    let second = analyzer.analyze_session(session_id).await.unwrap();

    assert_eq!(second, AnalysisOutcome::AlreadyProcessed);
    assert_eq!(count_rows(&pool, "analysis_artifacts", session_id).await, 2);
    assert_eq!(count_rows(&pool, "session_summaries", session_id).await, 1);
    assert_eq!(model.step_calls(), calls_after_first);
}

#[tokio::test]
async fn test_concurrent_runs_commit_once() {
    let (_dir, pool) = create_test_db().await;
    let (session_id, _) = seed_answered_session(&pool, 2).await;
    let model = Arc::new(StubModel::ok());
    let first = analyzer(&pool, &model);
    let second = analyzer(&pool, &model);

    let (a, b) = tokio::join!(first.analyze_session(session_id), second.analyze_session(session_id));
    let outcomes = [a.unwrap(), b.unwrap()];

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, AnalysisOutcome::Processed { .. }))
        .count();
    assert_eq!(processed, 1);
    assert_eq!(count_rows(&pool, "analysis_artifacts", session_id).await, 2);
    assert_eq!(count_rows(&pool, "session_summaries", session_id).await, 1);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (_dir, pool) = create_test_db().await;
    let model = Arc::new(StubModel::ok());

    let err = analyzer(&pool, &model).analyze_session(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, xpi_common::Error::NotFound(_)));
}

#[tokio::test]
async fn test_in_progress_session_is_rejected() {
    let (_dir, pool) = create_test_db().await;
    let (project_id, _) = seed_project(&pool, 1).await;
    let session_id = seed_session(&pool, project_id, "IN_PROGRESS").await;
    let model = Arc::new(StubModel::ok());

    let err = analyzer(&pool, &model).analyze_session(session_id).await.unwrap_err();
    assert!(matches!(err, xpi_common::Error::Conflict(_)));
    assert!(!is_processed(&pool, session_id).await);
}

#[tokio::test]
async fn test_plain_transcript_is_normalized_in_prompt() {
    let (_dir, pool) = create_test_db().await;
    let (project_id, pair_ids) = seed_project(&pool, 1).await;
    let session_id = seed_session(&pool, project_id, "COMPLETED").await;
    seed_step(
        &pool,
        session_id,
        project_id,
        pair_ids[0],
        "B",
        "agent: Why B?\n\nIt explains the edge case\nuser:  B covers: retries ",
    )
    .await;
    let model = Arc::new(StubModel::ok());

    analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    let step_prompt = &model.prompts()[0];
    assert!(step_prompt.contains("INTERVIEW TRANSCRIPT:\nagent: Why B?\nsystem: It explains the edge case\nuser: B covers: retries\n"));
    assert!(step_prompt.contains("EXPERT'S CHOICE: B"));
    assert!(step_prompt.contains("QUESTION: Question 1?"));
}

#[tokio::test]
async fn test_artifacts_follow_question_order() {
    let (_dir, pool) = create_test_db().await;
    let (project_id, pair_ids) = seed_project(&pool, 3).await;
    let session_id = seed_session(&pool, project_id, "COMPLETED").await;
    // Answer in reverse order; prompts must still follow sort order
    for pair_id in pair_ids.iter().rev() {
        seed_step(&pool, session_id, project_id, *pair_id, "A", "user: A").await;
    }
    let model = Arc::new(StubModel::ok());

    analyzer(&pool, &model).analyze_session(session_id).await.unwrap();

    let prompts = model.prompts();
    assert!(prompts[0].contains("QUESTION: Question 1?"));
    assert!(prompts[1].contains("QUESTION: Question 2?"));
    assert!(prompts[2].contains("QUESTION: Question 3?"));

    let stored: Vec<String> = sqlx::query("SELECT question_pair_id FROM analysis_artifacts WHERE session_id = ?")
        .bind(session_id.to_string())
        .fetch_all(&pool)
        .await
        .unwrap()
        .iter()
        .map(|row| row.get::<String, _>("question_pair_id"))
        .collect();
    assert_eq!(stored.len(), 3);
}
