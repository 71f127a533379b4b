//! Interview session endpoints: detail, next question, answers, completion

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use xpi_common::db::{InterviewSession, StepRecord};

use super::parse_id;
use crate::services::interview::{self, NextQuestion, SessionDetail, SubmitAnswer};
use crate::{ApiResult, AppState};

/// GET /api/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionDetail>> {
    let session_id = parse_id("session", &session_id)?;
    Ok(Json(interview::session_detail(&state.db, session_id).await?))
}

/// GET /api/sessions/:session_id/next
pub async fn next_question(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<NextQuestion>> {
    let session_id = parse_id("session", &session_id)?;
    Ok(Json(interview::next_question(&state.db, session_id).await?))
}

/// POST /api/sessions/:session_id/answers
pub async fn submit_answer(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<SubmitAnswer>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StepRecord>)> {
    let Json(answer) = payload?;
    let session_id = parse_id("session", &session_id)?;
    let record = interview::submit_answer(&state.db, session_id, answer).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/sessions/:session_id/complete
pub async fn complete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<InterviewSession>> {
    let session_id = parse_id("session", &session_id)?;
    Ok(Json(
        interview::complete_session(&state.db, &state.trigger, session_id).await?,
    ))
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/sessions/:session_id", get(get_session))
        .route("/api/sessions/:session_id/next", get(next_question))
        .route("/api/sessions/:session_id/answers", post(submit_answer))
        .route("/api/sessions/:session_id/complete", post(complete_session))
}
