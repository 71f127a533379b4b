//! Analysis trigger endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::info;
use xpi_common::db::SessionStatus;
use xpi_common::ids;

use crate::db::sessions::get_session;
use crate::jobs::spawn_analysis_job;
use crate::{ApiError, ApiResult, AppState};

pub const QUEUED_MESSAGE: &str = "Analysis job queued";
pub const ALREADY_PROCESSED_MESSAGE: &str = "Session already processed";

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// POST /analyze/:session_id
///
/// Validates the session, queues the job and answers 202 without waiting
/// for it. A processed session answers 200 and queues nothing.
pub async fn trigger_analysis(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let session_id = ids::parse(&session_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid session id: {}", session_id)))?;

    let session = get_session(&state.db, session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Interview session {}", session_id)))?;

    if session.processed {
        return Ok((
            StatusCode::OK,
            Json(MessageResponse {
                message: ALREADY_PROCESSED_MESSAGE.to_string(),
            }),
        ));
    }

    if session.status != SessionStatus::Completed {
        return Err(ApiError::Conflict(format!(
            "Interview session {} is not completed",
            session_id
        )));
    }

    info!(session_id = %session_id, "Analysis job queued");
    spawn_analysis_job(state.clone(), session_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: QUEUED_MESSAGE.to_string(),
        }),
    ))
}

/// Build analysis trigger routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze/:session_id", post(trigger_analysis))
}
