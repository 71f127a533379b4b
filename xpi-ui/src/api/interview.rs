//! Interview start endpoint

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::services::interview::{self, StartedInterview};
use crate::{ApiResult, AppState};

/// POST /api/interview/:link_id/start
///
/// Resumes the link's in-progress session when there is one.
pub async fn start_interview(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<StartedInterview>> {
    Ok(Json(interview::start_interview(&state.db, &link_id).await?))
}

/// Build interview routes
pub fn interview_routes() -> Router<AppState> {
    Router::new().route("/api/interview/:link_id/start", post(start_interview))
}
