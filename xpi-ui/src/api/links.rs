//! Interview link endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use xpi_common::db::{InterviewLink, InterviewSession, DEFAULT_ROW_QUOTA};

use super::parse_id;
use crate::db::links::{self, NewLink};
use crate::db::projects::require_project;
use crate::services::interview::{self, LinkView};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkRequest {
    pub name: String,
    pub interview_name: String,
    pub expiry_date: Option<DateTime<Utc>>,
    pub row_quota: Option<i64>,
}

impl CreateLinkRequest {
    fn validate(self, project_id: uuid::Uuid) -> Result<NewLink, ApiError> {
        let name = self.name.trim();
        let interview_name = self.interview_name.trim();
        if name.is_empty() || interview_name.is_empty() {
            return Err(ApiError::BadRequest(
                "Link name and interview name are required".to_string(),
            ));
        }

        let row_quota = self.row_quota.unwrap_or(DEFAULT_ROW_QUOTA);
        if row_quota < 1 {
            return Err(ApiError::BadRequest(format!(
                "rowQuota must be a positive integer (got {})",
                row_quota
            )));
        }

        Ok(NewLink {
            project_id,
            name: name.to_string(),
            interview_name: interview_name.to_string(),
            expiry_date: self.expiry_date,
            row_quota,
        })
    }
}

/// POST /api/projects/:id/links
pub async fn create_link(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InterviewLink>)> {
    let Json(request) = payload?;
    let project_id = parse_id("project", &project_id)?;
    require_project(&state.db, project_id).await?;

    let link = links::create_link(&state.db, request.validate(project_id)?, &state.app_url).await?;
    info!(link_id = %link.id, project_id = %project_id, row_quota = link.row_quota, "Interview link created");

    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/projects/:id/links
pub async fn list_links(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<InterviewLink>>> {
    let project_id = parse_id("project", &project_id)?;
    require_project(&state.db, project_id).await?;
    Ok(Json(links::list_links(&state.db, project_id).await?))
}

/// GET /api/links/:link_id
pub async fn get_link(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<LinkView>> {
    Ok(Json(interview::link_view(&state.db, &link_id).await?))
}

/// GET /api/links/:link_id/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<Vec<InterviewSession>>> {
    Ok(Json(interview::sessions_for_link(&state.db, &link_id).await?))
}

/// GET /api/links/:link_id/sessions/latest-completed
pub async fn latest_completed(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<InterviewSession>> {
    Ok(Json(interview::latest_completed_for_link(&state.db, &link_id).await?))
}

/// Build interview link routes
pub fn link_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/links", get(list_links).post(create_link))
        .route("/api/links/:link_id", get(get_link))
        .route("/api/links/:link_id/sessions", get(list_sessions))
        .route("/api/links/:link_id/sessions/latest-completed", get(latest_completed))
}
