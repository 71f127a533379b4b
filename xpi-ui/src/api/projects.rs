//! Project endpoints: CRUD, CSV upload, questions, stats and export

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use xpi_common::db::{CsvFile, Project, QuestionPair};

use super::parse_id;
use crate::db::projects;
use crate::services::csv_import::{self, ImportResult};
use crate::services::export::generate_project_export;
use crate::services::stats::{project_stats, ProjectStats};
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvUploadRequest {
    pub filename: Option<String>,
    pub csv_content: String,
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    payload: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let Json(request) = payload?;
    let name = request.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Project name is required".to_string()));
    }

    let project = projects::create_project(&state.db, name).await?;
    info!(project_id = %project.id, name = %project.name, "Project created");

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(projects::list_projects(&state.db).await?))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Project>> {
    let project_id = parse_id("project", &project_id)?;
    Ok(Json(projects::require_project(&state.db, project_id).await?))
}

/// POST /api/projects/:id/csv
pub async fn upload_csv(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    payload: Result<Json<CsvUploadRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ImportResult>)> {
    let Json(request) = payload?;
    let project_id = parse_id("project", &project_id)?;
    let result = csv_import::import_csv(
        &state.db,
        project_id,
        request.filename.as_deref(),
        &request.csv_content,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(result)))
}

/// GET /api/projects/:id/questions
pub async fn list_questions(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<QuestionPair>>> {
    let project_id = parse_id("project", &project_id)?;
    projects::require_project(&state.db, project_id).await?;
    Ok(Json(projects::list_question_pairs(&state.db, project_id, None).await?))
}

/// GET /api/projects/:id/csv-files
pub async fn list_csv_files(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<Vec<CsvFile>>> {
    let project_id = parse_id("project", &project_id)?;
    projects::require_project(&state.db, project_id).await?;
    Ok(Json(projects::list_csv_files(&state.db, project_id).await?))
}

/// GET /api/projects/:id/stats
pub async fn get_stats(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ProjectStats>> {
    let project_id = parse_id("project", &project_id)?;
    Ok(Json(project_stats(&state.db, project_id).await?))
}

/// GET /api/projects/:id/export
pub async fn export_project(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let project_id = parse_id("project", &project_id)?;
    let csv = generate_project_export(&state.db, project_id).await?;
    let disposition = format!("attachment; filename=\"project-{}-export.csv\"", project_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}

/// Build project routes
pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", post(create_project).get(list_projects))
        .route("/api/projects/:id", get(get_project))
        .route("/api/projects/:id/csv", post(upload_csv))
        .route("/api/projects/:id/questions", get(list_questions))
        .route("/api/projects/:id/csv-files", get(list_csv_files))
        .route("/api/projects/:id/stats", get(get_stats))
        .route("/api/projects/:id/export", get(export_project))
}
