//! xpi-ui library interface
//!
//! Application API: projects, CSV question ingestion, interview links, the
//! interview flow and project export. Completing a session triggers xpi-an.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::AnalysisTrigger;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Public base URL used to build interview link URLs
    pub app_url: String,
    pub trigger: AnalysisTrigger,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, app_url: impl Into<String>, trigger: AnalysisTrigger) -> Self {
        Self {
            db,
            app_url: app_url.into(),
            trigger,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::project_routes())
        .merge(api::link_routes())
        .merge(api::interview_routes())
        .merge(api::session_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
