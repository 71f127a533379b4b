//! xpi-an library interface
//!
//! Analysis trigger service: scores completed interview sessions with a chat
//! model and stores per-question artifacts plus a session summary.

pub mod analyzer;
pub mod api;
pub mod db;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod sweep;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::analyzer::SessionAnalyzer;
use crate::jobs::InFlightSet;
use crate::llm::ChatModel;

/// Application state shared across handlers, jobs and the sweep
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub analyzer: SessionAnalyzer,
    /// Sessions with an analysis job running in this process
    pub in_flight: InFlightSet,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last job error, reported by /health
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(db: SqlitePool, model: Arc<dyn ChatModel>) -> Self {
        Self {
            analyzer: SessionAnalyzer::new(db.clone(), model),
            db,
            in_flight: InFlightSet::default(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::analyze_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
