//! HTTP API handlers for xpi-ui

pub mod health;
pub mod interview;
pub mod links;
pub mod projects;
pub mod sessions;

pub use health::health_routes;
pub use interview::interview_routes;
pub use links::link_routes;
pub use projects::project_routes;
pub use sessions::session_routes;

use uuid::Uuid;
use xpi_common::ids;

use crate::ApiError;

/// Parse a UUID path segment, answering 400 when malformed
pub(crate) fn parse_id(kind: &str, raw: &str) -> Result<Uuid, ApiError> {
    ids::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {} id: {}", kind, raw)))
}
