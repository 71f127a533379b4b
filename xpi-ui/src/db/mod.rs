//! Database access for xpi-ui
//!
//! The schema is created by `xpi_common::db::init`. Queries here cover
//! projects, CSV files and question pairs, interview links, sessions and
//! step records. Analysis results are read-only from this service.

pub mod links;
pub mod projects;
pub mod sessions;
pub mod steps;
