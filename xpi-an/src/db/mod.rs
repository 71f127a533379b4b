//! Database access for xpi-an
//!
//! The schema is owned by `xpi_common::db::init`; this module only reads
//! sessions and step records and writes analysis results.

pub mod analysis;
pub mod sessions;
