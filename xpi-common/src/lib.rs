//! # XPI Common Library
//!
//! Shared code for both XPI services:
//! - Database initialization and row models
//! - Configuration loading
//! - Transcript model (plain text vs. structured message list)
//! - CSV codec used by ingestion and export
//! - Identifier helpers

pub mod config;
pub mod csv;
pub mod db;
pub mod error;
pub mod ids;
pub mod transcript;

pub use error::{Error, Result};
pub use transcript::{Message, Transcript};
