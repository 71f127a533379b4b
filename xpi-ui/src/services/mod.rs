//! Application services layered over the database queries

pub mod csv_import;
pub mod export;
pub mod interview;
pub mod stats;
pub mod trigger;

pub use trigger::AnalysisTrigger;
