//! Cleaning and anomaly-scoring pipeline for uploaded personal health
//! measurements, plus the weekly rollup and dashboard data built on top.

pub mod clean;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod forest;
pub mod ingest;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod scorer;
pub mod stats;
pub mod table;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use table::{HealthTable, RawTable, ScoredTable};
