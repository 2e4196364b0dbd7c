use thiserror::Error;

/// Failures surfaced to whoever submitted the upload or requested the report.
///
/// Row-level problems (bad timestamps, non-numeric tokens) never reach this
/// type; the cleaner drops or repairs them.
#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("Could not read file: {0}")]
    Parse(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
