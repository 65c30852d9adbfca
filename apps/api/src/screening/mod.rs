// Screening: job-requirement parsing, scoring, ranking and the concurrent batch pipeline.
// Per-candidate problems never surface as ScreeningError; they become warnings on the row.

pub mod fit_scoring;
pub mod handlers;
pub mod jd_parser;
pub mod pipeline;
pub mod pool;
pub mod ranker;

use thiserror::Error;

/// Batch-level failures. Any of these aborts the whole screening.
#[derive(Debug, Error)]
pub enum ScreeningError {
    #[error("invalid factor weights: {0}")]
    InvalidWeightConfig(String),

    #[error("invalid screening configuration: {0}")]
    InvalidConfig(String),

    #[error("job description contains no recognizable requirements")]
    EmptyJobDescription,

    #[error("screening was cancelled")]
    Cancelled,
}
