// Error taxonomy for collection and aggregation.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// Invalid options or an even run count. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("step {requested} exceeds the declared step count {declared}")]
    StepOverflow { requested: u32, declared: u32 },

    #[error("run directory {} does not end in an integer run id", path.display())]
    InvalidRunId { path: PathBuf },

    #[error("metrics file of run {run_id} missing: {}", path.display())]
    MissingArtifact { run_id: u32, path: PathBuf },

    /// A statistical precondition does not hold (no contributors for a step, stddev with < 2 runs).
    #[error("statistics: {0}")]
    Statistics(String),

    /// The baseline read at collector construction failed.
    #[error("baseline counters: {0}")]
    Counter(#[from] CounterError),

    #[error("collector thread panicked")]
    CollectorPanicked,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure while reading OS counters. Recovered by skipping the sample.
#[derive(Debug, Error)]
pub enum CounterError {
    #[error("counter source unavailable: {0}")]
    Unavailable(&'static str),

    #[error("counter read: {0}")]
    Io(#[from] std::io::Error),

    #[error("counter parse: {0}")]
    Parse(String),

    #[error("counter {counter} went backwards against the baseline")]
    Reset { counter: &'static str },
}

pub type Result<T, E = MetricsError> = std::result::Result<T, E>;
