use std::time::Duration;

use thiserror::Error;

/// Errors reported across the worker boundary as error-tagged responses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("malformed analysis request: {0}")]
    Malformed(String),

    #[error("invalid sample rate {0}, expected a finite value > 0")]
    InvalidSampleRate(f64),

    #[error("window size {0} exceeds the maximum of {1}")]
    WindowTooLarge(usize, usize),

    #[error("analysis panicked: {0}")]
    Panicked(String),

    #[error("no analysis response within {0:?}")]
    Timeout(Duration),

    #[error("analysis worker is no longer running")]
    WorkerGone,
}
