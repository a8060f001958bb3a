use crate::run::{RunId, RunStatus, WorkerId};

/// Errors raised by run submission, lookup and state transitions.
///
/// `Validation` and `NotFound` are returned synchronously to callers. The
/// dispatch-time variants are never returned to a caller; their `Display`
/// text is what ends up in a run's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("test run {0} not found")]
    NotFound(RunId),

    #[error("no workers available")]
    NoWorkerAvailable,

    #[error("{0}")]
    ExecutionFailure(String),

    #[error("maximum retries exceeded")]
    RetriesExhausted,

    #[error("invalid run transition from {from} to {to}")]
    InvalidTransition { from: RunStatus, to: RunStatus },
}

impl RunError {
    pub(crate) fn validation(
        field: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Errors from worker pool construction and check-in.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool requires at least one worker")]
    Empty,

    #[error("duplicate worker id {0}")]
    Duplicate(WorkerId),

    #[error("worker {0} is not part of this pool")]
    UnknownWorker(WorkerId),

    #[error("worker {0} is not checked out")]
    NotCheckedOut(WorkerId),
}

/// Errors from configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    #[error("simulated delay range is inverted: min {min_ms}ms > max {max_ms}ms")]
    InvertedDelayRange { min_ms: u64, max_ms: u64 },

    #[error("pass rate must be within 0.0..=1.0, got {0}")]
    PassRateOutOfRange(f64),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
