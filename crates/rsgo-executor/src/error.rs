//! Executor error types.

use thiserror::Error;

/// Lifecycle misuse, returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Executor already running")]
    AlreadyRunning,

    #[error("Executor not running")]
    NotRunning,

    #[error("Invalid worker count: {0}")]
    InvalidWorkerCount(usize),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Why a single task did not succeed. Rendered into `ProcessingResult.error`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),

    #[error("worker panicked: {0}")]
    Panicked(String),

    #[error("cancelled")]
    Cancelled,
}

impl TaskError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskError::Timeout(_))
    }
}
