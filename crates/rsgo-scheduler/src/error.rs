//! Scheduler error types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SchedulerError {
    #[error("Invalid budget: {0}")]
    InvalidBudget(String),

    #[error("Invalid priority weight for {ticker}: {weight}")]
    InvalidWeight { ticker: String, weight: f64 },
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
