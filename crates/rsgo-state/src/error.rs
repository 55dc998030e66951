//! State machine error types.

use rsgo_core::{Ticker, TickerStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Ticker not found: {0}")]
    NotFound(Ticker),

    #[error("Ticker already exists: {0}")]
    AlreadyExists(Ticker),

    #[error("Invalid transition for {ticker}: {from} -> {to}")]
    InvalidTransition {
        ticker: Ticker,
        from: TickerStatus,
        to: TickerStatus,
    },
}

pub type StateResult<T> = Result<T, StateError>;
