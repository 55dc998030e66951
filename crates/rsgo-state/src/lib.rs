//! Ticker lifecycle state machine.
//!
//! Owns one `TickerState` per watched ticker and is the only writer of it.
//!
//! # Key Components
//!
//! - [`StateMachine`]: validated READY/SET/GO/COOLDOWN transitions, per-ticker
//!   serialized access, snapshot reads
//! - [`CooldownQueue`]: min-heap of cooldown expiries with generation-based
//!   invalidation of re-armed or cancelled timers
//! - [`TransitionHistory`]: bounded ring buffer of past transitions
//! - [`StateStatistics`]: side-effect-free aggregation over all tickers

pub mod cooldown;
pub mod error;
pub mod history;
pub mod machine;
pub mod stats;

pub use cooldown::CooldownQueue;
pub use error::{StateError, StateResult};
pub use history::TransitionHistory;
pub use machine::{StateMachine, StateMachineConfig, DEFAULT_COOLDOWN_MS, DEFAULT_HISTORY_CAPACITY};
pub use stats::StateStatistics;
