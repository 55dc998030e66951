//! Core domain types for the rsgo ticker lifecycle engine.
//!
//! This crate provides the types shared by every component:
//! - `Ticker`, `TickerStatus`, `TickerState`: per-symbol lifecycle state
//! - `ProcessingTask`, `ProcessingResult`: units of work and their outcomes
//! - `ResourceBudget`, `ResourceUsage`: admission-control counters
//! - `LifecycleEvent`, `EventBus`: in-process publish/subscribe
//! - `Clock`: wall-clock abstraction for deterministic tests

pub mod clock;
pub mod error;
pub mod event;
pub mod resources;
pub mod signal;
pub mod task;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, Result};
pub use event::{EventBus, LifecycleEvent, DEFAULT_EVENT_CAPACITY};
pub use resources::{PriorityWeights, ResourceBudget, ResourceEstimate, ResourceKind, ResourceUsage};
pub use signal::SignalFactors;
pub use task::{ProcessingResult, ProcessingTask, TaskId, TaskKind, TaskOutput};
pub use types::{FibZone, StateTransition, Ticker, TickerState, TickerStatus, TickerUpdate};
