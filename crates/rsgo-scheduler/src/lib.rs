//! Admission scheduling for ticker processing.
//!
//! Turns "all known tickers" into "the work that should run now":
//!
//! - [`AdmissionScheduler::prioritize`]: GO tickers first, then
//!   `weight x confidence` descending
//! - [`AdmissionScheduler::admit`]: reserve a task's estimate against the
//!   [`ResourceBudget`](rsgo_core::ResourceBudget) or park it in the pending queue
//! - [`AdmissionScheduler::release`]: return the reservation (idempotent)
//!
//! All ledger mutation happens under one short critical section; nothing
//! here blocks on I/O.

pub mod admission;
pub mod error;
pub mod priority;

pub use admission::{
    Admission, AdmissionScheduler, AdmissionToken, RejectReason, SchedulerStatistics, Utilization,
};
pub use error::{SchedulerError, SchedulerResult};
pub use priority::{is_urgent, priority_score};
