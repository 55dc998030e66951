//! Bounded concurrent executor for processing tasks.
//!
//! # Key Components
//!
//! - [`ConcurrentExecutor`]: fixed pool of worker slots, chunked batch
//!   execution, hard per-task timeouts, bounded shutdown drain
//! - [`TaskWorker`]: what a worker computes for one task
//! - [`InflightTracker`]: lock-free count of running tasks
//! - [`MockWorker`]: scripted worker for tests
//!
//! # Batch Execution
//!
//! 1. Order tasks (urgent first when `respect_priority`)
//! 2. Split into chunks of `min(max_concurrent, worker_count)`
//! 3. Run a chunk concurrently; every task races its timeout
//! 4. Wait for the whole chunk to settle, then start the next
//!
//! A failed, panicked or timed-out task becomes a failed
//! `ProcessingResult`; it never aborts its siblings.

pub mod error;
pub mod inflight;
pub mod pool;
pub mod slots;
pub mod worker;

pub use error::{ExecutorError, ExecutorResult, TaskError};
pub use inflight::InflightTracker;
pub use pool::{
    BatchOptions, ConcurrentExecutor, ExecutorStatistics, ShutdownReport, DEFAULT_TASK_TIMEOUT_MS,
};
pub use slots::{WorkerLease, WorkerSlots};
pub use worker::{BoxFuture, DynTaskWorker, MockBehavior, MockWorker, TaskWorker};
