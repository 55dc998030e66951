//! Worker abstraction.
//!
//! A worker turns one `ProcessingTask` into a `TaskOutput`. The executor
//! owns timeouts and slot accounting, so workers only compute.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rsgo_core::{ProcessingTask, TaskOutput, Ticker};

use crate::error::TaskError;

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Computes the result of one task.
pub trait TaskWorker: Send + Sync {
    fn process(&self, task: ProcessingTask) -> BoxFuture<'_, Result<TaskOutput, TaskError>>;
}

/// Type alias for shared worker.
pub type DynTaskWorker = Arc<dyn TaskWorker>;

// ============================================================================
// MockWorker
// ============================================================================

/// Scripted outcome for [`MockWorker`].
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Succeed(TaskOutput),
    Fail(String),
    /// Succeed after sleeping.
    Delay(Duration, TaskOutput),
    /// Never complete.
    Hang,
    Panic(String),
}

/// Mock worker for testing.
///
/// Behaves per ticker (falling back to a default) and records calls and
/// peak concurrency.
pub struct MockWorker {
    default: parking_lot::Mutex<MockBehavior>,
    per_ticker: parking_lot::Mutex<HashMap<Ticker, MockBehavior>>,
    calls: parking_lot::Mutex<Vec<Ticker>>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Default for MockWorker {
    fn default() -> Self {
        Self::new(MockBehavior::Succeed(TaskOutput::default()))
    }
}

impl MockWorker {
    #[must_use]
    pub fn new(default: MockBehavior) -> Self {
        Self {
            default: parking_lot::Mutex::new(default),
            per_ticker: parking_lot::Mutex::new(HashMap::new()),
            calls: parking_lot::Mutex::new(Vec::new()),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_default(&self, behavior: MockBehavior) {
        *self.default.lock() = behavior;
    }

    pub fn set_behavior(&self, ticker: Ticker, behavior: MockBehavior) {
        self.per_ticker.lock().insert(ticker, behavior);
    }

    /// Tickers processed so far, in call order.
    pub fn calls(&self) -> Vec<Ticker> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Highest number of tasks this worker ran at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    fn behavior_for(&self, ticker: &Ticker) -> MockBehavior {
        self.per_ticker
            .lock()
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| self.default.lock().clone())
    }
}

struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl TaskWorker for MockWorker {
    fn process(&self, task: ProcessingTask) -> BoxFuture<'_, Result<TaskOutput, TaskError>> {
        let behavior = self.behavior_for(&task.ticker);
        self.calls.lock().push(task.ticker.clone());
        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        let guard = ActiveGuard(Arc::clone(&self.active));

        Box::pin(async move {
            let _guard = guard;
            match behavior {
                MockBehavior::Succeed(output) => Ok(output),
                MockBehavior::Fail(message) => Err(TaskError::Failed(message)),
                MockBehavior::Delay(delay, output) => {
                    tokio::time::sleep(delay).await;
                    Ok(output)
                }
                MockBehavior::Hang => std::future::pending().await,
                MockBehavior::Panic(message) => panic!("{message}"),
            }
        })
    }
}
