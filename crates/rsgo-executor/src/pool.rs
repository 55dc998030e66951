//! Concurrent executor.

use std::any::Any;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::future::join_all;
use parking_lot::Mutex;
use rsgo_core::{
    Clock, EventBus, LifecycleEvent, ProcessingResult, ProcessingTask, TaskId, TaskOutput,
};
use serde::Serialize;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, ExecutorResult, TaskError};
use crate::inflight::InflightTracker;
use crate::slots::WorkerSlots;
use crate::worker::DynTaskWorker;

/// Default per-task timeout.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 5_000;

const NO_WORKER: usize = usize::MAX;

// ============================================================================
// Options and reports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Upper bound on tasks run at once (further capped by worker count).
    pub max_concurrent: usize,
    pub timeout_ms: u64,
    /// Dispatch urgent tasks first. Results still come back in input order.
    pub respect_priority: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent: usize::MAX,
            timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            respect_priority: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Whether every in-flight task finished inside the drain window.
    pub drained: bool,
    /// Tasks aborted after the drain window.
    pub abandoned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorStatistics {
    pub running: bool,
    pub worker_count: usize,
    pub in_flight: usize,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub batches: u64,
    pub average_processing_ms: f64,
    /// `failed / processed`.
    pub error_rate: f64,
    /// Processed tasks per second since the current start.
    pub throughput_per_sec: f64,
}

#[derive(Debug, Default)]
struct Counters {
    processed: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
    batches: AtomicU64,
    total_time_ms: AtomicU64,
}

#[derive(Debug)]
struct RunningPool {
    slots: Arc<WorkerSlots>,
    started_at: Instant,
}

// ============================================================================
// ConcurrentExecutor
// ============================================================================

/// Runs tasks on a bounded pool of worker slots.
///
/// ```text
/// STOPPED --start(n)--> RUNNING --shutdown(drain)--> STOPPED
/// ```
pub struct ConcurrentExecutor {
    worker: DynTaskWorker,
    clock: Arc<dyn Clock>,
    events: EventBus,
    running: Mutex<Option<RunningPool>>,
    inflight: Arc<InflightTracker>,
    /// Spawned tasks not yet collected, for abort on shutdown.
    handles: DashMap<TaskId, AbortHandle>,
    counters: Counters,
    /// `processed` at the latest start, for throughput.
    processed_at_start: AtomicU64,
}

impl std::fmt::Debug for ConcurrentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentExecutor")
            .field("running", &self.is_running())
            .field("in_flight", &self.inflight.current())
            .finish()
    }
}

impl ConcurrentExecutor {
    pub fn new(worker: DynTaskWorker, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            worker,
            clock,
            events,
            running: Mutex::new(None),
            inflight: Arc::new(InflightTracker::new()),
            handles: DashMap::new(),
            counters: Counters::default(),
            processed_at_start: AtomicU64::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Provision `worker_count` worker slots.
    pub fn start(&self, worker_count: usize) -> ExecutorResult<()> {
        if worker_count == 0 {
            return Err(ExecutorError::InvalidWorkerCount(worker_count));
        }
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(ExecutorError::AlreadyRunning);
        }
        *running = Some(RunningPool {
            slots: Arc::new(WorkerSlots::new(worker_count)),
            started_at: Instant::now(),
        });
        self.processed_at_start
            .store(self.counters.processed.load(Ordering::Relaxed), Ordering::Relaxed);
        info!(worker_count, "Executor started");
        Ok(())
    }

    /// Stop accepting batches and drain.
    ///
    /// Waits up to `drain_timeout` for in-flight tasks, then aborts the rest.
    /// Never blocks longer than the drain window.
    pub async fn shutdown(&self, drain_timeout: Duration) -> ExecutorResult<ShutdownReport> {
        let pool = self
            .running
            .lock()
            .take()
            .ok_or(ExecutorError::NotRunning)?;
        pool.slots.close();

        let in_flight = self.inflight.current();
        info!(in_flight, drain_ms = drain_timeout.as_millis() as u64, "Executor draining");

        let drained = tokio::time::timeout(drain_timeout, self.inflight.wait_idle())
            .await
            .is_ok();

        let mut abandoned = 0;
        if !drained {
            abandoned = self.inflight.current();
            for handle in self.handles.iter() {
                handle.value().abort();
            }
            warn!(abandoned, "Drain window elapsed, aborting in-flight tasks");
        }
        self.handles.clear();

        info!(drained, abandoned, "Executor stopped");
        Ok(ShutdownReport { drained, abandoned })
    }

    /// Change the number of worker slots while running.
    pub fn resize(&self, worker_count: usize) -> ExecutorResult<()> {
        if worker_count == 0 {
            return Err(ExecutorError::InvalidWorkerCount(worker_count));
        }
        let running = self.running.lock();
        let pool = running.as_ref().ok_or(ExecutorError::NotRunning)?;
        pool.slots.resize(worker_count);
        info!(worker_count, "Executor resized");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.running
            .lock()
            .as_ref()
            .map_or(0, |pool| pool.slots.size())
    }

    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.current()
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    /// Run `tasks` in chunks of `min(max_concurrent, worker_count)`.
    ///
    /// Returns one result per input task, in input order.
    pub async fn run_batch(
        &self,
        tasks: Vec<ProcessingTask>,
        options: BatchOptions,
    ) -> ExecutorResult<Vec<ProcessingResult>> {
        let slots = self.slots()?;
        let total = tasks.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let mut indexed: Vec<(usize, ProcessingTask)> = tasks.into_iter().enumerate().collect();
        if options.respect_priority {
            indexed.sort_by_key(|(_, task)| !task.urgent);
        }

        let timeout = Duration::from_millis(options.timeout_ms);
        let mut results: Vec<Option<ProcessingResult>> = (0..total).map(|_| None).collect();
        let mut queue = indexed.into_iter();

        loop {
            let chunk_size = options.max_concurrent.min(slots.size()).max(1);
            let chunk: Vec<(usize, ProcessingTask)> = queue.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            debug!(size = chunk.len(), "Dispatching chunk");

            let settled = join_all(chunk.into_iter().map(|(index, task)| {
                let slots = Arc::clone(&slots);
                async move { (index, self.run_one(slots, task, timeout).await) }
            }))
            .await;

            for (index, result) in settled {
                results[index] = Some(result);
            }
        }

        let results: Vec<ProcessingResult> = results.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.success).count();
        self.counters.batches.fetch_add(1, Ordering::Relaxed);
        self.events.publish(LifecycleEvent::BatchProcessed {
            count: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            timestamp: self.clock.now_ms(),
        });
        debug!(count = results.len(), succeeded, "Batch processed");
        Ok(results)
    }

    async fn run_one(
        &self,
        slots: Arc<WorkerSlots>,
        task: ProcessingTask,
        timeout: Duration,
    ) -> ProcessingResult {
        let started = Instant::now();
        let worker_slot = Arc::new(AtomicUsize::new(NO_WORKER));

        let mut handle = {
            let worker = Arc::clone(&self.worker);
            let inflight = Arc::clone(&self.inflight);
            let worker_slot = Arc::clone(&worker_slot);
            let task = task.clone();
            tokio::spawn(async move {
                let lease = slots.acquire().await.map_err(|_| TaskError::Cancelled)?;
                worker_slot.store(lease.id(), Ordering::Release);
                let _inflight = inflight.enter();
                let outcome = worker.process(task).await;
                drop(lease);
                outcome
            })
        };
        self.handles.insert(task.id.clone(), handle.abort_handle());

        let outcome = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(TaskError::Panicked(panic_message(join_err.into_panic())))
            }
            Ok(Err(_)) => Err(TaskError::Cancelled),
            Err(_) => {
                // Best effort: the slot frees once the worker future is dropped.
                handle.abort();
                Err(TaskError::Timeout(timeout.as_millis() as u64))
            }
        };
        self.handles.remove(&task.id);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let worker_id = match worker_slot.load(Ordering::Acquire) {
            NO_WORKER => None,
            id => Some(id),
        };
        self.record(&task, outcome, elapsed_ms, worker_id)
    }

    fn record(
        &self,
        task: &ProcessingTask,
        outcome: Result<TaskOutput, TaskError>,
        elapsed_ms: u64,
        worker_id: Option<usize>,
    ) -> ProcessingResult {
        let now = self.clock.now_ms();
        self.counters.processed.fetch_add(1, Ordering::Relaxed);
        self.counters
            .total_time_ms
            .fetch_add(elapsed_ms, Ordering::Relaxed);

        match outcome {
            Ok(output) => {
                self.counters.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(ticker = %task.ticker, elapsed_ms, ?worker_id, "Task completed");
                self.events.publish(LifecycleEvent::TaskCompleted {
                    ticker: task.ticker.clone(),
                    task_id: task.id.clone(),
                    duration_ms: elapsed_ms,
                    worker_id,
                });
                ProcessingResult::succeeded(task, output, elapsed_ms, now, worker_id)
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                if err.is_timeout() {
                    self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                }
                let message = err.to_string();
                debug!(ticker = %task.ticker, elapsed_ms, error = %message, "Task failed");
                self.events.publish(LifecycleEvent::TaskFailed {
                    ticker: task.ticker.clone(),
                    task_id: task.id.clone(),
                    error: message.clone(),
                    duration_ms: elapsed_ms,
                    timed_out: err.is_timeout(),
                });
                ProcessingResult::failed(task, message, elapsed_ms, now, worker_id)
            }
        }
    }

    fn slots(&self) -> ExecutorResult<Arc<WorkerSlots>> {
        self.running
            .lock()
            .as_ref()
            .map(|pool| Arc::clone(&pool.slots))
            .ok_or(ExecutorError::NotRunning)
    }

    // ------------------------------------------------------------------------
    // Statistics
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn statistics(&self) -> ExecutorStatistics {
        let (running, worker_count, uptime) = match self.running.lock().as_ref() {
            Some(pool) => (true, pool.slots.size(), pool.started_at.elapsed()),
            None => (false, 0, Duration::ZERO),
        };
        let processed = self.counters.processed.load(Ordering::Relaxed);
        let failed = self.counters.failed.load(Ordering::Relaxed);
        let total_time_ms = self.counters.total_time_ms.load(Ordering::Relaxed);
        let since_start = processed.saturating_sub(self.processed_at_start.load(Ordering::Relaxed));

        ExecutorStatistics {
            running,
            worker_count,
            in_flight: self.inflight.current(),
            processed,
            succeeded: self.counters.succeeded.load(Ordering::Relaxed),
            failed,
            timed_out: self.counters.timed_out.load(Ordering::Relaxed),
            batches: self.counters.batches.load(Ordering::Relaxed),
            average_processing_ms: if processed > 0 {
                total_time_ms as f64 / processed as f64
            } else {
                0.0
            },
            error_rate: if processed > 0 {
                failed as f64 / processed as f64
            } else {
                0.0
            },
            throughput_per_sec: if uptime.as_secs_f64() > 0.0 {
                since_start as f64 / uptime.as_secs_f64()
            } else {
                0.0
            },
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
