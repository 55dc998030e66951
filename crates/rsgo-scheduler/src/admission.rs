//! Resource-aware admission scheduler.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use parking_lot::{Mutex, RwLock};
use rsgo_core::{
    PriorityWeights, ProcessingTask, ResourceBudget, ResourceEstimate, ResourceKind,
    ResourceUsage, TaskId, Ticker, TickerState,
};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{SchedulerError, SchedulerResult};
use crate::priority;

// ============================================================================
// Admission outcome
// ============================================================================

/// Proof that a task's estimate is reserved against the budget.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionToken {
    pub task_id: TaskId,
    pub ticker: Ticker,
    pub estimate: ResourceEstimate,
}

/// Why a task was not admitted. A normal scheduling signal, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Admitting would exceed this budget dimension.
    BudgetExhausted(ResourceKind),
    /// The task already holds a reservation.
    AlreadyAdmitted,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::BudgetExhausted(kind) => write!(f, "budget exhausted: {kind}"),
            RejectReason::AlreadyAdmitted => f.write_str("already admitted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admitted(AdmissionToken),
    Rejected(RejectReason),
}

impl Admission {
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Per-resource `usage / budget`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Utilization {
    pub tasks: f64,
    pub memory: f64,
    pub cpu: f64,
    pub network: f64,
}

impl Utilization {
    fn of(usage: &ResourceUsage, budget: &ResourceBudget) -> Self {
        Self {
            tasks: ratio(f64::from(usage.tasks), f64::from(budget.max_concurrent_tasks)),
            memory: ratio(usage.memory_mb, budget.max_memory_mb),
            cpu: ratio(usage.cpu_percent, budget.max_cpu_percent),
            network: ratio(
                f64::from(usage.network_calls),
                f64::from(budget.max_network_calls),
            ),
        }
    }

    /// Highest ratio across dimensions.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.tasks.max(self.memory).max(self.cpu).max(self.network)
    }
}

fn ratio(used: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        used / limit
    } else if used > 0.0 {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerStatistics {
    /// Tasks waiting for the next scheduling pass.
    pub queue_length: usize,
    /// Tasks currently holding a reservation.
    pub admitted: usize,
    pub usage: ResourceUsage,
    pub budget: ResourceBudget,
    pub utilization: Utilization,
    pub total_admitted: u64,
    pub total_rejected: u64,
}

// ============================================================================
// AdmissionScheduler
// ============================================================================

#[derive(Debug, Default)]
struct Ledger {
    budget: ResourceBudget,
    usage: ResourceUsage,
    reservations: HashMap<TaskId, ResourceEstimate>,
    /// Rejected tasks, at most one per ticker, oldest first.
    pending: VecDeque<ProcessingTask>,
    total_admitted: u64,
    total_rejected: u64,
}

impl Ledger {
    fn park(&mut self, task: &ProcessingTask) {
        if !self.pending.iter().any(|p| p.ticker == task.ticker) {
            self.pending.push_back(task.clone());
        }
    }
}

/// Orders work by priority and admits it against a resource budget.
#[derive(Debug, Default)]
pub struct AdmissionScheduler {
    ledger: Mutex<Ledger>,
    weights: RwLock<PriorityWeights>,
}

impl AdmissionScheduler {
    #[must_use]
    pub fn new(budget: ResourceBudget, weights: PriorityWeights) -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                budget,
                ..Ledger::default()
            }),
            weights: RwLock::new(weights),
        }
    }

    /// Sort states for scheduling: GO first, then `weight x confidence`
    /// descending, ties broken by ticker.
    #[must_use]
    pub fn prioritize(&self, mut states: Vec<TickerState>) -> Vec<TickerState> {
        let weights = self.weights.read();
        states.sort_by(|a, b| priority::compare(a, b, &weights));
        states
    }

    /// Reserve `task`'s estimate if it fits the remaining budget.
    ///
    /// A rejected task is parked in the pending queue for the next pass.
    pub fn admit(&self, task: &ProcessingTask) -> Admission {
        let mut ledger = self.ledger.lock();

        if ledger.reservations.contains_key(&task.id) {
            return Admission::Rejected(RejectReason::AlreadyAdmitted);
        }

        let budget = ledger.budget;
        if let Some(kind) = ledger.usage.first_exceeded(&task.estimate, &budget) {
            ledger.total_rejected += 1;
            ledger.park(task);
            debug!(
                ticker = %task.ticker,
                task_id = %task.id,
                resource = %kind,
                "Admission rejected"
            );
            return Admission::Rejected(RejectReason::BudgetExhausted(kind));
        }

        ledger.usage.reserve(&task.estimate);
        ledger.reservations.insert(task.id.clone(), task.estimate);
        ledger.pending.retain(|p| p.id != task.id);
        ledger.total_admitted += 1;
        trace!(ticker = %task.ticker, task_id = %task.id, "Task admitted");

        Admission::Admitted(AdmissionToken {
            task_id: task.id.clone(),
            ticker: task.ticker.clone(),
            estimate: task.estimate,
        })
    }

    /// Return the task's reservation. Releasing an unknown task is a no-op.
    ///
    /// Returns whether a reservation was released.
    pub fn release(&self, task_id: &TaskId) -> bool {
        let mut ledger = self.ledger.lock();
        match ledger.reservations.remove(task_id) {
            Some(estimate) => {
                ledger.usage.release(&estimate);
                true
            }
            None => {
                trace!(task_id = %task_id, "Release of unreserved task ignored");
                false
            }
        }
    }

    /// Take the parked task for `ticker`, if any.
    pub fn take_pending(&self, ticker: &Ticker) -> Option<ProcessingTask> {
        let mut ledger = self.ledger.lock();
        let index = ledger.pending.iter().position(|p| &p.ticker == ticker)?;
        ledger.pending.remove(index)
    }

    /// Take every parked task, oldest first.
    pub fn drain_pending(&self) -> Vec<ProcessingTask> {
        self.ledger.lock().pending.drain(..).collect()
    }

    /// Replace all priority weights.
    pub fn update_weights(&self, weights: PriorityWeights) {
        *self.weights.write() = weights;
        debug!("Priority weights updated");
    }

    pub fn set_weight(&self, ticker: Ticker, weight: f64) -> SchedulerResult<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(SchedulerError::InvalidWeight {
                ticker: ticker.to_string(),
                weight,
            });
        }
        self.weights.write().set(ticker, weight);
        Ok(())
    }

    /// Swap the budget. Tasks admitted under the old budget keep their
    /// reservations; a lower ceiling only blocks new admissions.
    pub fn update_budget(&self, budget: ResourceBudget) -> SchedulerResult<()> {
        validate_budget(&budget)?;
        let mut ledger = self.ledger.lock();
        ledger.budget = budget;
        if !ledger.usage.within(&budget) {
            info!(
                tasks = ledger.usage.tasks,
                max_tasks = budget.max_concurrent_tasks,
                "Budget lowered below current usage; new admissions paused until drained"
            );
        }
        Ok(())
    }

    #[must_use]
    pub fn budget(&self) -> ResourceBudget {
        self.ledger.lock().budget
    }

    #[must_use]
    pub fn usage(&self) -> ResourceUsage {
        self.ledger.lock().usage
    }

    #[must_use]
    pub fn weights(&self) -> PriorityWeights {
        self.weights.read().clone()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.ledger.lock().pending.len()
    }

    #[must_use]
    pub fn statistics(&self) -> SchedulerStatistics {
        let ledger = self.ledger.lock();
        SchedulerStatistics {
            queue_length: ledger.pending.len(),
            admitted: ledger.reservations.len(),
            usage: ledger.usage,
            budget: ledger.budget,
            utilization: Utilization::of(&ledger.usage, &ledger.budget),
            total_admitted: ledger.total_admitted,
            total_rejected: ledger.total_rejected,
        }
    }
}

fn validate_budget(budget: &ResourceBudget) -> SchedulerResult<()> {
    if !budget.max_memory_mb.is_finite() || budget.max_memory_mb < 0.0 {
        return Err(SchedulerError::InvalidBudget(format!(
            "max_memory_mb = {}",
            budget.max_memory_mb
        )));
    }
    if !budget.max_cpu_percent.is_finite() || budget.max_cpu_percent < 0.0 {
        return Err(SchedulerError::InvalidBudget(format!(
            "max_cpu_percent = {}",
            budget.max_cpu_percent
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsgo_core::{TaskKind, TickerStatus};

    fn t(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    fn task(ticker: &str, memory_mb: f64, cpu: f64, calls: u32) -> ProcessingTask {
        ProcessingTask::new(
            t(ticker),
            TaskKind::SignalProcessing,
            false,
            ResourceEstimate::new(memory_mb, cpu, calls),
            serde_json::Value::Null,
            0,
        )
    }

    fn state(ticker: &str, status: TickerStatus, confidence: f64) -> TickerState {
        let mut s = TickerState::new(t(ticker), 0);
        s.status = status;
        s.confidence = confidence;
        s
    }

    fn small_budget() -> ResourceBudget {
        ResourceBudget {
            max_concurrent_tasks: 3,
            max_memory_mb: 100.0,
            max_cpu_percent: 60.0,
            max_network_calls: 10,
        }
    }

    #[test]
    fn test_prioritize_go_first_then_weighted_confidence() {
        let weights: PriorityWeights = [(t("IWM"), 3.0)].into_iter().collect();
        let scheduler = AdmissionScheduler::new(ResourceBudget::default(), weights);
        let ordered = scheduler.prioritize(vec![
            state("SPY", TickerStatus::Set, 0.9),
            state("QQQ", TickerStatus::Go, 0.1),
            state("IWM", TickerStatus::Ready, 0.4),
            state("AAPL", TickerStatus::Ready, 0.9),
        ]);
        let tickers: Vec<&str> = ordered.iter().map(|s| s.ticker.as_str()).collect();
        // QQQ urgent; IWM 1.2; SPY 0.9 and AAPL 0.9 tie -> ticker order.
        assert_eq!(tickers, vec!["QQQ", "IWM", "AAPL", "SPY"]);
    }

    #[test]
    fn test_go_beats_heavily_weighted_ticker() {
        let weights: PriorityWeights = [(t("SPY"), 100.0)].into_iter().collect();
        let scheduler = AdmissionScheduler::new(ResourceBudget::default(), weights);
        let ordered = scheduler.prioritize(vec![
            state("SPY", TickerStatus::Set, 1.0),
            state("QQQ", TickerStatus::Go, 0.0),
        ]);
        assert_eq!(ordered[0].ticker.as_str(), "QQQ");
    }

    #[test]
    fn test_admit_and_release_round_trip() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let before = scheduler.usage();
        let a = task("SPY", 30.0, 20.0, 2);
        let b = task("QQQ", 40.0, 10.0, 3);

        assert!(scheduler.admit(&a).is_admitted());
        assert!(scheduler.admit(&b).is_admitted());
        assert_eq!(scheduler.usage().tasks, 2);

        assert!(scheduler.release(&a.id));
        assert!(scheduler.release(&b.id));
        assert_eq!(scheduler.usage(), before);
    }

    #[test]
    fn test_release_is_idempotent() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let a = task("SPY", 10.0, 10.0, 1);
        scheduler.admit(&a);
        assert!(scheduler.release(&a.id));
        assert!(!scheduler.release(&a.id));
        assert!(!scheduler.release(&TaskId::new()));
        assert_eq!(scheduler.usage(), ResourceUsage::default());
    }

    #[test]
    fn test_double_admit_rejected() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let a = task("SPY", 10.0, 10.0, 1);
        assert!(scheduler.admit(&a).is_admitted());
        assert_eq!(
            scheduler.admit(&a),
            Admission::Rejected(RejectReason::AlreadyAdmitted)
        );
        assert_eq!(scheduler.usage().tasks, 1);
    }

    #[test]
    fn test_rejected_task_is_parked_once_per_ticker() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let big = task("SPY", 500.0, 1.0, 0);
        assert_eq!(
            scheduler.admit(&big),
            Admission::Rejected(RejectReason::BudgetExhausted(ResourceKind::Memory))
        );
        scheduler.admit(&task("SPY", 500.0, 1.0, 0));
        assert_eq!(scheduler.pending_len(), 1);

        let parked = scheduler.take_pending(&t("SPY")).unwrap();
        assert_eq!(parked.id, big.id);
        assert!(scheduler.take_pending(&t("SPY")).is_none());

        let stats = scheduler.statistics();
        assert_eq!(stats.total_rejected, 2);
        assert_eq!(stats.total_admitted, 0);
    }

    #[test]
    fn test_admission_clears_parked_entry() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let filler = task("QQQ", 90.0, 1.0, 0);
        let waiting = task("SPY", 20.0, 1.0, 0);
        assert!(scheduler.admit(&filler).is_admitted());
        assert!(!scheduler.admit(&waiting).is_admitted());
        assert_eq!(scheduler.pending_len(), 1);

        scheduler.release(&filler.id);
        assert!(scheduler.admit(&waiting).is_admitted());
        assert_eq!(scheduler.pending_len(), 0);
    }

    #[test]
    fn test_budget_decrease_keeps_admitted_tasks() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        let a = task("SPY", 50.0, 10.0, 1);
        let b = task("QQQ", 40.0, 10.0, 1);
        scheduler.admit(&a);
        scheduler.admit(&b);

        scheduler
            .update_budget(ResourceBudget {
                max_memory_mb: 60.0,
                ..small_budget()
            })
            .unwrap();
        let stats = scheduler.statistics();
        assert_eq!(stats.admitted, 2);
        assert!(stats.utilization.memory > 1.0);

        assert!(!scheduler.admit(&task("IWM", 1.0, 1.0, 0)).is_admitted());
        scheduler.release(&a.id);
        assert!(scheduler.admit(&task("IWM", 1.0, 1.0, 0)).is_admitted());
    }

    #[test]
    fn test_invalid_budget_and_weight() {
        let scheduler = AdmissionScheduler::default();
        assert!(scheduler
            .update_budget(ResourceBudget {
                max_memory_mb: f64::NAN,
                ..ResourceBudget::default()
            })
            .is_err());
        assert!(scheduler.set_weight(t("SPY"), -1.0).is_err());
        assert!(scheduler.set_weight(t("SPY"), 2.5).is_ok());
        assert_eq!(scheduler.weights().weight_of(&t("SPY")), 2.5);
    }

    #[test]
    fn test_statistics_utilization() {
        let scheduler = AdmissionScheduler::new(small_budget(), PriorityWeights::new());
        scheduler.admit(&task("SPY", 50.0, 30.0, 5));
        let stats = scheduler.statistics();
        assert_eq!(stats.admitted, 1);
        assert!((stats.utilization.tasks - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.utilization.memory - 0.5).abs() < 1e-9);
        assert!((stats.utilization.cpu - 0.5).abs() < 1e-9);
        assert!((stats.utilization.network - 0.5).abs() < 1e-9);
        assert!((stats.utilization.max() - 0.5).abs() < 1e-9);
    }

    /// Deterministic admit/release interleaving; usage must never leave the
    /// budget and must return to zero once everything is released.
    #[test]
    fn test_usage_never_exceeds_budget_under_churn() {
        let budget = small_budget();
        let scheduler = AdmissionScheduler::new(budget, PriorityWeights::new());
        let mut seed: u64 = 0x5eed;
        let mut next = move || {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            seed >> 33
        };
        let mut held: Vec<TaskId> = Vec::new();

        for i in 0..2_000 {
            if next() % 3 == 0 && !held.is_empty() {
                let idx = (next() as usize) % held.len();
                let id = held.swap_remove(idx);
                assert!(scheduler.release(&id));
            } else {
                let memory = (next() % 60) as f64 + 0.25;
                let cpu = (next() % 40) as f64 + 0.5;
                let calls = (next() % 6) as u32;
                let candidate = task(&format!("T{}", i % 17), memory, cpu, calls);
                if let Admission::Admitted(token) = scheduler.admit(&candidate) {
                    held.push(token.task_id);
                }
            }
            assert!(scheduler.usage().within(&budget), "step {i}");
        }

        for id in held.drain(..) {
            scheduler.release(&id);
        }
        assert_eq!(scheduler.usage(), ResourceUsage::default());
        assert_eq!(scheduler.statistics().admitted, 0);
    }
}
