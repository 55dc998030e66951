//! Orchestrator: the tick loop and signal-driven transitions.
//!
//! ```text
//! STOPPED --start()--> RUNNING --stop()--> STOPPED
//! ```
//!
//! Each tick:
//! 1. Snapshot and prioritize all tickers
//! 2. Sample resource pressure, shrink the batch and stretch the interval
//!    when degraded
//! 3. Admit per-ticker tasks against the resource budget (rejected tasks
//!    are carried over to the next tick)
//! 4. Run the admitted batch on the executor
//! 5. Feed every result back through the state machine; a failed ticker
//!    only produces a processing-error event
//! 6. Publish a tick summary

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use rsgo_core::{
    Clock, EventBus, LifecycleEvent, PriorityWeights, ProcessingResult, ProcessingTask,
    ResourceBudget, ResourceEstimate, SignalFactors, StateTransition, TaskKind, Ticker,
    TickerState, TickerStatus, TickerUpdate,
};
use rsgo_executor::{
    BatchOptions, ConcurrentExecutor, DynTaskWorker, ExecutorStatistics, ShutdownReport,
};
use rsgo_scheduler::{is_urgent, Admission, AdmissionScheduler, SchedulerStatistics};
use rsgo_state::{StateError, StateMachine, StateMachineConfig, StateStatistics};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ExecutorConfig, OrchestratorConfig, PolicyConfig, RiskConfig};
use crate::degradation::{DegradationPlan, DegradationPolicy, ResourceProbe, ResourceStatus};
use crate::error::{AppError, AppResult};
use crate::hooks::{DynTradeHook, TradeRequest};
use crate::policy::{Decision, TransitionPolicy};
use crate::portfolio::{Position, PositionBook};

// ============================================================================
// Reports
// ============================================================================

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    /// Results collected from the executor.
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks refused by admission and carried over.
    pub rejected: usize,
    pub duration_ms: u64,
    pub resource_status: ResourceStatus,
    pub plan: DegradationPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStatistics {
    pub executor: ExecutorStatistics,
    pub scheduler: SchedulerStatistics,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Hot-updatable settings.
#[derive(Debug, Clone)]
struct RuntimeSettings {
    orchestrator: OrchestratorConfig,
    policy: TransitionPolicy,
    risk: RiskConfig,
    executor: ExecutorConfig,
    task_estimate: ResourceEstimate,
}

impl RuntimeSettings {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            orchestrator: config.orchestrator.clone(),
            policy: TransitionPolicy::new(config.policy.clone()),
            risk: config.risk.clone(),
            executor: config.executor.clone(),
            task_estimate: config.scheduler.task_estimate,
        }
    }

    fn degradation(&self) -> DegradationPolicy {
        DegradationPolicy::new(&self.risk, &self.orchestrator)
    }
}

struct RunHandle {
    cancel: CancellationToken,
    tick_loop: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

/// Drives ticker processing and owns the lifecycle components.
pub struct Orchestrator {
    settings: RwLock<RuntimeSettings>,
    state: Arc<StateMachine>,
    scheduler: Arc<AdmissionScheduler>,
    executor: Arc<ConcurrentExecutor>,
    positions: Arc<PositionBook>,
    hook: DynTradeHook,
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    current_interval_ms: AtomicU64,
    max_concurrent_tickers: AtomicUsize,
    degraded: AtomicBool,
    running: Mutex<Option<RunHandle>>,
    /// Serializes ticks between the loop and manual callers.
    tick_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("running", &self.is_running())
            .field("tickers", &self.state.len())
            .field("current_interval_ms", &self.current_interval_ms())
            .finish()
    }
}

impl Orchestrator {
    /// Build the components and initialize the watchlist.
    pub fn new(
        config: &AppConfig,
        worker: DynTaskWorker,
        hook: DynTradeHook,
        probe: Arc<dyn ResourceProbe>,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> AppResult<Self> {
        config.validate()?;

        let state = Arc::new(StateMachine::new(
            StateMachineConfig {
                cooldown_ms: config.state.cooldown_ms,
                history_capacity: config.state.history_capacity,
            },
            Arc::clone(&clock),
            events.clone(),
        ));
        let scheduler = Arc::new(AdmissionScheduler::new(
            config.scheduler.budget,
            config.priority_weights()?,
        ));
        let executor = Arc::new(ConcurrentExecutor::new(
            worker,
            Arc::clone(&clock),
            events.clone(),
        ));

        let orchestrator = Self {
            settings: RwLock::new(RuntimeSettings::from_config(config)),
            state,
            scheduler,
            executor,
            positions: Arc::new(PositionBook::new()),
            hook,
            probe,
            clock,
            events,
            current_interval_ms: AtomicU64::new(config.orchestrator.update_interval_ms),
            max_concurrent_tickers: AtomicUsize::new(config.orchestrator.max_concurrent_tickers),
            degraded: AtomicBool::new(false),
            running: Mutex::new(None),
            tick_lock: tokio::sync::Mutex::new(()),
        };

        for ticker in config.watchlist_tickers()? {
            orchestrator.state.initialize(ticker)?;
        }
        Ok(orchestrator)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start the executor, the cooldown sweeper and the tick loop.
    ///
    /// The first tick fires one interval after start.
    pub fn start(self: &Arc<Self>) -> AppResult<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(AppError::AlreadyRunning);
        }

        let (worker_count, sweep_ms) = {
            let settings = self.settings.read();
            (
                settings.executor.worker_count,
                settings.orchestrator.cooldown_sweep_interval_ms,
            )
        };
        self.executor.start(worker_count)?;

        let cancel = CancellationToken::new();
        let sweeper = {
            let positions = Arc::clone(&self.positions);
            self.state.spawn_cooldown_sweeper(
                Duration::from_millis(sweep_ms.max(1)),
                cancel.child_token(),
                move |expired| retire_positions(&positions, expired, "cooldown expired"),
            )
        };
        let tick_loop = {
            let this = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move { this.run_loop(cancel).await })
        };

        *running = Some(RunHandle {
            cancel,
            tick_loop,
            sweeper,
        });
        info!(
            tickers = self.state.len(),
            worker_count,
            interval_ms = self.current_interval_ms(),
            "Orchestrator started"
        );
        Ok(())
    }

    /// Stop the loop and drain the executor.
    ///
    /// Bounded by the drain window plus one task timeout.
    pub async fn stop(&self) -> AppResult<ShutdownReport> {
        let handle = self.running.lock().take().ok_or(AppError::NotRunning)?;
        handle.cancel.cancel();

        let drain = Duration::from_millis(self.settings.read().executor.drain_timeout_ms);
        let report = self.executor.shutdown(drain).await?;

        if let Err(e) = handle.tick_loop.await {
            warn!(error = %e, "Tick loop ended abnormally");
        }
        if let Err(e) = handle.sweeper.await {
            warn!(error = %e, "Cooldown sweeper ended abnormally");
        }

        info!(
            drained = report.drained,
            abandoned = report.abandoned,
            "Orchestrator stopped"
        );
        Ok(report)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        loop {
            let wait = Duration::from_millis(self.current_interval_ms().max(1));
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            if let Err(e) = self.tick().await {
                if cancel.is_cancelled() {
                    break;
                }
                error!(error = %e, "Tick failed");
                self.events.publish(LifecycleEvent::OrchestratorError {
                    error: e.to_string(),
                    timestamp: self.clock.now_ms(),
                });
            }
        }
        debug!("Tick loop exited");
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Run one processing pass over the watchlist.
    ///
    /// Per-ticker failures are reported through events and counted in the
    /// report; only executor-level failures return an error.
    pub async fn tick(&self) -> AppResult<TickReport> {
        let _tick = self.tick_lock.lock().await;
        let started = Instant::now();
        let settings = self.settings.read().clone();
        let now = self.clock.now_ms();

        let states = self.state.all_states();
        let watchlist_len = states.len();
        let prioritized = self.scheduler.prioritize(states);

        let status = self.sample_resources(&settings);
        let plan = settings.degradation().plan(
            &status,
            watchlist_len,
            self.current_interval_ms(),
        );
        self.apply_plan(&status, plan, now);

        let mut tasks = Vec::with_capacity(plan.max_concurrent_tickers);
        let mut rejected = 0;
        for state in prioritized.iter().take(plan.max_concurrent_tickers) {
            let task = self.task_for(state, &settings, now)?;
            match self.scheduler.admit(&task) {
                Admission::Admitted(_) => tasks.push(task),
                Admission::Rejected(reason) => {
                    rejected += 1;
                    debug!(ticker = %state.ticker, %reason, "Task deferred");
                }
            }
        }

        let admitted: Vec<_> = tasks.iter().map(|t| t.id.clone()).collect();
        let options = BatchOptions {
            max_concurrent: plan.max_concurrent_tickers.max(1),
            timeout_ms: settings.orchestrator.task_timeout_ms,
            respect_priority: true,
        };
        let results = match self.executor.run_batch(tasks, options).await {
            Ok(results) => results,
            Err(e) => {
                for id in &admitted {
                    self.scheduler.release(id);
                }
                return Err(e.into());
            }
        };
        for result in &results {
            self.scheduler.release(&result.task_id);
        }

        let processed = results.len();
        let mut succeeded = 0;
        for result in results {
            if self.apply_result(result) {
                succeeded += 1;
            }
        }

        let report = TickReport {
            processed,
            succeeded,
            failed: processed - succeeded,
            rejected,
            duration_ms: started.elapsed().as_millis() as u64,
            resource_status: status,
            plan,
        };
        self.events.publish(LifecycleEvent::Tick {
            processed: report.processed,
            succeeded: report.succeeded,
            failed: report.failed,
            rejected: report.rejected,
            duration_ms: report.duration_ms,
            degraded: report.resource_status.is_degraded(),
            memory_utilization: report.resource_status.memory_utilization,
            open_positions: report.resource_status.open_positions,
            portfolio_heat: report.resource_status.portfolio_heat,
            timestamp: self.clock.now_ms(),
        });
        debug!(
            processed,
            succeeded,
            failed = report.failed,
            rejected,
            duration_ms = report.duration_ms,
            "Tick complete"
        );
        Ok(report)
    }

    fn sample_resources(&self, settings: &RuntimeSettings) -> ResourceStatus {
        settings.degradation().assess(
            self.probe.memory_utilization(),
            self.positions.open_count(),
            self.positions.portfolio_heat(settings.risk.account_size),
        )
    }

    fn apply_plan(&self, status: &ResourceStatus, plan: DegradationPlan, now: u64) {
        self.current_interval_ms
            .store(plan.update_interval_ms, Ordering::Relaxed);
        self.max_concurrent_tickers
            .store(plan.max_concurrent_tickers, Ordering::Relaxed);

        if status.is_degraded() {
            let causes: Vec<String> = status.causes.iter().map(|c| c.to_string()).collect();
            warn!(
                causes = ?causes,
                memory_utilization = status.memory_utilization,
                max_concurrent_tickers = plan.max_concurrent_tickers,
                update_interval_ms = plan.update_interval_ms,
                "Degradation applied"
            );
            self.degraded.store(true, Ordering::Relaxed);
            self.events.publish(LifecycleEvent::DegradationApplied {
                causes,
                max_concurrent_tickers: plan.max_concurrent_tickers,
                update_interval_ms: plan.update_interval_ms,
                memory_utilization: status.memory_utilization,
                timestamp: now,
            });
        } else if self.degraded.swap(false, Ordering::Relaxed) {
            info!(
                update_interval_ms = plan.update_interval_ms,
                "Resource pressure cleared"
            );
        }
    }

    /// Carried-over task for `state`, refreshed with the current snapshot,
    /// or a new one.
    fn task_for(
        &self,
        state: &TickerState,
        settings: &RuntimeSettings,
        now: u64,
    ) -> AppResult<ProcessingTask> {
        let payload = serde_json::to_value(state)?;
        let urgent = is_urgent(state);
        Ok(match self.scheduler.take_pending(&state.ticker) {
            Some(mut task) => {
                task.payload = payload;
                task.urgent = urgent;
                task
            }
            None => ProcessingTask::new(
                state.ticker.clone(),
                TaskKind::SignalProcessing,
                urgent,
                settings.task_estimate,
                payload,
                now,
            ),
        })
    }

    /// Feed one result back into the state machine. Returns whether it
    /// succeeded end to end.
    fn apply_result(&self, result: ProcessingResult) -> bool {
        let ticker = result.ticker;
        let outcome = match (result.success, result.data) {
            (true, Some(output)) => self.apply_output(&ticker, output.update, output.signal),
            (true, None) => Ok(()),
            (false, _) => Err(result
                .error
                .unwrap_or_else(|| "task failed".to_string())),
        };

        match outcome {
            Ok(()) => true,
            Err(error) => {
                warn!(ticker = %ticker, error = %error, "Ticker processing failed");
                self.events.publish(LifecycleEvent::ProcessingError {
                    ticker,
                    error,
                    timestamp: self.clock.now_ms(),
                });
                false
            }
        }
    }

    fn apply_output(
        &self,
        ticker: &Ticker,
        update: Option<TickerUpdate>,
        signal: Option<SignalFactors>,
    ) -> Result<(), String> {
        if let Some(update) = update {
            self.state
                .update(ticker, update, false)
                .map_err(|e| e.to_string())?;
        }
        if let Some(signal) = signal {
            self.process_signal(ticker, signal)
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------------

    /// Merge a fresh reading into `ticker` and apply the transition policy.
    ///
    /// GO -> COOLDOWN reserves a position first; if none can be reserved the
    /// ticker stays in GO. The trade hook fires once per successful
    /// GO -> COOLDOWN.
    ///
    /// The decision is made on a snapshot. If the ticker moved before the
    /// write landed, the signal is decided once more against a fresh one.
    pub fn process_signal(&self, ticker: &Ticker, signal: SignalFactors) -> AppResult<TickerState> {
        let current = self.snapshot(ticker)?;
        self.process_signal_from(&current, &signal)
    }

    fn process_signal_from(
        &self,
        current: &TickerState,
        signal: &SignalFactors,
    ) -> AppResult<TickerState> {
        match self.apply_signal(current, signal) {
            Err(AppError::State(StateError::InvalidTransition { from, to, .. })) => {
                debug!(ticker = %current.ticker, %from, %to, "Stale snapshot, deciding again");
                let fresh = self.snapshot(&current.ticker)?;
                self.apply_signal(&fresh, signal)
            }
            outcome => outcome,
        }
    }

    fn snapshot(&self, ticker: &Ticker) -> AppResult<TickerState> {
        Ok(self
            .state
            .get(ticker)
            .ok_or_else(|| StateError::NotFound(ticker.clone()))?)
    }

    fn apply_signal(&self, current: &TickerState, signal: &SignalFactors) -> AppResult<TickerState> {
        let ticker = &current.ticker;
        let (decision, max_trades) = {
            let settings = self.settings.read();
            (
                settings.policy.decide(current, signal),
                settings.risk.max_concurrent_trades,
            )
        };

        let readings = TickerUpdate {
            confidence: Some(signal.confidence),
            conviction: Some(signal.conviction),
            fib_zone: Some(signal.fib_zone),
            gamma_exposure: Some(signal.gamma_exposure),
            recommended_action: signal.recommended_action.clone(),
            ..TickerUpdate::default()
        };

        match decision {
            Decision::Hold => Ok(self.state.update(ticker, readings, false)?),
            Decision::Transition(to) => {
                debug!(ticker = %ticker, from = %current.status, to = %to, "Policy transition");
                let update = TickerUpdate {
                    status: Some(to),
                    ..readings
                };
                Ok(self.state.update(ticker, update, false)?)
            }
            Decision::ExecuteTrade => self.execute_trade(current, signal, readings, max_trades),
        }
    }

    fn execute_trade(
        &self,
        current: &TickerState,
        signal: &SignalFactors,
        readings: TickerUpdate,
        max_trades: usize,
    ) -> AppResult<TickerState> {
        let ticker = &current.ticker;
        let now = self.clock.now_ms();
        let recommendation = signal
            .recommended_action
            .clone()
            .or_else(|| current.recommended_action.clone());

        let position = match self
            .positions
            .try_open(ticker, max_trades, recommendation.clone(), now)
        {
            Ok(position) => position,
            Err(reason) => {
                debug!(ticker = %ticker, %reason, "Trade not executed, staying in GO");
                return Ok(self.state.update(ticker, readings, false)?);
            }
        };

        let update = TickerUpdate {
            status: Some(TickerStatus::Cooldown),
            ..readings
        };
        let state = match self.state.update(ticker, update, false) {
            Ok(state) => state,
            Err(e) => {
                self.positions.close(&position.id);
                return Err(e.into());
            }
        };

        self.hook.submit(TradeRequest {
            ticker: ticker.clone(),
            confidence: signal.confidence,
            conviction: signal.conviction,
            risk_score: signal.risk_score,
            recommendation: recommendation.clone(),
            position_id: position.id,
            timestamp: now,
        });
        info!(
            ticker = %ticker,
            confidence = signal.confidence,
            position_id = %position.id,
            cooldown_until = ?state.cooldown_until,
            "Trade executed"
        );
        self.events.publish(LifecycleEvent::TradeExecuted {
            ticker: ticker.clone(),
            confidence: signal.confidence,
            recommendation,
            timestamp: now,
        });
        Ok(state)
    }

    /// Return due cooldowns to READY now and retire their positions.
    ///
    /// The background sweeper does the same on every sweep interval.
    pub fn expire_cooldowns(&self) -> Vec<Ticker> {
        let expired = self.state.expire_cooldowns();
        retire_positions(&self.positions, &expired, "cooldown expired");
        expired
    }

    // ------------------------------------------------------------------------
    // Hot updates
    // ------------------------------------------------------------------------

    pub fn add_ticker(&self, ticker: Ticker) -> AppResult<TickerState> {
        Ok(self.state.initialize(ticker)?)
    }

    /// Stop tracking `ticker`, dropping its carried-over task and closing
    /// its positions.
    pub fn remove_ticker(&self, ticker: &Ticker) -> bool {
        self.scheduler.take_pending(ticker);
        let removed = self.state.remove(ticker);
        retire_positions(&self.positions, std::slice::from_ref(ticker), "ticker removed");
        removed
    }

    pub fn update_thresholds(&self, policy: PolicyConfig) -> AppResult<()> {
        policy.validate()?;
        info!(
            confidence_threshold = policy.confidence_threshold,
            "Thresholds updated"
        );
        self.settings.write().policy = TransitionPolicy::new(policy);
        Ok(())
    }

    pub fn update_weights(&self, weights: PriorityWeights) {
        self.scheduler.update_weights(weights);
    }

    pub fn update_budget(&self, budget: ResourceBudget) -> AppResult<()> {
        Ok(self.scheduler.update_budget(budget)?)
    }

    pub fn set_max_concurrent_trades(&self, max_trades: usize) {
        self.settings.write().risk.max_concurrent_trades = max_trades;
    }

    /// Change the base interval; takes effect from the next sleep.
    pub fn set_update_interval(&self, interval_ms: u64) -> AppResult<()> {
        if interval_ms == 0 {
            return Err(AppError::Config("update interval must be > 0".into()));
        }
        self.settings.write().orchestrator.update_interval_ms = interval_ms;
        self.current_interval_ms.store(interval_ms, Ordering::Relaxed);
        Ok(())
    }

    /// Resize the worker pool now if running, otherwise on next start.
    pub fn resize_workers(&self, worker_count: usize) -> AppResult<()> {
        if worker_count == 0 {
            return Err(AppError::Config("worker count must be > 0".into()));
        }
        if self.executor.is_running() {
            self.executor.resize(worker_count)?;
        }
        self.settings.write().executor.worker_count = worker_count;
        Ok(())
    }

    /// Apply a reloaded configuration without restarting.
    ///
    /// `state.history_capacity` only applies to tickers added afterwards.
    pub fn apply_config(&self, config: &AppConfig) -> AppResult<()> {
        config.validate()?;

        let wanted = config.watchlist_tickers()?;
        for ticker in self.state.tickers() {
            if !wanted.contains(&ticker) {
                self.remove_ticker(&ticker);
            }
        }
        for ticker in wanted {
            if !self.state.contains(&ticker) {
                self.add_ticker(ticker)?;
            }
        }

        self.update_weights(config.priority_weights()?);
        self.update_budget(config.scheduler.budget)?;
        self.state.set_cooldown_ms(config.state.cooldown_ms);
        self.resize_workers(config.executor.worker_count)?;

        let base_changed = {
            let mut settings = self.settings.write();
            let base_changed = settings.orchestrator.update_interval_ms
                != config.orchestrator.update_interval_ms;
            *settings = RuntimeSettings::from_config(config);
            base_changed
        };
        if base_changed {
            self.current_interval_ms
                .store(config.orchestrator.update_interval_ms, Ordering::Relaxed);
        }

        info!(tickers = self.state.len(), "Configuration applied");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn get_state(&self, ticker: &Ticker) -> Option<TickerState> {
        self.state.get(ticker)
    }

    #[must_use]
    pub fn all_states(&self) -> Vec<TickerState> {
        self.state.all_states()
    }

    #[must_use]
    pub fn history(&self, ticker: &Ticker) -> Option<Vec<StateTransition>> {
        self.state.history(ticker)
    }

    #[must_use]
    pub fn state_statistics(&self) -> StateStatistics {
        self.state.statistics()
    }

    #[must_use]
    pub fn processing_statistics(&self) -> ProcessingStatistics {
        ProcessingStatistics {
            executor: self.executor.statistics(),
            scheduler: self.scheduler.statistics(),
        }
    }

    #[must_use]
    pub fn active_positions(&self) -> Vec<Position> {
        self.positions.active_positions()
    }

    /// Shared book, for collaborators that settle or mark positions.
    #[must_use]
    pub fn position_book(&self) -> Arc<PositionBook> {
        Arc::clone(&self.positions)
    }

    #[must_use]
    pub fn resource_status(&self) -> ResourceStatus {
        self.sample_resources(&self.settings.read())
    }

    #[must_use]
    pub fn current_interval_ms(&self) -> u64 {
        self.current_interval_ms.load(Ordering::Relaxed)
    }

    /// Tickers processed per tick under the latest plan.
    #[must_use]
    pub fn max_concurrent_tickers(&self) -> usize {
        self.max_concurrent_tickers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn thresholds(&self) -> PolicyConfig {
        self.settings.read().policy.config().clone()
    }

    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}

/// Close the positions held by `tickers`; their trade window is over.
fn retire_positions(positions: &PositionBook, tickers: &[Ticker], reason: &str) {
    for ticker in tickers {
        for position in positions.close_ticker(ticker) {
            info!(
                ticker = %ticker,
                position_id = %position.id,
                pnl = position.pnl,
                reason,
                "Position retired"
            );
        }
    }
}
