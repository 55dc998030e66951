//! Validated ticker lifecycle state machine.
//!
//! Every ticker lives in its own `DashMap` slot, so reads and writes for one
//! ticker are serialized while different tickers proceed in parallel.
//! Cooldown expiry goes through the same slot, which keeps "cooldown just
//! expired" and "tick result just wrote SET" mutually exclusive.
//!
//! Lock order: ticker slot, then cooldown queue. The sweeper pops due
//! entries under the queue lock alone and re-checks each slot afterwards.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rsgo_core::{
    Clock, EventBus, LifecycleEvent, StateTransition, Ticker, TickerState, TickerStatus,
    TickerUpdate,
};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cooldown::CooldownQueue;
use crate::error::{StateError, StateResult};
use crate::history::TransitionHistory;
use crate::stats::StateStatistics;

/// Default cooldown window (5 minutes).
pub const DEFAULT_COOLDOWN_MS: u64 = 5 * 60 * 1000;

/// Default number of transitions kept per ticker.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

const FORCED_UPDATE_REASON: &str = "forced update";

#[derive(Debug, Clone, Copy)]
pub struct StateMachineConfig {
    pub cooldown_ms: u64,
    pub history_capacity: usize,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct TickerEntry {
    state: TickerState,
    history: TransitionHistory,
    /// Generation of the armed cooldown, if any.
    cooldown_generation: Option<u64>,
}

/// Owner of all ticker lifecycle state.
pub struct StateMachine {
    entries: DashMap<Ticker, TickerEntry>,
    cooldowns: Mutex<CooldownQueue>,
    cooldown_ms: AtomicU64,
    history_capacity: usize,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("tickers", &self.entries.len())
            .field("cooldown_ms", &self.cooldown_ms())
            .field("history_capacity", &self.history_capacity)
            .finish()
    }
}

impl StateMachine {
    pub fn new(config: StateMachineConfig, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self {
            entries: DashMap::new(),
            cooldowns: Mutex::new(CooldownQueue::new()),
            cooldown_ms: AtomicU64::new(config.cooldown_ms),
            history_capacity: config.history_capacity,
            clock,
            events,
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Start tracking `ticker` in READY with zeroed readings.
    pub fn initialize(&self, ticker: Ticker) -> StateResult<TickerState> {
        let now = self.clock.now_ms();
        let state = match self.entries.entry(ticker.clone()) {
            Entry::Occupied(_) => return Err(StateError::AlreadyExists(ticker)),
            Entry::Vacant(slot) => {
                let state = TickerState::new(ticker.clone(), now);
                slot.insert(TickerEntry {
                    state: state.clone(),
                    history: TransitionHistory::new(self.history_capacity),
                    cooldown_generation: None,
                });
                state
            }
        };

        info!(ticker = %ticker, "Ticker initialized");
        self.events.publish(LifecycleEvent::TickerInitialized {
            ticker,
            timestamp: now,
        });
        Ok(state)
    }

    /// Merge `update` into the ticker's state.
    ///
    /// A status change is validated against the transition table unless
    /// `force` is set; validation happens before anything is written.
    pub fn update(
        &self,
        ticker: &Ticker,
        update: TickerUpdate,
        force: bool,
    ) -> StateResult<TickerState> {
        let reason = force.then(|| FORCED_UPDATE_REASON.to_string());
        self.apply(ticker, update, force, reason)
    }

    /// Administrative transition that bypasses validation.
    pub fn force_transition(
        &self,
        ticker: &Ticker,
        to: TickerStatus,
        reason: impl Into<String>,
    ) -> StateResult<TickerState> {
        self.apply(ticker, TickerUpdate::status(to), true, Some(reason.into()))
    }

    /// Stop tracking `ticker`, cancelling any pending cooldown.
    ///
    /// Returns whether the ticker existed.
    pub fn remove(&self, ticker: &Ticker) -> bool {
        let removed = self
            .entries
            .remove_if(ticker, |key, entry| {
                if entry.cooldown_generation.is_some() {
                    self.cooldowns.lock().cancel(key);
                }
                true
            })
            .is_some();

        if removed {
            info!(ticker = %ticker, "Ticker removed");
            self.events.publish(LifecycleEvent::TickerRemoved {
                ticker: ticker.clone(),
                timestamp: self.clock.now_ms(),
            });
        }
        removed
    }

    /// Return every ticker whose cooldown is due to READY.
    ///
    /// Tickers forced out of COOLDOWN, re-armed, or removed since their
    /// timer was armed are skipped.
    pub fn expire_cooldowns(&self) -> Vec<Ticker> {
        let now = self.clock.now_ms();
        let due = self.cooldowns.lock().pop_expired(now);
        let mut expired = Vec::with_capacity(due.len());

        for (ticker, generation) in due {
            let mut events = Vec::with_capacity(3);
            {
                let Some(mut guard) = self.entries.get_mut(&ticker) else {
                    continue;
                };
                let entry = &mut *guard;
                if entry.cooldown_generation != Some(generation)
                    || entry.state.status != TickerStatus::Cooldown
                {
                    continue;
                }

                let transition = StateTransition {
                    from: TickerStatus::Cooldown,
                    to: TickerStatus::Ready,
                    timestamp: now,
                    duration_in_previous_state: entry.state.time_in_state_ms(now),
                    forced: false,
                    reason: None,
                };
                entry.cooldown_generation = None;
                entry.state.status = TickerStatus::Ready;
                entry.state.cooldown_until = None;
                entry.state.state_entry_time = now;
                entry.state.last_update = now;
                entry.history.push(transition.clone());

                events.push(LifecycleEvent::TickerTransition {
                    ticker: ticker.clone(),
                    transition,
                });
                events.push(LifecycleEvent::CooldownExpired {
                    ticker: ticker.clone(),
                    timestamp: now,
                });
                events.push(LifecycleEvent::TickerUpdated {
                    state: entry.state.clone(),
                });
            }

            info!(ticker = %ticker, "Cooldown expired");
            for event in events {
                self.events.publish(event);
            }
            expired.push(ticker);
        }
        expired
    }

    /// Sweep cooldowns every `interval` until `cancel` fires.
    ///
    /// `on_expired` runs after each sweep that returned tickers to READY.
    pub fn spawn_cooldown_sweeper<F>(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
        on_expired: F,
    ) -> JoinHandle<()>
    where
        F: Fn(&[Ticker]) + Send + 'static,
    {
        let machine = Arc::clone(self);
        let period = interval.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut sweep = tokio::time::interval(period);
            sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Cooldown sweeper stopped");
                        break;
                    }
                    _ = sweep.tick() => {
                        let expired = machine.expire_cooldowns();
                        if !expired.is_empty() {
                            debug!(count = expired.len(), "Cooldown sweep returned tickers to READY");
                            on_expired(&expired);
                        }
                    }
                }
            }
        })
    }

    /// Change the default cooldown for cooldowns armed from now on.
    pub fn set_cooldown_ms(&self, cooldown_ms: u64) {
        self.cooldown_ms.store(cooldown_ms, Ordering::Relaxed);
    }

    // ------------------------------------------------------------------------
    // Queries (all return snapshots)
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn get(&self, ticker: &Ticker) -> Option<TickerState> {
        self.entries.get(ticker).map(|entry| entry.state.clone())
    }

    #[must_use]
    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.entries.contains_key(ticker)
    }

    /// Snapshot of every state, sorted by ticker.
    #[must_use]
    pub fn all_states(&self) -> Vec<TickerState> {
        let mut states: Vec<TickerState> =
            self.entries.iter().map(|entry| entry.state.clone()).collect();
        states.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        states
    }

    #[must_use]
    pub fn tickers(&self) -> Vec<Ticker> {
        let mut tickers: Vec<Ticker> = self.entries.iter().map(|e| e.key().clone()).collect();
        tickers.sort();
        tickers
    }

    /// Transition history, oldest first.
    #[must_use]
    pub fn history(&self, ticker: &Ticker) -> Option<Vec<StateTransition>> {
        self.entries.get(ticker).map(|entry| entry.history.to_vec())
    }

    #[must_use]
    pub fn statistics(&self) -> StateStatistics {
        StateStatistics::from_states(&self.all_states())
    }

    /// Earliest pending cooldown expiry (Unix ms).
    #[must_use]
    pub fn next_cooldown_expiry(&self) -> Option<u64> {
        self.cooldowns.lock().next_expiry()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn apply(
        &self,
        ticker: &Ticker,
        update: TickerUpdate,
        force: bool,
        reason: Option<String>,
    ) -> StateResult<TickerState> {
        let now = self.clock.now_ms();
        let mut events = Vec::with_capacity(3);

        let snapshot = {
            let mut guard = self
                .entries
                .get_mut(ticker)
                .ok_or_else(|| StateError::NotFound(ticker.clone()))?;
            let entry = &mut *guard;
            let from = entry.state.status;
            let target = update.status.filter(|to| *to != from);

            if let Some(to) = target {
                if !force && !from.can_transition_to(to) {
                    return Err(StateError::InvalidTransition {
                        ticker: ticker.clone(),
                        from,
                        to,
                    });
                }
            }

            if let Some(confidence) = update.confidence {
                entry.state.confidence = clamp_unit(confidence);
            }
            if let Some(conviction) = update.conviction {
                entry.state.conviction = clamp_unit(conviction);
            }
            if let Some(zone) = update.fib_zone {
                entry.state.fib_zone = zone;
            }
            if let Some(gamma) = update.gamma_exposure {
                entry.state.gamma_exposure = gamma;
            }
            if let Some(action) = update.recommended_action {
                entry.state.recommended_action = Some(action);
            }
            entry.state.last_update = now;

            if let Some(to) = target {
                let transition = StateTransition {
                    from,
                    to,
                    timestamp: now,
                    duration_in_previous_state: entry.state.time_in_state_ms(now),
                    forced: force,
                    reason: reason.clone(),
                };
                entry.state.status = to;
                entry.state.state_entry_time = now;

                if from == TickerStatus::Cooldown {
                    self.disarm(ticker, entry);
                }
                entry.history.push(transition.clone());

                if force {
                    info!(
                        ticker = %ticker,
                        from = %from,
                        to = %to,
                        reason = reason.as_deref().unwrap_or_default(),
                        "Forced transition"
                    );
                    events.push(LifecycleEvent::TickerTransitionForced {
                        ticker: ticker.clone(),
                        transition,
                        reason: reason.unwrap_or_default(),
                    });
                } else {
                    info!(ticker = %ticker, from = %from, to = %to, "Transition");
                    events.push(LifecycleEvent::TickerTransition {
                        ticker: ticker.clone(),
                        transition,
                    });
                }

                if to == TickerStatus::Cooldown {
                    let until = update
                        .cooldown_until
                        .unwrap_or_else(|| now.saturating_add(self.cooldown_ms()));
                    self.arm(ticker, entry, until);
                    events.push(LifecycleEvent::CooldownStarted {
                        ticker: ticker.clone(),
                        until,
                    });
                }
            } else if entry.state.status == TickerStatus::Cooldown {
                if let Some(until) = update.cooldown_until {
                    self.arm(ticker, entry, until);
                    debug!(ticker = %ticker, until, "Cooldown re-armed");
                    events.push(LifecycleEvent::CooldownStarted {
                        ticker: ticker.clone(),
                        until,
                    });
                }
            }

            events.push(LifecycleEvent::TickerUpdated {
                state: entry.state.clone(),
            });
            entry.state.clone()
        };

        for event in events {
            self.events.publish(event);
        }
        Ok(snapshot)
    }

    fn arm(&self, ticker: &Ticker, entry: &mut TickerEntry, until: u64) {
        let generation = self.cooldowns.lock().arm(ticker.clone(), until);
        entry.cooldown_generation = Some(generation);
        entry.state.cooldown_until = Some(until);
    }

    fn disarm(&self, ticker: &Ticker, entry: &mut TickerEntry) {
        if entry.cooldown_generation.take().is_some() {
            self.cooldowns.lock().cancel(ticker);
        }
        entry.state.cooldown_until = None;
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsgo_core::{FibZone, ManualClock};
    use tokio::sync::broadcast::error::TryRecvError;

    const T0: u64 = 1_700_000_000_000;
    const MINUTE: u64 = 60_000;

    fn setup() -> (Arc<StateMachine>, Arc<ManualClock>, EventBus) {
        let clock = Arc::new(ManualClock::new(T0));
        let events = EventBus::new(256);
        let machine = Arc::new(StateMachine::new(
            StateMachineConfig::default(),
            clock.clone(),
            events.clone(),
        ));
        (machine, clock, events)
    }

    fn t(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    fn walk_to_cooldown(machine: &StateMachine, ticker: &Ticker) -> TickerState {
        for status in [TickerStatus::Set, TickerStatus::Go, TickerStatus::Cooldown] {
            machine
                .update(ticker, TickerUpdate::status(status), false)
                .unwrap();
        }
        machine.get(ticker).unwrap()
    }

    fn drain_topics(rx: &mut tokio::sync::broadcast::Receiver<LifecycleEvent>) -> Vec<&'static str> {
        let mut topics = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => topics.push(event.topic()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                Err(TryRecvError::Lagged(_)) => continue,
            }
        }
        topics
    }

    #[test]
    fn test_initialize_and_duplicate() {
        let (machine, _, _) = setup();
        let state = machine.initialize(t("SPY")).unwrap();
        assert_eq!(state.status, TickerStatus::Ready);
        assert_eq!(state.confidence, 0.0);
        assert_eq!(
            machine.initialize(t("SPY")).unwrap_err(),
            StateError::AlreadyExists(t("SPY"))
        );
    }

    #[test]
    fn test_update_unknown_ticker() {
        let (machine, _, _) = setup();
        let err = machine
            .update(&t("NOPE"), TickerUpdate::default(), false)
            .unwrap_err();
        assert_eq!(err, StateError::NotFound(t("NOPE")));
        assert!(machine.force_transition(&t("NOPE"), TickerStatus::Go, "x").is_err());
    }

    #[test]
    fn test_invalid_transition_leaves_state_untouched() {
        let (machine, _, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();

        let update = TickerUpdate {
            status: Some(TickerStatus::Go),
            confidence: Some(0.9),
            ..TickerUpdate::default()
        };
        let err = machine.update(&spy, update, false).unwrap_err();
        assert!(matches!(
            err,
            StateError::InvalidTransition {
                from: TickerStatus::Ready,
                to: TickerStatus::Go,
                ..
            }
        ));
        let state = machine.get(&spy).unwrap();
        assert_eq!(state.status, TickerStatus::Ready);
        assert_eq!(state.confidence, 0.0);
        assert!(machine.history(&spy).unwrap().is_empty());
    }

    #[test]
    fn test_every_invalid_pair_rejected_unless_forced() {
        let (machine, _, _) = setup();
        for from in TickerStatus::ALL {
            for to in TickerStatus::ALL {
                if from == to || from.can_transition_to(to) {
                    continue;
                }
                let ticker = t(&format!("{from}{to}"));
                machine.initialize(ticker.clone()).unwrap();
                machine.force_transition(&ticker, from, "setup").unwrap();
                assert!(machine
                    .update(&ticker, TickerUpdate::status(to), false)
                    .is_err());
                let forced = machine
                    .update(&ticker, TickerUpdate::status(to), true)
                    .unwrap();
                assert_eq!(forced.status, to);
            }
        }
    }

    #[test]
    fn test_state_entry_time_changes_only_with_status() {
        let (machine, clock, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();

        clock.advance(1_000);
        let readings = TickerUpdate {
            confidence: Some(0.5),
            ..TickerUpdate::default()
        };
        let state = machine.update(&spy, readings, false).unwrap();
        assert_eq!(state.state_entry_time, T0);
        assert_eq!(state.last_update, T0 + 1_000);

        clock.advance(1_000);
        let same = machine
            .update(&spy, TickerUpdate::status(TickerStatus::Ready), false)
            .unwrap();
        assert_eq!(same.state_entry_time, T0);

        clock.advance(1_000);
        let moved = machine
            .update(&spy, TickerUpdate::status(TickerStatus::Set), false)
            .unwrap();
        assert_eq!(moved.state_entry_time, T0 + 3_000);

        let history = machine.history(&spy).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duration_in_previous_state, 3_000);
        assert!(!history[0].forced);
    }

    #[test]
    fn test_readings_are_clamped() {
        let (machine, _, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        let update = TickerUpdate {
            confidence: Some(1.7),
            conviction: Some(-0.2),
            fib_zone: Some(FibZone::GoldenPocket),
            ..TickerUpdate::default()
        };
        let state = machine.update(&spy, update, false).unwrap();
        assert_eq!(state.confidence, 1.0);
        assert_eq!(state.conviction, 0.0);
        assert_eq!(state.fib_zone, FibZone::GoldenPocket);
    }

    #[test]
    fn test_forced_transition_records_reason() {
        let (machine, _, events) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        let mut rx = events.subscribe();

        machine
            .force_transition(&spy, TickerStatus::Go, "operator override")
            .unwrap();

        let history = machine.history(&spy).unwrap();
        assert!(history[0].forced);
        assert_eq!(history[0].reason.as_deref(), Some("operator override"));
        let topics = drain_topics(&mut rx);
        assert!(topics.contains(&"ticker:transition:forced"));
        assert!(!topics.contains(&"ticker:transition"));
    }

    #[test]
    fn test_cooldown_expires_after_default_window() {
        let (machine, clock, events) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        let state = walk_to_cooldown(&machine, &spy);
        assert_eq!(state.cooldown_until, Some(T0 + 5 * MINUTE));
        assert_eq!(machine.next_cooldown_expiry(), Some(T0 + 5 * MINUTE));

        let mut rx = events.subscribe();
        clock.advance(5 * MINUTE - 1);
        assert!(machine.expire_cooldowns().is_empty());

        clock.advance(1);
        assert_eq!(machine.expire_cooldowns(), vec![spy.clone()]);
        let state = machine.get(&spy).unwrap();
        assert_eq!(state.status, TickerStatus::Ready);
        assert_eq!(state.cooldown_until, None);
        assert_eq!(state.state_entry_time, T0 + 5 * MINUTE);
        assert!(drain_topics(&mut rx).contains(&"ticker:cooldown:expired"));
        assert_eq!(machine.next_cooldown_expiry(), None);
    }

    #[test]
    fn test_explicit_cooldown_until_is_honored() {
        let (machine, clock, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        machine
            .force_transition(&spy, TickerStatus::Go, "setup")
            .unwrap();
        let update = TickerUpdate {
            status: Some(TickerStatus::Cooldown),
            cooldown_until: Some(T0 + 1_000),
            ..TickerUpdate::default()
        };
        let state = machine.update(&spy, update, false).unwrap();
        assert_eq!(state.cooldown_until, Some(T0 + 1_000));

        clock.advance(1_000);
        assert_eq!(machine.expire_cooldowns(), vec![spy]);
    }

    #[test]
    fn test_forced_away_from_cooldown_does_not_fire_stale_timer() {
        let (machine, clock, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        walk_to_cooldown(&machine, &spy);

        clock.advance(MINUTE);
        let state = machine
            .force_transition(&spy, TickerStatus::Ready, "manual reset")
            .unwrap();
        assert_eq!(state.cooldown_until, None);

        clock.advance(MINUTE);
        let rearmed = walk_to_cooldown(&machine, &spy);
        assert_eq!(rearmed.cooldown_until, Some(T0 + 7 * MINUTE));

        clock.set(T0 + 5 * MINUTE);
        assert!(machine.expire_cooldowns().is_empty());
        assert_eq!(machine.get(&spy).unwrap().status, TickerStatus::Cooldown);

        clock.set(T0 + 7 * MINUTE);
        assert_eq!(machine.expire_cooldowns(), vec![spy]);
    }

    #[test]
    fn test_remove_mid_cooldown_cancels_timer() {
        let (machine, clock, events) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        walk_to_cooldown(&machine, &spy);

        let mut rx = events.subscribe();
        assert!(machine.remove(&spy));
        assert!(!machine.remove(&spy));
        assert!(machine.get(&spy).is_none());
        assert!(machine.history(&spy).is_none());

        clock.advance(10 * MINUTE);
        assert!(machine.expire_cooldowns().is_empty());
        let topics = drain_topics(&mut rx);
        assert_eq!(topics, vec!["ticker:removed"]);
    }

    #[test]
    fn test_reinitialized_ticker_ignores_old_timer() {
        let (machine, clock, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        walk_to_cooldown(&machine, &spy);
        machine.remove(&spy);
        machine.initialize(spy.clone()).unwrap();

        clock.advance(10 * MINUTE);
        assert!(machine.expire_cooldowns().is_empty());
        assert_eq!(machine.get(&spy).unwrap().status, TickerStatus::Ready);
    }

    #[test]
    fn test_history_is_bounded() {
        let clock = Arc::new(ManualClock::new(T0));
        let machine = StateMachine::new(
            StateMachineConfig {
                history_capacity: 4,
                ..StateMachineConfig::default()
            },
            clock,
            EventBus::default(),
        );
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        for _ in 0..5 {
            machine
                .update(&spy, TickerUpdate::status(TickerStatus::Set), false)
                .unwrap();
            machine
                .update(&spy, TickerUpdate::status(TickerStatus::Ready), false)
                .unwrap();
        }
        let history = machine.history(&spy).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.last().unwrap().to, TickerStatus::Ready);
    }

    #[test]
    fn test_all_states_sorted_and_statistics() {
        let (machine, _, _) = setup();
        for symbol in ["QQQ", "AAPL", "SPY"] {
            machine.initialize(t(symbol)).unwrap();
        }
        walk_to_cooldown(&machine, &t("SPY"));

        let tickers: Vec<String> = machine
            .all_states()
            .iter()
            .map(|s| s.ticker.to_string())
            .collect();
        assert_eq!(tickers, vec!["AAPL", "QQQ", "SPY"]);

        let stats = machine.statistics();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count(TickerStatus::Ready), 2);
        assert_eq!(stats.in_cooldown, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_expires_cooldowns() {
        let (machine, clock, _) = setup();
        let spy = t("SPY");
        machine.initialize(spy.clone()).unwrap();
        walk_to_cooldown(&machine, &spy);

        let cancel = CancellationToken::new();
        let swept = Arc::new(Mutex::new(Vec::new()));
        let handle = {
            let swept = Arc::clone(&swept);
            machine.spawn_cooldown_sweeper(
                Duration::from_millis(100),
                cancel.clone(),
                move |expired| swept.lock().extend_from_slice(expired),
            )
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(swept.lock().is_empty());

        clock.advance(5 * MINUTE);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(machine.get(&spy).unwrap().status, TickerStatus::Ready);
        assert_eq!(*swept.lock(), vec![spy]);

        cancel.cancel();
        handle.await.unwrap();
    }
}
