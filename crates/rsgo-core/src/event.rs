//! Lifecycle events and the in-process event bus.
//!
//! Components publish `LifecycleEvent`s onto an `EventBus`; consumers
//! (metrics, logging, dashboards, the trade audit trail) subscribe
//! without the core depending on them.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use crate::task::TaskId;
use crate::types::{StateTransition, Ticker, TickerState};

/// Default channel capacity; slow subscribers lag instead of blocking publishers.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Everything observable that happens inside the engine.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TickerInitialized {
        ticker: Ticker,
        timestamp: u64,
    },
    TickerUpdated {
        state: TickerState,
    },
    TickerTransition {
        ticker: Ticker,
        transition: StateTransition,
    },
    TickerTransitionForced {
        ticker: Ticker,
        transition: StateTransition,
        reason: String,
    },
    CooldownStarted {
        ticker: Ticker,
        until: u64,
    },
    CooldownExpired {
        ticker: Ticker,
        timestamp: u64,
    },
    TickerRemoved {
        ticker: Ticker,
        timestamp: u64,
    },
    TaskCompleted {
        ticker: Ticker,
        task_id: TaskId,
        duration_ms: u64,
        worker_id: Option<usize>,
    },
    TaskFailed {
        ticker: Ticker,
        task_id: TaskId,
        error: String,
        duration_ms: u64,
        timed_out: bool,
    },
    BatchProcessed {
        count: usize,
        succeeded: usize,
        failed: usize,
        timestamp: u64,
    },
    DegradationApplied {
        /// Triggering conditions, e.g. `"memory"`, `"open_positions"`, `"portfolio_heat"`.
        causes: Vec<String>,
        max_concurrent_tickers: usize,
        update_interval_ms: u64,
        memory_utilization: f64,
        timestamp: u64,
    },
    OrchestratorError {
        error: String,
        timestamp: u64,
    },
    ProcessingError {
        ticker: Ticker,
        error: String,
        timestamp: u64,
    },
    Tick {
        processed: usize,
        succeeded: usize,
        failed: usize,
        rejected: usize,
        duration_ms: u64,
        degraded: bool,
        memory_utilization: f64,
        open_positions: usize,
        portfolio_heat: f64,
        timestamp: u64,
    },
    TradeExecuted {
        ticker: Ticker,
        confidence: f64,
        recommendation: Option<serde_json::Value>,
        timestamp: u64,
    },
}

impl LifecycleEvent {
    /// Stable topic name for routing and logging.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            LifecycleEvent::TickerInitialized { .. } => "ticker:initialized",
            LifecycleEvent::TickerUpdated { .. } => "ticker:updated",
            LifecycleEvent::TickerTransition { .. } => "ticker:transition",
            LifecycleEvent::TickerTransitionForced { .. } => "ticker:transition:forced",
            LifecycleEvent::CooldownStarted { .. } => "ticker:cooldown:started",
            LifecycleEvent::CooldownExpired { .. } => "ticker:cooldown:expired",
            LifecycleEvent::TickerRemoved { .. } => "ticker:removed",
            LifecycleEvent::TaskCompleted { .. } => "task:completed",
            LifecycleEvent::TaskFailed { .. } => "task:failed",
            LifecycleEvent::BatchProcessed { .. } => "processor:batch:processed",
            LifecycleEvent::DegradationApplied { .. } => "orchestrator:degradation:applied",
            LifecycleEvent::OrchestratorError { .. } => "orchestrator:error",
            LifecycleEvent::ProcessingError { .. } => "orchestrator:processing:error",
            LifecycleEvent::Tick { .. } => "orchestrator:tick",
            LifecycleEvent::TradeExecuted { .. } => "trade:executed",
        }
    }

    /// Ticker the event concerns, if any.
    #[must_use]
    pub fn ticker(&self) -> Option<&Ticker> {
        match self {
            LifecycleEvent::TickerInitialized { ticker, .. }
            | LifecycleEvent::TickerTransition { ticker, .. }
            | LifecycleEvent::TickerTransitionForced { ticker, .. }
            | LifecycleEvent::CooldownStarted { ticker, .. }
            | LifecycleEvent::CooldownExpired { ticker, .. }
            | LifecycleEvent::TickerRemoved { ticker, .. }
            | LifecycleEvent::TaskCompleted { ticker, .. }
            | LifecycleEvent::TaskFailed { ticker, .. }
            | LifecycleEvent::ProcessingError { ticker, .. }
            | LifecycleEvent::TradeExecuted { ticker, .. } => Some(ticker),
            LifecycleEvent::TickerUpdated { state } => Some(&state.ticker),
            LifecycleEvent::BatchProcessed { .. }
            | LifecycleEvent::DegradationApplied { .. }
            | LifecycleEvent::OrchestratorError { .. }
            | LifecycleEvent::Tick { .. } => None,
        }
    }
}

/// Fan-out channel for lifecycle events.
///
/// Cloning shares the same underlying channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<LifecycleEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is normal and not an error.
    pub fn publish(&self, event: LifecycleEvent) {
        let topic = event.topic();
        match self.tx.send(event) {
            Ok(receivers) => trace!(topic, receivers, "Event published"),
            Err(_) => trace!(topic, "No event subscribers"),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = EventBus::default();
        bus.publish(LifecycleEvent::OrchestratorError {
            error: "x".to_string(),
            timestamp: 0,
        });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let spy = Ticker::new("SPY").unwrap();
        bus.publish(LifecycleEvent::TickerRemoved {
            ticker: spy.clone(),
            timestamp: 7,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "ticker:removed");
        assert_eq!(event.ticker(), Some(&spy));
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = LifecycleEvent::BatchProcessed {
            count: 3,
            succeeded: 2,
            failed: 1,
            timestamp: 9,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "batch_processed");
        assert_eq!(json["count"], 3);
    }
}
