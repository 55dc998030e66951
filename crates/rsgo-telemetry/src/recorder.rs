//! Event-driven metrics recorder.

use std::collections::HashMap;

use rsgo_core::{EventBus, LifecycleEvent, Ticker, TickerStatus};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::Metrics;

/// Folds lifecycle events into Prometheus metrics.
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    statuses: HashMap<Ticker, TickerStatus>,
}

impl MetricsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to `events` and record until `cancel` fires or the bus closes.
    pub fn spawn(events: &EventBus, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = events.subscribe();
        tokio::spawn(async move {
            let mut recorder = MetricsRecorder::new();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => recorder.record(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Metrics recorder lagged behind event stream");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Metrics recorder stopped");
        })
    }

    /// Apply one event.
    pub fn record(&mut self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::TickerInitialized { ticker, .. } => {
                self.track(ticker.clone(), TickerStatus::Ready);
            }
            LifecycleEvent::TickerUpdated { state } => {
                self.track(state.ticker.clone(), state.status);
            }
            LifecycleEvent::TickerRemoved { ticker, .. } => {
                self.statuses.remove(ticker);
                self.publish_status_counts();
            }
            LifecycleEvent::TickerTransition { transition, .. }
            | LifecycleEvent::TickerTransitionForced { transition, .. } => {
                Metrics::transition(
                    transition.from.as_str(),
                    transition.to.as_str(),
                    transition.forced,
                );
            }
            LifecycleEvent::CooldownExpired { .. } => Metrics::cooldown_expired(),
            LifecycleEvent::CooldownStarted { .. } => {}
            LifecycleEvent::TaskCompleted { duration_ms, .. } => {
                Metrics::task_duration("success", *duration_ms as f64);
            }
            LifecycleEvent::TaskFailed {
                duration_ms,
                timed_out,
                ..
            } => {
                let outcome = if *timed_out { "timeout" } else { "failure" };
                Metrics::task_duration(outcome, *duration_ms as f64);
            }
            LifecycleEvent::BatchProcessed { count, .. } => Metrics::batch_processed(*count),
            LifecycleEvent::DegradationApplied { causes, .. } => {
                for cause in causes {
                    Metrics::degradation_applied(cause);
                }
            }
            LifecycleEvent::OrchestratorError { .. } => Metrics::orchestrator_error("tick"),
            LifecycleEvent::ProcessingError { .. } => Metrics::orchestrator_error("processing"),
            LifecycleEvent::Tick {
                processed,
                rejected,
                duration_ms,
                degraded,
                memory_utilization,
                open_positions,
                portfolio_heat,
                ..
            } => {
                Metrics::tick_duration(*duration_ms as f64);
                Metrics::admission("admitted", *processed as u64);
                Metrics::admission("rejected", *rejected as u64);
                Metrics::degraded(*degraded);
                Metrics::resource_pressure("memory", *memory_utilization);
                Metrics::resource_pressure("portfolio_heat", *portfolio_heat);
                Metrics::resource_pressure("open_positions", *open_positions as f64);
            }
            LifecycleEvent::TradeExecuted { ticker, .. } => Metrics::trade_executed(ticker.as_str()),
        }
    }

    /// Tickers tracked with `status`.
    #[must_use]
    pub fn count(&self, status: TickerStatus) -> usize {
        self.statuses.values().filter(|s| **s == status).count()
    }

    fn track(&mut self, ticker: Ticker, status: TickerStatus) {
        if self.statuses.insert(ticker, status) != Some(status) {
            self.publish_status_counts();
        }
    }

    fn publish_status_counts(&self) {
        for status in TickerStatus::ALL {
            Metrics::tickers_by_status(status.as_str(), self.count(status) as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{COOLDOWN_EXPIRED_TOTAL, TICKERS_BY_STATUS};
    use rsgo_core::TickerState;

    fn t(s: &str) -> Ticker {
        Ticker::new(s).unwrap()
    }

    #[test]
    fn test_tracks_status_counts() {
        let mut recorder = MetricsRecorder::new();
        recorder.record(&LifecycleEvent::TickerInitialized {
            ticker: t("SPY"),
            timestamp: 0,
        });
        recorder.record(&LifecycleEvent::TickerInitialized {
            ticker: t("QQQ"),
            timestamp: 0,
        });
        let mut state = TickerState::new(t("SPY"), 0);
        state.status = TickerStatus::Set;
        recorder.record(&LifecycleEvent::TickerUpdated { state });

        assert_eq!(recorder.count(TickerStatus::Ready), 1);
        assert_eq!(recorder.count(TickerStatus::Set), 1);

        recorder.record(&LifecycleEvent::TickerRemoved {
            ticker: t("QQQ"),
            timestamp: 0,
        });
        assert_eq!(recorder.count(TickerStatus::Ready), 0);
        // Gauges are global; only check the label exists.
        let _ = TICKERS_BY_STATUS.with_label_values(&["SET"]).get();
    }

    #[test]
    fn test_cooldown_expiry_counted() {
        let mut recorder = MetricsRecorder::new();
        let before = COOLDOWN_EXPIRED_TOTAL.get();
        recorder.record(&LifecycleEvent::CooldownExpired {
            ticker: t("SPY"),
            timestamp: 0,
        });
        assert!(COOLDOWN_EXPIRED_TOTAL.get() >= before + 1);
    }

    #[tokio::test]
    async fn test_spawned_recorder_stops_on_cancel() {
        let events = EventBus::new(16);
        let cancel = CancellationToken::new();
        let handle = MetricsRecorder::spawn(&events, cancel.clone());
        events.publish(LifecycleEvent::CooldownExpired {
            ticker: t("SPY"),
            timestamp: 0,
        });
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
