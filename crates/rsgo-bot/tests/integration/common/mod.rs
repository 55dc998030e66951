//! Shared helpers for integration tests.

pub mod mocks;

use std::sync::Arc;
use std::time::Duration;

use rsgo_bot::{AppConfig, FixedProbe, Orchestrator};
use rsgo_core::{EventBus, LifecycleEvent, ManualClock, Ticker};
use rsgo_executor::DynTaskWorker;
use tokio::sync::broadcast;

use mocks::RecordingTradeHook;

/// Start of the manual clock (Unix ms).
pub const START_MS: u64 = 1_700_000_000_000;

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub clock: Arc<ManualClock>,
    pub hook: Arc<RecordingTradeHook>,
    pub probe: Arc<FixedProbe>,
    pub events: broadcast::Receiver<LifecycleEvent>,
}

impl Harness {
    pub fn new(config: &AppConfig, worker: DynTaskWorker) -> Self {
        let clock = Arc::new(ManualClock::new(START_MS));
        let hook = Arc::new(RecordingTradeHook::default());
        let probe = Arc::new(FixedProbe::new(0.1));
        let bus = EventBus::default();
        let events = bus.subscribe();
        let orchestrator = Orchestrator::new(
            config,
            worker,
            hook.clone(),
            probe.clone(),
            clock.clone(),
            bus,
        )
        .expect("orchestrator");

        Self {
            orchestrator: Arc::new(orchestrator),
            clock,
            hook,
            probe,
            events,
        }
    }

    /// Everything published since the last drain.
    pub fn drain_events(&mut self) -> Vec<LifecycleEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Config with `watchlist`, a fast cooldown sweep and a loop interval long
/// enough that the background loop never ticks during a test.
pub fn test_config(watchlist: &[&str]) -> AppConfig {
    let mut config = AppConfig {
        watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
        ..AppConfig::default()
    };
    config.orchestrator.update_interval_ms = 600_000;
    config.orchestrator.cooldown_sweep_interval_ms = 10;
    config
}

pub fn ticker(symbol: &str) -> Ticker {
    Ticker::new(symbol).expect("ticker")
}

/// Poll `check` every 10ms for up to two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}
