//! Application wiring and main loop.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rsgo_core::{EventBus, SystemClock};
use rsgo_telemetry::MetricsRecorder;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::degradation::ProcessMemoryProbe;
use crate::error::AppResult;
use crate::hooks::LoggingTradeHook;
use crate::orchestrator::Orchestrator;
use crate::signal_worker::{PassthroughSignalSource, SignalWorker};

// ============================================================================
// ConfigWatcher
// ============================================================================

/// Polls a config file's modification time.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified_at(&path);
        Self {
            path,
            last_modified,
        }
    }

    /// Parsed and validated config if the file changed since the last poll.
    ///
    /// A file that fails to parse or validate is reported once per change.
    pub fn poll(&mut self) -> Option<AppResult<AppConfig>> {
        let modified = modified_at(&self.path)?;
        if self.last_modified == Some(modified) {
            return None;
        }
        self.last_modified = Some(modified);

        let path = self.path.to_string_lossy();
        Some(AppConfig::from_file(&path).and_then(|config| {
            config.validate()?;
            Ok(config)
        }))
    }
}

fn modified_at(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

// ============================================================================
// Application
// ============================================================================

/// Main application.
pub struct Application {
    config: AppConfig,
    config_path: Option<PathBuf>,
    orchestrator: Arc<Orchestrator>,
    events: EventBus,
}

impl Application {
    /// Wire the production components.
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> AppResult<Self> {
        let events = EventBus::default();
        let worker = Arc::new(SignalWorker::new(Arc::new(PassthroughSignalSource)));
        let orchestrator = Orchestrator::new(
            &config,
            worker,
            Arc::new(LoggingTradeHook),
            Arc::new(ProcessMemoryProbe::new(config.risk.memory_limit_mb)),
            Arc::new(SystemClock),
            events.clone(),
        )?;

        Ok(Self {
            config,
            config_path,
            orchestrator: Arc::new(orchestrator),
            events,
        })
    }

    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        let cancel = CancellationToken::new();
        let recorder = MetricsRecorder::spawn(&self.events, cancel.child_token());

        self.orchestrator.start()?;

        let reload_secs = self.config.reload_interval_secs;
        let mut watcher = self
            .config_path
            .as_ref()
            .filter(|_| reload_secs > 0)
            .map(ConfigWatcher::new);
        let mut reload = tokio::time::interval(Duration::from_secs(reload_secs.max(1)));
        reload.tick().await;

        info!(
            tickers = self.orchestrator.all_states().len(),
            hot_reload = watcher.is_some(),
            "Entering main loop"
        );

        loop {
            tokio::select! {
                _ = reload.tick(), if watcher.is_some() => {
                    if let Some(watcher) = watcher.as_mut() {
                        self.reload(watcher);
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        let report = self.orchestrator.stop().await?;
        cancel.cancel();
        if let Err(e) = recorder.await {
            warn!(error = %e, "Metrics recorder ended abnormally");
        }

        let states = self.orchestrator.state_statistics();
        let processing = self.orchestrator.processing_statistics();
        info!(
            tickers = states.total,
            in_cooldown = states.in_cooldown,
            processed = processing.executor.processed,
            failed = processing.executor.failed,
            timed_out = processing.executor.timed_out,
            admitted = processing.scheduler.total_admitted,
            rejected = processing.scheduler.total_rejected,
            abandoned = report.abandoned,
            "Final statistics"
        );
        Ok(())
    }

    fn reload(&self, watcher: &mut ConfigWatcher) {
        match watcher.poll() {
            None => debug!("Config unchanged"),
            Some(Ok(config)) => match self.orchestrator.apply_config(&config) {
                Ok(()) => info!("Configuration reloaded"),
                Err(e) => warn!(error = %e, "Configuration reload failed"),
            },
            Some(Err(e)) => warn!(error = %e, "Ignoring invalid configuration"),
        }
    }
}
