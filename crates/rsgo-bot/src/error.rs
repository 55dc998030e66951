//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State error: {0}")]
    State(#[from] rsgo_state::StateError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] rsgo_scheduler::SchedulerError),

    #[error("Executor error: {0}")]
    Executor(#[from] rsgo_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] rsgo_telemetry::TelemetryError),

    #[error("Core error: {0}")]
    Core(#[from] rsgo_core::CoreError),

    #[error("Orchestrator already running")]
    AlreadyRunning,

    #[error("Orchestrator not running")]
    NotRunning,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
