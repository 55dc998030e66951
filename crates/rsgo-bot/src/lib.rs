//! rsgo: READY/SET/GO ticker lifecycle engine.
//!
//! Application crate that ties the components together:
//! - [`Orchestrator`]: tick loop, admission, batch execution, degradation
//! - [`TransitionPolicy`]: signal thresholds driving READY/SET/GO/COOLDOWN
//! - [`PositionBook`]: open positions backing executed trades
//! - [`TradeHook`]: where executed trades are handed off
//! - [`AppConfig`]: TOML configuration with hot reload

pub mod app;
pub mod config;
pub mod degradation;
pub mod error;
pub mod hooks;
pub mod orchestrator;
pub mod policy;
pub mod portfolio;
pub mod signal_worker;

pub use app::{Application, ConfigWatcher};
pub use config::AppConfig;
pub use degradation::{
    DegradationCause, DegradationPlan, DegradationPolicy, FixedProbe, ProcessMemoryProbe,
    ResourceProbe, ResourceStatus,
};
pub use error::{AppError, AppResult};
pub use hooks::{DynTradeHook, LoggingTradeHook, TradeHook, TradeRequest};
pub use orchestrator::{Orchestrator, ProcessingStatistics, TickReport};
pub use policy::{Decision, TransitionPolicy};
pub use portfolio::{OpenRejected, Position, PositionBook};
pub use signal_worker::{PassthroughSignalSource, SignalSource, SignalWorker};
