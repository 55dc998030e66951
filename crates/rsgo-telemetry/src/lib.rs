//! Prometheus metrics and structured logging for rsgo.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus metrics for lifecycle transitions, admission, task
//!   execution, degradation and trades
//! - [`MetricsRecorder`]: turns the event stream into metric updates, so
//!   the engine crates never call into telemetry themselves

pub mod error;
pub mod logging;
pub mod metrics;
pub mod recorder;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
pub use recorder::MetricsRecorder;
