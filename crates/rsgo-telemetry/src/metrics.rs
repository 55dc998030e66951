//! Prometheus metrics for rsgo.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_histogram_vec,
    register_int_counter, register_int_counter_vec, register_int_gauge, register_int_gauge_vec,
    Encoder, Gauge, GaugeVec, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, TextEncoder,
};

use crate::error::TelemetryResult;

// ============================================================================
// Lifecycle
// ============================================================================

/// Tickers per lifecycle status.
/// Labels: status (READY/SET/GO/COOLDOWN)
pub static TICKERS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "rsgo_tickers_by_status",
        "Number of tickers in each lifecycle status",
        &["status"]
    )
    .unwrap()
});

/// Status transitions.
pub static TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rsgo_transitions_total",
        "Total ticker status transitions",
        &["from", "to", "forced"]
    )
    .unwrap()
});

pub static COOLDOWN_EXPIRED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rsgo_cooldown_expired_total",
        "Cooldowns that returned a ticker to READY"
    )
    .unwrap()
});

// ============================================================================
// Scheduling and execution
// ============================================================================

/// Admission outcomes.
/// Labels: outcome (admitted/rejected)
pub static ADMISSION_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rsgo_admission_total",
        "Admission decisions by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Task duration in milliseconds.
/// Labels: outcome (success/failure/timeout)
pub static TASK_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rsgo_task_duration_ms",
        "Task processing time in milliseconds",
        &["outcome"],
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .unwrap()
});

pub static TASKS_INFLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("rsgo_tasks_inflight", "Tasks currently executing").unwrap()
});

pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rsgo_batch_size",
        "Tasks per executed batch",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .unwrap()
});

// ============================================================================
// Orchestrator
// ============================================================================

pub static TICK_DURATION_MS: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "rsgo_tick_duration_ms",
        "Orchestrator tick duration in milliseconds",
        vec![10.0, 50.0, 100.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Resource pressure observed by the degradation check.
/// Labels: kind (memory/portfolio_heat/open_positions)
pub static RESOURCE_PRESSURE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "rsgo_resource_pressure",
        "Resource pressure inputs to degradation",
        &["kind"]
    )
    .unwrap()
});

/// Degraded mode flag (1 = degraded).
pub static DEGRADED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("rsgo_degraded", "Degraded mode active (1=degraded)").unwrap()
});

pub static DEGRADATION_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rsgo_degradation_total",
        "Degradation applications by triggering cause",
        &["cause"]
    )
    .unwrap()
});

pub static TRADES_EXECUTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rsgo_trades_executed_total",
        "Trades submitted on GO -> COOLDOWN",
        &["ticker"]
    )
    .unwrap()
});

/// Labels: kind (tick/processing)
pub static ORCHESTRATOR_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rsgo_orchestrator_errors_total",
        "Errors surfaced by the orchestrator",
        &["kind"]
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set per-status ticker counts.
    pub fn tickers_by_status(status: &str, count: i64) {
        TICKERS_BY_STATUS.with_label_values(&[status]).set(count);
    }

    pub fn transition(from: &str, to: &str, forced: bool) {
        let forced = if forced { "true" } else { "false" };
        TRANSITIONS_TOTAL
            .with_label_values(&[from, to, forced])
            .inc();
    }

    pub fn cooldown_expired() {
        COOLDOWN_EXPIRED_TOTAL.inc();
    }

    pub fn admission(outcome: &str, count: u64) {
        ADMISSION_TOTAL.with_label_values(&[outcome]).inc_by(count);
    }

    pub fn task_duration(outcome: &str, duration_ms: f64) {
        TASK_DURATION_MS
            .with_label_values(&[outcome])
            .observe(duration_ms);
    }

    pub fn tasks_inflight_set(count: i64) {
        TASKS_INFLIGHT.set(count);
    }

    pub fn batch_processed(size: usize) {
        BATCH_SIZE.observe(size as f64);
    }

    pub fn tick_duration(duration_ms: f64) {
        TICK_DURATION_MS.observe(duration_ms);
    }

    pub fn resource_pressure(kind: &str, value: f64) {
        RESOURCE_PRESSURE.with_label_values(&[kind]).set(value);
    }

    pub fn degraded(is_degraded: bool) {
        DEGRADED.set(if is_degraded { 1.0 } else { 0.0 });
    }

    pub fn degradation_applied(cause: &str) {
        DEGRADATION_TOTAL.with_label_values(&[cause]).inc();
    }

    pub fn trade_executed(ticker: &str) {
        TRADES_EXECUTED_TOTAL.with_label_values(&[ticker]).inc();
    }

    pub fn orchestrator_error(kind: &str) {
        ORCHESTRATOR_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::error::TelemetryError::Metrics(e.to_string()))
    }
}
