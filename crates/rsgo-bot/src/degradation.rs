//! Resource pressure and graceful degradation.
//!
//! Each tick samples memory utilization, open positions and portfolio heat.
//! Under pressure the orchestrator processes a smaller share of the
//! watchlist and stretches its interval instead of failing.

use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::config::{OrchestratorConfig, RiskConfig};

// ============================================================================
// ResourceProbe
// ============================================================================

/// Source of process memory utilization in [0, 1].
pub trait ResourceProbe: Send + Sync {
    fn memory_utilization(&self) -> f64;
}

/// Resident set size of this process against a configured ceiling.
///
/// Reads `/proc/self/statm`; reports 0 where that is unavailable.
#[derive(Debug, Clone)]
pub struct ProcessMemoryProbe {
    limit_mb: u64,
}

/// Page size assumed for `/proc/self/statm`.
const PAGE_SIZE_BYTES: u64 = 4096;

impl ProcessMemoryProbe {
    #[must_use]
    pub fn new(limit_mb: u64) -> Self {
        Self { limit_mb }
    }

    fn resident_mb() -> Option<f64> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
        Some((resident_pages * PAGE_SIZE_BYTES) as f64 / (1024.0 * 1024.0))
    }
}

impl ResourceProbe for ProcessMemoryProbe {
    fn memory_utilization(&self) -> f64 {
        if self.limit_mb == 0 {
            return 0.0;
        }
        match Self::resident_mb() {
            Some(resident) => resident / self.limit_mb as f64,
            None => {
                debug!("Process memory unavailable, assuming no pressure");
                0.0
            }
        }
    }
}

/// Probe reporting a settable value.
#[derive(Debug, Default)]
pub struct FixedProbe {
    utilization: Mutex<f64>,
}

impl FixedProbe {
    #[must_use]
    pub fn new(utilization: f64) -> Self {
        Self {
            utilization: Mutex::new(utilization),
        }
    }

    pub fn set(&self, utilization: f64) {
        *self.utilization.lock() = utilization;
    }
}

impl ResourceProbe for FixedProbe {
    fn memory_utilization(&self) -> f64 {
        *self.utilization.lock()
    }
}

// ============================================================================
// ResourceStatus
// ============================================================================

/// Condition that triggered degradation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationCause {
    Memory,
    OpenPositions,
    PortfolioHeat,
}

impl DegradationCause {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DegradationCause::Memory => "memory",
            DegradationCause::OpenPositions => "open_positions",
            DegradationCause::PortfolioHeat => "portfolio_heat",
        }
    }
}

impl fmt::Display for DegradationCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pressure snapshot for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceStatus {
    pub memory_utilization: f64,
    pub open_positions: usize,
    pub portfolio_heat: f64,
    /// Empty when healthy.
    pub causes: Vec<DegradationCause>,
}

impl ResourceStatus {
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.causes.is_empty()
    }
}

// ============================================================================
// DegradationPolicy
// ============================================================================

/// Throughput for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DegradationPlan {
    pub max_concurrent_tickers: usize,
    pub update_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradationPolicy {
    pub memory_degrade_threshold: f64,
    pub memory_severe_threshold: f64,
    pub max_portfolio_heat: f64,
    pub max_concurrent_trades: usize,
    pub fraction_moderate: f64,
    pub fraction_severe: f64,
    pub max_concurrent_tickers: usize,
    pub base_interval_ms: u64,
    pub interval_multiplier: f64,
    pub interval_cap_ms: u64,
}

impl DegradationPolicy {
    #[must_use]
    pub fn new(risk: &RiskConfig, orchestrator: &OrchestratorConfig) -> Self {
        Self {
            memory_degrade_threshold: risk.memory_degrade_threshold,
            memory_severe_threshold: risk.memory_severe_threshold,
            max_portfolio_heat: risk.max_portfolio_heat,
            max_concurrent_trades: risk.max_concurrent_trades,
            fraction_moderate: risk.degraded_fraction_moderate,
            fraction_severe: risk.degraded_fraction_severe,
            max_concurrent_tickers: orchestrator.max_concurrent_tickers,
            base_interval_ms: orchestrator.update_interval_ms,
            interval_multiplier: orchestrator.degraded_interval_multiplier,
            interval_cap_ms: orchestrator.degraded_interval_cap_ms,
        }
    }

    /// Classify raw readings.
    #[must_use]
    pub fn assess(
        &self,
        memory_utilization: f64,
        open_positions: usize,
        portfolio_heat: f64,
    ) -> ResourceStatus {
        let mut causes = Vec::new();
        if memory_utilization > self.memory_degrade_threshold {
            causes.push(DegradationCause::Memory);
        }
        if open_positions >= self.max_concurrent_trades {
            causes.push(DegradationCause::OpenPositions);
        }
        if portfolio_heat > self.max_portfolio_heat {
            causes.push(DegradationCause::PortfolioHeat);
        }
        ResourceStatus {
            memory_utilization,
            open_positions,
            portfolio_heat,
            causes,
        }
    }

    /// Throughput for the next tick.
    ///
    /// Healthy: `min(max_concurrent_tickers, watchlist)` at the base interval.
    /// Degraded: `max(1, floor(watchlist x fraction))` (severe fraction above
    /// the severe memory threshold) and `min(current x multiplier, cap)`.
    #[must_use]
    pub fn plan(
        &self,
        status: &ResourceStatus,
        watchlist_len: usize,
        current_interval_ms: u64,
    ) -> DegradationPlan {
        let healthy_max = self.max_concurrent_tickers.min(watchlist_len);
        if !status.is_degraded() {
            return DegradationPlan {
                max_concurrent_tickers: healthy_max,
                update_interval_ms: self.base_interval_ms,
            };
        }

        let fraction = if status.memory_utilization > self.memory_severe_threshold {
            self.fraction_severe
        } else {
            self.fraction_moderate
        };
        let reduced = if watchlist_len == 0 {
            0
        } else {
            ((watchlist_len as f64 * fraction).floor() as usize).max(1)
        };
        let stretched = (current_interval_ms as f64 * self.interval_multiplier).round() as u64;

        DegradationPlan {
            max_concurrent_tickers: reduced.min(healthy_max),
            update_interval_ms: stretched.min(self.interval_cap_ms).max(1),
        }
    }
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self::new(&RiskConfig::default(), &OrchestratorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_status() {
        let policy = DegradationPolicy::default();
        let status = policy.assess(0.5, 0, 0.0);
        assert!(!status.is_degraded());
        let plan = policy.plan(&status, 10, 30_000);
        assert_eq!(plan.max_concurrent_tickers, 10);
        assert_eq!(plan.update_interval_ms, 30_000);
    }

    #[test]
    fn test_each_cause_detected() {
        let policy = DegradationPolicy::default();
        assert_eq!(
            policy.assess(0.81, 0, 0.0).causes,
            vec![DegradationCause::Memory]
        );
        assert_eq!(
            policy.assess(0.1, 3, 0.0).causes,
            vec![DegradationCause::OpenPositions]
        );
        assert_eq!(
            policy.assess(0.1, 0, 0.16).causes,
            vec![DegradationCause::PortfolioHeat]
        );
        assert!(policy.assess(0.8, 2, 0.15).causes.is_empty());
    }

    #[test]
    fn test_severe_memory_uses_severe_fraction() {
        let policy = DegradationPolicy::default();
        let status = policy.assess(0.92, 0, 0.0);
        let plan = policy.plan(&status, 10, 30_000);
        assert_eq!(plan.max_concurrent_tickers, 3);
        assert_eq!(plan.update_interval_ms, 10_000);
    }

    #[test]
    fn test_moderate_pressure_uses_moderate_fraction() {
        let policy = DegradationPolicy::default();
        let status = policy.assess(0.85, 0, 0.0);
        let plan = policy.plan(&status, 10, 4_000);
        assert_eq!(plan.max_concurrent_tickers, 6);
        assert_eq!(plan.update_interval_ms, 6_000);
    }

    #[test]
    fn test_reduced_never_below_one() {
        let policy = DegradationPolicy::default();
        let status = policy.assess(0.95, 0, 0.0);
        assert_eq!(policy.plan(&status, 2, 1_000).max_concurrent_tickers, 1);
        assert_eq!(policy.plan(&status, 0, 1_000).max_concurrent_tickers, 0);
    }

    #[test]
    fn test_fixed_probe() {
        let probe = FixedProbe::new(0.4);
        assert_eq!(probe.memory_utilization(), 0.4);
        probe.set(0.92);
        assert_eq!(probe.memory_utilization(), 0.92);
    }

    #[test]
    fn test_process_probe_zero_limit() {
        assert_eq!(ProcessMemoryProbe::new(0).memory_utilization(), 0.0);
        assert!(ProcessMemoryProbe::new(1 << 30).memory_utilization() >= 0.0);
    }
}
