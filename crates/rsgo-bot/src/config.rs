//! Application configuration.

use std::collections::HashMap;
use std::path::Path;

use rsgo_core::{FibZone, PriorityWeights, ResourceBudget, ResourceEstimate, Ticker};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

// ============================================================================
// Orchestrator loop
// ============================================================================

/// Tick loop configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Base tick interval (ms). Default: 30,000.
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
    /// Ceiling for the stretched interval under degradation (ms). Default: 10,000.
    #[serde(default = "default_degraded_interval_cap_ms")]
    pub degraded_interval_cap_ms: u64,
    /// Interval multiplier applied per degraded tick. Default: 1.5.
    #[serde(default = "default_degraded_interval_multiplier")]
    pub degraded_interval_multiplier: f64,
    /// Tickers processed per tick when not degraded. Default: 50.
    #[serde(default = "default_max_concurrent_tickers")]
    pub max_concurrent_tickers: usize,
    /// Per-task timeout (ms). Default: 5,000.
    #[serde(default = "default_task_timeout_ms")]
    pub task_timeout_ms: u64,
    /// Cooldown sweep period (ms). Default: 1,000.
    #[serde(default = "default_cooldown_sweep_interval_ms")]
    pub cooldown_sweep_interval_ms: u64,
}

fn default_update_interval_ms() -> u64 {
    30_000
}

fn default_degraded_interval_cap_ms() -> u64 {
    10_000
}

fn default_degraded_interval_multiplier() -> f64 {
    1.5
}

fn default_max_concurrent_tickers() -> usize {
    50
}

fn default_task_timeout_ms() -> u64 {
    5_000
}

fn default_cooldown_sweep_interval_ms() -> u64 {
    1_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: default_update_interval_ms(),
            degraded_interval_cap_ms: default_degraded_interval_cap_ms(),
            degraded_interval_multiplier: default_degraded_interval_multiplier(),
            max_concurrent_tickers: default_max_concurrent_tickers(),
            task_timeout_ms: default_task_timeout_ms(),
            cooldown_sweep_interval_ms: default_cooldown_sweep_interval_ms(),
        }
    }
}

// ============================================================================
// Transition policy
// ============================================================================

/// Signal thresholds for READY/SET/GO/COOLDOWN decisions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Base confidence threshold. Default: 0.62.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Minimum conviction for SET -> GO. Default: 0.7.
    #[serde(default = "default_conviction_threshold")]
    pub conviction_threshold: f64,
    /// Minimum fib confluence for SET -> GO. Default: 0.6.
    #[serde(default = "default_fib_confluence_threshold")]
    pub fib_confluence_threshold: f64,
    /// SET -> GO requires `confidence > threshold x go_multiplier`. Default: 1.2.
    #[serde(default = "default_go_multiplier")]
    pub go_multiplier: f64,
    /// SET -> READY when `confidence < threshold x decay_multiplier`. Default: 0.8.
    #[serde(default = "default_decay_multiplier")]
    pub decay_multiplier: f64,
    /// GO -> COOLDOWN requires `confidence > threshold x execute_multiplier`. Default: 1.5.
    #[serde(default = "default_execute_multiplier")]
    pub execute_multiplier: f64,
    /// GO -> COOLDOWN requires `risk_score < max_risk_score`. Default: 0.8.
    #[serde(default = "default_max_risk_score")]
    pub max_risk_score: f64,
    /// Zones that block READY -> SET. Default: [EXHAUSTION].
    #[serde(default = "default_fib_blocklist")]
    pub fib_blocklist: Vec<FibZone>,
}

fn default_confidence_threshold() -> f64 {
    0.62
}

fn default_conviction_threshold() -> f64 {
    0.7
}

fn default_fib_confluence_threshold() -> f64 {
    0.6
}

fn default_go_multiplier() -> f64 {
    1.2
}

fn default_decay_multiplier() -> f64 {
    0.8
}

fn default_execute_multiplier() -> f64 {
    1.5
}

fn default_max_risk_score() -> f64 {
    0.8
}

fn default_fib_blocklist() -> Vec<FibZone> {
    vec![FibZone::Exhaustion]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            conviction_threshold: default_conviction_threshold(),
            fib_confluence_threshold: default_fib_confluence_threshold(),
            go_multiplier: default_go_multiplier(),
            decay_multiplier: default_decay_multiplier(),
            execute_multiplier: default_execute_multiplier(),
            max_risk_score: default_max_risk_score(),
            fib_blocklist: default_fib_blocklist(),
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("conviction_threshold", self.conviction_threshold),
            ("fib_confluence_threshold", self.fib_confluence_threshold),
            ("max_risk_score", self.max_risk_score),
        ] {
            ensure_unit_interval(name, value)?;
        }
        for (name, value) in [
            ("go_multiplier", self.go_multiplier),
            ("decay_multiplier", self.decay_multiplier),
            ("execute_multiplier", self.execute_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::Config(format!("{name} must be > 0, got {value}")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Risk and degradation
// ============================================================================

/// Trade limits and degradation breakpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum simultaneously open positions. Default: 3.
    #[serde(default = "default_max_concurrent_trades")]
    pub max_concurrent_trades: usize,
    /// Denominator for portfolio heat. Default: 100,000.
    #[serde(default = "default_account_size")]
    pub account_size: f64,
    /// Degrade when heat exceeds this. Default: 0.15.
    #[serde(default = "default_max_portfolio_heat")]
    pub max_portfolio_heat: f64,
    /// Degrade when memory utilization exceeds this. Default: 0.8.
    #[serde(default = "default_memory_degrade_threshold")]
    pub memory_degrade_threshold: f64,
    /// Use the severe fraction above this utilization. Default: 0.9.
    #[serde(default = "default_memory_severe_threshold")]
    pub memory_severe_threshold: f64,
    /// Watchlist share processed under moderate pressure. Default: 0.6.
    #[serde(default = "default_moderate_fraction")]
    pub degraded_fraction_moderate: f64,
    /// Watchlist share processed under severe memory pressure. Default: 0.3.
    #[serde(default = "default_severe_fraction")]
    pub degraded_fraction_severe: f64,
    /// Memory ceiling used for utilization (MB). Default: 2,048.
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
}

fn default_max_concurrent_trades() -> usize {
    3
}

fn default_account_size() -> f64 {
    100_000.0
}

fn default_max_portfolio_heat() -> f64 {
    0.15
}

fn default_memory_degrade_threshold() -> f64 {
    0.8
}

fn default_memory_severe_threshold() -> f64 {
    0.9
}

fn default_moderate_fraction() -> f64 {
    0.6
}

fn default_severe_fraction() -> f64 {
    0.3
}

fn default_memory_limit_mb() -> u64 {
    2_048
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_concurrent_trades: default_max_concurrent_trades(),
            account_size: default_account_size(),
            max_portfolio_heat: default_max_portfolio_heat(),
            memory_degrade_threshold: default_memory_degrade_threshold(),
            memory_severe_threshold: default_memory_severe_threshold(),
            degraded_fraction_moderate: default_moderate_fraction(),
            degraded_fraction_severe: default_severe_fraction(),
            memory_limit_mb: default_memory_limit_mb(),
        }
    }
}

// ============================================================================
// Components
// ============================================================================

/// State machine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Default cooldown window (ms). Default: 300,000.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    /// Transitions kept per ticker. Default: 50.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
}

fn default_cooldown_ms() -> u64 {
    300_000
}

fn default_history_capacity() -> usize {
    50
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            history_capacity: default_history_capacity(),
        }
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Worker slots. Default: 4.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Shutdown drain window (ms). Default: 10,000.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_worker_count() -> usize {
    4
}

fn default_drain_timeout_ms() -> u64 {
    10_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

/// Admission configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub budget: ResourceBudget,
    /// Estimated cost of one per-ticker task.
    #[serde(default = "default_task_estimate")]
    pub task_estimate: ResourceEstimate,
    /// Per-ticker priority multipliers (default 1.0).
    #[serde(default)]
    pub weights: HashMap<String, f64>,
}

fn default_task_estimate() -> ResourceEstimate {
    ResourceEstimate::new(32.0, 2.0, 1)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            budget: ResourceBudget::default(),
            task_estimate: default_task_estimate(),
            weights: HashMap::new(),
        }
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tickers to watch.
    #[serde(default)]
    pub watchlist: Vec<String>,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Config file poll period (s); 0 disables hot reload. Default: 30.
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,
}

fn default_reload_interval_secs() -> u64 {
    30
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            watchlist: Vec::new(),
            orchestrator: OrchestratorConfig::default(),
            policy: PolicyConfig::default(),
            risk: RiskConfig::default(),
            state: StateConfig::default(),
            executor: ExecutorConfig::default(),
            scheduler: SchedulerConfig::default(),
            reload_interval_secs: default_reload_interval_secs(),
        }
    }
}

impl AppConfig {
    /// Load from `RSGO_CONFIG` or `config/default.toml`, falling back to defaults.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("RSGO_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());
        Self::load_or_default(&config_path)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &str) -> AppResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> AppResult<()> {
        self.policy.validate()?;
        self.watchlist_tickers()?;
        self.priority_weights()?;

        if self.executor.worker_count == 0 {
            return Err(AppError::Config("executor.worker_count must be > 0".into()));
        }
        if self.orchestrator.update_interval_ms == 0 {
            return Err(AppError::Config(
                "orchestrator.update_interval_ms must be > 0".into(),
            ));
        }
        if self.orchestrator.degraded_interval_cap_ms == 0 {
            return Err(AppError::Config(
                "orchestrator.degraded_interval_cap_ms must be > 0".into(),
            ));
        }
        if !self.orchestrator.degraded_interval_multiplier.is_finite()
            || self.orchestrator.degraded_interval_multiplier < 1.0
        {
            return Err(AppError::Config(
                "orchestrator.degraded_interval_multiplier must be >= 1".into(),
            ));
        }
        if self.orchestrator.max_concurrent_tickers == 0 {
            return Err(AppError::Config(
                "orchestrator.max_concurrent_tickers must be > 0".into(),
            ));
        }
        if self.orchestrator.task_timeout_ms == 0 {
            return Err(AppError::Config(
                "orchestrator.task_timeout_ms must be > 0".into(),
            ));
        }
        if !self.risk.account_size.is_finite() || self.risk.account_size <= 0.0 {
            return Err(AppError::Config("risk.account_size must be > 0".into()));
        }
        for (name, value) in [
            ("risk.max_portfolio_heat", self.risk.max_portfolio_heat),
            ("risk.memory_degrade_threshold", self.risk.memory_degrade_threshold),
            ("risk.memory_severe_threshold", self.risk.memory_severe_threshold),
            ("risk.degraded_fraction_moderate", self.risk.degraded_fraction_moderate),
            ("risk.degraded_fraction_severe", self.risk.degraded_fraction_severe),
        ] {
            ensure_unit_interval(name, value)?;
        }
        if self.risk.memory_severe_threshold < self.risk.memory_degrade_threshold {
            return Err(AppError::Config(
                "risk.memory_severe_threshold must be >= risk.memory_degrade_threshold".into(),
            ));
        }
        Ok(())
    }

    /// Parsed, de-duplicated watchlist in file order.
    pub fn watchlist_tickers(&self) -> AppResult<Vec<Ticker>> {
        let mut tickers: Vec<Ticker> = Vec::with_capacity(self.watchlist.len());
        for symbol in &self.watchlist {
            let ticker = Ticker::new(symbol)?;
            if !tickers.contains(&ticker) {
                tickers.push(ticker);
            }
        }
        Ok(tickers)
    }

    pub fn priority_weights(&self) -> AppResult<PriorityWeights> {
        let mut weights = PriorityWeights::new();
        for (symbol, weight) in &self.scheduler.weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(AppError::Config(format!(
                    "scheduler.weights.{symbol} must be >= 0, got {weight}"
                )));
            }
            weights.set(Ticker::new(symbol)?, *weight);
        }
        Ok(weights)
    }
}

/// `value` must lie in (0, 1].
fn ensure_unit_interval(name: &str, value: f64) -> AppResult<()> {
    if value.is_finite() && value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(AppError::Config(format!("{name} must be in (0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.orchestrator.update_interval_ms, 30_000);
        assert_eq!(config.orchestrator.degraded_interval_cap_ms, 10_000);
        assert_eq!(config.orchestrator.task_timeout_ms, 5_000);
        assert_eq!(config.policy.confidence_threshold, 0.62);
        assert_eq!(config.policy.fib_blocklist, vec![FibZone::Exhaustion]);
        assert_eq!(config.risk.max_concurrent_trades, 3);
        assert_eq!(config.risk.account_size, 100_000.0);
        assert_eq!(config.state.cooldown_ms, 300_000);
        assert_eq!(config.state.history_capacity, 50);
        assert_eq!(config.executor.worker_count, 4);
        assert_eq!(config.reload_interval_secs, 30);
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_toml_matches_defaults() {
        let parsed = AppConfig::from_toml("").unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = AppConfig::from_toml(
            r#"
            watchlist = ["spy", "QQQ", "SPY"]

            [policy]
            confidence_threshold = 0.5
            fib_blocklist = ["EXHAUSTION", "EXTENSION"]

            [scheduler.weights]
            QQQ = 2.0

            [scheduler.budget]
            max_concurrent_tasks = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.policy.confidence_threshold, 0.5);
        assert_eq!(config.policy.conviction_threshold, 0.7);
        assert_eq!(config.policy.fib_blocklist.len(), 2);
        assert_eq!(config.scheduler.budget.max_concurrent_tasks, 8);
        assert_eq!(config.scheduler.budget.max_memory_mb, 1024.0);

        let tickers = config.watchlist_tickers().unwrap();
        let symbols: Vec<&str> = tickers.iter().map(Ticker::as_str).collect();
        assert_eq!(symbols, vec!["SPY", "QQQ"]);
        let weights = config.priority_weights().unwrap();
        assert_eq!(weights.weight_of(&Ticker::new("QQQ").unwrap()), 2.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.executor.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.policy.confidence_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.risk.account_size = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.risk.degraded_fraction_severe = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.watchlist = vec!["BAD TICKER".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let config = AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.watchlist_tickers().unwrap().len(), 8);
        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        assert_eq!(config.policy, PolicyConfig::default());
    }
}
