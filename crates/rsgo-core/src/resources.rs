//! Resource budget, usage counters and priority weights.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::Ticker;

/// Estimated cost of one task.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceEstimate {
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub network_calls: u32,
}

impl ResourceEstimate {
    #[must_use]
    pub fn new(memory_mb: f64, cpu_percent: f64, network_calls: u32) -> Self {
        Self {
            memory_mb,
            cpu_percent,
            network_calls,
        }
    }
}

/// Fixed ceiling for admitted work.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceBudget {
    pub max_concurrent_tasks: u32,
    pub max_memory_mb: f64,
    pub max_cpu_percent: f64,
    pub max_network_calls: u32,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 50,
            max_memory_mb: 1024.0,
            max_cpu_percent: 80.0,
            max_network_calls: 100,
        }
    }
}

/// Which budget dimension a check failed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ConcurrentTasks,
    Memory,
    Cpu,
    NetworkCalls,
}

impl ResourceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::ConcurrentTasks => "concurrent_tasks",
            ResourceKind::Memory => "memory",
            ResourceKind::Cpu => "cpu",
            ResourceKind::NetworkCalls => "network_calls",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live counters consumed by admitted, not-yet-released tasks.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub tasks: u32,
    pub memory_mb: f64,
    pub cpu_percent: f64,
    pub network_calls: u32,
}

/// Float slack so repeated add/sub round-trips don't trip the ceiling.
const EPSILON: f64 = 1e-9;

impl ResourceUsage {
    /// First dimension on which `self + estimate` would exceed `budget`.
    #[must_use]
    pub fn first_exceeded(
        &self,
        estimate: &ResourceEstimate,
        budget: &ResourceBudget,
    ) -> Option<ResourceKind> {
        if self.tasks.saturating_add(1) > budget.max_concurrent_tasks {
            return Some(ResourceKind::ConcurrentTasks);
        }
        if self.memory_mb + estimate.memory_mb > budget.max_memory_mb + EPSILON {
            return Some(ResourceKind::Memory);
        }
        if self.cpu_percent + estimate.cpu_percent > budget.max_cpu_percent + EPSILON {
            return Some(ResourceKind::Cpu);
        }
        if self.network_calls.saturating_add(estimate.network_calls) > budget.max_network_calls {
            return Some(ResourceKind::NetworkCalls);
        }
        None
    }

    /// Whether every dimension is within `budget`.
    #[must_use]
    pub fn within(&self, budget: &ResourceBudget) -> bool {
        self.tasks <= budget.max_concurrent_tasks
            && self.memory_mb <= budget.max_memory_mb + EPSILON
            && self.cpu_percent <= budget.max_cpu_percent + EPSILON
            && self.network_calls <= budget.max_network_calls
    }

    pub fn reserve(&mut self, estimate: &ResourceEstimate) {
        self.tasks += 1;
        self.memory_mb += estimate.memory_mb;
        self.cpu_percent += estimate.cpu_percent;
        self.network_calls += estimate.network_calls;
    }

    pub fn release(&mut self, estimate: &ResourceEstimate) {
        self.tasks = self.tasks.saturating_sub(1);
        self.memory_mb = (self.memory_mb - estimate.memory_mb).max(0.0);
        self.cpu_percent = (self.cpu_percent - estimate.cpu_percent).max(0.0);
        self.network_calls = self.network_calls.saturating_sub(estimate.network_calls);
        if self.tasks == 0 {
            // Clear float drift once nothing is reserved.
            self.memory_mb = 0.0;
            self.cpu_percent = 0.0;
        }
    }
}

/// Per-ticker scheduling multipliers (default 1.0).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriorityWeights(HashMap<Ticker, f64>);

impl PriorityWeights {
    pub const DEFAULT_WEIGHT: f64 = 1.0;

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn weight_of(&self, ticker: &Ticker) -> f64 {
        self.0.get(ticker).copied().unwrap_or(Self::DEFAULT_WEIGHT)
    }

    pub fn set(&mut self, ticker: Ticker, weight: f64) {
        self.0.insert(ticker, weight.max(0.0));
    }

    pub fn remove(&mut self, ticker: &Ticker) -> Option<f64> {
        self.0.remove(ticker)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Ticker, f64)> for PriorityWeights {
    fn from_iter<I: IntoIterator<Item = (Ticker, f64)>>(iter: I) -> Self {
        let mut weights = Self::new();
        for (ticker, weight) in iter {
            weights.set(ticker, weight);
        }
        weights
    }
}
