//! Processing tasks and their results.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resources::ResourceEstimate;
use crate::signal::SignalFactors;
use crate::types::{Ticker, TickerUpdate};

// ============================================================================
// TaskId
// ============================================================================

/// Unique task identifier.
///
/// Format: `task_{timestamp_ms}_{uuid_short}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        let ts = chrono::Utc::now().timestamp_millis();
        let uuid_short = &Uuid::new_v4().simple().to_string()[..8];
        Self(format!("task_{ts}_{uuid_short}"))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// ProcessingTask
// ============================================================================

/// What a task asks a worker to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    /// Recompute signal readings for the ticker.
    #[default]
    SignalProcessing,
    /// Refresh state from external sources without a new signal.
    StateRefresh,
    /// Re-evaluate risk for an actionable ticker.
    RiskEvaluation,
}

impl TaskKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::SignalProcessing => "signal_processing",
            TaskKind::StateRefresh => "state_refresh",
            TaskKind::RiskEvaluation => "risk_evaluation",
        }
    }
}

/// Immutable unit of per-ticker work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTask {
    pub id: TaskId,
    pub ticker: Ticker,
    pub kind: TaskKind,
    pub urgent: bool,
    /// Creation time (Unix ms).
    pub created_at: u64,
    pub estimate: ResourceEstimate,
    /// Opaque input for the worker (the orchestrator sends a state snapshot).
    pub payload: serde_json::Value,
}

impl ProcessingTask {
    #[must_use]
    pub fn new(
        ticker: Ticker,
        kind: TaskKind,
        urgent: bool,
        estimate: ResourceEstimate,
        payload: serde_json::Value,
        created_at: u64,
    ) -> Self {
        Self {
            id: TaskId::new(),
            ticker,
            kind,
            urgent,
            created_at,
            estimate,
            payload,
        }
    }
}

// ============================================================================
// ProcessingResult
// ============================================================================

/// What a worker hands back on success.
///
/// `signal` is routed through the transition policy, `update` is merged
/// directly into the state machine, `data` is carried for consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalFactors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<TickerUpdate>,
    pub data: serde_json::Value,
}

impl TaskOutput {
    #[must_use]
    pub fn signal(signal: SignalFactors) -> Self {
        Self {
            signal: Some(signal),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn update(update: TickerUpdate) -> Self {
        Self {
            update: Some(update),
            ..Self::default()
        }
    }
}

/// Outcome of one task. `data` is present iff `success`, `error` iff not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub ticker: Ticker,
    pub task_id: TaskId,
    pub success: bool,
    pub data: Option<TaskOutput>,
    pub error: Option<String>,
    pub processing_time_ms: u64,
    /// Completion time (Unix ms).
    pub timestamp: u64,
    /// Worker slot that ran the task, if one was acquired.
    pub worker_id: Option<usize>,
}

impl ProcessingResult {
    #[must_use]
    pub fn succeeded(
        task: &ProcessingTask,
        output: TaskOutput,
        processing_time_ms: u64,
        timestamp: u64,
        worker_id: Option<usize>,
    ) -> Self {
        Self {
            ticker: task.ticker.clone(),
            task_id: task.id.clone(),
            success: true,
            data: Some(output),
            error: None,
            processing_time_ms,
            timestamp,
            worker_id,
        }
    }

    #[must_use]
    pub fn failed(
        task: &ProcessingTask,
        error: impl Into<String>,
        processing_time_ms: u64,
        timestamp: u64,
        worker_id: Option<usize>,
    ) -> Self {
        Self {
            ticker: task.ticker.clone(),
            task_id: task.id.clone(),
            success: false,
            data: None,
            error: Some(error.into()),
            processing_time_ms,
            timestamp,
            worker_id,
        }
    }
}
