//! Signal readings supplied by external engines.

use serde::{Deserialize, Serialize};

use crate::types::FibZone;

/// One fresh reading for a ticker.
///
/// The values are opaque inputs: how they are computed (trend, momentum,
/// fib, gamma engines) is outside this workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignalFactors {
    pub confidence: f64,
    pub conviction: f64,
    pub fib_zone: FibZone,
    /// Agreement across fib levels in [0, 1].
    pub fib_confluence: f64,
    pub gamma_exposure: f64,
    /// Collaborator risk score in [0, 1]; higher is riskier.
    pub risk_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_action: Option<serde_json::Value>,
}

impl Default for SignalFactors {
    fn default() -> Self {
        Self {
            confidence: 0.0,
            conviction: 0.0,
            fib_zone: FibZone::Neutral,
            fib_confluence: 0.0,
            gamma_exposure: 0.0,
            risk_score: 1.0,
            recommended_action: None,
        }
    }
}

impl SignalFactors {
    #[must_use]
    pub fn with_confidence(confidence: f64) -> Self {
        Self {
            confidence,
            ..Self::default()
        }
    }
}
