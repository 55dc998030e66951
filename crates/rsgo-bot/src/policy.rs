//! Signal-driven transition policy.
//!
//! | From  | To       | Condition                                                        |
//! |-------|----------|------------------------------------------------------------------|
//! | READY | SET      | `confidence > t` and fib zone not blocklisted                    |
//! | SET   | GO       | `confidence > t x 1.2`, `conviction > 0.7`, `confluence > 0.6`   |
//! | SET   | READY    | `confidence < t x 0.8`                                           |
//! | GO    | COOLDOWN | `confidence > t x 1.5` and `risk_score < 0.8` (trade executes)   |
//! | GO    | SET      | `confidence < t`                                                 |
//!
//! Multipliers and limits come from [`PolicyConfig`]. Open-position capacity
//! for GO -> COOLDOWN is checked when the position is reserved.

use rsgo_core::{SignalFactors, TickerState, TickerStatus};

use crate::config::PolicyConfig;

/// What the policy wants for a ticker given a fresh signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Merge readings, keep status.
    Hold,
    Transition(TickerStatus),
    /// GO -> COOLDOWN, contingent on reserving a position.
    ExecuteTrade,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionPolicy {
    config: PolicyConfig,
}

impl TransitionPolicy {
    #[must_use]
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    #[must_use]
    pub fn decide(&self, state: &TickerState, signal: &SignalFactors) -> Decision {
        let c = &self.config;
        let threshold = c.confidence_threshold;
        let confidence = signal.confidence;

        match state.status {
            TickerStatus::Ready => {
                if confidence > threshold && !c.fib_blocklist.contains(&signal.fib_zone) {
                    Decision::Transition(TickerStatus::Set)
                } else {
                    Decision::Hold
                }
            }
            TickerStatus::Set => {
                if confidence > threshold * c.go_multiplier
                    && signal.conviction > c.conviction_threshold
                    && signal.fib_confluence > c.fib_confluence_threshold
                {
                    Decision::Transition(TickerStatus::Go)
                } else if confidence < threshold * c.decay_multiplier {
                    Decision::Transition(TickerStatus::Ready)
                } else {
                    Decision::Hold
                }
            }
            TickerStatus::Go => {
                if confidence > threshold * c.execute_multiplier
                    && signal.risk_score < c.max_risk_score
                {
                    Decision::ExecuteTrade
                } else if confidence < threshold {
                    Decision::Transition(TickerStatus::Set)
                } else {
                    Decision::Hold
                }
            }
            TickerStatus::Cooldown => Decision::Hold,
        }
    }
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self::new(PolicyConfig::default())
    }
}
