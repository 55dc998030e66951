//! State statistics.

use std::collections::BTreeMap;

use rsgo_core::{FibZone, TickerState, TickerStatus};
use serde::Serialize;

/// Aggregate view over all tickers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StateStatistics {
    pub total: usize,
    pub by_status: BTreeMap<TickerStatus, usize>,
    pub average_confidence: f64,
    pub average_conviction: f64,
    pub fib_zones: BTreeMap<FibZone, usize>,
    pub in_cooldown: usize,
}

impl StateStatistics {
    /// Pure aggregation; every status appears in `by_status`, even at zero.
    #[must_use]
    pub fn from_states<'a>(states: impl IntoIterator<Item = &'a TickerState>) -> Self {
        let mut stats = Self {
            by_status: TickerStatus::ALL.iter().map(|s| (*s, 0)).collect(),
            ..Self::default()
        };
        let mut confidence_sum = 0.0;
        let mut conviction_sum = 0.0;

        for state in states {
            stats.total += 1;
            *stats.by_status.entry(state.status).or_insert(0) += 1;
            *stats.fib_zones.entry(state.fib_zone).or_insert(0) += 1;
            confidence_sum += state.confidence;
            conviction_sum += state.conviction;
            if state.status == TickerStatus::Cooldown {
                stats.in_cooldown += 1;
            }
        }

        if stats.total > 0 {
            stats.average_confidence = confidence_sum / stats.total as f64;
            stats.average_conviction = conviction_sum / stats.total as f64;
        }
        stats
    }

    #[must_use]
    pub fn count(&self, status: TickerStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsgo_core::Ticker;

    #[test]
    fn test_empty_statistics() {
        let stats = StateStatistics::from_states(std::iter::empty());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_confidence, 0.0);
        assert_eq!(stats.by_status.len(), 4);
    }

    #[test]
    fn test_aggregates_states() {
        let mut a = TickerState::new(Ticker::new("SPY").unwrap(), 0);
        a.confidence = 0.4;
        a.conviction = 0.2;
        a.status = TickerStatus::Cooldown;
        a.fib_zone = FibZone::GoldenPocket;
        let mut b = TickerState::new(Ticker::new("QQQ").unwrap(), 0);
        b.confidence = 0.8;
        b.conviction = 0.6;

        let stats = StateStatistics::from_states(&[a, b]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.count(TickerStatus::Cooldown), 1);
        assert_eq!(stats.count(TickerStatus::Ready), 1);
        assert_eq!(stats.in_cooldown, 1);
        assert!((stats.average_confidence - 0.6).abs() < 1e-9);
        assert!((stats.average_conviction - 0.4).abs() < 1e-9);
        assert_eq!(stats.fib_zones.get(&FibZone::GoldenPocket), Some(&1));
        assert_eq!(stats.fib_zones.get(&FibZone::Neutral), Some(&1));
    }
}
