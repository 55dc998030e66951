//! Priority ordering.

use std::cmp::Ordering;

use rsgo_core::{PriorityWeights, TickerState, TickerStatus};

/// GO tickers are always urgent, whatever their weight.
#[must_use]
pub fn is_urgent(state: &TickerState) -> bool {
    state.status == TickerStatus::Go
}

/// `weight x confidence` for the ticker.
#[must_use]
pub fn priority_score(state: &TickerState, weights: &PriorityWeights) -> f64 {
    weights.weight_of(&state.ticker) * state.confidence
}

/// Total order: urgent first, then score descending, then ticker ascending.
pub(crate) fn compare(a: &TickerState, b: &TickerState, weights: &PriorityWeights) -> Ordering {
    is_urgent(b)
        .cmp(&is_urgent(a))
        .then_with(|| priority_score(b, weights).total_cmp(&priority_score(a, weights)))
        .then_with(|| a.ticker.cmp(&b.ticker))
}
