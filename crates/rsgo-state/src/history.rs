//! Bounded transition history.

use std::collections::VecDeque;

use rsgo_core::StateTransition;

/// Ring buffer keeping the most recent transitions, oldest evicted first.
#[derive(Debug, Clone)]
pub struct TransitionHistory {
    entries: VecDeque<StateTransition>,
    capacity: usize,
}

impl TransitionHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, transition: StateTransition) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(transition);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn last(&self) -> Option<&StateTransition> {
        self.entries.back()
    }

    /// Copy of the history, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<StateTransition> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsgo_core::TickerStatus;

    fn transition(ts: u64) -> StateTransition {
        StateTransition {
            from: TickerStatus::Ready,
            to: TickerStatus::Set,
            timestamp: ts,
            duration_in_previous_state: 0,
            forced: false,
            reason: None,
        }
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut history = TransitionHistory::new(3);
        for ts in 0..5 {
            history.push(transition(ts));
        }
        assert_eq!(history.len(), 3);
        let stamps: Vec<u64> = history.to_vec().iter().map(|t| t.timestamp).collect();
        assert_eq!(stamps, vec![2, 3, 4]);
        assert_eq!(history.last().map(|t| t.timestamp), Some(4));
    }

    #[test]
    fn test_zero_capacity_keeps_latest() {
        let mut history = TransitionHistory::new(0);
        history.push(transition(1));
        history.push(transition(2));
        assert_eq!(history.capacity(), 1);
        assert_eq!(history.to_vec()[0].timestamp, 2);
    }
}
