//! Cooldown expiry queue.
//!
//! One min-heap for every ticker instead of a timer per ticker. Each arm
//! gets a fresh generation; heap entries whose generation is no longer the
//! ticker's live one are skipped when they surface.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use rsgo_core::Ticker;

#[derive(Debug, Default)]
pub struct CooldownQueue {
    heap: BinaryHeap<Reverse<(u64, u64, Ticker)>>,
    live: HashMap<Ticker, (u64, u64)>,
    next_generation: u64,
}

impl CooldownQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the ticker's cooldown. Returns the new generation.
    pub fn arm(&mut self, ticker: Ticker, expires_at: u64) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.live.insert(ticker.clone(), (expires_at, generation));
        self.heap.push(Reverse((expires_at, generation, ticker)));
        generation
    }

    /// Cancel the ticker's pending cooldown. Returns whether one was pending.
    pub fn cancel(&mut self, ticker: &Ticker) -> bool {
        self.live.remove(ticker).is_some()
    }

    #[must_use]
    pub fn is_armed(&self, ticker: &Ticker) -> bool {
        self.live.contains_key(ticker)
    }

    /// Number of live (non-cancelled) cooldowns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Pop every live cooldown due at or before `now_ms`, as `(ticker, generation)`.
    pub fn pop_expired(&mut self, now_ms: u64) -> Vec<(Ticker, u64)> {
        let mut due = Vec::new();
        while let Some(Reverse((expires_at, _, _))) = self.heap.peek() {
            if *expires_at > now_ms {
                break;
            }
            let Some(Reverse((_, generation, ticker))) = self.heap.pop() else {
                break;
            };
            if self.is_live(&ticker, generation) {
                self.live.remove(&ticker);
                due.push((ticker, generation));
            }
        }
        due
    }

    /// Earliest live expiry, discarding stale heap heads on the way.
    pub fn next_expiry(&mut self) -> Option<u64> {
        while let Some(Reverse((expires_at, generation, ticker))) = self.heap.peek() {
            if self.is_live(ticker, *generation) {
                return Some(*expires_at);
            }
            self.heap.pop();
        }
        None
    }

    fn is_live(&self, ticker: &Ticker, generation: u64) -> bool {
        self.live
            .get(ticker)
            .is_some_and(|(_, live_gen)| *live_gen == generation)
    }
}
