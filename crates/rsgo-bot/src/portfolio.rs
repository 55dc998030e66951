//! Open position bookkeeping.
//!
//! Positions are reserved atomically against `max_concurrent_trades` at the
//! moment a GO ticker qualifies, so concurrent trades can never exceed the
//! limit. The orchestrator retires a ticker's positions when its cooldown
//! expires or the ticker leaves the watchlist.

use std::collections::HashMap;

use parking_lot::Mutex;
use rsgo_core::Ticker;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub id: Uuid,
    pub ticker: Ticker,
    /// Reservation time (Unix ms).
    pub opened_at: u64,
    /// Unrealized P&L in account currency.
    pub pnl: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<serde_json::Value>,
}

/// Why a position could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OpenRejected {
    #[error("maximum concurrent trades reached ({0})")]
    AtCapacity(usize),
}

/// Open positions keyed by position id.
///
/// A ticker may hold several positions; only the total count is limited.
#[derive(Debug, Default)]
pub struct PositionBook {
    positions: Mutex<HashMap<Uuid, Position>>,
}

impl PositionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a position for `ticker` if fewer than `max_open` are open.
    ///
    /// The capacity check and the insert happen under one lock.
    pub fn try_open(
        &self,
        ticker: &Ticker,
        max_open: usize,
        recommendation: Option<serde_json::Value>,
        now_ms: u64,
    ) -> Result<Position, OpenRejected> {
        let mut positions = self.positions.lock();
        if positions.len() >= max_open {
            return Err(OpenRejected::AtCapacity(max_open));
        }
        let position = Position {
            id: Uuid::new_v4(),
            ticker: ticker.clone(),
            opened_at: now_ms,
            pnl: 0.0,
            recommendation,
        };
        positions.insert(position.id, position.clone());
        Ok(position)
    }

    /// Returns false if no position with `id` is open.
    pub fn update_pnl(&self, id: &Uuid, pnl: f64) -> bool {
        match self.positions.lock().get_mut(id) {
            Some(position) => {
                position.pnl = pnl;
                true
            }
            None => false,
        }
    }

    pub fn close(&self, id: &Uuid) -> Option<Position> {
        self.positions.lock().remove(id)
    }

    /// Close every position held for `ticker`, oldest first.
    pub fn close_ticker(&self, ticker: &Ticker) -> Vec<Position> {
        let mut positions = self.positions.lock();
        let ids: Vec<Uuid> = positions
            .values()
            .filter(|p| p.ticker == *ticker)
            .map(|p| p.id)
            .collect();
        let mut closed: Vec<Position> = ids
            .iter()
            .filter_map(|id| positions.remove(id))
            .collect();
        closed.sort_by_key(|p| p.opened_at);
        closed
    }

    /// Snapshot ordered by ticker, then open time.
    #[must_use]
    pub fn active_positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.positions.lock().values().cloned().collect();
        positions.sort_by(|a, b| {
            a.ticker
                .cmp(&b.ticker)
                .then_with(|| a.opened_at.cmp(&b.opened_at))
        });
        positions
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.positions.lock().len()
    }

    #[must_use]
    pub fn is_open(&self, ticker: &Ticker) -> bool {
        self.positions.lock().values().any(|p| p.ticker == *ticker)
    }

    /// Sum of absolute P&L over account size.
    #[must_use]
    pub fn portfolio_heat(&self, account_size: f64) -> f64 {
        if account_size <= 0.0 {
            return 0.0;
        }
        let exposure: f64 = self.positions.lock().values().map(|p| p.pnl.abs()).sum();
        exposure / account_size
    }
}
