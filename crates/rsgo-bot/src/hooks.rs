//! Trade execution hook.
//!
//! The orchestrator decides *that* a trade happens; where the order goes is
//! up to the hook. `submit` is called on the tick path and must not block.

use std::sync::Arc;

use rsgo_core::Ticker;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

/// Everything the hook needs to route one trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRequest {
    pub ticker: Ticker,
    pub confidence: f64,
    pub conviction: f64,
    pub risk_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<serde_json::Value>,
    /// Reserved position backing this trade.
    pub position_id: Uuid,
    /// Decision time (Unix ms).
    pub timestamp: u64,
}

/// Receives executed-trade decisions.
pub trait TradeHook: Send + Sync {
    /// Hand off a trade. Implementations queue or spawn; they never block.
    fn submit(&self, request: TradeRequest);
}

pub type DynTradeHook = Arc<dyn TradeHook>;

/// Hook that only logs the decision.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTradeHook;

impl TradeHook for LoggingTradeHook {
    fn submit(&self, request: TradeRequest) {
        info!(
            ticker = %request.ticker,
            confidence = request.confidence,
            conviction = request.conviction,
            risk_score = request.risk_score,
            position_id = %request.position_id,
            "Trade executed"
        );
    }
}
