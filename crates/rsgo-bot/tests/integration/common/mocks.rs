//! Test doubles for the orchestrator's collaborators.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rsgo_bot::{SignalSource, TradeHook, TradeRequest};
use rsgo_core::{SignalFactors, Ticker, TickerState};
use rsgo_executor::BoxFuture;

/// Trade hook that records every submission.
#[derive(Debug, Default)]
pub struct RecordingTradeHook {
    requests: Mutex<Vec<TradeRequest>>,
}

impl RecordingTradeHook {
    pub fn requests(&self) -> Vec<TradeRequest> {
        self.requests.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

impl TradeHook for RecordingTradeHook {
    fn submit(&self, request: TradeRequest) {
        self.requests.lock().push(request);
    }
}

/// Signal source replaying a per-ticker script.
///
/// Each evaluation pops the next scripted reading; an exhausted script
/// echoes the snapshot's readings.
#[derive(Debug, Default)]
pub struct ScriptedSignalSource {
    scripts: Mutex<HashMap<Ticker, VecDeque<Result<SignalFactors, String>>>>,
    evaluations: Mutex<Vec<Ticker>>,
}

impl ScriptedSignalSource {
    pub fn push(&self, ticker: Ticker, reading: Result<SignalFactors, String>) {
        self.scripts.lock().entry(ticker).or_default().push_back(reading);
    }

    pub fn evaluations(&self) -> Vec<Ticker> {
        self.evaluations.lock().clone()
    }
}

impl SignalSource for ScriptedSignalSource {
    fn evaluate(&self, state: TickerState) -> BoxFuture<'_, Result<SignalFactors, String>> {
        Box::pin(async move {
            self.evaluations.lock().push(state.ticker.clone());
            let next = self
                .scripts
                .lock()
                .get_mut(&state.ticker)
                .and_then(VecDeque::pop_front);
            next.unwrap_or_else(|| {
                Ok(SignalFactors {
                    confidence: state.confidence,
                    conviction: state.conviction,
                    fib_zone: state.fib_zone,
                    ..SignalFactors::default()
                })
            })
        })
    }
}
