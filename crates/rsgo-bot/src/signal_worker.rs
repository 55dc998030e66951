//! Task worker that evaluates signals for a ticker.
//!
//! The orchestrator sends a `TickerState` snapshot as the task payload; a
//! [`SignalSource`] turns it into fresh `SignalFactors`.

use std::sync::Arc;

use rsgo_core::{ProcessingTask, SignalFactors, TaskOutput, TickerState};
use rsgo_executor::{BoxFuture, TaskError, TaskWorker};
use tracing::trace;

/// Produces a signal reading for one ticker.
pub trait SignalSource: Send + Sync {
    fn evaluate(&self, state: TickerState) -> BoxFuture<'_, Result<SignalFactors, String>>;
}

/// Source that echoes the snapshot's own readings.
///
/// Stand-in until real analysis engines are wired in; keeps every ticker in
/// place.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughSignalSource;

impl SignalSource for PassthroughSignalSource {
    fn evaluate(&self, state: TickerState) -> BoxFuture<'_, Result<SignalFactors, String>> {
        Box::pin(async move {
            Ok(SignalFactors {
                confidence: state.confidence,
                conviction: state.conviction,
                fib_zone: state.fib_zone,
                gamma_exposure: state.gamma_exposure,
                recommended_action: state.recommended_action,
                ..SignalFactors::default()
            })
        })
    }
}

/// [`TaskWorker`] backed by a [`SignalSource`].
pub struct SignalWorker<S> {
    source: Arc<S>,
}

impl<S: SignalSource> SignalWorker<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }
}

impl<S: SignalSource + 'static> TaskWorker for SignalWorker<S> {
    fn process(&self, task: ProcessingTask) -> BoxFuture<'_, Result<TaskOutput, TaskError>> {
        Box::pin(async move {
            let state: TickerState = serde_json::from_value(task.payload)
                .map_err(|e| TaskError::Failed(format!("invalid task payload: {e}")))?;
            trace!(ticker = %state.ticker, "Evaluating signal");
            let signal = self
                .source
                .evaluate(state)
                .await
                .map_err(TaskError::Failed)?;
            Ok(TaskOutput::signal(signal))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsgo_core::{ResourceEstimate, TaskKind, Ticker};

    fn task(payload: serde_json::Value) -> ProcessingTask {
        ProcessingTask::new(
            Ticker::new("SPY").unwrap(),
            TaskKind::SignalProcessing,
            false,
            ResourceEstimate::default(),
            payload,
            0,
        )
    }

    #[tokio::test]
    async fn test_passthrough_echoes_state() {
        let mut state = TickerState::new(Ticker::new("SPY").unwrap(), 0);
        state.confidence = 0.7;
        state.conviction = 0.4;
        let worker = SignalWorker::new(Arc::new(PassthroughSignalSource));

        let output = worker
            .process(task(serde_json::to_value(&state).unwrap()))
            .await
            .unwrap();
        let signal = output.signal.unwrap();
        assert_eq!(signal.confidence, 0.7);
        assert_eq!(signal.conviction, 0.4);
        assert!(output.update.is_none());
    }

    #[tokio::test]
    async fn test_bad_payload_fails_task() {
        let worker = SignalWorker::new(Arc::new(PassthroughSignalSource));
        let err = worker
            .process(task(serde_json::json!({"nope": true})))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskError::Failed(_)));
    }
}
