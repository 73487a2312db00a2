//! Complex path and stream-outcome resolution.

use tracing::{info, warn};

use super::{EventNormalizer, EventSink, ExecutionState, PumpOutcome, QueryRequest, StateLog, StreamingExecutor, pump};
use crate::core::{AgentKey, TaskState};

/// What to do once a provider stream has ended.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Resolution {
    /// Close the query with this state.
    Finalize(TaskState, Option<String>),
    /// Nothing was delivered; another path may still answer.
    Fallback(String),
    /// The caller is gone.
    Abandon,
}

/// Decides how a stream ending maps to the query's outcome.
///
/// After content has been delivered, failures never trigger a fallback:
/// the query completes with the partial output.
pub(crate) fn resolve(outcome: PumpOutcome, delivered: bool) -> Resolution {
    match outcome {
        PumpOutcome::Disconnected => Resolution::Abandon,
        PumpOutcome::Terminal(TaskState::Failed, message) if delivered => {
            let reason = message.unwrap_or_else(|| "remote task failed".to_string());
            warn!(reason = %reason, "remote failure after content; keeping partial result");
            Resolution::Finalize(TaskState::Completed, Some(format!("partial result: {reason}")))
        }
        PumpOutcome::Terminal(TaskState::Failed, message) => {
            Resolution::Fallback(message.unwrap_or_else(|| "remote task failed".to_string()))
        }
        PumpOutcome::Terminal(state, message) => Resolution::Finalize(state, message),
        PumpOutcome::Ended if delivered => {
            warn!("stream closed without a terminal status; completing");
            Resolution::Finalize(TaskState::Completed, None)
        }
        PumpOutcome::Ended => Resolution::Fallback("stream closed before any content".to_string()),
        PumpOutcome::Failed(e) if delivered => {
            warn!(error = %e, "stream failed after content; keeping partial result");
            Resolution::Finalize(TaskState::Completed, Some(format!("partial result: {e}")))
        }
        PumpOutcome::Failed(e) => Resolution::Fallback(e.to_string()),
    }
}

impl StreamingExecutor {
    /// Hands the query to the orchestrator with `hint` as the agents
    /// already identified.
    pub(super) async fn run_complex(
        &self,
        hint: Vec<AgentKey>,
        request: &QueryRequest,
        sink: &EventSink,
        log: &mut StateLog,
    ) -> TaskState {
        let Some(orchestrator) = &self.orchestrator else {
            warn!(hint = ?hint, "complex query but no orchestrator configured");
            sink.terminate(
                TaskState::Failed,
                Some("no orchestration backend is configured for complex queries".to_string()),
            )
            .await;
            return TaskState::Failed;
        };

        info!(hint = ?hint, orchestrator = %orchestrator.key(), "delegating to orchestrator");
        log.enter(ExecutionState::Streaming);
        let stream_request = request.stream_request().with_hint(hint);
        let mut normalizer = EventNormalizer::new();
        let outcome = pump(orchestrator.as_ref(), &stream_request, &mut normalizer, Some(sink)).await;

        match resolve(outcome, normalizer.has_delivered()) {
            Resolution::Finalize(state, message) => {
                Self::finalize(&mut normalizer, state, message, sink).await
            }
            Resolution::Fallback(reason) => {
                warn!(reason = %reason, "orchestrator produced no result");
                sink.terminate(TaskState::Failed, Some(format!("orchestration failed: {reason}")))
                    .await;
                TaskState::Failed
            }
            Resolution::Abandon => TaskState::Failed,
        }
    }
}
