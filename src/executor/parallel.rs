//! Parallel path: fan out, wait for every call, aggregate.

use tracing::{debug, info, warn};

use super::fallback::{Resolution, resolve};
use super::{
    EventNormalizer, EventSink, ExecutionState, PARALLEL_ARTIFACT, QueryRequest, StateLog,
    StreamingExecutor, new_artifact_id, pump,
};
use crate::core::{AgentKey, StreamEvent, TaskState};
use crate::error::ExecutionError;
use crate::protocol::StreamRequest;

/// Formats per-agent results as markdown sections, in the given order.
#[must_use]
pub fn render_sections(results: &[(AgentKey, Result<String, String>)]) -> String {
    let mut out = String::new();
    for (i, (agent, result)) in results.iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&format!("## {agent}\n\n"));
        match result {
            Ok(text) if text.trim().is_empty() => out.push_str("_No output._"),
            Ok(text) => out.push_str(text.trim_end()),
            Err(message) => out.push_str(&format!("> **Error:** {message}")),
        }
    }
    out
}

/// Runs one agent to completion, returning its full output.
async fn collect_output(
    executor: &StreamingExecutor,
    agent: &AgentKey,
    request: &StreamRequest,
) -> Result<String, String> {
    let client = executor
        .registry
        .get_client(agent.as_str())
        .ok_or_else(|| ExecutionError::NoClient {
            agent: agent.to_string(),
        }
        .to_string())?;

    let mut normalizer = EventNormalizer::new();
    let outcome = pump(client.as_ref(), request, &mut normalizer, None).await;

    match resolve(outcome, normalizer.has_delivered()) {
        Resolution::Finalize(TaskState::InputRequired, Some(question))
            if normalizer.accumulated().is_empty() =>
        {
            Ok(question)
        }
        Resolution::Finalize(_, _) => Ok(normalizer.accumulated().to_string()),
        Resolution::Fallback(reason) => Err(reason),
        Resolution::Abandon => Err("call abandoned".to_string()),
    }
}

impl StreamingExecutor {
    pub(super) async fn run_parallel(
        &self,
        agents: &[AgentKey],
        request: &QueryRequest,
        sink: &EventSink,
        log: &mut StateLog,
    ) -> TaskState {
        info!(agents = ?agents, "fanning out");
        log.enter(ExecutionState::Streaming);

        let handles: Vec<_> = agents
            .iter()
            .map(|agent| {
                let executor = self.clone();
                let agent = agent.clone();
                let stream_request = request.stream_request();
                tokio::spawn(async move {
                    collect_output(&executor, &agent, &stream_request).await
                })
            })
            .collect();

        let mut results = Vec::with_capacity(agents.len());
        for (agent, handle) in agents.iter().zip(handles) {
            let result = handle
                .await
                .unwrap_or_else(|e| Err(format!("agent task failed: {e}")));
            match &result {
                Ok(text) => debug!(agent = %agent, len = text.len(), "parallel call finished"),
                Err(reason) => warn!(agent = %agent, reason = %reason, "parallel call failed"),
            }
            results.push((agent.clone(), result));
        }

        let failed = results.iter().filter(|(_, r)| r.is_err()).count();
        if failed == results.len() {
            warn!(total = failed, "every parallel call failed; falling back");
            log.enter(ExecutionState::FallingBack);
            return self.run_complex(agents.to_vec(), request, sink, log).await;
        }
        if failed > 0 {
            let partial = ExecutionError::AggregationPartialFailure {
                failed,
                total: results.len(),
            };
            warn!(error = %partial, "aggregating partial results");
        }

        let aggregate = StreamEvent::ArtifactUpdate {
            artifact_id: new_artifact_id(),
            name: PARALLEL_ARTIFACT.to_string(),
            description: format!("Results from {} agents", results.len()),
            text: render_sections(&results),
            append: false,
            last_chunk: true,
        };
        if !sink.send(aggregate).await {
            return TaskState::Failed;
        }
        sink.terminate(TaskState::Completed, None).await;
        TaskState::Completed
    }
}
