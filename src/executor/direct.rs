//! Direct path: one agent, events forwarded as they arrive.

use tracing::{info, warn};

use super::fallback::{Resolution, resolve};
use super::{EventNormalizer, EventSink, ExecutionState, QueryRequest, StateLog, StreamingExecutor, pump};
use crate::core::{AgentKey, TaskState};

impl StreamingExecutor {
    pub(super) async fn run_direct(
        &self,
        agent: &AgentKey,
        request: &QueryRequest,
        sink: &EventSink,
        log: &mut StateLog,
    ) -> TaskState {
        let Some(client) = self.registry.get_client(agent.as_str()) else {
            warn!(agent = %agent, "agent left the active set; falling back");
            log.enter(ExecutionState::FallingBack);
            return self.run_complex(vec![agent.clone()], request, sink, log).await;
        };

        info!(agent = %agent, "streaming from agent");
        log.enter(ExecutionState::Streaming);
        let mut normalizer = EventNormalizer::new();
        let outcome = pump(client.as_ref(), &request.stream_request(), &mut normalizer, Some(sink)).await;

        match resolve(outcome, normalizer.has_delivered()) {
            Resolution::Finalize(state, message) => {
                Self::finalize(&mut normalizer, state, message, sink).await
            }
            Resolution::Fallback(reason) => {
                warn!(agent = %agent, reason = %reason, "direct call failed before content; falling back");
                log.enter(ExecutionState::FallingBack);
                self.run_complex(vec![agent.clone()], request, sink, log).await
            }
            Resolution::Abandon => {
                info!(agent = %agent, "caller disconnected");
                TaskState::Failed
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::core::{RoutingDecision, StreamEvent};
    use crate::error::StreamError;
    use crate::executor::tests::{collect, registry_with, terminal_states};
    use crate::executor::{FINAL_ARTIFACT, STREAMING_ARTIFACT};
    use crate::testing::{ScriptedClient, artifact, chunk, status};
    use std::sync::Arc;

    fn artifacts<'a>(events: &'a [StreamEvent], wanted: &str) -> Vec<(&'a str, &'a str, bool)> {
        events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ArtifactUpdate {
                    artifact_id,
                    name,
                    text,
                    append,
                    ..
                } if name == wanted => Some((artifact_id.as_str(), text.as_str(), *append)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_direct_streams_and_completes() {
        let komodor = Arc::new(ScriptedClient::new(
            "komodor",
            vec![
                status("working", None),
                chunk("Cluster A: healthy\n"),
                chunk("Cluster B: degraded"),
                artifact("final_result", "Cluster A: healthy\nCluster B: degraded", true),
                status("completed", None),
            ],
        ));
        let executor = StreamingExecutor::new(registry_with(vec![komodor]).await, None);

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "show me clusters in komodor",
        )
        .await;

        let streamed = artifacts(&events, STREAMING_ARTIFACT);
        assert_eq!(streamed.len(), 2);
        assert!(!streamed[0].2);
        assert!(streamed[1].2);
        assert_eq!(streamed[0].0, streamed[1].0);

        let finals = artifacts(&events, FINAL_ARTIFACT);
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].1, "Cluster A: healthy\nCluster B: degraded");
        assert_ne!(finals[0].0, streamed[0].0);

        assert_eq!(terminal_states(&events), vec![TaskState::Completed]);
        assert!(events.last().and_then(StreamEvent::terminal_state).is_some());
    }

    #[tokio::test]
    async fn test_unreachable_agent_falls_back_to_orchestrator() {
        let komodor = Arc::new(ScriptedClient::unreachable("komodor"));
        let orchestrator = Arc::new(ScriptedClient::new(
            "orchestrator",
            vec![chunk("Answer via orchestration"), status("completed", None)],
        ));
        let executor =
            StreamingExecutor::new(registry_with(vec![komodor]).await, Some(orchestrator.clone()));

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "show me clusters in komodor",
        )
        .await;

        assert_eq!(orchestrator.call_count(), 1);
        assert_eq!(orchestrator.requests.lock()[0].hint, vec![AgentKey::new("komodor")]);
        let streamed = artifacts(&events, STREAMING_ARTIFACT);
        assert_eq!(streamed.len(), 1);
        assert_eq!(streamed[0].1, "Answer via orchestration");
        assert_eq!(terminal_states(&events), vec![TaskState::Completed]);
    }

    #[tokio::test]
    async fn test_failure_after_content_does_not_fall_back() {
        let komodor = Arc::new(ScriptedClient::new(
            "komodor",
            vec![
                chunk("first "),
                chunk("second"),
                Err(StreamError::StreamProtocol {
                    agent: "komodor".to_string(),
                    message: "connection reset".to_string(),
                }),
            ],
        ));
        let orchestrator = Arc::new(ScriptedClient::new(
            "orchestrator",
            vec![chunk("should never appear"), status("completed", None)],
        ));
        let executor =
            StreamingExecutor::new(registry_with(vec![komodor]).await, Some(orchestrator.clone()));

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "show me clusters in komodor",
        )
        .await;

        assert_eq!(orchestrator.call_count(), 0);
        let streamed = artifacts(&events, STREAMING_ARTIFACT);
        assert_eq!(
            streamed.iter().map(|a| a.1).collect::<Vec<_>>(),
            vec!["first ", "second"]
        );
        assert_eq!(terminal_states(&events), vec![TaskState::Completed]);
        assert!(events.iter().all(|e| e.text() != Some("should never appear")));
    }

    #[tokio::test]
    async fn test_remote_failed_status_before_content_falls_back() {
        let komodor = Arc::new(ScriptedClient::new(
            "komodor",
            vec![status("working", None), status("failed", Some("token expired"))],
        ));
        let orchestrator = Arc::new(ScriptedClient::new(
            "orchestrator",
            vec![chunk("recovered"), status("completed", None)],
        ));
        let executor =
            StreamingExecutor::new(registry_with(vec![komodor]).await, Some(orchestrator.clone()));

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "komodor events",
        )
        .await;

        assert_eq!(orchestrator.call_count(), 1);
        assert_eq!(terminal_states(&events), vec![TaskState::Completed]);
    }

    #[tokio::test]
    async fn test_input_required_passes_through() {
        let komodor = Arc::new(ScriptedClient::new(
            "komodor",
            vec![status("input-required", Some("Which cluster?"))],
        ));
        let executor = StreamingExecutor::new(registry_with(vec![komodor]).await, None);

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "restart the pod in komodor",
        )
        .await;

        match events.last() {
            Some(StreamEvent::StatusUpdate { state, message }) => {
                assert_eq!(*state, TaskState::InputRequired);
                assert_eq!(message.as_deref(), Some("Which cluster?"));
            }
            other => panic!("unexpected last event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_inactive_agent_falls_back() {
        let github = Arc::new(ScriptedClient::new("github", Vec::new()));
        let orchestrator = Arc::new(ScriptedClient::new(
            "orchestrator",
            vec![status("completed", Some("done"))],
        ));
        let executor =
            StreamingExecutor::new(registry_with(vec![github]).await, Some(orchestrator.clone()));

        let events = collect(
            &executor,
            RoutingDecision::direct(AgentKey::new("komodor"), "mentioned"),
            "komodor",
        )
        .await;

        assert_eq!(orchestrator.call_count(), 1);
        assert_eq!(terminal_states(&events), vec![TaskState::Completed]);
    }
}
