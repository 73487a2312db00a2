//! Provider frame normalization.
//!
//! Turns provider-native frames into [`StreamEvent`]s with consistent
//! artifact identity: the first content chunk of a query creates an
//! artifact, every later chunk appends to it. Execution plans delimited by
//! `⟦ ... ⟧` are buffered and emitted as one `execution_plan` artifact.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::{StreamEvent, TaskState};
use crate::protocol::{Artifact, ProviderEvent, TaskStatus, text_of};

/// Opens an execution plan.
pub const PLAN_START_MARKER: char = '⟦';
/// Closes an execution plan.
pub const PLAN_END_MARKER: char = '⟧';

/// Artifact carrying streamed content.
pub const STREAMING_ARTIFACT: &str = "streaming_result";
/// Artifact carrying execution plans.
pub const PLAN_ARTIFACT: &str = "execution_plan";
/// Artifact carrying the accumulated text at completion.
pub const FINAL_ARTIFACT: &str = "final_result";
/// Artifact carrying aggregated parallel results.
pub const PARALLEL_ARTIFACT: &str = "parallel_result";

/// Provider artifact names that repeat everything already streamed.
const AGGREGATE_ARTIFACT_NAMES: [&str; 2] = ["final_result", "complete_result"];

/// Events produced from one provider frame.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Normalized {
    /// Events to forward, in order.
    pub events: Vec<StreamEvent>,
    /// Terminal state reported by the frame, with its message.
    pub terminal: Option<(TaskState, Option<String>)>,
}

/// Per-query normalization state.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    content_artifact: Option<String>,
    plan_artifact: Option<String>,
    plan_buffer: Option<String>,
    accumulated: String,
    streamed: bool,
    delivered: bool,
}

impl EventNormalizer {
    /// Creates state for a fresh query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any content (plan or ordinary) has been emitted.
    #[must_use]
    pub const fn has_delivered(&self) -> bool {
        self.delivered
    }

    /// Ordinary content emitted so far.
    #[must_use]
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Consumes one provider frame.
    pub fn normalize(&mut self, event: ProviderEvent) -> Normalized {
        match event {
            ProviderEvent::ArtifactUpdate(frame) => Normalized {
                events: self.artifact(&frame.artifact, frame.last_chunk),
                terminal: None,
            },
            ProviderEvent::StatusUpdate(frame) => self.status(&frame.status),
            ProviderEvent::Message(message) => Normalized {
                events: self.push_text(&message.text()),
                terminal: None,
            },
            ProviderEvent::Task(task) => {
                let mut events = Vec::new();
                for artifact in &task.artifacts {
                    events.extend(self.artifact(artifact, true));
                }
                let mut out = task
                    .status
                    .as_ref()
                    .map_or_else(Normalized::default, |s| self.status(s));
                events.append(&mut out.events);
                out.events = events;
                out
            }
        }
    }

    fn artifact(&mut self, artifact: &Artifact, last_chunk: bool) -> Vec<StreamEvent> {
        let text = text_of(&artifact.parts);
        let is_aggregate = last_chunk
            && artifact
                .name
                .as_deref()
                .is_some_and(|n| AGGREGATE_ARTIFACT_NAMES.contains(&n));
        if is_aggregate && self.streamed {
            debug!(
                name = artifact.name.as_deref().unwrap_or_default(),
                "dropping provider aggregate that repeats streamed content"
            );
            return Vec::new();
        }
        self.push_text(&text)
    }

    fn status(&mut self, status: &TaskStatus) -> Normalized {
        let text = status.message.as_ref().map(|m| m.text()).unwrap_or_default();
        let state = TaskState::parse(&status.state).unwrap_or_else(|| {
            debug!(state = %status.state, "unrecognized task state; treating as working");
            TaskState::Working
        });

        match state {
            TaskState::Working if text.is_empty() => Normalized {
                events: vec![StreamEvent::status(TaskState::Working, None)],
                terminal: None,
            },
            TaskState::Working => Normalized {
                events: self.push_text(&text),
                terminal: None,
            },
            TaskState::Completed => Normalized {
                // A completion message repeats streamed content when any was sent.
                events: if self.streamed {
                    Vec::new()
                } else {
                    self.push_text(&text)
                },
                terminal: Some((TaskState::Completed, None)),
            },
            TaskState::Failed | TaskState::InputRequired => Normalized {
                events: Vec::new(),
                terminal: Some((state, (!text.is_empty()).then_some(text))),
            },
        }
    }

    /// Routes a content chunk through the plan buffer.
    pub fn push_text(&mut self, text: &str) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        let mut rest = text;

        while !rest.is_empty() {
            if let Some(buffer) = self.plan_buffer.as_mut() {
                if let Some(end) = rest.find(PLAN_END_MARKER) {
                    buffer.push_str(&rest[..end]);
                    rest = &rest[end + PLAN_END_MARKER.len_utf8()..];
                    let plan = self.plan_buffer.take().unwrap_or_default();
                    events.push(self.plan_event(plan));
                } else {
                    buffer.push_str(rest);
                    rest = "";
                }
            } else if let Some(start) = rest.find(PLAN_START_MARKER) {
                if start > 0 {
                    events.push(self.content_event(&rest[..start]));
                }
                self.plan_buffer = Some(String::new());
                rest = &rest[start + PLAN_START_MARKER.len_utf8()..];
            } else {
                events.push(self.content_event(rest));
                rest = "";
            }
        }
        events
    }

    /// Events that close the query in `state`.
    ///
    /// An unterminated plan is flushed as-is. On completion, accumulated
    /// content is re-emitted once as a fresh `final_result` artifact.
    pub fn finish(&mut self, state: TaskState) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if let Some(plan) = self.plan_buffer.take() {
            warn!(len = plan.len(), "execution plan never closed; flushing");
            events.push(self.plan_event(plan));
        }
        if state == TaskState::Completed && !self.accumulated.is_empty() {
            events.push(StreamEvent::ArtifactUpdate {
                artifact_id: new_artifact_id(),
                name: FINAL_ARTIFACT.to_string(),
                description: "Complete result".to_string(),
                text: self.accumulated.clone(),
                append: false,
                last_chunk: true,
            });
        }
        events
    }

    fn content_event(&mut self, text: &str) -> StreamEvent {
        self.accumulated.push_str(text);
        self.streamed = true;
        self.delivered = true;
        let (artifact_id, append) = match &self.content_artifact {
            Some(id) => (id.clone(), true),
            None => {
                let id = new_artifact_id();
                self.content_artifact = Some(id.clone());
                (id, false)
            }
        };
        StreamEvent::ArtifactUpdate {
            artifact_id,
            name: STREAMING_ARTIFACT.to_string(),
            description: "Streaming result".to_string(),
            text: text.to_string(),
            append,
            last_chunk: false,
        }
    }

    fn plan_event(&mut self, plan: String) -> StreamEvent {
        self.delivered = true;
        let (artifact_id, append) = match &self.plan_artifact {
            Some(id) => (id.clone(), true),
            None => {
                let id = new_artifact_id();
                self.plan_artifact = Some(id.clone());
                (id, false)
            }
        };
        StreamEvent::ArtifactUpdate {
            artifact_id,
            name: PLAN_ARTIFACT.to_string(),
            description: "Execution plan".to_string(),
            text: plan,
            append,
            last_chunk: true,
        }
    }
}

/// Fresh artifact identifier.
#[must_use]
pub fn new_artifact_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{artifact, chunk, status};

    fn feed(normalizer: &mut EventNormalizer, frame: Result<ProviderEvent, crate::error::StreamError>) -> Normalized {
        normalizer.normalize(frame.unwrap_or_else(|_| unreachable!()))
    }

    fn artifact_fields(event: &StreamEvent) -> (&str, &str, &str, bool) {
        match event {
            StreamEvent::ArtifactUpdate {
                artifact_id,
                name,
                text,
                append,
                ..
            } => (artifact_id, name, text, *append),
            StreamEvent::StatusUpdate { .. } => panic!("expected artifact, got {event:?}"),
        }
    }

    #[test]
    fn test_first_chunk_creates_later_chunks_append() {
        let mut n = EventNormalizer::new();
        let first = feed(&mut n, chunk("Hello "));
        let second = feed(&mut n, chunk("world"));

        let (id1, name, text1, append1) = artifact_fields(&first.events[0]);
        let (id2, _, text2, append2) = artifact_fields(&second.events[0]);
        assert_eq!(name, STREAMING_ARTIFACT);
        assert_eq!((text1, append1), ("Hello ", false));
        assert_eq!((text2, append2), ("world", true));
        assert_eq!(id1, id2);
        assert_eq!(n.accumulated(), "Hello world");
    }

    #[test]
    fn test_plan_split_across_chunks() {
        let mut n = EventNormalizer::new();
        let mut events = Vec::new();
        for piece in ["Intro ⟦step 1", "; step 2⟧ after"] {
            events.extend(feed(&mut n, chunk(piece)).events);
        }

        let fields: Vec<_> = events.iter().map(artifact_fields).collect();
        assert_eq!(fields.len(), 3);
        assert_eq!((fields[0].1, fields[0].2), (STREAMING_ARTIFACT, "Intro "));
        assert_eq!((fields[1].1, fields[1].2), (PLAN_ARTIFACT, "step 1; step 2"));
        assert!(!fields[1].3);
        assert_eq!((fields[2].1, fields[2].2, fields[2].3), (STREAMING_ARTIFACT, " after", true));
        assert_eq!(n.accumulated(), "Intro  after");
    }

    #[test]
    fn test_second_plan_appends_to_plan_artifact() {
        let mut n = EventNormalizer::new();
        let events = feed(&mut n, chunk("⟦plan a⟧⟦plan b⟧")).events;
        let first = artifact_fields(&events[0]);
        let second = artifact_fields(&events[1]);
        assert_eq!(first.0, second.0);
        assert!(!first.3);
        assert!(second.3);
    }

    #[test]
    fn test_unclosed_plan_flushed_at_finish() {
        let mut n = EventNormalizer::new();
        assert!(feed(&mut n, chunk("⟦half a plan")).events.is_empty());
        let events = n.finish(TaskState::Completed);
        assert_eq!(events.len(), 1);
        let (_, name, text, _) = artifact_fields(&events[0]);
        assert_eq!((name, text), (PLAN_ARTIFACT, "half a plan"));
    }

    #[test]
    fn test_finish_emits_final_result_with_fresh_id() {
        let mut n = EventNormalizer::new();
        let streamed = feed(&mut n, chunk("abc")).events;
        let finished = n.finish(TaskState::Completed);

        let (stream_id, _, _, _) = artifact_fields(&streamed[0]);
        let (final_id, name, text, append) = artifact_fields(&finished[0]);
        assert_eq!(name, FINAL_ARTIFACT);
        assert_eq!(text, "abc");
        assert!(!append);
        assert_ne!(stream_id, final_id);
    }

    #[test]
    fn test_finish_without_content_or_on_failure_is_empty() {
        assert!(EventNormalizer::new().finish(TaskState::Completed).is_empty());

        let mut n = EventNormalizer::new();
        feed(&mut n, chunk("partial"));
        assert!(n.finish(TaskState::Failed).is_empty());
    }

    #[test]
    fn test_provider_aggregate_dropped_after_streaming() {
        let mut n = EventNormalizer::new();
        feed(&mut n, chunk("Hello"));
        let dup = feed(&mut n, artifact("final_result", "Hello", true));
        assert!(dup.events.is_empty());
        assert_eq!(n.accumulated(), "Hello");
    }

    #[test]
    fn test_provider_aggregate_kept_when_nothing_streamed() {
        let mut n = EventNormalizer::new();
        let only = feed(&mut n, artifact("complete_result", "Everything", true));
        assert_eq!(only.events.len(), 1);
        assert_eq!(n.accumulated(), "Everything");
    }

    #[test]
    fn test_completed_message_kept_after_plan_only() {
        let mut n = EventNormalizer::new();
        let plan = feed(&mut n, chunk("⟦1. ask komodor⟧"));
        assert_eq!(artifact_fields(&plan.events[0]).1, PLAN_ARTIFACT);
        assert!(n.has_delivered());

        let out = feed(&mut n, status("completed", Some("All clusters healthy")));
        assert_eq!(out.events.len(), 1);
        assert_eq!(artifact_fields(&out.events[0]).2, "All clusters healthy");
        assert_eq!(n.accumulated(), "All clusters healthy");

        let finished = n.finish(TaskState::Completed);
        let (_, name, text, _) = artifact_fields(&finished[0]);
        assert_eq!((name, text), (FINAL_ARTIFACT, "All clusters healthy"));
    }

    #[test]
    fn test_provider_aggregate_kept_after_plan_only() {
        let mut n = EventNormalizer::new();
        feed(&mut n, chunk("⟦1. ask komodor⟧"));
        let out = feed(&mut n, artifact("final_result", "All clusters healthy", true));
        assert_eq!(out.events.len(), 1);
        assert_eq!(artifact_fields(&out.events[0]).1, STREAMING_ARTIFACT);
        assert_eq!(n.accumulated(), "All clusters healthy");
    }

    #[test]
    fn test_working_status_text_is_content() {
        let mut n = EventNormalizer::new();
        let out = feed(&mut n, status("working", Some("Looking up clusters...")));
        assert!(out.terminal.is_none());
        assert_eq!(artifact_fields(&out.events[0]).2, "Looking up clusters...");
    }

    #[test]
    fn test_bare_working_status_forwarded() {
        let mut n = EventNormalizer::new();
        let out = feed(&mut n, status("working", None));
        assert_eq!(out.events, vec![StreamEvent::status(TaskState::Working, None)]);
        assert!(!n.has_delivered());
    }

    #[test]
    fn test_completed_message_used_only_without_prior_content() {
        let mut n = EventNormalizer::new();
        let out = feed(&mut n, status("completed", Some("All healthy")));
        assert_eq!(out.terminal, Some((TaskState::Completed, None)));
        assert_eq!(artifact_fields(&out.events[0]).2, "All healthy");

        let mut n = EventNormalizer::new();
        feed(&mut n, chunk("All healthy"));
        let out = feed(&mut n, status("completed", Some("All healthy")));
        assert!(out.events.is_empty());
    }

    #[test]
    fn test_failed_and_input_required_are_terminal() {
        let mut n = EventNormalizer::new();
        let failed = feed(&mut n, status("failed", Some("token expired")));
        assert_eq!(
            failed.terminal,
            Some((TaskState::Failed, Some("token expired".to_string())))
        );

        let asked = feed(&mut n, status("input-required", Some("Which cluster?")));
        assert_eq!(
            asked.terminal,
            Some((TaskState::InputRequired, Some("Which cluster?".to_string())))
        );
        assert!(!n.has_delivered());
    }
}
