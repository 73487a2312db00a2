//! Normalized outbound event model.
//!
//! Whatever shape a remote agent streams, the caller only ever sees
//! [`StreamEvent`]s.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Task state carried by a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Work in progress.
    Working,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// The agent needs more input from the user.
    InputRequired,
}

impl TaskState {
    /// Parses a wire state string. Unknown states yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "working" | "submitted" => Some(Self::Working),
            "completed" => Some(Self::Completed),
            "failed" | "canceled" | "rejected" => Some(Self::Failed),
            "input-required" | "input_required" | "auth-required" => Some(Self::InputRequired),
            _ => None,
        }
    }

    /// Returns `true` for states that end a query.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Working)
    }

    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::InputRequired => "input-required",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One event on the outbound stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StreamEvent {
    /// Creates (`append = false`) or extends (`append = true`) an artifact.
    #[serde(rename_all = "camelCase")]
    ArtifactUpdate {
        /// Artifact identifier.
        artifact_id: String,
        /// Artifact name (`streaming_result`, `execution_plan`, ...).
        name: String,
        /// Artifact description.
        description: String,
        /// Text carried by this chunk.
        text: String,
        /// Whether this chunk extends an existing artifact.
        append: bool,
        /// Whether this is the final chunk of the artifact.
        last_chunk: bool,
    },
    /// Task state change.
    StatusUpdate {
        /// New state.
        state: TaskState,
        /// Optional human-readable message.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
}

impl StreamEvent {
    /// Builds a status update.
    #[must_use]
    pub const fn status(state: TaskState, message: Option<String>) -> Self {
        Self::StatusUpdate { state, message }
    }

    /// Returns the terminal state if this event ends the query.
    #[must_use]
    pub const fn terminal_state(&self) -> Option<TaskState> {
        match self {
            Self::StatusUpdate { state, .. } if state.is_terminal() => Some(*state),
            _ => None,
        }
    }

    /// Returns the artifact text, if this is an artifact update.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::ArtifactUpdate { text, .. } => Some(text),
            Self::StatusUpdate { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_state_parse() {
        assert_eq!(TaskState::parse("working"), Some(TaskState::Working));
        assert_eq!(TaskState::parse("COMPLETED"), Some(TaskState::Completed));
        assert_eq!(
            TaskState::parse("input-required"),
            Some(TaskState::InputRequired)
        );
        assert_eq!(TaskState::parse("canceled"), Some(TaskState::Failed));
        assert_eq!(TaskState::parse("dancing"), None);
    }

    #[test]
    fn test_artifact_event_wire_shape() {
        let event = StreamEvent::ArtifactUpdate {
            artifact_id: "a-1".to_string(),
            name: "streaming_result".to_string(),
            description: String::new(),
            text: "hello".to_string(),
            append: false,
            last_chunk: false,
        };
        let json = serde_json::to_value(&event).unwrap_or_default();
        assert_eq!(json["kind"], "artifact-update");
        assert_eq!(json["artifactId"], "a-1");
        assert_eq!(json["lastChunk"], false);
    }

    #[test]
    fn test_terminal_state() {
        let working = StreamEvent::status(TaskState::Working, None);
        let done = StreamEvent::status(TaskState::Completed, None);
        assert_eq!(working.terminal_state(), None);
        assert_eq!(done.terminal_state(), Some(TaskState::Completed));
    }
}
