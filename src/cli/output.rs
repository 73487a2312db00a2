//! Output formatting for CLI commands.
//!
//! Text output is meant for people; `json` emits one document and
//! `ndjson` one document per line where a command produces a sequence.

use serde::Serialize;

use crate::core::{AgentKey, RoutingDecision, StreamEvent, TaskState};
use crate::executor::{FINAL_ARTIFACT, PARALLEL_ARTIFACT, PLAN_ARTIFACT};
use crate::registry::{EntryState, RegistryEntry};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// A single JSON document.
    Json,
    /// Newline-delimited JSON.
    Ndjson,
}

impl OutputFormat {
    /// Parses a format name. Unknown names fall back to text.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Serializes `value` for this format.
    ///
    /// Pretty-printed for `json`, compact for `ndjson`.
    #[must_use]
    pub fn to_json<T: Serialize + ?Sized>(self, value: &T) -> String {
        let rendered = match self {
            Self::Ndjson => serde_json::to_string(value),
            Self::Text | Self::Json => serde_json::to_string_pretty(value),
        };
        rendered.unwrap_or_else(|e| format!("{{\"error\": \"{e}\"}}"))
    }
}

/// Formats registry entries as a table.
#[must_use]
pub fn format_entries(entries: &[RegistryEntry]) -> String {
    if entries.is_empty() {
        return "No agents configured.\n".to_string();
    }

    let width = entries
        .iter()
        .map(|e| e.key.as_str().len())
        .max()
        .unwrap_or(0)
        .max(5);

    let mut out = format!("{:<width$}  {:<8}  URL\n", "AGENT", "STATE");
    for entry in entries {
        let state = match entry.state {
            EntryState::Unknown => "unknown",
            EntryState::Active => "active",
            EntryState::Excluded => "excluded",
        };
        out.push_str(&format!("{:<width$}  {:<8}  {}", entry.key, state, entry.url));
        if let Some(descriptor) = &entry.descriptor
            && entry.state == EntryState::Active
        {
            out.push_str(&format!("  ({})", descriptor.name));
        }
        if let Some(reason) = &entry.reason {
            out.push_str(&format!("  - {reason}"));
        }
        out.push('\n');
    }

    let active = entries
        .iter()
        .filter(|e| e.state == EntryState::Active)
        .count();
    out.push_str(&format!("\n{active}/{} agents active\n", entries.len()));
    out
}

/// Formats a routing decision for people.
#[must_use]
pub fn format_decision(decision: &RoutingDecision) -> String {
    let agents: Vec<&str> = decision.agents.iter().map(AgentKey::as_str).collect();
    let agents = if agents.is_empty() {
        "(none)".to_string()
    } else {
        agents.join(", ")
    };
    format!(
        "Route:  {}\nAgents: {}\nReason: {}\n",
        decision.kind, agents, decision.reason
    )
}

/// Folds a query's event stream into what a terminal should show.
#[derive(Debug, Default)]
pub struct Transcript {
    plan: String,
    streamed: String,
    aggregate: Option<String>,
    state: Option<TaskState>,
    message: Option<String>,
}

impl Transcript {
    /// Builds a transcript from a finished event sequence.
    #[must_use]
    pub fn from_events(events: &[StreamEvent]) -> Self {
        let mut transcript = Self::default();
        for event in events {
            transcript.push(event);
        }
        transcript
    }

    /// Folds one event.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::ArtifactUpdate { name, text, .. } if name == PLAN_ARTIFACT => {
                self.plan.push_str(text);
            }
            StreamEvent::ArtifactUpdate { name, text, .. }
                if name == FINAL_ARTIFACT || name == PARALLEL_ARTIFACT =>
            {
                self.aggregate = Some(text.clone());
            }
            StreamEvent::ArtifactUpdate { text, .. } => self.streamed.push_str(text),
            StreamEvent::StatusUpdate { state, message } => {
                if state.is_terminal() {
                    self.state = Some(*state);
                }
                if message.is_some() {
                    self.message.clone_from(message);
                }
            }
        }
    }

    /// The answer text, preferring an aggregate artifact over the raw
    /// streamed chunks.
    #[must_use]
    pub fn answer(&self) -> &str {
        self.aggregate.as_deref().unwrap_or(&self.streamed)
    }

    /// The terminal state, if the stream reached one.
    #[must_use]
    pub const fn state(&self) -> Option<TaskState> {
        self.state
    }

    /// Renders the transcript as text.
    #[must_use]
    pub fn render(&self, decision: &RoutingDecision) -> String {
        let mut out = String::new();
        if !self.plan.trim().is_empty() {
            out.push_str(&format!("Plan:\n{}\n\n", self.plan.trim()));
        }
        let answer = self.answer().trim();
        if !answer.is_empty() {
            out.push_str(&format!("{answer}\n\n"));
        }
        if let Some(message) = &self.message {
            out.push_str(&format!("{message}\n\n"));
        }
        let state = self.state.map_or("incomplete", |s| s.as_str());
        out.push_str(&format!("--- {} via {} ---\n", state, decision.kind));
        out
    }
}
