//! Routing decision value object.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::agent::AgentKey;

/// How a query will be executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    /// One agent, streamed straight through.
    Direct,
    /// Several agents concurrently, results aggregated.
    Parallel,
    /// Deferred to the orchestration path.
    Complex,
}

impl RouteKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Parallel => "parallel",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the router for one query. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    /// Execution strategy.
    #[serde(rename = "type")]
    pub kind: RouteKind,
    /// Target agents, or the orchestration hint for `Complex`.
    pub agents: Vec<AgentKey>,
    /// Why this decision was made.
    pub reason: String,
}

impl RoutingDecision {
    /// Routes to a single agent.
    #[must_use]
    pub fn direct(agent: AgentKey, reason: impl Into<String>) -> Self {
        Self {
            kind: RouteKind::Direct,
            agents: vec![agent],
            reason: reason.into(),
        }
    }

    /// Fans out to several agents.
    #[must_use]
    pub fn parallel(agents: Vec<AgentKey>, reason: impl Into<String>) -> Self {
        Self {
            kind: RouteKind::Parallel,
            agents,
            reason: reason.into(),
        }
    }

    /// Defers to orchestration, carrying `hint` agents.
    #[must_use]
    pub fn complex(hint: Vec<AgentKey>, reason: impl Into<String>) -> Self {
        Self {
            kind: RouteKind::Complex,
            agents: hint,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RoutingDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let agents: Vec<&str> = self.agents.iter().map(AgentKey::as_str).collect();
        write!(f, "{}([{}]): {}", self.kind, agents.join(", "), self.reason)
    }
}
