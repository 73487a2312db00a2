//! Deployment-level routing strategy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{RouteKind, RoutingDecision};

/// Overrides applied on top of the keyword router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingMode {
    /// Never fan out; multi-agent queries go to orchestration.
    DirectOnly,
    /// Multi-agent orchestration decisions fan out in parallel instead.
    ParallelOrchestration,
    /// Router decisions are used as-is.
    #[default]
    IntelligentRouting,
    /// Every query goes to orchestration.
    SequentialOrchestration,
}

impl RoutingMode {
    /// Returns the configuration spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DirectOnly => "DIRECT_ONLY",
            Self::ParallelOrchestration => "PARALLEL_ORCHESTRATION",
            Self::IntelligentRouting => "INTELLIGENT_ROUTING",
            Self::SequentialOrchestration => "SEQUENTIAL_ORCHESTRATION",
        }
    }

    /// Whether queries are classified by the router at all.
    #[must_use]
    pub const fn consults_router(self) -> bool {
        !matches!(self, Self::SequentialOrchestration)
    }

    /// Rewrites a router decision for this mode.
    #[must_use]
    pub fn apply(self, decision: RoutingDecision) -> RoutingDecision {
        match (self, decision.kind) {
            (Self::DirectOnly, RouteKind::Parallel) => RoutingDecision::complex(
                decision.agents,
                format!("{}; parallel fan-out disabled by DIRECT_ONLY", decision.reason),
            ),
            (Self::ParallelOrchestration, RouteKind::Complex) if decision.agents.len() >= 2 => {
                RoutingDecision::parallel(
                    decision.agents,
                    format!(
                        "{}; PARALLEL_ORCHESTRATION fans out multi-agent queries",
                        decision.reason
                    ),
                )
            }
            _ => decision,
        }
    }
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "DIRECT_ONLY" => Ok(Self::DirectOnly),
            "PARALLEL_ORCHESTRATION" => Ok(Self::ParallelOrchestration),
            "INTELLIGENT_ROUTING" => Ok(Self::IntelligentRouting),
            "SEQUENTIAL_ORCHESTRATION" => Ok(Self::SequentialOrchestration),
            other => Err(format!(
                "unknown routing mode '{other}' (expected DIRECT_ONLY, PARALLEL_ORCHESTRATION, \
                 INTELLIGENT_ROUTING or SEQUENTIAL_ORCHESTRATION)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AgentKey;
    use test_case::test_case;

    fn keys(names: &[&str]) -> Vec<AgentKey> {
        names.iter().map(|n| AgentKey::new(n)).collect()
    }

    #[test_case("direct_only", RoutingMode::DirectOnly ; "lower snake")]
    #[test_case("PARALLEL_ORCHESTRATION", RoutingMode::ParallelOrchestration ; "upper snake")]
    #[test_case("intelligent-routing", RoutingMode::IntelligentRouting ; "kebab")]
    #[test_case(" Sequential_Orchestration ", RoutingMode::SequentialOrchestration ; "mixed case padded")]
    fn test_parse_mode(input: &str, expected: RoutingMode) {
        assert_eq!(input.parse::<RoutingMode>(), Ok(expected));
    }

    #[test]
    fn test_parse_unknown_mode() {
        assert!("round_robin".parse::<RoutingMode>().is_err());
    }

    #[test]
    fn test_direct_only_disables_parallel() {
        let decision = RoutingDecision::parallel(keys(&["github", "komodor"]), "two agents");
        let applied = RoutingMode::DirectOnly.apply(decision);
        assert_eq!(applied.kind, RouteKind::Complex);
        assert_eq!(applied.agents, keys(&["github", "komodor"]));
    }

    #[test]
    fn test_parallel_orchestration_fans_out_complex() {
        let decision = RoutingDecision::complex(keys(&["github", "komodor"]), "analyze");
        let applied = RoutingMode::ParallelOrchestration.apply(decision);
        assert_eq!(applied.kind, RouteKind::Parallel);

        let unhinted = RoutingDecision::complex(Vec::new(), "no mention");
        assert_eq!(
            RoutingMode::ParallelOrchestration.apply(unhinted).kind,
            RouteKind::Complex
        );
    }

    #[test]
    fn test_intelligent_routing_is_identity() {
        let decision = RoutingDecision::direct(AgentKey::new("komodor"), "mentioned");
        assert_eq!(
            RoutingMode::IntelligentRouting.apply(decision.clone()),
            decision
        );
        assert!(RoutingMode::IntelligentRouting.consults_router());
        assert!(!RoutingMode::SequentialOrchestration.consults_router());
    }
}
