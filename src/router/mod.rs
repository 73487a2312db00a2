//! Deterministic keyword router.
//!
//! Classifies a query into a [`RoutingDecision`] from the query text and
//! the set of active agents alone. No model calls, no I/O.
//!
//! Rules, first match wins:
//!
//! 1. The query starts with a knowledge-base keyword and the knowledge-base
//!    agent is active: `Direct(kb)`.
//! 2. Collect active agent keys that appear in the query.
//! 3. Zero mentioned: `Complex([])`.
//! 4. One mentioned: `Direct(agent)`.
//! 5. Several mentioned: `Complex(mentioned)` if an orchestration keyword
//!    appears as a whole word, otherwise `Parallel(mentioned)`.

mod mode;

pub use mode::RoutingMode;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::core::{AgentKey, RoutingDecision};
use crate::error::RouterError;

/// Keyword lists the router classifies with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterSettings {
    /// Agent that serves knowledge-base queries.
    pub knowledge_base_agent: AgentKey,
    /// Prefixes that send a query to the knowledge-base agent.
    pub knowledge_base_keywords: Vec<String>,
    /// Words that mark a multi-agent query as needing orchestration.
    pub orchestration_keywords: Vec<String>,
}

/// Keyword router. Cheap to share; holds only compiled patterns.
#[derive(Debug, Clone)]
pub struct QueryRouter {
    knowledge_base_agent: AgentKey,
    knowledge_base_prefixes: Vec<String>,
    orchestration: Vec<(String, Regex)>,
}

impl QueryRouter {
    /// Compiles a router from its settings.
    #[must_use]
    pub fn new(settings: RouterSettings) -> Self {
        let knowledge_base_prefixes = settings
            .knowledge_base_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        let orchestration = settings
            .orchestration_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .filter_map(|keyword| match whole_word_pattern(&keyword) {
                Ok(re) => Some((keyword, re)),
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "skipping orchestration keyword");
                    None
                }
            })
            .collect();

        Self {
            knowledge_base_agent: settings.knowledge_base_agent,
            knowledge_base_prefixes,
            orchestration,
        }
    }

    /// Routes `query` against the currently active agents.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::NoAgentsConfigured`] when `active` is empty.
    pub fn route(&self, query: &str, active: &[AgentKey]) -> Result<RoutingDecision, RouterError> {
        if active.is_empty() {
            return Err(RouterError::NoAgentsConfigured);
        }

        let lowered = query.trim().to_lowercase();

        if let Some(prefix) = self.knowledge_base_prefix(&lowered) {
            if active.contains(&self.knowledge_base_agent) {
                let decision = RoutingDecision::direct(
                    self.knowledge_base_agent.clone(),
                    format!("query starts with knowledge-base keyword '{prefix}'"),
                );
                debug!(decision = %decision, "routed");
                return Ok(decision);
            }
            debug!(
                prefix,
                agent = %self.knowledge_base_agent,
                "knowledge-base keyword present but agent inactive"
            );
        }

        let mentioned = mentioned_agents(&lowered, active);
        let decision = match mentioned.as_slice() {
            [] => RoutingDecision::complex(
                Vec::new(),
                "no explicit agent mentioned, defer to orchestration",
            ),
            [only] => {
                let reason = format!("query mentions agent '{only}'");
                RoutingDecision::direct(only.clone(), reason)
            }
            _ => match self.orchestration_keyword(&lowered) {
                Some(keyword) => RoutingDecision::complex(
                    mentioned,
                    format!("several agents mentioned with orchestration keyword '{keyword}'"),
                ),
                None => RoutingDecision::parallel(
                    mentioned,
                    "several agents mentioned without orchestration keywords",
                ),
            },
        };

        debug!(decision = %decision, "routed");
        Ok(decision)
    }

    fn knowledge_base_prefix(&self, lowered: &str) -> Option<&str> {
        self.knowledge_base_prefixes
            .iter()
            .find(|p| lowered.starts_with(p.as_str()))
            .map(String::as_str)
    }

    fn orchestration_keyword(&self, lowered: &str) -> Option<&str> {
        self.orchestration
            .iter()
            .find(|(_, re)| re.is_match(lowered))
            .map(|(k, _)| k.as_str())
    }
}

/// Active agents whose key appears in `lowered`, ordered by first
/// occurrence. Ties keep the order of `active`.
#[must_use]
pub fn mentioned_agents(lowered: &str, active: &[AgentKey]) -> Vec<AgentKey> {
    let mut hits: Vec<(usize, &AgentKey)> = active
        .iter()
        .filter(|k| !k.as_str().is_empty())
        .filter_map(|k| lowered.find(k.as_str()).map(|pos| (pos, k)))
        .collect();
    hits.sort_by_key(|(pos, _)| *pos);
    hits.into_iter().map(|(_, k)| k.clone()).collect()
}

/// Case-insensitive whole-word pattern for `keyword`.
///
/// Word boundaries are only anchored on sides that end in a word
/// character; internal whitespace matches any run of whitespace.
fn whole_word_pattern(keyword: &str) -> Result<Regex, regex::Error> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let body = regex::escape(keyword).replace(' ', r"\s+");
    let start = if keyword.starts_with(is_word) { r"\b" } else { "" };
    let end = if keyword.ends_with(is_word) { r"\b" } else { "" };
    RegexBuilder::new(&format!("{start}{body}{end}"))
        .case_insensitive(true)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RouteKind;
    use test_case::test_case;

    fn router() -> QueryRouter {
        QueryRouter::new(RouterSettings {
            knowledge_base_agent: AgentKey::new("rag"),
            knowledge_base_keywords: vec![
                "docs:".to_string(),
                "@docs".to_string(),
                "kb:".to_string(),
                "knowledge base:".to_string(),
            ],
            orchestration_keywords: ["analyze", "compare", "if", "then", "based on", "correlate"]
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }

    fn keys(names: &[&str]) -> Vec<AgentKey> {
        names.iter().map(|n| AgentKey::new(n)).collect()
    }

    #[test_case("show me clusters in komodor", RouteKind::Direct, &["komodor"] ; "single mention")]
    #[test_case("list github repos and komodor clusters", RouteKind::Parallel, &["github", "komodor"] ; "two mentions no keyword")]
    #[test_case("analyze github and komodor", RouteKind::Complex, &["github", "komodor"] ; "two mentions with keyword")]
    #[test_case("analyze komodor clusters and create github tickets if unhealthy", RouteKind::Complex, &["komodor", "github"] ; "keyword in longer request")]
    #[test_case("what is the weather", RouteKind::Complex, &[] ; "no mention")]
    #[test_case("docs: how to configure SSO", RouteKind::Direct, &["rag"] ; "knowledge base prefix")]
    #[test_case("KB: komodor setup", RouteKind::Direct, &["rag"] ; "knowledge base prefix wins over mention")]
    #[test_case("Komodor and GitHub status", RouteKind::Parallel, &["komodor", "github"] ; "case insensitive first occurrence order")]
    #[test_case("github and komodor differences, BASED   ON last week", RouteKind::Complex, &["github", "komodor"] ; "multi word keyword spans whitespace")]
    fn test_route(query: &str, kind: RouteKind, agents: &[&str]) {
        let active = keys(&["github", "komodor", "rag"]);
        let decision = router()
            .route(query, &active)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.kind, kind);
        assert_eq!(decision.agents, keys(agents));
        assert!(!decision.reason.is_empty());
    }

    #[test]
    fn test_no_mention_reason() {
        let decision = router()
            .route("what is the weather", &keys(&["github", "komodor"]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.reason, "no explicit agent mentioned, defer to orchestration");
    }

    #[test]
    fn test_keyword_requires_whole_word() {
        // "diff" contains "if" but is not the word "if".
        let decision = router()
            .route("diff github against komodor", &keys(&["github", "komodor"]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.kind, RouteKind::Parallel);
    }

    #[test]
    fn test_inactive_knowledge_base_falls_through() {
        let decision = router()
            .route("docs: komodor setup", &keys(&["github", "komodor"]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.kind, RouteKind::Direct);
        assert_eq!(decision.agents, keys(&["komodor"]));
    }

    #[test]
    fn test_knowledge_base_keyword_must_be_prefix() {
        let decision = router()
            .route("where are the docs: for komodor", &keys(&["komodor", "rag"]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.agents, keys(&["komodor"]));
    }

    #[test]
    fn test_inactive_agent_never_selected() {
        let decision = router()
            .route("show me clusters in komodor", &keys(&["github"]))
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(decision.kind, RouteKind::Complex);
        assert!(decision.agents.is_empty());
    }

    #[test]
    fn test_no_active_agents() {
        assert!(matches!(
            router().route("anything", &[]),
            Err(RouterError::NoAgentsConfigured)
        ));
    }

    #[test]
    fn test_mentioned_agents_tie_keeps_active_order() {
        let found = mentioned_agents("aws_eks clusters", &keys(&["aws", "aws_eks"]));
        assert_eq!(found, keys(&["aws", "aws_eks"]));
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = router();
        let active = keys(&["github", "komodor", "rag"]);
        let first = router.route("compare github and komodor", &active);
        let second = router.route("compare github and komodor", &active);
        assert_eq!(first.ok(), second.ok());
    }
}
