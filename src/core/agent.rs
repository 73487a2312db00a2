//! Agent identity types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known path of the agent descriptor document.
pub const DESCRIPTOR_PATH: &str = "/.well-known/agent.json";

/// Stable identifier of a configured agent (e.g. `"komodor"`).
///
/// Keys are stored lower-cased; two keys that differ only in case are the
/// same agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentKey(String);

impl AgentKey {
    /// Creates a key, trimming and lower-casing the input.
    #[must_use]
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(key.as_ref().trim().to_lowercase())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for AgentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for AgentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AgentKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for AgentKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

/// Where a configured agent lives. Derived once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEndpoint {
    /// Agent key.
    pub key: AgentKey,
    /// Base URL without a trailing slash.
    pub url: String,
}

impl AgentEndpoint {
    /// Creates an endpoint, dropping any trailing slash from `url`.
    #[must_use]
    pub fn new(key: impl Into<AgentKey>, url: impl AsRef<str>) -> Self {
        Self {
            key: key.into(),
            url: url.as_ref().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the descriptor document for this endpoint.
    #[must_use]
    pub fn descriptor_url(&self) -> String {
        format!("{}{DESCRIPTOR_PATH}", self.url)
    }
}

/// One capability advertised in a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    /// Skill identifier.
    pub id: String,
    /// Human-readable skill name.
    pub name: String,
    /// Optional skill description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Identity and capability document served by an agent.
///
/// Only attached to a registry entry after identity validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent display name.
    pub name: String,
    /// What the agent does.
    pub description: String,
    /// Advertised skills.
    pub skills: Vec<AgentSkill>,
    /// URL the agent claims to be served from.
    pub url: String,
}

impl AgentDescriptor {
    /// Builds the descriptor used when connectivity checks are skipped.
    #[must_use]
    pub fn synthesized(endpoint: &AgentEndpoint) -> Self {
        Self {
            name: endpoint.key.to_string(),
            description: String::new(),
            skills: Vec::new(),
            url: endpoint.url.clone(),
        }
    }
}
