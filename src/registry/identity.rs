//! Descriptor identity validation.
//!
//! A descriptor matches the agent key when its name, or the id or name of
//! any advertised skill, normalizes to a string that contains the key or
//! is contained in it.

use crate::core::{AgentDescriptor, AgentKey};

/// Which descriptor field established the identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityMatch {
    /// The descriptor name matched.
    Name,
    /// A skill id or name matched.
    Skill(String),
}

/// Lower-cases and collapses whitespace and underscores into `_`.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.split(|c: char| c.is_whitespace() || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn matches_key(candidate: &str, key: &str) -> bool {
    let candidate = normalize(candidate);
    !candidate.is_empty() && (candidate.contains(key) || key.contains(&candidate))
}

/// Finds the descriptor field that identifies the agent `key`.
#[must_use]
pub fn identity_match(descriptor: &AgentDescriptor, key: &AgentKey) -> Option<IdentityMatch> {
    let key = normalize(key.as_str());
    if key.is_empty() {
        return None;
    }

    if matches_key(&descriptor.name, &key) {
        return Some(IdentityMatch::Name);
    }

    descriptor.skills.iter().find_map(|skill| {
        (matches_key(&skill.id, &key) || matches_key(&skill.name, &key))
            .then(|| IdentityMatch::Skill(skill.id.clone()))
    })
}

/// Returns `true` when `descriptor` identifies the agent `key`.
#[must_use]
pub fn validate_identity(descriptor: &AgentDescriptor, key: &AgentKey) -> bool {
    identity_match(descriptor, key).is_some()
}
