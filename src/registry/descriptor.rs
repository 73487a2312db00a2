//! Descriptor retrieval.

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

use crate::core::{AgentDescriptor, AgentEndpoint};
use crate::error::ConnectivityError;

/// Fetches the descriptor document of an agent.
#[async_trait]
pub trait DescriptorFetcher: Send + Sync {
    /// Fetches and decodes the descriptor at `endpoint`, within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConnectivityError`] describing why the descriptor could
    /// not be obtained.
    async fn fetch(
        &self,
        endpoint: &AgentEndpoint,
        timeout: Duration,
    ) -> Result<AgentDescriptor, ConnectivityError>;
}

/// Fetches descriptors over HTTP.
#[derive(Debug, Clone, Default)]
pub struct HttpDescriptorClient {
    http: reqwest::Client,
}

impl HttpDescriptorClient {
    /// Creates a fetcher with its own connection pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher sharing `http`'s connection pool.
    #[must_use]
    pub const fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DescriptorFetcher for HttpDescriptorClient {
    async fn fetch(
        &self,
        endpoint: &AgentEndpoint,
        timeout: Duration,
    ) -> Result<AgentDescriptor, ConnectivityError> {
        let url = endpoint.descriptor_url();
        let unreachable = |e: reqwest::Error| ConnectivityError::Unreachable {
            url: url.clone(),
            message: e.to_string(),
        };

        trace!(agent = %endpoint.key, url = %url, "fetching descriptor");
        let response = self
            .http
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(unreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectivityError::BadStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(unreachable)?;
        parse_descriptor(&url, &body)
    }
}

/// Decodes a descriptor body. `name`, `description`, `skills` and `url`
/// are required.
///
/// # Errors
///
/// Returns [`ConnectivityError::MalformedDescriptor`] when the body is not
/// a descriptor.
pub fn parse_descriptor(url: &str, body: &[u8]) -> Result<AgentDescriptor, ConnectivityError> {
    let descriptor: AgentDescriptor =
        serde_json::from_slice(body).map_err(|e| ConnectivityError::MalformedDescriptor {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if descriptor.name.trim().is_empty() {
        return Err(ConnectivityError::MalformedDescriptor {
            url: url.to_string(),
            message: "descriptor name is empty".to_string(),
        });
    }
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const URL: &str = "http://localhost:8001/.well-known/agent.json";

    #[test]
    fn test_parse_minimal_descriptor() {
        let body = br#"{"name":"Komodor Agent","description":"","skills":[],"url":"http://localhost:8001"}"#;
        let descriptor = parse_descriptor(URL, body).unwrap_or_else(|_| unreachable!());
        assert_eq!(descriptor.name, "Komodor Agent");
        assert!(descriptor.skills.is_empty());
        assert!(descriptor.description.is_empty());
    }

    #[test_case(br#"{"name":"Komodor Agent","url":"http://x"}"# ; "description and skills missing")]
    #[test_case(br#"{"name":"Komodor Agent","description":"d","url":"http://x"}"# ; "skills missing")]
    #[test_case(br#"{"name":"Komodor Agent","skills":[],"url":"http://x"}"# ; "description missing")]
    #[test_case(br#"{"name":"Komodor Agent","description":"d","skills":[]}"# ; "url missing")]
    fn test_parse_missing_required_field(body: &[u8]) {
        assert!(matches!(
            parse_descriptor(URL, body),
            Err(ConnectivityError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_parse_full_descriptor_ignores_unknown_fields() {
        let body = br#"{
            "name": "GitHub Agent",
            "description": "Repositories and pull requests",
            "url": "http://localhost:8002",
            "version": "1.2.0",
            "capabilities": {"streaming": true},
            "skills": [{"id": "github_repos", "name": "Repos", "tags": ["git"]}]
        }"#;
        let descriptor = parse_descriptor(URL, body).unwrap_or_else(|_| unreachable!());
        assert_eq!(descriptor.skills.len(), 1);
        assert_eq!(descriptor.skills[0].id, "github_repos");
    }

    #[test]
    fn test_parse_missing_name() {
        let result = parse_descriptor(URL, br#"{"url":"http://localhost:8001"}"#);
        assert!(matches!(
            result,
            Err(ConnectivityError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_parse_blank_name() {
        let result = parse_descriptor(URL, br#"{"name":"  ","url":"http://x"}"#);
        assert!(matches!(
            result,
            Err(ConnectivityError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_parse_not_json() {
        let result = parse_descriptor(URL, b"<html>hello</html>");
        assert!(matches!(
            result,
            Err(ConnectivityError::MalformedDescriptor { .. })
        ));
    }
}
