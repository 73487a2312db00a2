//! Connectivity checks with bounded retry and exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::descriptor::DescriptorFetcher;
use super::identity::identity_match;
use crate::core::{AgentDescriptor, AgentEndpoint, AgentKey};
use crate::error::ConnectivityError;

/// Retry parameters for one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each later retry.
    pub base_delay: Duration,
    /// Per-attempt request timeout.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Waits between attempts. Swapped out in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of checking one agent.
#[derive(Debug, Clone)]
pub struct CheckOutcome {
    /// Agent that was checked.
    pub endpoint: AgentEndpoint,
    /// Validated descriptor, if the agent is reachable and matched.
    pub descriptor: Option<AgentDescriptor>,
    /// Why the agent was excluded.
    pub error: Option<ConnectivityError>,
    /// Fetch attempts made (zero when checks are skipped).
    pub attempts: u32,
}

impl CheckOutcome {
    /// Outcome for an admitted agent.
    #[must_use]
    pub const fn reachable(
        endpoint: AgentEndpoint,
        descriptor: AgentDescriptor,
        attempts: u32,
    ) -> Self {
        Self {
            endpoint,
            descriptor: Some(descriptor),
            error: None,
            attempts,
        }
    }

    /// Outcome for an excluded agent.
    #[must_use]
    pub const fn excluded(endpoint: AgentEndpoint, error: ConnectivityError, attempts: u32) -> Self {
        Self {
            endpoint,
            descriptor: None,
            error: Some(error),
            attempts,
        }
    }

    /// Key of the checked agent.
    #[must_use]
    pub const fn key(&self) -> &AgentKey {
        &self.endpoint.key
    }

    /// Whether the agent may join the active set.
    #[must_use]
    pub const fn is_reachable(&self) -> bool {
        self.descriptor.is_some()
    }
}

/// Fetches and validates descriptors, retrying transient failures.
#[derive(Clone)]
pub struct ConnectivityChecker {
    fetcher: Arc<dyn DescriptorFetcher>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for ConnectivityChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityChecker").finish_non_exhaustive()
    }
}

impl ConnectivityChecker {
    /// Creates a checker.
    #[must_use]
    pub fn new(fetcher: Arc<dyn DescriptorFetcher>, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { fetcher, sleeper }
    }

    /// Checks one agent.
    ///
    /// Makes at most `max_retries + 1` attempts. Only
    /// [retryable](ConnectivityError::is_retryable) failures are retried;
    /// a descriptor that fails identity validation excludes the agent
    /// immediately.
    pub async fn check(&self, endpoint: &AgentEndpoint, policy: &RetryPolicy) -> CheckOutcome {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.fetcher.fetch(endpoint, policy.timeout).await {
                Ok(descriptor) => {
                    return match identity_match(&descriptor, &endpoint.key) {
                        Some(matched) => {
                            debug!(
                                agent = %endpoint.key,
                                descriptor = %descriptor.name,
                                matched = ?matched,
                                attempt,
                                "agent reachable"
                            );
                            CheckOutcome::reachable(endpoint.clone(), descriptor, attempt)
                        }
                        None => {
                            let err = ConnectivityError::IdentityMismatch {
                                expected: endpoint.key.to_string(),
                                found: descriptor.name,
                            };
                            CheckOutcome::excluded(endpoint.clone(), err, attempt)
                        }
                    };
                }
                Err(e) if e.is_retryable() && attempt <= policy.max_retries => {
                    let delay = policy.delay_for_retry(attempt);
                    warn!(
                        agent = %endpoint.key,
                        attempt,
                        max_retries = policy.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "retrying connectivity check"
                    );
                    self.sleeper.sleep(delay).await;
                }
                Err(e) => return CheckOutcome::excluded(endpoint.clone(), e, attempt),
            }
        }
    }
}
