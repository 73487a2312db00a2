//! Coordinator configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::core::{AgentEndpoint, AgentKey};
use crate::error::ConfigError;
use crate::registry::RetryPolicy;
use crate::router::{RouterSettings, RoutingMode};

/// Default per-fetch connectivity timeout in seconds.
const DEFAULT_CONNECTIVITY_TIMEOUT_SECS: f64 = 5.0;
/// Default retries after the first connectivity attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default backoff base delay in seconds.
const DEFAULT_RETRY_DELAY_SECS: f64 = 2.0;
/// Default background refresh period in seconds.
const DEFAULT_REFRESH_INTERVAL_SECS: f64 = 300.0;
/// Default timeout for background (fast) checks in seconds.
const DEFAULT_FAST_CHECK_TIMEOUT_SECS: f64 = 2.0;
/// Default idle timeout between two stream frames in seconds.
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: f64 = 120.0;
/// Default bounded wait when stopping the monitor, in seconds.
const DEFAULT_MONITOR_SHUTDOWN_GRACE_SECS: f64 = 5.0;
/// Default port for agents without an explicit port.
const DEFAULT_AGENT_PORT: u16 = 8000;
/// Default host for agents without an explicit host.
const DEFAULT_AGENT_HOST: &str = "localhost";
/// Default knowledge-base agent key.
const DEFAULT_KNOWLEDGE_BASE_AGENT: &str = "rag";
/// Default knowledge-base prefix keywords.
const DEFAULT_KNOWLEDGE_BASE_KEYWORDS: &[&str] = &["docs:", "@docs", "kb:", "knowledge base:"];
/// Default orchestration keywords.
const DEFAULT_ORCHESTRATION_KEYWORDS: &[&str] = &[
    "analyze",
    "compare",
    "if",
    "then",
    "create",
    "update",
    "based on",
    "correlate",
    "summarize",
];

/// Configuration for the coordinator.
#[derive(Debug, Clone)]
pub struct SwitchboardConfig {
    /// Configured agent endpoints, in configuration order.
    pub agents: Vec<AgentEndpoint>,
    /// Skip descriptor checks and treat every configured agent as active.
    pub skip_connectivity_check: bool,
    /// Per-fetch connectivity timeout.
    pub connectivity_timeout: Duration,
    /// Retries after the first connectivity attempt.
    pub connectivity_max_retries: u32,
    /// Backoff base delay between connectivity attempts.
    pub connectivity_retry_delay: Duration,
    /// Wait before the first connectivity check.
    pub connectivity_startup_delay: Duration,
    /// Start background monitoring after initialization.
    pub background_monitoring_enabled: bool,
    /// Period of background refresh cycles.
    pub background_refresh_interval: Duration,
    /// Timeout used by background refresh cycles.
    pub background_fast_check_timeout: Duration,
    /// Designated knowledge-base agent.
    pub knowledge_base_agent: AgentKey,
    /// Query prefixes that route to the knowledge-base agent.
    pub knowledge_base_keywords: Vec<String>,
    /// Words that mark a multi-agent query as needing orchestration.
    pub orchestration_keywords: Vec<String>,
    /// Routing mode selector.
    pub routing_mode: RoutingMode,
    /// Orchestrator agent for the complex path, if any.
    pub orchestrator_url: Option<String>,
    /// Maximum wait between two frames of a streaming call.
    pub stream_idle_timeout: Duration,
    /// Bounded wait when stopping background monitoring.
    pub monitor_shutdown_grace: Duration,
}

impl SwitchboardConfig {
    /// Creates a new builder for `SwitchboardConfig`.
    #[must_use]
    pub fn builder() -> SwitchboardConfigBuilder {
        SwitchboardConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().from_env()?.build()
    }

    /// Retry policy for connectivity checks.
    ///
    /// Fast checks (background monitoring) use the short timeout and make a
    /// single attempt.
    #[must_use]
    pub const fn retry_policy(&self, fast: bool) -> RetryPolicy {
        if fast {
            RetryPolicy {
                max_retries: 0,
                base_delay: self.connectivity_retry_delay,
                timeout: self.background_fast_check_timeout,
            }
        } else {
            RetryPolicy {
                max_retries: self.connectivity_max_retries,
                base_delay: self.connectivity_retry_delay,
                timeout: self.connectivity_timeout,
            }
        }
    }

    /// Router settings derived from this configuration.
    #[must_use]
    pub fn router_settings(&self) -> RouterSettings {
        RouterSettings {
            knowledge_base_agent: self.knowledge_base_agent.clone(),
            knowledge_base_keywords: self.knowledge_base_keywords.clone(),
            orchestration_keywords: self.orchestration_keywords.clone(),
        }
    }
}

/// Builder for [`SwitchboardConfig`].
#[derive(Debug, Clone, Default)]
pub struct SwitchboardConfigBuilder {
    agents: Option<Vec<AgentEndpoint>>,
    skip_connectivity_check: Option<bool>,
    connectivity_timeout: Option<Duration>,
    connectivity_max_retries: Option<u32>,
    connectivity_retry_delay: Option<Duration>,
    connectivity_startup_delay: Option<Duration>,
    background_monitoring_enabled: Option<bool>,
    background_refresh_interval: Option<Duration>,
    background_fast_check_timeout: Option<Duration>,
    knowledge_base_agent: Option<AgentKey>,
    knowledge_base_keywords: Option<Vec<String>>,
    orchestration_keywords: Option<Vec<String>>,
    routing_mode: Option<RoutingMode>,
    orchestrator_url: Option<String>,
    stream_idle_timeout: Option<Duration>,
    monitor_shutdown_grace: Option<Duration>,
}

impl SwitchboardConfigBuilder {
    /// Populates unset fields from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable cannot be parsed.
    pub fn from_env(self) -> Result<Self, ConfigError> {
        self.from_lookup(|key| std::env::var(key).ok())
    }

    /// Populates unset fields from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable cannot be parsed.
    pub fn from_lookup<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if self.agents.is_none() {
            self.agents = get("SWITCHBOARD_AGENTS")
                .map(|raw| agents_from_lookup(&raw, &get))
                .transpose()?;
        }
        if self.skip_connectivity_check.is_none() {
            self.skip_connectivity_check = get_parsed(&get, "SKIP_CONNECTIVITY_CHECK", parse_bool)?;
        }
        if self.connectivity_timeout.is_none() {
            self.connectivity_timeout = get_parsed(&get, "CONNECTIVITY_TIMEOUT", parse_seconds)?;
        }
        if self.connectivity_max_retries.is_none() {
            self.connectivity_max_retries =
                get_parsed(&get, "CONNECTIVITY_MAX_RETRIES", |v| {
                    v.trim().parse::<u32>().map_err(|e| e.to_string())
                })?;
        }
        if self.connectivity_retry_delay.is_none() {
            self.connectivity_retry_delay =
                get_parsed(&get, "CONNECTIVITY_RETRY_DELAY", parse_seconds)?;
        }
        if self.connectivity_startup_delay.is_none() {
            self.connectivity_startup_delay =
                get_parsed(&get, "CONNECTIVITY_STARTUP_DELAY", parse_seconds)?;
        }
        if self.background_monitoring_enabled.is_none() {
            self.background_monitoring_enabled =
                get_parsed(&get, "BACKGROUND_MONITORING_ENABLED", parse_bool)?;
        }
        if self.background_refresh_interval.is_none() {
            self.background_refresh_interval =
                get_parsed(&get, "BACKGROUND_REFRESH_INTERVAL", parse_seconds)?;
        }
        if self.background_fast_check_timeout.is_none() {
            self.background_fast_check_timeout =
                get_parsed(&get, "BACKGROUND_FAST_CHECK_TIMEOUT", parse_seconds)?;
        }
        if self.knowledge_base_agent.is_none() {
            self.knowledge_base_agent = get("KNOWLEDGE_BASE_AGENT").map(AgentKey::new);
        }
        if self.knowledge_base_keywords.is_none() {
            self.knowledge_base_keywords = get("KNOWLEDGE_BASE_KEYWORDS").map(|v| parse_list(&v));
        }
        if self.orchestration_keywords.is_none() {
            self.orchestration_keywords = get("ORCHESTRATION_KEYWORDS").map(|v| parse_list(&v));
        }
        if self.routing_mode.is_none() {
            self.routing_mode = get_parsed(&get, "ROUTING_MODE", |v| v.parse::<RoutingMode>())?;
        }
        if self.orchestrator_url.is_none() {
            self.orchestrator_url = get("ORCHESTRATOR_URL");
        }
        if self.stream_idle_timeout.is_none() {
            self.stream_idle_timeout = get_parsed(&get, "STREAM_IDLE_TIMEOUT", parse_seconds)?;
        }
        if self.monitor_shutdown_grace.is_none() {
            self.monitor_shutdown_grace =
                get_parsed(&get, "MONITOR_SHUTDOWN_GRACE", parse_seconds)?;
        }
        Ok(self)
    }

    /// Sets the full list of agent endpoints.
    #[must_use]
    pub fn agents(mut self, agents: Vec<AgentEndpoint>) -> Self {
        self.agents = Some(agents);
        self
    }

    /// Adds one agent endpoint.
    #[must_use]
    pub fn agent(mut self, key: impl Into<AgentKey>, url: impl AsRef<str>) -> Self {
        self.agents
            .get_or_insert_with(Vec::new)
            .push(AgentEndpoint::new(key, url));
        self
    }

    /// Enables or disables skipping connectivity checks.
    #[must_use]
    pub const fn skip_connectivity_check(mut self, skip: bool) -> Self {
        self.skip_connectivity_check = Some(skip);
        self
    }

    /// Sets the per-fetch connectivity timeout.
    #[must_use]
    pub const fn connectivity_timeout(mut self, timeout: Duration) -> Self {
        self.connectivity_timeout = Some(timeout);
        self
    }

    /// Sets the retries after the first connectivity attempt.
    #[must_use]
    pub const fn connectivity_max_retries(mut self, n: u32) -> Self {
        self.connectivity_max_retries = Some(n);
        self
    }

    /// Sets the backoff base delay.
    #[must_use]
    pub const fn connectivity_retry_delay(mut self, delay: Duration) -> Self {
        self.connectivity_retry_delay = Some(delay);
        self
    }

    /// Sets the wait before the first connectivity check.
    #[must_use]
    pub const fn connectivity_startup_delay(mut self, delay: Duration) -> Self {
        self.connectivity_startup_delay = Some(delay);
        self
    }

    /// Enables or disables background monitoring.
    #[must_use]
    pub const fn background_monitoring_enabled(mut self, enabled: bool) -> Self {
        self.background_monitoring_enabled = Some(enabled);
        self
    }

    /// Sets the background refresh period.
    #[must_use]
    pub const fn background_refresh_interval(mut self, interval: Duration) -> Self {
        self.background_refresh_interval = Some(interval);
        self
    }

    /// Sets the timeout for background checks.
    #[must_use]
    pub const fn background_fast_check_timeout(mut self, timeout: Duration) -> Self {
        self.background_fast_check_timeout = Some(timeout);
        self
    }

    /// Sets the knowledge-base agent key.
    #[must_use]
    pub fn knowledge_base_agent(mut self, key: impl Into<AgentKey>) -> Self {
        self.knowledge_base_agent = Some(key.into());
        self
    }

    /// Sets the knowledge-base prefix keywords.
    #[must_use]
    pub fn knowledge_base_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.knowledge_base_keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the orchestration keywords.
    #[must_use]
    pub fn orchestration_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.orchestration_keywords = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the routing mode.
    #[must_use]
    pub const fn routing_mode(mut self, mode: RoutingMode) -> Self {
        self.routing_mode = Some(mode);
        self
    }

    /// Sets the orchestrator URL for the complex path.
    #[must_use]
    pub fn orchestrator_url(mut self, url: impl Into<String>) -> Self {
        self.orchestrator_url = Some(url.into());
        self
    }

    /// Sets the idle timeout between stream frames.
    #[must_use]
    pub const fn stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = Some(timeout);
        self
    }

    /// Sets the bounded wait for stopping background monitoring.
    #[must_use]
    pub const fn monitor_shutdown_grace(mut self, grace: Duration) -> Self {
        self.monitor_shutdown_grace = Some(grace);
        self
    }

    /// Builds the [`SwitchboardConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the refresh interval is zero.
    pub fn build(self) -> Result<SwitchboardConfig, ConfigError> {
        let background_refresh_interval = self
            .background_refresh_interval
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_REFRESH_INTERVAL_SECS));
        if background_refresh_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "BACKGROUND_REFRESH_INTERVAL".to_string(),
                value: "0".to_string(),
                message: "interval must be positive".to_string(),
            });
        }

        Ok(SwitchboardConfig {
            agents: self.agents.unwrap_or_default(),
            skip_connectivity_check: self.skip_connectivity_check.unwrap_or(true),
            connectivity_timeout: self
                .connectivity_timeout
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_CONNECTIVITY_TIMEOUT_SECS)),
            connectivity_max_retries: self
                .connectivity_max_retries
                .unwrap_or(DEFAULT_MAX_RETRIES),
            connectivity_retry_delay: self
                .connectivity_retry_delay
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS)),
            connectivity_startup_delay: self.connectivity_startup_delay.unwrap_or(Duration::ZERO),
            background_monitoring_enabled: self.background_monitoring_enabled.unwrap_or(false),
            background_refresh_interval,
            background_fast_check_timeout: self
                .background_fast_check_timeout
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_FAST_CHECK_TIMEOUT_SECS)),
            knowledge_base_agent: self
                .knowledge_base_agent
                .unwrap_or_else(|| AgentKey::new(DEFAULT_KNOWLEDGE_BASE_AGENT)),
            knowledge_base_keywords: self.knowledge_base_keywords.unwrap_or_else(|| {
                DEFAULT_KNOWLEDGE_BASE_KEYWORDS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }),
            orchestration_keywords: self.orchestration_keywords.unwrap_or_else(|| {
                DEFAULT_ORCHESTRATION_KEYWORDS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            }),
            routing_mode: self.routing_mode.unwrap_or_default(),
            orchestrator_url: self.orchestrator_url,
            stream_idle_timeout: self
                .stream_idle_timeout
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_STREAM_IDLE_TIMEOUT_SECS)),
            monitor_shutdown_grace: self
                .monitor_shutdown_grace
                .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_MONITOR_SHUTDOWN_GRACE_SECS)),
        })
    }
}

/// Reads and parses one variable, naming it in the error.
fn get_parsed<T, G, P, E>(get: &G, key: &str, parse: P) -> Result<Option<T>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Result<T, E>,
    E: ToString,
{
    get(key)
        .map(|value| {
            parse(&value).map_err(|e| ConfigError::Invalid {
                key: key.to_string(),
                value,
                message: e.to_string(),
            })
        })
        .transpose()
}

/// Resolves `<KEY>_AGENT_URL`, or `<KEY>_AGENT_HOST` / `<KEY>_AGENT_PORT`, per agent.
fn agents_from_lookup<G>(raw: &str, get: &G) -> Result<Vec<AgentEndpoint>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let mut endpoints: Vec<AgentEndpoint> = Vec::new();
    for key in parse_list(raw) {
        let agent = AgentKey::new(&key);
        if endpoints.iter().any(|e| e.key == agent) {
            continue;
        }
        let prefix = agent.as_str().to_uppercase().replace(['-', ' '], "_");
        let url = if let Some(url) = get(&format!("{prefix}_AGENT_URL")) {
            url
        } else {
            let host = get(&format!("{prefix}_AGENT_HOST"))
                .unwrap_or_else(|| DEFAULT_AGENT_HOST.to_string());
            let port = get_parsed(get, &format!("{prefix}_AGENT_PORT"), |v| {
                v.trim().parse::<u16>().map_err(|e| e.to_string())
            })?
            .unwrap_or(DEFAULT_AGENT_PORT);
            format!("http://{host}:{port}")
        };
        endpoints.push(AgentEndpoint::new(agent, url));
    }
    Ok(endpoints)
}

/// Splits a comma-separated list, trimming and dropping empty items.
pub(crate) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got '{other}'")),
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw.trim().parse().map_err(|e| format!("{e}"))?;
    Duration::try_from_secs_f64(secs).map_err(|e| e.to_string())
}
