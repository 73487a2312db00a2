//! Top-level query handling.
//!
//! [`Coordinator`] owns the registry, router and executor, and turns a
//! query into a routing decision plus an event stream.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::SwitchboardConfig;
use crate::core::{AgentKey, RoutingDecision};
use crate::error::{Error, Result};
use crate::executor::{EventStream, QueryRequest, StreamingExecutor};
use crate::protocol::{AgentClient, HttpAgentClient, HttpClientFactory};
use crate::registry::{
    AgentRegistry, ConnectivityChecker, HttpDescriptorClient, RegistrySettings, TokioSleeper,
};
use crate::router::{QueryRouter, RoutingMode};

/// Key used for the orchestration backend in logs and errors.
pub const ORCHESTRATOR_KEY: &str = "orchestrator";

/// Routes and executes queries.
#[derive(Debug)]
pub struct Coordinator {
    registry: Arc<AgentRegistry>,
    router: QueryRouter,
    mode: RoutingMode,
    executor: StreamingExecutor,
    monitor_interval: Option<std::time::Duration>,
}

impl Coordinator {
    /// Builds a coordinator speaking HTTP to the configured agents.
    #[must_use]
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        let http = reqwest::Client::new();
        let checker = ConnectivityChecker::new(
            Arc::new(HttpDescriptorClient::with_client(http.clone())),
            Arc::new(TokioSleeper),
        );
        let registry = Arc::new(AgentRegistry::new(
            config.agents.clone(),
            RegistrySettings::from_config(config),
            checker,
            Arc::new(HttpClientFactory::new(http.clone(), config.stream_idle_timeout)),
        ));

        let orchestrator = config.orchestrator_url.as_ref().map(|url| {
            Arc::new(HttpAgentClient::new(
                AgentKey::new(ORCHESTRATOR_KEY),
                url.trim_end_matches('/'),
                http.clone(),
                config.stream_idle_timeout,
            )) as Arc<dyn AgentClient>
        });

        let mut coordinator = Self::new(
            registry,
            QueryRouter::new(config.router_settings()),
            config.routing_mode,
            orchestrator,
        );
        if config.background_monitoring_enabled {
            coordinator.monitor_interval = Some(config.background_refresh_interval);
        }
        coordinator
    }

    /// Assembles a coordinator from parts.
    #[must_use]
    pub fn new(
        registry: Arc<AgentRegistry>,
        router: QueryRouter,
        mode: RoutingMode,
        orchestrator: Option<Arc<dyn AgentClient>>,
    ) -> Self {
        let executor = StreamingExecutor::new(Arc::clone(&registry), orchestrator);
        Self {
            registry,
            router,
            mode,
            executor,
            monitor_interval: None,
        }
    }

    /// The agent registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// The routing mode in effect.
    #[must_use]
    pub const fn mode(&self) -> RoutingMode {
        self.mode
    }

    /// Initializes the registry and, when enabled, starts monitoring.
    pub async fn start(&self) -> Vec<AgentKey> {
        let active = self.registry.initialize().await;
        if let Some(interval) = self.monitor_interval {
            self.registry.start_background_monitoring(interval);
        }
        active
    }

    /// Stops background monitoring.
    pub async fn shutdown(&self) {
        if self.registry.stop_background_monitoring().await {
            info!("background monitoring stopped");
        }
    }

    /// Validates and routes `request` without executing it.
    ///
    /// # Errors
    ///
    /// Fails for invalid queries and when no agent is active.
    pub fn decide(&self, request: &QueryRequest) -> Result<RoutingDecision> {
        request.validate()?;

        if !self.mode.consults_router() {
            return Ok(RoutingDecision::complex(
                Vec::new(),
                format!("routing mode {} sends every query to orchestration", self.mode),
            ));
        }

        let active = self.registry.active_keys();
        let decision = self.router.route(&request.query, &active)?;
        let decision = self.mode.apply(decision);
        debug!(decision = %decision, mode = %self.mode, "decision");
        Ok(decision)
    }

    /// Routes and executes `request`.
    ///
    /// # Errors
    ///
    /// Routing errors surface here, before any event is produced.
    pub fn handle(&self, request: QueryRequest) -> Result<(RoutingDecision, EventStream)> {
        let decision = self.decide(&request)?;
        let stream = self.executor.execute(decision.clone(), request);
        Ok((decision, stream))
    }
}
