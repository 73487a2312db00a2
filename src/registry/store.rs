//! Active-set bookkeeping for configured agents.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::{Mutex as CycleLock, Semaphore};
use tracing::{debug, info, warn};

use super::checker::{CheckOutcome, ConnectivityChecker, RetryPolicy};
use super::monitor::MonitorHandle;
use crate::config::SwitchboardConfig;
use crate::core::{AgentDescriptor, AgentEndpoint, AgentKey};
use crate::error::ConnectivityError;
use crate::protocol::{AgentClient, ClientFactory};

/// Upper bound on concurrent connectivity checks.
pub const MAX_CHECK_WORKERS: usize = 10;

/// Registry behavior knobs, derived from [`SwitchboardConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Admit every configured agent without network I/O.
    pub skip_connectivity_check: bool,
    /// Policy for [`AgentRegistry::initialize`] and full refreshes.
    pub policy: RetryPolicy,
    /// Policy for fast refreshes.
    pub fast_policy: RetryPolicy,
    /// Delay before the first check cycle.
    pub startup_delay: Duration,
    /// Concurrent check limit.
    pub max_workers: usize,
    /// How long [`AgentRegistry::stop_background_monitoring`] waits.
    pub shutdown_grace: Duration,
}

impl RegistrySettings {
    /// Derives settings from configuration.
    #[must_use]
    pub const fn from_config(config: &SwitchboardConfig) -> Self {
        Self {
            skip_connectivity_check: config.skip_connectivity_check,
            policy: config.retry_policy(false),
            fast_policy: config.retry_policy(true),
            startup_delay: config.connectivity_startup_delay,
            max_workers: MAX_CHECK_WORKERS,
            shutdown_grace: config.monitor_shutdown_grace,
        }
    }
}

/// Check state of one configured agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Not checked yet.
    Unknown,
    /// In the active set.
    Active,
    /// Excluded by the last check.
    Excluded,
}

/// Bookkeeping for one configured agent.
#[derive(Debug, Clone, Serialize)]
pub struct RegistryEntry {
    /// Agent key.
    pub key: AgentKey,
    /// Configured base URL.
    pub url: String,
    /// Check state.
    pub state: EntryState,
    /// Descriptor from the last successful check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<AgentDescriptor>,
    /// Why the agent was excluded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the agent was last checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    fn unchecked(endpoint: &AgentEndpoint) -> Self {
        Self {
            key: endpoint.key.clone(),
            url: endpoint.url.clone(),
            state: EntryState::Unknown,
            descriptor: None,
            reason: None,
            last_checked: None,
        }
    }

    /// Result of the last check, if any.
    #[must_use]
    pub const fn reachable(&self) -> Option<bool> {
        match self.state {
            EntryState::Unknown => None,
            EntryState::Active => Some(true),
            EntryState::Excluded => Some(false),
        }
    }
}

/// Difference between two active sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryChange {
    /// Agents that joined.
    pub added: Vec<AgentKey>,
    /// Agents that left.
    pub removed: Vec<AgentKey>,
    /// The new active set, in configured order.
    pub active: Vec<AgentKey>,
}

impl RegistryChange {
    /// Whether the active set changed at all.
    #[must_use]
    pub fn is_change(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty()
    }
}

/// Invoked after an active-set swap that changed membership.
pub type ChangeCallback = Arc<dyn Fn(&RegistryChange) + Send + Sync>;

#[derive(Clone)]
struct ActiveAgent {
    descriptor: AgentDescriptor,
    client: Arc<dyn AgentClient>,
}

/// Snapshot of admitted agents. Replaced wholesale, never mutated.
#[derive(Clone, Default)]
struct ActiveSet {
    order: Vec<AgentKey>,
    agents: HashMap<AgentKey, ActiveAgent>,
}

impl ActiveSet {
    fn diff(&self, next: &Self) -> RegistryChange {
        RegistryChange {
            added: next
                .order
                .iter()
                .filter(|k| !self.agents.contains_key(*k))
                .cloned()
                .collect(),
            removed: self
                .order
                .iter()
                .filter(|k| !next.agents.contains_key(*k))
                .cloned()
                .collect(),
            active: next.order.clone(),
        }
    }
}

/// Tracks which configured agents are usable.
///
/// Readers see either the old or the new active set, never a mixture:
/// each check cycle builds a complete replacement and swaps it in under a
/// short write lock. Cycles run one at a time, so an older cycle never
/// overwrites the result of a newer one.
pub struct AgentRegistry {
    endpoints: Vec<AgentEndpoint>,
    settings: RegistrySettings,
    checker: ConnectivityChecker,
    factory: Arc<dyn ClientFactory>,
    cycle: CycleLock<()>,
    active: RwLock<Arc<ActiveSet>>,
    entries: Mutex<HashMap<AgentKey, RegistryEntry>>,
    on_change: Mutex<Option<ChangeCallback>>,
    pub(super) monitor: Mutex<Option<MonitorHandle>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("endpoints", &self.endpoints)
            .field("settings", &self.settings)
            .field("active", &self.active_keys())
            .finish_non_exhaustive()
    }
}

impl AgentRegistry {
    /// Creates a registry over `endpoints`. Nothing is active until
    /// [`initialize`](Self::initialize) runs.
    #[must_use]
    pub fn new(
        endpoints: Vec<AgentEndpoint>,
        settings: RegistrySettings,
        checker: ConnectivityChecker,
        factory: Arc<dyn ClientFactory>,
    ) -> Self {
        let entries = endpoints
            .iter()
            .map(|e| (e.key.clone(), RegistryEntry::unchecked(e)))
            .collect();
        Self {
            endpoints,
            settings,
            checker,
            factory,
            cycle: CycleLock::new(()),
            active: RwLock::new(Arc::new(ActiveSet::default())),
            entries: Mutex::new(entries),
            on_change: Mutex::new(None),
            monitor: Mutex::new(None),
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Registers the callback fired after membership changes. Replaces any
    /// previous callback.
    pub fn set_change_callback(&self, callback: ChangeCallback) {
        *self.on_change.lock() = Some(callback);
    }

    /// Runs the first check cycle and installs the active set.
    ///
    /// Returns the active keys. Unreachable or mismatched agents are
    /// logged and excluded; they never fail initialization.
    pub async fn initialize(&self) -> Vec<AgentKey> {
        if !self.settings.skip_connectivity_check && !self.settings.startup_delay.is_zero() {
            debug!(
                delay_ms = u64::try_from(self.settings.startup_delay.as_millis()).unwrap_or(u64::MAX),
                "waiting before first connectivity check"
            );
            tokio::time::sleep(self.settings.startup_delay).await;
        }

        let change = self.checked_install(&self.settings.policy).await;
        info!(
            configured = self.endpoints.len(),
            active = change.active.len(),
            agents = ?change.active,
            "agent registry initialized"
        );
        change.active
    }

    /// Re-checks every configured agent and swaps in the new active set.
    ///
    /// With `fast` the fast policy applies (short timeout, no retries).
    /// Returns `true` if membership changed; the change callback has
    /// already run by then.
    pub async fn refresh(&self, fast: bool) -> bool {
        let policy = if fast {
            self.settings.fast_policy
        } else {
            self.settings.policy
        };
        let change = self.checked_install(&policy).await;

        if !change.is_change() {
            debug!(active = change.active.len(), "registry refresh: no change");
            return false;
        }

        info!(
            added = ?change.added,
            removed = ?change.removed,
            active = change.active.len(),
            "active agent set changed"
        );
        let callback = self.on_change.lock().clone();
        if let Some(callback) = callback {
            callback(&change);
        }
        true
    }

    /// Client for an active agent.
    #[must_use]
    pub fn get_client(&self, key: &str) -> Option<Arc<dyn AgentClient>> {
        let key = AgentKey::new(key);
        self.snapshot()
            .agents
            .get(&key)
            .map(|a| Arc::clone(&a.client))
    }

    /// Descriptors of active agents.
    #[must_use]
    pub fn active_agents(&self) -> HashMap<AgentKey, AgentDescriptor> {
        self.snapshot()
            .agents
            .iter()
            .map(|(k, a)| (k.clone(), a.descriptor.clone()))
            .collect()
    }

    /// Active keys in configured order.
    #[must_use]
    pub fn active_keys(&self) -> Vec<AgentKey> {
        self.snapshot().order.clone()
    }

    /// Bookkeeping for every configured agent, in configured order.
    #[must_use]
    pub fn entries(&self) -> Vec<RegistryEntry> {
        let entries = self.entries.lock();
        self.endpoints
            .iter()
            .filter_map(|e| entries.get(&e.key).cloned())
            .collect()
    }

    fn snapshot(&self) -> Arc<ActiveSet> {
        Arc::clone(&self.active.read())
    }

    /// Runs one check cycle and installs its result while holding the
    /// cycle lock.
    async fn checked_install(&self, policy: &RetryPolicy) -> RegistryChange {
        let _cycle = self.cycle.lock().await;
        let outcomes = self.run_cycle(policy).await;
        self.install(outcomes)
    }

    async fn run_cycle(&self, policy: &RetryPolicy) -> Vec<CheckOutcome> {
        if self.settings.skip_connectivity_check {
            return self
                .endpoints
                .iter()
                .map(|e| CheckOutcome::reachable(e.clone(), AgentDescriptor::synthesized(e), 0))
                .collect();
        }

        let workers = self.endpoints.len().clamp(1, self.settings.max_workers.max(1));
        let semaphore = Arc::new(Semaphore::new(workers));
        let handles: Vec<_> = self
            .endpoints
            .iter()
            .map(|endpoint| {
                let semaphore = Arc::clone(&semaphore);
                let checker = self.checker.clone();
                let endpoint = endpoint.clone();
                let policy = *policy;
                tokio::spawn(async move {
                    let Ok(_permit) = semaphore.acquire_owned().await else {
                        let err = ConnectivityError::Unreachable {
                            url: endpoint.descriptor_url(),
                            message: "check pool closed".to_string(),
                        };
                        return CheckOutcome::excluded(endpoint, err, 0);
                    };
                    checker.check(&endpoint, &policy).await
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (endpoint, handle) in self.endpoints.iter().zip(handles) {
            let outcome = handle.await.unwrap_or_else(|e| {
                let err = ConnectivityError::Unreachable {
                    url: endpoint.descriptor_url(),
                    message: format!("check task failed: {e}"),
                };
                CheckOutcome::excluded(endpoint.clone(), err, 0)
            });
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Builds the replacement set, swaps it in, and updates bookkeeping.
    fn install(&self, outcomes: Vec<CheckOutcome>) -> RegistryChange {
        let checked_at = Utc::now();
        let mut next = ActiveSet::default();
        let mut updates = Vec::with_capacity(outcomes.len());

        for outcome in outcomes {
            let CheckOutcome {
                endpoint,
                descriptor,
                error,
                ..
            } = outcome;

            let mut entry = RegistryEntry::unchecked(&endpoint);
            entry.last_checked = Some(checked_at);
            match (descriptor, error) {
                (Some(descriptor), _) => {
                    let client = self.factory.build(&endpoint, &descriptor);
                    entry.state = EntryState::Active;
                    entry.descriptor = Some(descriptor.clone());
                    next.order.push(endpoint.key.clone());
                    next.agents
                        .insert(endpoint.key.clone(), ActiveAgent { descriptor, client });
                }
                (None, error) => {
                    let reason = error.map_or_else(|| "excluded".to_string(), |e| e.to_string());
                    warn!(agent = %endpoint.key, url = %endpoint.url, reason = %reason, "agent excluded");
                    entry.state = EntryState::Excluded;
                    entry.reason = Some(reason);
                }
            }
            updates.push(entry);
        }

        let next = Arc::new(next);
        let previous = std::mem::replace(&mut *self.active.write(), Arc::clone(&next));

        let mut entries = self.entries.lock();
        for entry in updates {
            entries.insert(entry.key.clone(), entry);
        }
        drop(entries);

        previous.diff(&next)
    }
}
