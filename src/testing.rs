//! Fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::Mutex;

use crate::core::{AgentDescriptor, AgentEndpoint, AgentKey};
use crate::error::{ConnectivityError, StreamError};
use crate::protocol::{
    AgentClient, Artifact, ArtifactUpdateFrame, ClientFactory, Message, Part, ProviderEvent,
    ProviderStream, StatusUpdateFrame, StreamRequest, TaskStatus,
};
use crate::registry::{DescriptorFetcher, Sleeper};

pub(crate) fn descriptor_named(name: &str) -> AgentDescriptor {
    AgentDescriptor {
        name: name.to_string(),
        description: String::new(),
        skills: Vec::new(),
        url: "http://localhost:8000".to_string(),
    }
}

/// Replays scripted fetch results; repeats the last one when exhausted.
pub(crate) struct ScriptedFetcher {
    script: Mutex<VecDeque<Result<AgentDescriptor, ConnectivityError>>>,
    pub(crate) calls: Mutex<Vec<Duration>>,
}

impl ScriptedFetcher {
    pub(crate) fn new(script: Vec<Result<AgentDescriptor, ConnectivityError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DescriptorFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        _endpoint: &AgentEndpoint,
        timeout: Duration,
    ) -> Result<AgentDescriptor, ConnectivityError> {
        self.calls.lock().push(timeout);
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front().unwrap_or_else(|| unreachable!())
        } else {
            script.front().cloned().unwrap_or_else(|| unreachable!())
        }
    }
}

/// Per-agent fetch results that tests can change between cycles.
#[derive(Default)]
pub(crate) struct MapFetcher {
    results: Mutex<HashMap<AgentKey, Result<AgentDescriptor, ConnectivityError>>>,
    calls: AtomicUsize,
}

impl MapFetcher {
    pub(crate) fn set(&self, key: &str, result: Result<AgentDescriptor, ConnectivityError>) {
        self.results.lock().insert(AgentKey::new(key), result);
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DescriptorFetcher for MapFetcher {
    async fn fetch(
        &self,
        endpoint: &AgentEndpoint,
        _timeout: Duration,
    ) -> Result<AgentDescriptor, ConnectivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .get(&endpoint.key)
            .cloned()
            .unwrap_or_else(|| {
                Err(ConnectivityError::Unreachable {
                    url: endpoint.descriptor_url(),
                    message: "no scripted result".to_string(),
                })
            })
    }
}

/// Records requested sleeps without waiting.
#[derive(Default)]
pub(crate) struct RecordingSleeper {
    pub(crate) sleeps: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}

/// Agent client replaying a fixed frame script.
pub(crate) struct ScriptedClient {
    key: AgentKey,
    open: Result<Vec<Result<ProviderEvent, StreamError>>, StreamError>,
    calls: AtomicUsize,
    pub(crate) requests: Mutex<Vec<StreamRequest>>,
}

impl ScriptedClient {
    pub(crate) fn new(key: &str, frames: Vec<Result<ProviderEvent, StreamError>>) -> Self {
        Self {
            key: AgentKey::new(key),
            open: Ok(frames),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn unreachable(key: &str) -> Self {
        Self {
            key: AgentKey::new(key),
            open: Err(StreamError::Unreachable {
                agent: key.to_string(),
                message: "connection refused".to_string(),
            }),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentClient for ScriptedClient {
    fn key(&self) -> &AgentKey {
        &self.key
    }

    async fn stream(&self, request: &StreamRequest) -> Result<ProviderStream, StreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        let frames = self.open.clone()?;
        Ok(Box::pin(stream::iter(frames)))
    }
}

/// Hands out pre-registered clients; unknown agents get an empty script.
#[derive(Default)]
pub(crate) struct StaticClientFactory {
    clients: Mutex<HashMap<AgentKey, Arc<dyn AgentClient>>>,
}

impl StaticClientFactory {
    pub(crate) fn with(self, client: Arc<dyn AgentClient>) -> Self {
        self.clients.lock().insert(client.key().clone(), client);
        self
    }
}

impl ClientFactory for StaticClientFactory {
    fn build(&self, endpoint: &AgentEndpoint, _descriptor: &AgentDescriptor) -> Arc<dyn AgentClient> {
        self.clients
            .lock()
            .get(&endpoint.key)
            .cloned()
            .unwrap_or_else(|| Arc::new(ScriptedClient::new(endpoint.key.as_str(), Vec::new())))
    }
}

pub(crate) fn artifact(name: &str, text: &str, last_chunk: bool) -> Result<ProviderEvent, StreamError> {
    Ok(ProviderEvent::ArtifactUpdate(ArtifactUpdateFrame {
        artifact: Artifact {
            artifact_id: format!("provider-{name}"),
            name: Some(name.to_string()),
            description: None,
            parts: vec![Part::text(text)],
        },
        append: true,
        last_chunk,
    }))
}

pub(crate) fn chunk(text: &str) -> Result<ProviderEvent, StreamError> {
    artifact("streaming_result", text, false)
}

pub(crate) fn status(state: &str, text: Option<&str>) -> Result<ProviderEvent, StreamError> {
    Ok(ProviderEvent::StatusUpdate(StatusUpdateFrame {
        status: TaskStatus {
            state: state.to_string(),
            message: text.map(|t| Message {
                role: "agent".to_string(),
                parts: vec![Part::text(t)],
                message_id: String::new(),
            }),
        },
        is_final: state != "working",
    }))
}
