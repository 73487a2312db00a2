//! Streaming clients for remote agents.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use super::sse::SseDecoder;
use super::wire::{JsonRpcRequest, ProviderEvent, StreamRequest, parse_frame};
use crate::core::{AgentDescriptor, AgentEndpoint, AgentKey};
use crate::error::StreamError;

/// Stream of provider-native frames from one call.
pub type ProviderStream = Pin<Box<dyn Stream<Item = Result<ProviderEvent, StreamError>> + Send>>;

/// A remote agent that answers queries with a stream of frames.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Key of the agent behind this client.
    fn key(&self) -> &AgentKey;

    /// Opens a streaming call.
    ///
    /// # Errors
    ///
    /// Returns a [`StreamError`] if the call cannot be started. Errors
    /// after the stream opened are yielded as stream items; a yielded
    /// error is always the last item.
    async fn stream(&self, request: &StreamRequest) -> Result<ProviderStream, StreamError>;
}

/// Builds clients for agents admitted to the active set.
pub trait ClientFactory: Send + Sync {
    /// Creates the client for `endpoint`.
    fn build(&self, endpoint: &AgentEndpoint, descriptor: &AgentDescriptor) -> Arc<dyn AgentClient>;
}

/// JSON-RPC over HTTP with an SSE response body.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    key: AgentKey,
    url: String,
    http: reqwest::Client,
    idle_timeout: Duration,
}

impl HttpAgentClient {
    /// Creates a client posting to `url`.
    #[must_use]
    pub fn new(
        key: AgentKey,
        url: impl Into<String>,
        http: reqwest::Client,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            key,
            url: url.into(),
            http,
            idle_timeout,
        }
    }

    /// URL the client posts to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    fn key(&self) -> &AgentKey {
        &self.key
    }

    async fn stream(&self, request: &StreamRequest) -> Result<ProviderStream, StreamError> {
        let agent = self.key.to_string();
        let body = JsonRpcRequest::stream(request);
        debug!(agent = %agent, url = %self.url, request_id = %body.id, "opening stream");

        let send = self
            .http
            .post(&self.url)
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send();
        let response = tokio::time::timeout(self.idle_timeout, send)
            .await
            .map_err(|_| StreamError::Timeout {
                agent: agent.clone(),
                timeout: self.idle_timeout,
            })?
            .map_err(|e| StreamError::Unreachable {
                agent: agent.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::Unreachable {
                agent,
                message: format!("HTTP {status}"),
            });
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));
        if !is_event_stream {
            // Non-streaming providers answer with one JSON-RPC response.
            let payload = response.text().await.map_err(|e| StreamError::Unreachable {
                agent: agent.clone(),
                message: e.to_string(),
            })?;
            let frame = parse_frame(&agent, &payload);
            return Ok(Box::pin(stream::once(async move { frame })));
        }

        Ok(Box::pin(decode_frames(
            agent,
            response.bytes_stream(),
            self.idle_timeout,
        )))
    }
}

struct FrameState<S> {
    bytes: Pin<Box<S>>,
    decoder: SseDecoder,
    queue: VecDeque<String>,
    finished: bool,
    agent: String,
    idle_timeout: Duration,
}

/// Decodes an SSE byte stream into provider frames.
///
/// Each wait for the next chunk is bounded by `idle_timeout`. The stream
/// ends after the first error.
pub fn decode_frames<S, B>(
    agent: String,
    bytes: S,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<ProviderEvent, StreamError>> + Send + 'static
where
    S: Stream<Item = Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = FrameState {
        bytes: Box::pin(bytes),
        decoder: SseDecoder::new(),
        queue: VecDeque::new(),
        finished: false,
        agent,
        idle_timeout,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(payload) = st.queue.pop_front() {
                let item = parse_frame(&st.agent, &payload);
                if item.is_err() {
                    st.finished = true;
                    st.queue.clear();
                }
                return Some((item, st));
            }
            if st.finished {
                return None;
            }

            match tokio::time::timeout(st.idle_timeout, st.bytes.next()).await {
                Err(_) => {
                    st.finished = true;
                    let err = StreamError::Timeout {
                        agent: st.agent.clone(),
                        timeout: st.idle_timeout,
                    };
                    return Some((Err(err), st));
                }
                Ok(None) => {
                    st.finished = true;
                    if let Some(last) = st.decoder.finish() {
                        st.queue.push_back(last);
                    }
                }
                Ok(Some(Err(e))) => {
                    st.finished = true;
                    let err = StreamError::Unreachable {
                        agent: st.agent.clone(),
                        message: e.to_string(),
                    };
                    return Some((Err(err), st));
                }
                Ok(Some(Ok(chunk))) => {
                    st.queue.extend(st.decoder.push(chunk.as_ref()));
                }
            }
        }
    })
}

/// Builds [`HttpAgentClient`]s sharing one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    http: reqwest::Client,
    idle_timeout: Duration,
}

impl HttpClientFactory {
    /// Creates a factory.
    #[must_use]
    pub const fn new(http: reqwest::Client, idle_timeout: Duration) -> Self {
        Self { http, idle_timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn build(&self, endpoint: &AgentEndpoint, _descriptor: &AgentDescriptor) -> Arc<dyn AgentClient> {
        Arc::new(HttpAgentClient::new(
            endpoint.key.clone(),
            endpoint.url.clone(),
            self.http.clone(),
            self.idle_timeout,
        ))
    }
}
