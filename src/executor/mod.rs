//! Streaming executor.
//!
//! Executes a [`RoutingDecision`] and streams normalized events back to the
//! caller:
//!
//! - **Direct**: one agent, events forwarded as they arrive.
//! - **Parallel**: every agent concurrently, results aggregated into one
//!   artifact once all calls settle.
//! - **Complex**: handed to the orchestrator with the agents as a hint.
//!
//! A direct call that fails before delivering content falls back to the
//! complex path. Once content has reached the caller there is no fallback;
//! the query finishes with what was delivered.
//!
//! Every query ends with exactly one terminal status update.

mod direct;
mod fallback;
mod normalize;
mod parallel;

pub use normalize::{
    EventNormalizer, FINAL_ARTIFACT, Normalized, PARALLEL_ARTIFACT, PLAN_ARTIFACT,
    PLAN_END_MARKER, PLAN_START_MARKER, STREAMING_ARTIFACT, new_artifact_id,
};
pub use parallel::render_sections;

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::core::{RouteKind, RoutingDecision, StreamEvent, TaskState};
use crate::error::{ExecutionError, StreamError};
use crate::protocol::{AgentClient, StreamRequest};
use crate::registry::AgentRegistry;

/// Longest accepted query, in bytes.
pub const MAX_QUERY_BYTES: usize = 10_000;

/// Events buffered between the executor task and a slow consumer.
pub const EVENT_BUFFER: usize = 64;

/// Outbound event stream for one query.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// A query as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    /// Query text.
    pub query: String,
    /// Trace identifier forwarded to agents.
    pub trace_id: Option<String>,
}

impl QueryRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(query: impl Into<String>, trace_id: Option<String>) -> Self {
        Self {
            query: query.into(),
            trace_id,
        }
    }

    /// Rejects empty and oversized queries.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError::InvalidQuery`].
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.query.trim().is_empty() {
            return Err(ExecutionError::InvalidQuery {
                message: "query is empty".to_string(),
            });
        }
        if self.query.len() > MAX_QUERY_BYTES {
            return Err(ExecutionError::InvalidQuery {
                message: format!(
                    "query is {} bytes; the limit is {MAX_QUERY_BYTES}",
                    self.query.len()
                ),
            });
        }
        Ok(())
    }

    fn stream_request(&self) -> StreamRequest {
        StreamRequest::new(self.query.clone(), self.trace_id.clone())
    }
}

/// Lifecycle of one query, logged as it moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    /// Decision received, nothing sent.
    Idle,
    /// Receiving frames from an agent or the orchestrator.
    Streaming,
    /// Direct path failed before content; re-running as complex.
    FallingBack,
    /// Terminal: completed (or input required).
    Completed,
    /// Terminal: failed.
    Failed,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::FallingBack => "falling_back",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

#[derive(Debug)]
struct StateLog {
    state: ExecutionState,
}

impl StateLog {
    const fn new() -> Self {
        Self {
            state: ExecutionState::Idle,
        }
    }

    fn enter(&mut self, next: ExecutionState) {
        debug!(from = %self.state, to = %next, "execution state");
        self.state = next;
    }
}

/// Write side of an outbound stream. Enforces a single terminal status.
#[derive(Debug)]
pub struct EventSink {
    tx: mpsc::Sender<StreamEvent>,
    terminated: AtomicBool,
}

impl EventSink {
    /// Wraps a channel sender.
    #[must_use]
    pub const fn new(tx: mpsc::Sender<StreamEvent>) -> Self {
        Self {
            tx,
            terminated: AtomicBool::new(false),
        }
    }

    /// Sends an event. Returns `false` if the receiver is gone or the
    /// query has already terminated.
    pub async fn send(&self, event: StreamEvent) -> bool {
        if let StreamEvent::StatusUpdate { state, message } = &event
            && state.is_terminal()
        {
            return self.terminate(*state, message.clone()).await;
        }
        if self.is_terminated() {
            debug!("dropping event sent after terminal status");
            return false;
        }
        self.tx.send(event).await.is_ok()
    }

    /// Sends the terminal status. Only the first call has any effect.
    pub async fn terminate(&self, state: TaskState, message: Option<String>) -> bool {
        if self.terminated.swap(true, Ordering::SeqCst) {
            warn!(state = %state, "suppressing second terminal status");
            return false;
        }
        self.tx.send(StreamEvent::status(state, message)).await.is_ok()
    }

    /// Whether a terminal status has been sent.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

/// How a provider stream ended.
#[derive(Debug)]
pub(crate) enum PumpOutcome {
    /// The provider reported a terminal state.
    Terminal(TaskState, Option<String>),
    /// The stream closed without a terminal state.
    Ended,
    /// The call or the stream failed.
    Failed(StreamError),
    /// The caller went away.
    Disconnected,
}

/// Drains `client`'s stream through `normalizer`, forwarding to `sink`
/// when given.
pub(crate) async fn pump(
    client: &dyn AgentClient,
    request: &StreamRequest,
    normalizer: &mut EventNormalizer,
    sink: Option<&EventSink>,
) -> PumpOutcome {
    let mut stream = match client.stream(request).await {
        Ok(stream) => stream,
        Err(e) => return PumpOutcome::Failed(e),
    };

    while let Some(item) = stream.next().await {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => return PumpOutcome::Failed(e),
        };
        let Normalized { events, terminal } = normalizer.normalize(frame);
        if let Some(sink) = sink {
            for event in events {
                if !sink.send(event).await {
                    return PumpOutcome::Disconnected;
                }
            }
        }
        if let Some((state, message)) = terminal {
            return PumpOutcome::Terminal(state, message);
        }
    }
    PumpOutcome::Ended
}

/// Executes routing decisions against the registry's agents.
#[derive(Clone)]
pub struct StreamingExecutor {
    registry: Arc<AgentRegistry>,
    orchestrator: Option<Arc<dyn AgentClient>>,
}

impl fmt::Debug for StreamingExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingExecutor")
            .field("registry", &self.registry)
            .field("orchestrator", &self.orchestrator.as_ref().map(|o| o.key().clone()))
            .finish()
    }
}

impl StreamingExecutor {
    /// Creates an executor. Without an orchestrator, complex queries fail
    /// with an explanatory status.
    #[must_use]
    pub fn new(registry: Arc<AgentRegistry>, orchestrator: Option<Arc<dyn AgentClient>>) -> Self {
        Self {
            registry,
            orchestrator,
        }
    }

    /// Spawns execution and returns the outbound stream.
    ///
    /// Dropping the stream cancels in-flight agent calls at their next
    /// event.
    #[must_use]
    pub fn execute(&self, decision: RoutingDecision, request: QueryRequest) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let executor = self.clone();
        let span = info_span!(
            "query",
            route = %decision.kind,
            trace_id = request.trace_id.as_deref().unwrap_or_default()
        );
        tokio::spawn(
            async move {
                let sink = EventSink::new(tx);
                executor.run(&decision, &request, &sink).await;
            }
            .instrument(span),
        );
        Box::pin(ReceiverStream::new(rx))
    }

    /// Executes `decision`, writing every event to `sink`.
    ///
    /// Returns the terminal state sent (`Failed` if the caller went away
    /// first).
    pub async fn run(
        &self,
        decision: &RoutingDecision,
        request: &QueryRequest,
        sink: &EventSink,
    ) -> TaskState {
        info!(decision = %decision, "executing query");
        let mut log = StateLog::new();

        let state = match decision.kind {
            RouteKind::Direct => match decision.agents.first() {
                Some(agent) => self.run_direct(agent, request, sink, &mut log).await,
                None => self.run_complex(Vec::new(), request, sink, &mut log).await,
            },
            RouteKind::Parallel => self.run_parallel(&decision.agents, request, sink, &mut log).await,
            RouteKind::Complex => {
                self.run_complex(decision.agents.clone(), request, sink, &mut log)
                    .await
            }
        };

        if !sink.is_terminated() {
            sink.terminate(TaskState::Failed, Some("execution ended without a result".to_string()))
                .await;
        }
        log.enter(if state == TaskState::Failed {
            ExecutionState::Failed
        } else {
            ExecutionState::Completed
        });
        info!(state = %state, "query finished");
        state
    }

    /// Sends closing events and the terminal status.
    async fn finalize(
        normalizer: &mut EventNormalizer,
        state: TaskState,
        message: Option<String>,
        sink: &EventSink,
    ) -> TaskState {
        for event in normalizer.finish(state) {
            if !sink.send(event).await {
                return TaskState::Failed;
            }
        }
        sink.terminate(state, message).await;
        state
    }
}
