//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::coordinator::Coordinator;
use crate::core::{RoutingDecision, StreamEvent};
use crate::error::{Error, ExecutionError, RouterError};
use crate::executor::QueryRequest;
use crate::registry::RegistryEntry;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` when the server answers.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
    /// Size of the active set.
    pub active_agents: usize,
    /// Whether background monitoring is running.
    pub monitoring: bool,
}

/// Body of `/route` and `/query`.
#[derive(Debug, Deserialize)]
pub struct QueryBody {
    /// Query text.
    pub query: String,
    /// Trace identifier propagated to agents.
    #[serde(default)]
    pub trace_id: Option<String>,
}

impl From<QueryBody> for QueryRequest {
    fn from(body: QueryBody) -> Self {
        Self::new(body.query, body.trace_id)
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
    /// Stable error code.
    pub code: &'static str,
    #[serde(skip)]
    status: StatusCode,
}

impl From<Error> for ErrorResponse {
    fn from(err: Error) -> Self {
        let (status, code) = match &err {
            Error::Router(RouterError::NoAgentsConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "NO_AGENTS")
            }
            Error::Execution(ExecutionError::InvalidQuery { .. }) => {
                (StatusCode::BAD_REQUEST, "INVALID_QUERY")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        Self {
            error: err.to_string(),
            code,
            status,
        }
    }
}

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Health check endpoint.
pub async fn health(State(coordinator): State<Arc<Coordinator>>) -> Json<HealthResponse> {
    let registry = coordinator.registry();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        active_agents: registry.active_keys().len(),
        monitoring: registry.is_monitoring(),
    })
}

/// Lists every configured agent with its check state.
pub async fn agents(State(coordinator): State<Arc<Coordinator>>) -> Json<Vec<RegistryEntry>> {
    Json(coordinator.registry().entries())
}

/// Routes a query without executing it.
pub async fn route(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<QueryBody>,
) -> Result<Json<RoutingDecision>, ErrorResponse> {
    let decision = coordinator.decide(&body.into())?;
    Ok(Json(decision))
}

/// Routes and executes a query, streaming events as server-sent events.
///
/// The first event (`route`) carries the routing decision; every event
/// after it is a [`StreamEvent`] named after its kind.
pub async fn query(
    State(coordinator): State<Arc<Coordinator>>,
    Json(body): Json<QueryBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ErrorResponse> {
    info!(
        query_preview = %body.query.chars().take(50).collect::<String>(),
        "received query"
    );
    let (decision, events) = coordinator.handle(body.into())?;

    let head = stream::once(async move { sse_event("route", &decision) });
    let body = events.map(|event| {
        let kind = match &event {
            StreamEvent::ArtifactUpdate { .. } => "artifact-update",
            StreamEvent::StatusUpdate { .. } => "status-update",
        };
        sse_event(kind, &event)
    });

    Ok(Sse::new(head.chain(body).map(Ok)).keep_alive(KeepAlive::default()))
}

fn sse_event<T: Serialize>(name: &str, value: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(value)
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to serialize event");
            Event::default().event("error").data(e.to_string())
        })
}
