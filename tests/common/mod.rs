//! Fake remote agent for integration tests.
//!
//! Serves a descriptor at `/.well-known/agent.json` and answers `POST /`
//! with a canned SSE body.

#![allow(dead_code, clippy::unwrap_used)]

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Behavior of one fake agent.
#[derive(Debug, Clone)]
pub struct FakeAgent {
    /// Name advertised in the descriptor.
    pub name: String,
    /// Status for descriptor requests.
    pub descriptor_status: StatusCode,
    /// Raw descriptor body; `None` serves a valid descriptor.
    pub descriptor_body: Option<String>,
    /// Status for streaming requests.
    pub stream_status: StatusCode,
    /// JSON payloads sent as `data:` frames.
    pub frames: Vec<String>,
}

impl FakeAgent {
    pub fn new(name: &str, frames: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            descriptor_status: StatusCode::OK,
            descriptor_body: None,
            stream_status: StatusCode::OK,
            frames,
        }
    }
}

#[derive(Clone)]
struct AgentState {
    agent: FakeAgent,
    base_url: String,
    requests: Arc<Mutex<Vec<Value>>>,
}

/// A running fake agent.
pub struct RunningAgent {
    pub url: String,
    pub requests: Arc<Mutex<Vec<Value>>>,
}

/// Binds a fake agent on a random local port.
pub async fn spawn_agent(agent: FakeAgent) -> RunningAgent {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));

    let state = AgentState {
        agent,
        base_url: url.clone(),
        requests: Arc::clone(&requests),
    };
    let router = Router::new()
        .route("/.well-known/agent.json", get(descriptor))
        .route("/", post(stream))
        .with_state(state);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    RunningAgent { url, requests }
}

/// A URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    url
}

async fn descriptor(State(state): State<AgentState>) -> Response {
    if state.agent.descriptor_status != StatusCode::OK {
        return state.agent.descriptor_status.into_response();
    }
    if let Some(body) = &state.agent.descriptor_body {
        return ([(header::CONTENT_TYPE, "application/json")], body.clone()).into_response();
    }
    Json(json!({
        "name": state.agent.name,
        "description": "fake agent",
        "url": state.base_url,
        "skills": [],
    }))
    .into_response()
}

async fn stream(State(state): State<AgentState>, Json(body): Json<Value>) -> Response {
    state.requests.lock().push(body);
    if state.agent.stream_status != StatusCode::OK {
        return state.agent.stream_status.into_response();
    }
    let sse: String = state
        .agent
        .frames
        .iter()
        .map(|frame| format!("data: {frame}\n\n"))
        .collect();
    ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response()
}

/// An enveloped `streaming_result` chunk.
pub fn chunk_frame(text: &str) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": "1",
        "result": {
            "kind": "artifact-update",
            "artifact": {
                "artifactId": "remote-1",
                "name": "streaming_result",
                "parts": [{"kind": "text", "text": text}],
            },
            "append": true,
            "lastChunk": false,
        },
    })
    .to_string()
}

/// A bare terminal status update.
pub fn status_frame(state: &str, message: Option<&str>) -> String {
    let mut status = json!({"state": state});
    if let Some(text) = message {
        status["message"] = json!({"role": "agent", "parts": [{"kind": "text", "text": text}]});
    }
    json!({"kind": "status-update", "status": status, "final": true}).to_string()
}
