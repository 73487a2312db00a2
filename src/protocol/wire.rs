//! Wire types for the streaming RPC protocol.
//!
//! Outbound: a JSON-RPC 2.0 `message/stream` request. Inbound: frames
//! discriminated by `kind`, optionally wrapped in a JSON-RPC response
//! envelope. Providers vary; the inbound types are deliberately lenient
//! about optional fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::AgentKey;
use crate::error::StreamError;

/// JSON-RPC method used for streaming calls.
pub const STREAM_METHOD: &str = "message/stream";

/// One content part of a message or artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part kind (`"text"`, `"data"`, `"file"`); absent on some providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Text payload for text parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Part {
    /// Creates a text part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: Some(text.into()),
        }
    }
}

/// Concatenates the text of all text-bearing parts.
#[must_use]
pub fn text_of(parts: &[Part]) -> String {
    parts.iter().filter_map(|p| p.text.as_deref()).collect()
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// `"user"` or `"agent"`.
    #[serde(default = "default_role")]
    pub role: String,
    /// Message content.
    #[serde(default)]
    pub parts: Vec<Part>,
    /// Unique message identifier.
    #[serde(default)]
    pub message_id: String,
}

fn default_role() -> String {
    "agent".to_string()
}

impl Message {
    /// Creates a user text message with a fresh identifier.
    #[must_use]
    pub fn user_text(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
            message_id: Uuid::new_v4().to_string(),
        }
    }

    /// Text content of the message.
    #[must_use]
    pub fn text(&self) -> String {
        text_of(&self.parts)
    }
}

/// What the caller wants the remote agent to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequest {
    /// Raw query text, passed through verbatim.
    pub query: String,
    /// Trace identifier, passed through verbatim.
    pub trace_id: Option<String>,
    /// Agents already identified as relevant (orchestration hint).
    pub hint: Vec<AgentKey>,
}

impl StreamRequest {
    /// Creates a request for `query`.
    #[must_use]
    pub fn new(query: impl Into<String>, trace_id: Option<String>) -> Self {
        Self {
            query: query.into(),
            trace_id,
            hint: Vec::new(),
        }
    }

    /// Attaches an orchestration hint.
    #[must_use]
    pub fn with_hint(mut self, hint: Vec<AgentKey>) -> Self {
        self.hint = hint;
        self
    }
}

/// Parameters of a `message/stream` call.
#[derive(Debug, Clone, Serialize)]
pub struct MessageSendParams {
    /// The user message.
    pub message: Message,
    /// Trace id and orchestration hint, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// JSON-RPC request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    /// Always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Request identifier.
    pub id: String,
    /// Method name.
    pub method: &'static str,
    /// Call parameters.
    pub params: MessageSendParams,
}

impl JsonRpcRequest {
    /// Builds the streaming request body for `request`.
    #[must_use]
    pub fn stream(request: &StreamRequest) -> Self {
        let mut metadata = Map::new();
        if let Some(trace_id) = &request.trace_id {
            metadata.insert("trace_id".to_string(), Value::String(trace_id.clone()));
        }
        if !request.hint.is_empty() {
            metadata.insert(
                "orchestration_hint".to_string(),
                Value::Array(
                    request
                        .hint
                        .iter()
                        .map(|k| Value::String(k.to_string()))
                        .collect(),
                ),
            );
        }

        Self {
            jsonrpc: "2.0",
            id: Uuid::new_v4().to_string(),
            method: STREAM_METHOD,
            params: MessageSendParams {
                message: Message::user_text(&request.query),
                metadata: (!metadata.is_empty()).then_some(Value::Object(metadata)),
            },
        }
    }
}

/// Artifact carried by an `artifact-update` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Provider-assigned artifact identifier.
    #[serde(default)]
    pub artifact_id: String,
    /// Artifact name.
    #[serde(default)]
    pub name: Option<String>,
    /// Artifact description.
    #[serde(default)]
    pub description: Option<String>,
    /// Artifact content.
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Task status carried by `status-update` and `task` frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskStatus {
    /// Wire state string.
    pub state: String,
    /// Optional status message; some providers put final content here.
    #[serde(default)]
    pub message: Option<Message>,
}

/// `artifact-update` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUpdateFrame {
    /// The artifact chunk.
    pub artifact: Artifact,
    /// Whether the provider considers this an append.
    #[serde(default)]
    pub append: bool,
    /// Whether this is the provider's last chunk for the artifact.
    #[serde(default)]
    pub last_chunk: bool,
}

/// `status-update` frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdateFrame {
    /// New status.
    pub status: TaskStatus,
    /// Provider's end-of-stream hint.
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

/// `task` frame: a task snapshot, usually the first frame of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskFrame {
    /// Current status, if reported.
    #[serde(default)]
    pub status: Option<TaskStatus>,
    /// Artifacts produced so far.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

/// A provider-native inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ProviderEvent {
    /// Artifact chunk.
    ArtifactUpdate(ArtifactUpdateFrame),
    /// Status change.
    StatusUpdate(StatusUpdateFrame),
    /// Direct message reply.
    Message(Message),
    /// Task snapshot.
    Task(TaskFrame),
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Parses one SSE `data:` payload into a [`ProviderEvent`].
///
/// Accepts both enveloped (`{"jsonrpc": "2.0", "result": {...}}`) and bare
/// frames.
///
/// # Errors
///
/// Returns [`StreamError::Remote`] for JSON-RPC errors and
/// [`StreamError::StreamProtocol`] for undecodable or unrecognized frames.
pub fn parse_frame(agent: &str, payload: &str) -> Result<ProviderEvent, StreamError> {
    let protocol = |message: String| StreamError::StreamProtocol {
        agent: agent.to_string(),
        message,
    };

    let value: Value =
        serde_json::from_str(payload).map_err(|e| protocol(format!("invalid JSON frame: {e}")))?;

    let is_envelope = value.get("jsonrpc").is_some()
        || value.get("result").is_some()
        || value.get("error").is_some();

    let frame = if is_envelope {
        let envelope: JsonRpcResponse = serde_json::from_value(value)
            .map_err(|e| protocol(format!("invalid JSON-RPC envelope: {e}")))?;
        if let Some(error) = envelope.error {
            return Err(StreamError::Remote {
                agent: agent.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        envelope
            .result
            .ok_or_else(|| protocol("response carried neither result nor error".to_string()))?
    } else {
        value
    };

    serde_json::from_value(frame).map_err(|e| protocol(format!("unrecognized frame: {e}")))
}
