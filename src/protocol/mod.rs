//! Streaming RPC protocol spoken by remote agents.
//!
//! A call is a JSON-RPC 2.0 `message/stream` POST; the reply is an SSE
//! stream of frames. [`AgentClient`] is the seam the executor talks to.

mod client;
mod sse;
mod wire;

pub use client::{
    AgentClient, ClientFactory, HttpAgentClient, HttpClientFactory, ProviderStream, decode_frames,
};
pub use sse::SseDecoder;
pub use wire::{
    Artifact, ArtifactUpdateFrame, JsonRpcRequest, Message, Part, ProviderEvent, STREAM_METHOD,
    StatusUpdateFrame, StreamRequest, TaskFrame, TaskStatus, parse_frame, text_of,
};
