//! # switchboard
//!
//! Routing and fan-out coordinator for remote streaming agents.
//!
//! A query enters through the CLI or the HTTP API, is classified by a
//! keyword router, and is executed against one agent, several agents in
//! parallel, or an orchestration backend. Every remote stream is
//! normalized into the same small event model before it reaches the
//! caller.
//!
//! ## Architecture
//!
//! ```text
//!  query ──► Coordinator ──► QueryRouter ──► RoutingDecision
//!                 │                               │
//!                 │                ┌──────────────┼──────────────┐
//!                 ▼                ▼              ▼              ▼
//!          AgentRegistry        direct        parallel        complex
//!          (active set,           │              │              │
//!           monitoring)           └──────► StreamingExecutor ◄──┘
//!                 │                              │
//!                 ▼                              ▼
//!          descriptor checks           StreamEvent stream
//! ```
//!
//! ## Modules
//!
//! - [`registry`]: descriptor checks, the active set, background monitoring
//! - [`router`]: keyword classification and routing modes
//! - [`executor`]: streaming execution, normalization, fallback
//! - [`protocol`]: JSON-RPC request and SSE response handling
//! - [`coordinator`]: ties the three together
//! - [`server`], [`cli`]: outer surfaces

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod error;
pub mod executor;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{SwitchboardConfig, SwitchboardConfigBuilder};
pub use coordinator::Coordinator;
pub use crate::core::{
    AgentDescriptor, AgentEndpoint, AgentKey, RouteKind, RoutingDecision, StreamEvent, TaskState,
};
pub use error::{Error, Result};
pub use executor::{EventStream, QueryRequest, StreamingExecutor};
pub use registry::{AgentRegistry, RegistryChange, RegistryEntry};
pub use router::{QueryRouter, RoutingMode};
