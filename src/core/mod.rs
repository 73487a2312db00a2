//! Core value types shared by the registry, router, and executor.
//!
//! These types carry no I/O and no behavior beyond construction and
//! formatting, so every layer can depend on them freely.

pub mod agent;
pub mod decision;
pub mod event;

pub use agent::{AgentDescriptor, AgentEndpoint, AgentKey, AgentSkill};
pub use decision::{RouteKind, RoutingDecision};
pub use event::{StreamEvent, TaskState};
