//! Error types for switchboard.
//!
//! Each concern gets its own enum so callers can match on the failures
//! they actually handle. [`Error`] wraps them all for the CLI and server
//! layers.

use std::time::Duration;

use thiserror::Error;

/// Result alias used by the CLI and server layers.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Connectivity check failure.
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    /// Streaming call failure.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Routing failure.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Execution failure.
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Configuration failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Failures while fetching or validating an agent descriptor.
#[derive(Debug, Clone, Error)]
pub enum ConnectivityError {
    /// Timeout, refused connection, or any other transport failure.
    #[error("agent unreachable at {url}: {message}")]
    Unreachable {
        /// URL that was requested.
        url: String,
        /// Transport error detail.
        message: String,
    },

    /// The descriptor endpoint answered with a non-2xx status.
    #[error("descriptor request to {url} returned HTTP {status}")]
    BadStatus {
        /// URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The descriptor body was not valid JSON or lacked required fields.
    #[error("malformed descriptor from {url}: {message}")]
    MalformedDescriptor {
        /// URL that was requested.
        url: String,
        /// Decode error detail.
        message: String,
    },

    /// The descriptor does not identify the expected agent.
    #[error("descriptor '{found}' does not match agent '{expected}'")]
    IdentityMismatch {
        /// Agent key the endpoint was configured for.
        expected: String,
        /// Name reported by the descriptor.
        found: String,
    },
}

impl ConnectivityError {
    /// Returns `true` when a retry may succeed.
    ///
    /// Malformed descriptors and identity mismatches are deterministic:
    /// retrying cannot fix a wrong URL or a broken document.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::BadStatus { .. })
    }
}

/// Failures of a streaming call to a remote agent.
#[derive(Debug, Clone, Error)]
pub enum StreamError {
    /// The request could not be sent or the connection dropped.
    #[error("agent '{agent}' unreachable: {message}")]
    Unreachable {
        /// Agent key (or `orchestrator`).
        agent: String,
        /// Transport error detail.
        message: String,
    },

    /// Unrecognized frame shape, undecodable payload, or premature close.
    #[error("stream protocol error from '{agent}': {message}")]
    StreamProtocol {
        /// Agent key (or `orchestrator`).
        agent: String,
        /// What was wrong with the stream.
        message: String,
    },

    /// The agent answered with a JSON-RPC error object.
    #[error("agent '{agent}' returned error {code}: {message}")]
    Remote {
        /// Agent key (or `orchestrator`).
        agent: String,
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// No frame arrived within the idle timeout.
    #[error("agent '{agent}' sent nothing for {timeout:?}")]
    Timeout {
        /// Agent key (or `orchestrator`).
        agent: String,
        /// Idle timeout that elapsed.
        timeout: Duration,
    },
}

/// Routing failures.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The router was asked to route with no active agents.
    #[error("no agents configured or reachable; nothing to route to")]
    NoAgentsConfigured,
}

/// Execution failures.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Some, but not all, parallel calls failed.
    #[error("{failed} of {total} parallel agent calls failed")]
    AggregationPartialFailure {
        /// Number of failed calls.
        failed: usize,
        /// Number of calls launched.
        total: usize,
    },

    /// The agent is no longer in the active set.
    #[error("no active client for agent '{agent}'")]
    NoClient {
        /// Agent key.
        agent: String,
    },

    /// The query was rejected before routing.
    #[error("invalid query: {message}")]
    InvalidQuery {
        /// Why the query was rejected.
        message: String,
    },
}

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable held a value that could not be parsed.
    #[error("invalid value for {key}: '{value}' ({message})")]
    Invalid {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// Parse error detail.
        message: String,
    },
}

/// CLI command failures.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command could not complete.
    #[error("command failed: {0}")]
    ExecutionFailed(String),

    /// The result could not be rendered.
    #[error("output formatting failed: {0}")]
    OutputFormat(String),
}
