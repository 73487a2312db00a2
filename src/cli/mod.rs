//! CLI layer for switchboard.
//!
//! Provides the command-line interface using clap, with commands for
//! inspecting the registry, routing and executing queries, monitoring,
//! and serving the HTTP API.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::execute;
pub use output::OutputFormat;
pub use parser::{Cli, Commands};
