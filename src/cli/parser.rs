//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};

/// Switchboard: routes queries across a fleet of streaming agents.
///
/// Agents are configured through environment variables; see
/// `SWITCHBOARD_AGENTS` and the `<KEY>_AGENT_URL` family.
#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json, ndjson).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured agents and their registry state.
    #[command(after_help = r#"Examples:
  switchboard agents                  # Registry as configured
  switchboard agents --check          # Fetch every descriptor first
  switchboard --format json agents | jq '.[].state'
"#)]
    Agents {
        /// Run connectivity checks even when skipping is configured.
        #[arg(short, long)]
        check: bool,
    },

    /// Show how a query would be routed, without executing it.
    #[command(after_help = r#"Examples:
  switchboard route "show me clusters in komodor"
  switchboard route "analyze github and komodor"
  switchboard --format json route "docs: deployment guide"
"#)]
    Route {
        /// Query text.
        query: String,
    },

    /// Route and execute a query, printing the result.
    #[command(after_help = r#"Examples:
  switchboard query "list open PRs in github"
  switchboard --format ndjson query "github and komodor status"
"#)]
    Query {
        /// Query text.
        query: String,

        /// Trace identifier propagated to every agent call.
        #[arg(short, long)]
        trace_id: Option<String>,
    },

    /// Run background monitoring in the foreground until interrupted.
    Monitor {
        /// Refresh interval in seconds (defaults to the configured value).
        #[arg(short, long)]
        interval: Option<f64>,
    },

    /// Serve the HTTP API.
    #[command(after_help = r#"Examples:
  switchboard serve                       # 127.0.0.1:8080
  switchboard serve --host 0.0.0.0 -p 9000
"#)]
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind.
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_query_with_trace() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "--format",
            "json",
            "query",
            "github status",
            "--trace-id",
            "t-1",
        ])
        .unwrap_or_else(|_| unreachable!());
        assert_eq!(cli.format, "json");
        match cli.command {
            Commands::Query { query, trace_id } => {
                assert_eq!(query, "github status");
                assert_eq!(trace_id.as_deref(), Some("t-1"));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["switchboard", "serve"]).unwrap_or_else(|_| unreachable!());
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 8080);
            }
            _ => unreachable!(),
        }
    }
}
