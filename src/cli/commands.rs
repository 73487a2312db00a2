//! CLI command implementations.
//!
//! Each command builds a [`Coordinator`] from the environment, runs on a
//! dedicated tokio runtime, and returns its rendered output.

// Allow certain patterns that improve readability in CLI output formatting
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::format_push_string)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::info;

use crate::cli::output::{OutputFormat, Transcript, format_decision, format_entries};
use crate::cli::parser::{Cli, Commands};
use crate::config::SwitchboardConfig;
use crate::coordinator::Coordinator;
use crate::core::{StreamEvent, TaskState};
use crate::error::{CommandError, ConfigError, Result};
use crate::executor::QueryRequest;
use crate::registry::RegistryChange;

/// Executes the CLI command.
///
/// # Arguments
///
/// * `cli` - Parsed CLI arguments.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the command fails.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let config = SwitchboardConfig::from_env()?;

    match &cli.command {
        Commands::Agents { check } => cmd_agents(config, *check, format),
        Commands::Route { query } => cmd_route(&config, query, format),
        Commands::Query { query, trace_id } => {
            cmd_query(&config, query, trace_id.clone(), format)
        }
        Commands::Monitor { interval } => cmd_monitor(config, *interval, format),
        Commands::Serve { host, port } => cmd_serve(&config, host, *port),
    }
}

/// Runs `future` to completion on a fresh multi-threaded runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CommandError::ExecutionFailed(format!("failed to start runtime: {e}")))?;
    Ok(runtime.block_on(future))
}

fn cmd_agents(mut config: SwitchboardConfig, check: bool, format: OutputFormat) -> Result<String> {
    if check {
        config.skip_connectivity_check = false;
        config.connectivity_startup_delay = Duration::ZERO;
    }
    config.background_monitoring_enabled = false;
    let coordinator = Coordinator::from_config(&config);

    let entries = block_on(async {
        coordinator.start().await;
        coordinator.registry().entries()
    })?;

    match format {
        OutputFormat::Text => Ok(format_entries(&entries)),
        OutputFormat::Json => Ok(format.to_json(&entries)),
        OutputFormat::Ndjson => Ok(entries
            .iter()
            .map(|e| format.to_json(e))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

fn cmd_route(config: &SwitchboardConfig, query: &str, format: OutputFormat) -> Result<String> {
    let coordinator = Coordinator::from_config(&without_monitoring(config));

    let decision = block_on(async {
        coordinator.start().await;
        coordinator.decide(&QueryRequest::new(query, None))
    })??;

    match format {
        OutputFormat::Text => Ok(format_decision(&decision)),
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&decision)),
    }
}

fn cmd_query(
    config: &SwitchboardConfig,
    query: &str,
    trace_id: Option<String>,
    format: OutputFormat,
) -> Result<String> {
    let coordinator = Coordinator::from_config(&without_monitoring(config));
    let request = QueryRequest::new(query, trace_id);

    let (decision, events) = block_on(async {
        coordinator.start().await;
        let (decision, stream) = coordinator.handle(request)?;
        let events: Vec<StreamEvent> = stream.collect().await;
        Ok::<_, crate::error::Error>((decision, events))
    })??;

    let transcript = Transcript::from_events(&events);
    let output = match format {
        OutputFormat::Text => transcript.render(&decision),
        OutputFormat::Json => format.to_json(&serde_json::json!({
            "decision": decision,
            "events": events,
        })),
        OutputFormat::Ndjson => events
            .iter()
            .map(|e| format.to_json(e))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    match transcript.state() {
        Some(TaskState::Failed) | None => Err(CommandError::ExecutionFailed(format!(
            "query did not complete\n{}",
            output
        ))
        .into()),
        Some(_) => Ok(output),
    }
}

fn cmd_monitor(
    mut config: SwitchboardConfig,
    interval: Option<f64>,
    format: OutputFormat,
) -> Result<String> {
    if let Some(seconds) = interval {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(ConfigError::Invalid {
                key: "--interval".to_string(),
                value: seconds.to_string(),
                message: "must be a positive number of seconds".to_string(),
            }
            .into());
        }
        config.background_refresh_interval = Duration::from_secs_f64(seconds);
    }
    config.background_monitoring_enabled = true;
    let coordinator = Coordinator::from_config(&config);

    coordinator
        .registry()
        .set_change_callback(Arc::new(|change: &RegistryChange| {
            info!(
                added = ?change.added,
                removed = ?change.removed,
                active = ?change.active,
                "active set changed"
            );
        }));

    let entries = block_on(async {
        let active = coordinator.start().await;
        info!(
            active = active.len(),
            interval = ?config.background_refresh_interval,
            "monitoring; press Ctrl-C to stop"
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        }
        coordinator.shutdown().await;
        coordinator.registry().entries()
    })?;

    match format {
        OutputFormat::Text => Ok(format_entries(&entries)),
        OutputFormat::Json | OutputFormat::Ndjson => Ok(format.to_json(&entries)),
    }
}

fn cmd_serve(config: &SwitchboardConfig, host: &str, port: u16) -> Result<String> {
    let coordinator = Arc::new(Coordinator::from_config(config));

    block_on(crate::server::serve(coordinator, host, port))?
        .map_err(|e| CommandError::ExecutionFailed(format!("{e:#}")))?;

    Ok(String::new())
}

/// One-shot commands never leave a monitor running.
fn without_monitoring(config: &SwitchboardConfig) -> SwitchboardConfig {
    let mut config = config.clone();
    config.background_monitoring_enabled = false;
    config
}
