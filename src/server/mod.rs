//! HTTP API.
//!
//! - `GET /health` - liveness and active agent count
//! - `GET /agents` - registry entries
//! - `POST /route` - routing decision for `{query, trace_id}`
//! - `POST /query` - routing decision plus the event stream, as SSE

pub mod routes;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::coordinator::Coordinator;

/// Builds the API router.
pub fn create_router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/agents", get(routes::agents))
        .route("/route", post(routes::route))
        .route("/query", post(routes::query))
        .with_state(coordinator)
}

/// Starts the coordinator and serves the API until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(coordinator: Arc<Coordinator>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "switchboard listening");

    let ct = CancellationToken::new();
    let on_signal = ct.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        on_signal.cancel();
    });

    serve_until(coordinator, listener, ct).await
}

/// Serves the API on `listener` until `ct` is cancelled.
///
/// The coordinator is started first; background monitoring, when enabled,
/// is stopped before returning.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_until(
    coordinator: Arc<Coordinator>,
    listener: tokio::net::TcpListener,
    ct: CancellationToken,
) -> anyhow::Result<()> {
    let active = coordinator.start().await;
    info!(active = ?active, mode = %coordinator.mode(), "coordinator ready");

    let router = create_router(Arc::clone(&coordinator));
    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await;

    coordinator.shutdown().await;
    served?;
    Ok(())
}
