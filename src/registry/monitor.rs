//! Background re-checking of the agent registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::store::AgentRegistry;

/// Handle to a running monitor task.
pub(crate) struct MonitorHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AgentRegistry {
    /// Starts periodic fast refreshes every `interval`.
    ///
    /// Returns `false`, leaving the existing monitor alone, when one is
    /// already running. The task holds only a weak reference; dropping the
    /// last registry handle ends it.
    pub fn start_background_monitoring(self: &Arc<Self>, interval: Duration) -> bool {
        let mut slot = self.monitor.lock();
        if slot.as_ref().is_some_and(|m| !m.task.is_finished()) {
            warn!("background monitoring already running; ignoring start request");
            return false;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let registry = Arc::downgrade(self);

        let task = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "background monitoring started");
            let mut cycle: u64 = 0;
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    () = tokio::time::sleep(interval) => {}
                }
                let Some(registry) = registry.upgrade() else {
                    debug!("registry dropped; stopping monitor");
                    break;
                };

                cycle += 1;
                // A panicking cycle is logged and the loop carries on.
                match tokio::spawn(async move { registry.refresh(true).await }).await {
                    Ok(changed) => debug!(cycle, changed, "background refresh finished"),
                    Err(e) => error!(cycle, error = %e, "background refresh failed"),
                }
            }
            info!("background monitoring stopped");
        });

        *slot = Some(MonitorHandle { cancel, task });
        true
    }

    /// Signals the monitor to stop and waits up to the shutdown grace.
    ///
    /// Returns `true` if a monitor was running and stopped in time. A
    /// monitor that overruns the grace period is aborted.
    pub async fn stop_background_monitoring(&self) -> bool {
        let handle = self.monitor.lock().take();
        let Some(MonitorHandle { cancel, mut task }) = handle else {
            debug!("background monitoring not running");
            return false;
        };

        cancel.cancel();
        let grace = self.settings().shutdown_grace;
        match tokio::time::timeout(grace, &mut task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(error = %e, "monitor task ended abnormally");
                true
            }
            Err(_) => {
                warn!(grace_secs = grace.as_secs_f64(), "monitor did not stop in time; aborting");
                task.abort();
                false
            }
        }
    }

    /// Whether a monitor task is running.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(|m| !m.task.is_finished())
    }
}
