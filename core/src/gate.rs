// Readiness gate: suspend until one of our workers controls the page
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info};

use crate::platform::LifecycleEvent;
use crate::role::Role;
use crate::{PushlinkError, Result};

/// Single-shot view over a host lifecycle stream: `fired` resolves on the
/// next occurrence of one event kind.
///
/// Create the signal *before* checking the condition it guards so an event
/// landing between the check and the wait is not lost.
pub struct ActivationSignal {
    events: broadcast::Receiver<LifecycleEvent>,
    wanted: LifecycleEvent,
}

impl ActivationSignal {
    pub fn new(events: broadcast::Receiver<LifecycleEvent>, wanted: LifecycleEvent) -> Self {
        Self { events, wanted }
    }

    pub fn wanted(&self) -> LifecycleEvent {
        self.wanted
    }

    pub async fn fired(&mut self) -> Result<()> {
        loop {
            match self.events.recv().await {
                Ok(event) if event == self.wanted => return Ok(()),
                Ok(_) => continue,
                // Missed some events; at least one of them may have been ours.
                Err(RecvError::Lagged(skipped)) => {
                    debug!(target: "pushlink", skipped, "Lifecycle stream lagged");
                    return Ok(());
                }
                Err(RecvError::Closed) => {
                    return Err(PushlinkError::Platform(format!(
                        "lifecycle event source closed while waiting for {:?}",
                        self.wanted
                    )))
                }
            }
        }
    }
}

/// Resolve once `is_worker_controlling_page` is true. No timeout.
pub async fn wait_until_worker_controls_page<R: Role + ?Sized>(role: &R) -> Result<()> {
    let mut signal = role.activation_signal();
    if role.is_worker_controlling_page().await? {
        return Ok(());
    }

    debug!(
        target: "pushlink",
        role = %role.kind(),
        event = ?signal.wanted(),
        "Worker not controlling page yet; waiting"
    );
    loop {
        signal.fired().await?;
        if role.is_worker_controlling_page().await? {
            info!(target: "pushlink", role = %role.kind(), "Worker now controls page");
            return Ok(());
        }
    }
}
