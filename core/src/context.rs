// Worker activation state as reported by the surrounding SDK
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use crate::Result;

/// Which service worker (if any) currently controls the page.
///
/// Two generations of the SDK worker exist side by side so an update can roll
/// out without a page ever losing an active worker of ours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkerActivationState {
    #[default]
    #[serde(rename = "None")]
    None,
    #[serde(rename = "Worker A (Main)")]
    WorkerA,
    #[serde(rename = "Worker B (Alt)")]
    WorkerB,
    #[serde(rename = "3rd Party")]
    ThirdParty,
    #[serde(rename = "Bypassed")]
    Bypassed,
    #[serde(rename = "Indeterminate")]
    Indeterminate,
}

impl WorkerActivationState {
    /// True for either generation of our own worker.
    pub fn is_ours(self) -> bool {
        matches!(
            self,
            WorkerActivationState::WorkerA | WorkerActivationState::WorkerB
        )
    }
}

/// Collaborator that knows the page's current worker activation state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivationContext: Send + Sync {
    async fn worker_activation_state(&self) -> Result<WorkerActivationState>;
}

/// `ActivationContext` backed by a watch channel; the owner pushes new states
/// with `set`.
#[derive(Debug, Clone)]
pub struct WatchActivationContext {
    tx: Arc<watch::Sender<WorkerActivationState>>,
}

impl WatchActivationContext {
    pub fn new(initial: WorkerActivationState) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self, state: WorkerActivationState) {
        debug!(target: "pushlink", ?state, "Worker activation state updated");
        self.tx.send_replace(state);
    }

    pub fn current(&self) -> WorkerActivationState {
        *self.tx.borrow()
    }

    /// Receiver for observers outside the messenger.
    pub fn subscribe(&self) -> watch::Receiver<WorkerActivationState> {
        self.tx.subscribe()
    }
}

impl Default for WatchActivationContext {
    fn default() -> Self {
        Self::new(WorkerActivationState::None)
    }
}

#[async_trait]
impl ActivationContext for WatchActivationContext {
    async fn worker_activation_state(&self) -> Result<WorkerActivationState> {
        Ok(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_our_generations_count() {
        assert!(WorkerActivationState::WorkerA.is_ours());
        assert!(WorkerActivationState::WorkerB.is_ours());
        assert!(!WorkerActivationState::None.is_ours());
        assert!(!WorkerActivationState::ThirdParty.is_ours());
        assert!(!WorkerActivationState::Bypassed.is_ours());
        assert!(!WorkerActivationState::Indeterminate.is_ours());
    }

    #[tokio::test]
    async fn test_watch_context_reports_latest() {
        let ctx = WatchActivationContext::default();
        assert_eq!(
            ctx.worker_activation_state().await.unwrap(),
            WorkerActivationState::None
        );

        let mut rx = ctx.subscribe();
        ctx.set(WorkerActivationState::WorkerB);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), WorkerActivationState::WorkerB);
        assert_eq!(
            ctx.worker_activation_state().await.unwrap(),
            WorkerActivationState::WorkerB
        );
    }
}
