//! Host platform seams.
//!
//! The messenger never talks to a browser directly. Everything it needs from
//! the host is expressed by two traits:
//! - `WorkerPlatform`: the service worker global scope (`clients.matchAll`,
//!   `client.postMessage`, `registration.active`, the `activate` event)
//! - `PagePlatform`: the page's service worker container
//!   (`controller.postMessage`, the `controllerchange` event)
//!
//! `loopback` provides an in-process host implementing both.

pub mod loopback;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::Result;

/// Structured record as it crosses the page/worker boundary.
pub type WireMessage = serde_json::Value;

/// Hook the host calls for each incoming `message` event.
pub type MessageHook = Arc<dyn Fn(WireMessage) + Send + Sync>;

/// Lifecycle notifications the readiness gate waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleEvent {
    /// The worker's registration became active (worker side).
    Activate,
    /// The page's controller changed (page side).
    ControllerChange,
}

/// A window client as seen from the worker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientHandle {
    pub id: String,
    pub url: String,
    /// Whether this client is controlled by the worker at enumeration time.
    pub controlled: bool,
}

#[async_trait]
pub trait WorkerPlatform: Send + Sync {
    /// Window clients of this worker. `include_uncontrolled` also returns
    /// windows in scope that no worker controls yet.
    async fn window_clients(&self, include_uncontrolled: bool) -> Result<Vec<ClientHandle>>;

    async fn post_to_client(&self, client: &ClientHandle, message: WireMessage) -> Result<()>;

    /// `registration.active` is set.
    async fn registration_active(&self) -> bool;

    fn install_message_hook(&self, hook: MessageHook);

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent>;
}

#[async_trait]
pub trait PagePlatform: Send + Sync {
    async fn post_to_controller(&self, message: WireMessage) -> Result<()>;

    fn install_message_hook(&self, hook: MessageHook);

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent>;
}
