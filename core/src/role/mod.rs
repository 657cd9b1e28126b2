//! Execution-context roles.
//!
//! A messenger runs either inside the service worker or inside a page. The
//! role is picked once at construction and owns everything that differs
//! between the two sides: how messages leave, how the receive hook is
//! installed, and what "worker controls the page" means.

mod page;
mod worker;

pub use page::PageRole;
pub use worker::WorkerRole;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::gate::ActivationSignal;
use crate::platform::{ClientHandle, MessageHook};
use crate::topic::Message;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Worker,
    Page,
}

impl fmt::Display for RoleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKind::Worker => f.write_str("worker"),
            RoleKind::Page => f.write_str("page"),
        }
    }
}

#[async_trait]
pub trait Role: Send + Sync {
    fn kind(&self) -> RoleKind;

    /// Post to every window client. Returns how many clients were posted to;
    /// roles without broadcast support return `Ok(0)`.
    async fn broadcast(&self, message: &Message) -> Result<usize>;

    async fn unicast(&self, message: &Message, target: Option<&ClientHandle>) -> Result<()>;

    /// Install the host's receive hook.
    async fn listen(&self, hook: MessageHook, listen_even_if_uncontrolled: bool) -> Result<()>;

    async fn is_worker_controlling_page(&self) -> Result<bool>;

    /// Signal for the lifecycle event after which control should be re-checked.
    fn activation_signal(&self) -> ActivationSignal;
}
