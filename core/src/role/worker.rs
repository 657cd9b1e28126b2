use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Role, RoleKind};
use crate::gate::ActivationSignal;
use crate::platform::{ClientHandle, LifecycleEvent, MessageHook, WorkerPlatform};
use crate::topic::Message;
use crate::{PushlinkError, Result};

/// Service worker side of the messenger.
pub struct WorkerRole {
    platform: Arc<dyn WorkerPlatform>,
    include_uncontrolled: bool,
}

impl WorkerRole {
    pub fn new(platform: Arc<dyn WorkerPlatform>) -> Self {
        Self {
            platform,
            include_uncontrolled: true,
        }
    }

    /// Whether broadcasts also reach windows no worker controls yet.
    pub fn with_uncontrolled_clients(mut self, include: bool) -> Self {
        self.include_uncontrolled = include;
        self
    }
}

#[async_trait]
impl Role for WorkerRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Worker
    }

    async fn broadcast(&self, message: &Message) -> Result<usize> {
        let wire = message.to_wire()?;
        let clients = self
            .platform
            .window_clients(self.include_uncontrolled)
            .await?;

        // A failed post aborts the broadcast; clients after it get nothing.
        let mut posted = 0;
        for client in &clients {
            self.platform.post_to_client(client, wire.clone()).await?;
            posted += 1;
        }
        debug!(target: "pushlink", topic = %message.topic(), clients = clients.len(), posted, "Broadcast sent");
        Ok(posted)
    }

    async fn unicast(&self, message: &Message, target: Option<&ClientHandle>) -> Result<()> {
        let Some(client) = target else {
            return Err(PushlinkError::InvalidArgument(format!(
                "unicast of {} from the worker requires a target client",
                message.topic()
            )));
        };
        let wire = message.to_wire()?;
        self.platform.post_to_client(client, wire).await?;
        debug!(target: "pushlink", topic = %message.topic(), client = %client.id, "Unicast to client");
        Ok(())
    }

    async fn listen(&self, hook: MessageHook, _listen_even_if_uncontrolled: bool) -> Result<()> {
        // Installed straight away: a worker woken by a message must have its
        // handler in place before the first event turn ends.
        self.platform.install_message_hook(hook);
        debug!(target: "pushlink", "Worker message hook installed");
        Ok(())
    }

    async fn is_worker_controlling_page(&self) -> Result<bool> {
        Ok(self.platform.registration_active().await)
    }

    fn activation_signal(&self) -> ActivationSignal {
        ActivationSignal::new(self.platform.lifecycle_events(), LifecycleEvent::Activate)
    }
}
