use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Role, RoleKind};
use crate::context::ActivationContext;
use crate::gate::{self, ActivationSignal};
use crate::platform::{ClientHandle, LifecycleEvent, MessageHook, PagePlatform};
use crate::topic::Message;
use crate::Result;

/// Page side of the messenger.
pub struct PageRole {
    platform: Arc<dyn PagePlatform>,
    context: Arc<dyn ActivationContext>,
}

impl PageRole {
    pub fn new(platform: Arc<dyn PagePlatform>, context: Arc<dyn ActivationContext>) -> Self {
        Self { platform, context }
    }
}

#[async_trait]
impl Role for PageRole {
    fn kind(&self) -> RoleKind {
        RoleKind::Page
    }

    async fn broadcast(&self, message: &Message) -> Result<usize> {
        debug!(target: "pushlink", topic = %message.topic(), "Broadcast is worker-only; skipped on page");
        Ok(0)
    }

    async fn unicast(&self, message: &Message, target: Option<&ClientHandle>) -> Result<()> {
        if let Some(client) = target {
            debug!(target: "pushlink", client = %client.id, "Page unicast ignores target client");
        }
        let wire = message.to_wire()?;
        gate::wait_until_worker_controls_page(self).await?;
        self.platform.post_to_controller(wire).await?;
        debug!(target: "pushlink", topic = %message.topic(), "Unicast to controlling worker");
        Ok(())
    }

    async fn listen(&self, hook: MessageHook, listen_even_if_uncontrolled: bool) -> Result<()> {
        if !listen_even_if_uncontrolled {
            gate::wait_until_worker_controls_page(self).await?;
        }
        self.platform.install_message_hook(hook);
        debug!(target: "pushlink", listen_even_if_uncontrolled, "Page message hook installed");
        Ok(())
    }

    async fn is_worker_controlling_page(&self) -> Result<bool> {
        let state = self.context.worker_activation_state().await?;
        Ok(state.is_ours())
    }

    fn activation_signal(&self) -> ActivationSignal {
        ActivationSignal::new(
            self.platform.lifecycle_events(),
            LifecycleEvent::ControllerChange,
        )
    }
}
