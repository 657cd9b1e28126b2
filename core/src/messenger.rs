// Messenger: send, receive and listener bookkeeping for one execution context
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::MessengerConfig;
use crate::context::ActivationContext;
use crate::gate;
use crate::platform::{ClientHandle, MessageHook, PagePlatform, WireMessage, WorkerPlatform};
use crate::registry::{ListenerRecord, ListenerRegistry};
use crate::role::{PageRole, Role, RoleKind, WorkerRole};
use crate::telemetry::{MessengerStats, MessengerStatsSnapshot};
use crate::topic::{Message, Payload, Topic};
use crate::Result;

/// Receive side shared between a messenger and the hook it installs on the
/// host. Holds no reference back to the platform.
#[derive(Clone)]
struct Dispatcher {
    registry: Arc<ListenerRegistry>,
    stats: Arc<MessengerStats>,
    role: RoleKind,
    log_payloads: bool,
}

impl Dispatcher {
    fn receive(&self, wire: WireMessage) {
        self.stats.record_received();
        match Message::from_wire(wire) {
            Ok(message) => self.dispatch(&message),
            Err(e) => {
                self.stats.record_undecodable();
                debug!(target: "pushlink", role = %self.role, error = %e, "Dropping undecodable message");
            }
        }
    }

    fn dispatch(&self, message: &Message) {
        let topic = message.topic();
        let listeners = self.registry.find_listeners_for_message(topic);
        if listeners.is_empty() {
            self.stats.record_dropped();
            trace!(target: "pushlink", role = %self.role, %topic, "No listeners; message dropped");
            return;
        }

        if self.log_payloads {
            debug!(target: "pushlink", role = %self.role, %topic, listeners = listeners.len(), payload = %message.payload(), "Dispatching message");
        } else {
            debug!(target: "pushlink", role = %self.role, %topic, listeners = listeners.len(), "Dispatching message");
        }

        // All once-only records leave the registry before any callback runs,
        // so a callback that re-dispatches this topic cannot reach them again.
        for record in listeners.iter().filter(|r| r.once_only()) {
            self.registry.delete_listener_record(topic, record);
        }
        self.stats.record_dispatched();

        for record in &listeners {
            record.invoke(message.payload());
        }
    }
}

/// Request/notification messaging between a page and its service worker.
///
/// Cloning is cheap; clones share the registry, statistics and role.
#[derive(Clone)]
pub struct Messenger {
    role: Arc<dyn Role>,
    dispatcher: Dispatcher,
    config: MessengerConfig,
}

impl Messenger {
    pub fn new(role: Arc<dyn Role>, config: MessengerConfig) -> Self {
        let dispatcher = Dispatcher {
            registry: Arc::new(ListenerRegistry::new()),
            stats: Arc::new(MessengerStats::new()),
            role: role.kind(),
            log_payloads: config.log_payloads,
        };
        debug!(target: "pushlink", role = %role.kind(), "Messenger created");
        Self {
            role,
            dispatcher,
            config,
        }
    }

    /// Messenger running inside the service worker.
    pub fn for_worker(platform: Arc<dyn WorkerPlatform>, config: MessengerConfig) -> Self {
        let role = WorkerRole::new(platform)
            .with_uncontrolled_clients(config.include_uncontrolled_clients);
        Self::new(Arc::new(role), config)
    }

    /// Messenger running inside a page.
    pub fn for_page(
        platform: Arc<dyn PagePlatform>,
        context: Arc<dyn ActivationContext>,
        config: MessengerConfig,
    ) -> Self {
        Self::new(Arc::new(PageRole::new(platform, context)), config)
    }

    pub fn role(&self) -> RoleKind {
        self.role.kind()
    }

    pub fn config(&self) -> &MessengerConfig {
        &self.config
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.dispatcher.registry
    }

    pub fn stats(&self) -> MessengerStatsSnapshot {
        self.dispatcher.stats.snapshot()
    }

    /// Post to every window client of this worker. A no-op returning `Ok(0)`
    /// outside the worker.
    pub async fn broadcast(&self, topic: Topic, payload: Payload) -> Result<usize> {
        let message = Message::from_payload(topic, payload);
        self.log_outgoing("broadcast", &message);
        let posted = self.role.broadcast(&message).await?;
        self.dispatcher.stats.record_sent(posted as u64);
        Ok(posted)
    }

    /// Send one message to the other side.
    ///
    /// In the worker `target` is required; without it this fails with
    /// `InvalidArgument` before anything is posted. In a page `target` is
    /// ignored and the call waits until one of our workers controls the page.
    pub async fn unicast(
        &self,
        topic: Topic,
        payload: Payload,
        target: Option<&ClientHandle>,
    ) -> Result<()> {
        let message = Message::from_payload(topic, payload);
        self.log_outgoing("unicast", &message);
        self.role.unicast(&message, target).await?;
        self.dispatcher.stats.record_sent(1);
        Ok(())
    }

    /// Install the host receive hook. In a page this waits for a controlling
    /// worker unless `listen_even_if_uncontrolled` is set.
    pub async fn listen(&self, listen_even_if_uncontrolled: bool) -> Result<()> {
        let dispatcher = self.dispatcher.clone();
        let hook: MessageHook = Arc::new(move |wire: WireMessage| dispatcher.receive(wire));
        self.role.listen(hook, listen_even_if_uncontrolled).await
    }

    /// Deliver `message` to the listeners registered for its topic, as if it
    /// had just arrived from the other side.
    pub fn dispatch(&self, message: &Message) {
        self.dispatcher.dispatch(message)
    }

    pub fn on<F>(&self, topic: Topic, callback: F) -> Arc<ListenerRecord>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.dispatcher
            .registry
            .add_listener(topic, Arc::new(callback), false)
    }

    pub fn once<F>(&self, topic: Topic, callback: F) -> Arc<ListenerRecord>
    where
        F: Fn(&Payload) + Send + Sync + 'static,
    {
        self.dispatcher
            .registry
            .add_listener(topic, Arc::new(callback), true)
    }

    /// Drop the listeners for `topic`, or every listener when `None`.
    pub fn off(&self, topic: Option<Topic>) {
        match topic {
            Some(topic) => self.dispatcher.registry.delete_listener_records(topic),
            None => self.dispatcher.registry.delete_all_listener_records(),
        }
        debug!(target: "pushlink", topic = ?topic, "Listeners removed");
    }

    /// Drop one registration returned by `on`/`once`.
    pub fn off_record(&self, topic: Topic, record: &Arc<ListenerRecord>) {
        self.dispatcher
            .registry
            .delete_listener_record(topic, record)
    }

    /// Whether the worker side is ready: our registration is active (worker)
    /// or the page is controlled by WorkerA/WorkerB (page).
    pub async fn is_worker_controlling_page(&self) -> Result<bool> {
        self.role.is_worker_controlling_page().await
    }

    pub async fn wait_until_worker_controls_page(&self) -> Result<()> {
        gate::wait_until_worker_controls_page(self.role.as_ref()).await
    }

    fn log_outgoing(&self, kind: &str, message: &Message) {
        if self.config.log_payloads {
            debug!(target: "pushlink", role = %self.role.kind(), kind, topic = %message.topic(), payload = %message.payload(), "Sending message");
        } else {
            debug!(target: "pushlink", role = %self.role.kind(), kind, topic = %message.topic(), "Sending message");
        }
    }
}
