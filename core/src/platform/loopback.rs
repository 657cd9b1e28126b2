//! In-process host: one service worker and any number of window clients in a
//! single scope, wired together without a browser.
//!
//! Messages are delivered synchronously, in post order, to whichever hook the
//! receiving side installed. A side without a hook drops the message, as a
//! browser context with no `message` listener would.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{ClientHandle, LifecycleEvent, MessageHook, PagePlatform, WireMessage, WorkerPlatform};
use crate::context::{WatchActivationContext, WorkerActivationState};
use crate::{PushlinkError, Result};

const LIFECYCLE_CAPACITY: usize = 16;

struct PageSlot {
    seq: u64,
    url: String,
    controlled: bool,
    hook: Option<MessageHook>,
    lifecycle: broadcast::Sender<LifecycleEvent>,
    // What this page's SDK reports; `None` until a worker controls it.
    activation: WatchActivationContext,
}

struct HostInner {
    worker_hook: RwLock<Option<MessageHook>>,
    registration_active: AtomicBool,
    worker_lifecycle: broadcast::Sender<LifecycleEvent>,
    pages: DashMap<String, PageSlot>,
    next_seq: AtomicU64,
    state: RwLock<WorkerActivationState>,
}

impl HostInner {
    fn state(&self) -> WorkerActivationState {
        self.state.read().map(|s| *s).unwrap_or_default()
    }
}

/// Owner of the simulated scope. Cloning shares the same scope.
#[derive(Clone)]
pub struct LoopbackHost {
    inner: Arc<HostInner>,
}

impl Default for LoopbackHost {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackHost {
    pub fn new() -> Self {
        let (worker_lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        Self {
            inner: Arc::new(HostInner {
                worker_hook: RwLock::new(None),
                registration_active: AtomicBool::new(false),
                worker_lifecycle,
                pages: DashMap::new(),
                next_seq: AtomicU64::new(0),
                state: RwLock::new(WorkerActivationState::None),
            }),
        }
    }

    /// Handle for the worker's global scope.
    pub fn worker(&self) -> Arc<LoopbackWorker> {
        Arc::new(LoopbackWorker {
            inner: Arc::clone(&self.inner),
        })
    }

    /// State recorded by the last `activate` / `set_activation_state`.
    /// Pages only see it once they are controlled.
    pub fn activation_state(&self) -> WorkerActivationState {
        self.inner.state()
    }

    /// Open a new window client. It is controlled from the start when the
    /// registration is already active, and uncontrolled otherwise.
    pub fn open_page(&self, url: impl Into<String>) -> Arc<LoopbackPage> {
        let controlled = self.inner.registration_active.load(Ordering::SeqCst);
        self.open(url.into(), controlled)
    }

    /// Open a window client that bypasses the worker, like a hard reload.
    /// It stays uncontrolled until `claim_clients`.
    pub fn open_uncontrolled_page(&self, url: impl Into<String>) -> Arc<LoopbackPage> {
        self.open(url.into(), false)
    }

    fn open(&self, url: String, controlled: bool) -> Arc<LoopbackPage> {
        let id = format!("client_{}", uuid::Uuid::new_v4());
        let (lifecycle, _) = broadcast::channel(LIFECYCLE_CAPACITY);
        let initial = if controlled {
            self.inner.state()
        } else {
            WorkerActivationState::None
        };
        self.inner.pages.insert(
            id.clone(),
            PageSlot {
                seq: self.inner.next_seq.fetch_add(1, Ordering::Relaxed),
                url: url.clone(),
                controlled,
                hook: None,
                lifecycle,
                activation: WatchActivationContext::new(initial),
            },
        );
        debug!(target: "pushlink", client = %id, %url, controlled, "Loopback page opened");
        Arc::new(LoopbackPage {
            inner: Arc::clone(&self.inner),
            id,
        })
    }

    pub fn close_page(&self, page: &LoopbackPage) {
        self.inner.pages.remove(&page.id);
    }

    /// Registration becomes active: fires `activate` in the worker. Pages
    /// already open stay uncontrolled until `claim_clients`.
    pub fn activate(&self, state: WorkerActivationState) {
        if let Ok(mut slot) = self.inner.state.write() {
            *slot = state;
        }
        self.inner.registration_active.store(true, Ordering::SeqCst);
        // No receivers is fine; nobody is waiting.
        let _ = self.inner.worker_lifecycle.send(LifecycleEvent::Activate);
        info!(target: "pushlink", ?state, "Loopback worker activated");
    }

    /// `clients.claim()`: every open page becomes controlled, reports the
    /// host's activation state and receives `controllerchange`.
    pub fn claim_clients(&self) {
        let claimed: Vec<_> = self
            .inner
            .pages
            .iter_mut()
            .map(|mut slot| {
                slot.controlled = true;
                (slot.activation.clone(), slot.lifecycle.clone())
            })
            .collect();
        self.notify_controller_change(claimed);
        debug!(target: "pushlink", pages = self.inner.pages.len(), "Loopback clients claimed");
    }

    /// Change the activation state reported by controlled pages and fire
    /// `controllerchange` at every page, e.g. a third-party worker taking
    /// over.
    pub fn set_activation_state(&self, state: WorkerActivationState) {
        if let Ok(mut slot) = self.inner.state.write() {
            *slot = state;
        }
        let pages: Vec<_> = self
            .inner
            .pages
            .iter()
            .map(|slot| {
                let activation = slot.controlled.then(|| slot.activation.clone());
                (activation, slot.lifecycle.clone())
            })
            .collect();
        for (activation, lifecycle) in pages {
            if let Some(activation) = activation {
                activation.set(state);
            }
            let _ = lifecycle.send(LifecycleEvent::ControllerChange);
        }
    }

    // Called with no shard lock held: the state must be visible before the
    // event so a woken gate re-checks against it.
    fn notify_controller_change(
        &self,
        pages: Vec<(WatchActivationContext, broadcast::Sender<LifecycleEvent>)>,
    ) {
        let state = self.inner.state();
        for (activation, lifecycle) in pages {
            activation.set(state);
            let _ = lifecycle.send(LifecycleEvent::ControllerChange);
        }
    }

    pub fn page_count(&self) -> usize {
        self.inner.pages.len()
    }
}

/// Worker-side handle into a `LoopbackHost`.
pub struct LoopbackWorker {
    inner: Arc<HostInner>,
}

#[async_trait]
impl WorkerPlatform for LoopbackWorker {
    async fn window_clients(&self, include_uncontrolled: bool) -> Result<Vec<ClientHandle>> {
        let mut found: Vec<(u64, ClientHandle)> = self
            .inner
            .pages
            .iter()
            .filter(|slot| include_uncontrolled || slot.controlled)
            .map(|slot| {
                (
                    slot.seq,
                    ClientHandle {
                        id: slot.key().clone(),
                        url: slot.url.clone(),
                        controlled: slot.controlled,
                    },
                )
            })
            .collect();
        found.sort_by_key(|(seq, _)| *seq);
        Ok(found.into_iter().map(|(_, client)| client).collect())
    }

    async fn post_to_client(&self, client: &ClientHandle, message: WireMessage) -> Result<()> {
        let hook = self
            .inner
            .pages
            .get(&client.id)
            .map(|slot| slot.hook.clone())
            .ok_or_else(|| PushlinkError::Platform(format!("unknown client: {}", client.id)))?;
        match hook {
            Some(hook) => hook(message),
            None => debug!(target: "pushlink", client = %client.id, "Page has no message hook; dropped"),
        }
        Ok(())
    }

    async fn registration_active(&self) -> bool {
        self.inner.registration_active.load(Ordering::SeqCst)
    }

    fn install_message_hook(&self, hook: MessageHook) {
        if let Ok(mut slot) = self.inner.worker_hook.write() {
            *slot = Some(hook);
        }
    }

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.worker_lifecycle.subscribe()
    }
}

/// Page-side handle into a `LoopbackHost`.
pub struct LoopbackPage {
    inner: Arc<HostInner>,
    id: String,
}

impl LoopbackPage {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// How the worker sees this page right now.
    pub fn client_handle(&self) -> Option<ClientHandle> {
        self.inner.pages.get(&self.id).map(|slot| ClientHandle {
            id: self.id.clone(),
            url: slot.url.clone(),
            controlled: slot.controlled,
        })
    }

    /// This page's view of the worker activation state, for
    /// `Messenger::for_page`. A closed page gets a detached context stuck at
    /// `None`.
    pub fn activation_context(&self) -> WatchActivationContext {
        self.inner
            .pages
            .get(&self.id)
            .map(|slot| slot.activation.clone())
            .unwrap_or_default()
    }

    pub fn is_controlled(&self) -> bool {
        self.inner
            .pages
            .get(&self.id)
            .map(|slot| slot.controlled)
            .unwrap_or(false)
    }
}

#[async_trait]
impl PagePlatform for LoopbackPage {
    async fn post_to_controller(&self, message: WireMessage) -> Result<()> {
        if !self.is_controlled() {
            return Err(PushlinkError::InvalidState(format!(
                "page {} has no controlling worker",
                self.id
            )));
        }
        let hook = self
            .inner
            .worker_hook
            .read()
            .ok()
            .and_then(|slot| slot.clone());
        match hook {
            Some(hook) => hook(message),
            None => debug!(target: "pushlink", client = %self.id, "Worker has no message hook; dropped"),
        }
        Ok(())
    }

    fn install_message_hook(&self, hook: MessageHook) {
        if let Some(mut slot) = self.inner.pages.get_mut(&self.id) {
            slot.hook = Some(hook);
        }
    }

    fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleEvent> {
        match self.inner.pages.get(&self.id) {
            Some(slot) => slot.lifecycle.subscribe(),
            // Closed page: hand out a receiver whose sender is already gone.
            None => broadcast::channel(1).1,
        }
    }
}
