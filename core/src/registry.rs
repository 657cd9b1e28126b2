// Listener registry keyed by topic
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::topic::{Payload, Topic};

/// Callback invoked with the payload of a dispatched message.
pub type Listener = Arc<dyn Fn(&Payload) + Send + Sync>;

/// One registration of a callback for a topic.
///
/// Records are immutable once registered; identity is the `Arc` that the
/// registry hands back, so the same callback registered twice yields two
/// distinct records.
pub struct ListenerRecord {
    callback: Listener,
    once_only: bool,
}

impl ListenerRecord {
    pub fn once_only(&self) -> bool {
        self.once_only
    }

    pub fn invoke(&self, payload: &Payload) {
        (self.callback)(payload)
    }
}

impl fmt::Debug for ListenerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRecord")
            .field("once_only", &self.once_only)
            .finish_non_exhaustive()
    }
}

/// Topic -> ordered listener records. Insertion order is invocation order.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: DashMap<Topic, Vec<Arc<ListenerRecord>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for `topic`. No deduplication.
    pub fn add_listener(
        &self,
        topic: Topic,
        callback: Listener,
        once_only: bool,
    ) -> Arc<ListenerRecord> {
        let record = Arc::new(ListenerRecord {
            callback,
            once_only,
        });
        self.listeners
            .entry(topic)
            .or_default()
            .push(Arc::clone(&record));
        debug!(target: "pushlink", %topic, once_only, "Listener registered");
        record
    }

    /// Snapshot of the records for `topic`; empty when nothing is registered.
    ///
    /// The snapshot is detached from the registry, so callers may invoke
    /// callbacks that mutate the registry while iterating it.
    pub fn find_listeners_for_message(&self, topic: Topic) -> Vec<Arc<ListenerRecord>> {
        self.listeners
            .get(&topic)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    pub fn delete_listener_records(&self, topic: Topic) {
        self.listeners.remove(&topic);
    }

    pub fn delete_all_listener_records(&self) {
        self.listeners.clear();
    }

    /// Remove every occurrence of `record` under `topic`.
    pub fn delete_listener_record(&self, topic: Topic, record: &Arc<ListenerRecord>) {
        let Some(mut records) = self.listeners.get_mut(&topic) else {
            return;
        };
        // Walk backwards so removals don't shift unvisited indices.
        for i in (0..records.len()).rev() {
            if Arc::ptr_eq(&records[i], record) {
                records.remove(i);
            }
        }
    }

    pub fn listener_count(&self, topic: Topic) -> usize {
        self.listeners.get(&topic).map(|r| r.len()).unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.iter().map(|e| e.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_listeners() == 0
    }
}
