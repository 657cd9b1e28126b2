// Logging setup and messenger counters
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing::info;

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"info,pushlink=debug"`).
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_logging(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        info!(target: "pushlink", "Logging initialized");
    }
}

/// Point-in-time copy of `MessengerStats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerStatsSnapshot {
    pub sent: u64,
    pub received: u64,
    pub dispatched: u64,
    pub dropped_no_listeners: u64,
    pub undecodable: u64,
}

/// Counters shared by a messenger and its receive hook.
#[derive(Debug, Default)]
pub struct MessengerStats {
    sent: AtomicU64,
    received: AtomicU64,
    dispatched: AtomicU64,
    dropped_no_listeners: AtomicU64,
    undecodable: AtomicU64,
}

impl MessengerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, count: u64) {
        self.sent.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_no_listeners.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_undecodable(&self) {
        self.undecodable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MessengerStatsSnapshot {
        MessengerStatsSnapshot {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            dropped_no_listeners: self.dropped_no_listeners.load(Ordering::Relaxed),
            undecodable: self.undecodable.load(Ordering::Relaxed),
        }
    }
}
