use std::fs;
use std::path::Path;

use pushlink_core::{MessengerConfig, WorkerActivationState};

/// High-level configuration for the page/worker demo
#[derive(Clone, Debug)]
pub struct DemoConfig {
    pub messenger: MessengerConfig,
    /// URLs of the window clients opened before the worker activates
    pub pages: Vec<String>,
    /// Generation the worker reports once active
    pub generation: WorkerActivationState,
    /// Version string the worker answers `GetWorkerVersion` with
    pub worker_version: String,
    /// Where a clicked notification redirects the page
    pub redirect_url: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            messenger: MessengerConfig::default(),
            pages: vec![
                "https://example.com/".to_string(),
                "https://example.com/inbox".to_string(),
            ],
            generation: WorkerActivationState::WorkerA,
            worker_version: std::env::var("DEMO_WORKER_VERSION")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "151500".to_string()),
            redirect_url: std::env::var("DEMO_REDIRECT_URL")
                .unwrap_or_else(|_| "https://example.com/inbox".to_string()),
        }
    }
}

impl DemoConfig {
    /// Load configuration from a TOML file (path via PAGE_WORKER_CONFIG or ./page_worker.toml),
    /// overlaying values onto defaults and env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path =
            std::env::var("PAGE_WORKER_CONFIG").unwrap_or_else(|_| "page_worker.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "page_worker", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match toml::from_str::<DemoToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target = "page_worker", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "page_worker", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DemoToml {
    pub pages: Option<Vec<String>>,
    pub generation: Option<String>,
    pub worker_version: Option<String>,
    pub redirect_url: Option<String>,
    pub log_payloads: Option<bool>,
    pub include_uncontrolled_clients: Option<bool>,
}

impl DemoToml {
    fn overlay(self, mut base: DemoConfig) -> DemoConfig {
        if let Some(p) = self.pages {
            base.pages = p;
        }
        match self.generation.as_deref() {
            Some("a") | Some("A") => base.generation = WorkerActivationState::WorkerA,
            Some("b") | Some("B") => base.generation = WorkerActivationState::WorkerB,
            Some(other) => {
                tracing::warn!(target = "page_worker", generation = %other, "Unknown worker generation; keeping default")
            }
            None => {}
        }
        if let Some(v) = self.worker_version {
            base.worker_version = v;
        }
        if let Some(u) = self.redirect_url {
            base.redirect_url = u;
        }
        if let Some(v) = self.log_payloads {
            base.messenger.log_payloads = v;
        }
        if let Some(v) = self.include_uncontrolled_clients {
            base.messenger.include_uncontrolled_clients = v;
        }
        base
    }
}
