use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PushlinkError, Result};

/// Messenger settings. Resolution order: built-in defaults, then environment,
/// then an optional TOML overlay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Broadcasts also reach in-scope windows that no worker controls yet.
    pub include_uncontrolled_clients: bool,
    /// Include payloads in debug logs.
    pub log_payloads: bool,
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            include_uncontrolled_clients: env_flag("PUSHLINK_INCLUDE_UNCONTROLLED").unwrap_or(true),
            log_payloads: env_flag("PUSHLINK_LOG_PAYLOADS").unwrap_or(false),
        }
    }
}

impl MessengerConfig {
    /// Load configuration from a TOML file (path via PUSHLINK_CONFIG or
    /// ./pushlink.toml), overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("PUSHLINK_CONFIG").unwrap_or_else(|_| "pushlink.toml".into());
        Self::load_from(Path::new(&path))
    }

    pub fn load_from(path: &Path) -> Self {
        let default = Self::default();
        if !path.exists() {
            tracing::info!(target: "pushlink", path = %path.display(), "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(path) {
            Ok(s) => match toml::from_str::<MessengerToml>(&s) {
                Ok(t) => t.overlay(default),
                Err(e) => {
                    tracing::warn!(target: "pushlink", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target: "pushlink", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    /// Strict variant of `load_from` for callers that want parse errors.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let t = toml::from_str::<MessengerToml>(s)
            .map_err(|e| PushlinkError::Config(e.to_string()))?;
        Ok(t.overlay(Self::default()))
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MessengerToml {
    include_uncontrolled_clients: Option<bool>,
    log_payloads: Option<bool>,
}

impl MessengerToml {
    fn overlay(self, mut base: MessengerConfig) -> MessengerConfig {
        if let Some(v) = self.include_uncontrolled_clients {
            base.include_uncontrolled_clients = v;
        }
        if let Some(v) = self.log_payloads {
            base.log_payloads = v;
        }
        base
    }
}
