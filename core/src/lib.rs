// Pushlink Core Library
// Page <-> service worker messaging for web push SDKs

pub mod config;
pub mod context;
pub mod gate;
pub mod messenger;
pub mod platform;
pub mod registry;
pub mod role;
pub mod telemetry;
pub mod topic;

// Export core types
pub use config::MessengerConfig;
pub use context::{ActivationContext, WatchActivationContext, WorkerActivationState};
pub use gate::ActivationSignal;
pub use messenger::Messenger;
pub use platform::{
    ClientHandle, LifecycleEvent, MessageHook, PagePlatform, WireMessage, WorkerPlatform,
};
pub use registry::{Listener, ListenerRecord, ListenerRegistry};
pub use role::{PageRole, Role, RoleKind, WorkerRole};
pub use telemetry::{MessengerStats, MessengerStatsSnapshot};
pub use topic::{Message, Payload, Topic};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PushlinkError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, PushlinkError>;
