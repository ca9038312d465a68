//! Shared ikochat library exports that keep the binary aligned on common behavior.

pub mod attachment;
pub mod auth;
pub mod capture;
pub mod compose;
pub mod config;
pub mod message;
pub mod playback;
pub mod protocol;
pub mod session;
mod telemetry;
pub mod terminal_restore;
pub mod transport;

pub use capture::{list_input_devices, CpalMicrophone, PermissionState, Recorder};
pub use compose::Composer;
pub use config::AppConfig;
pub use message::{EffortTier, Message, MessageContent, Role};
pub use playback::{AudioPlayer, CpalPlayer, NullPlayer};
pub use session::SessionClient;
pub use telemetry::init_tracing;
pub use transport::{AgentTransport, TransportEvent, WsTransport};
