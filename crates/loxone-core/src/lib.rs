// loxone-core: Miniserver session supervisor and live configuration mirror.

pub mod command;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod listener;
pub mod model;
pub mod store;
pub mod transport;

mod miniserver;
mod supervisor;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{CommandResult, ControlCommand};
pub use config::{ConnectionTimings, MessageLimits, MiniserverConfig, Timing, TimingUpdate};
pub use control::{Control, ControlKind, ControlReading, Jalousie, Switch};
pub use error::CoreError;
pub use event::{EventSender, OfflineReason, ServerEvent};
pub use listener::{Listener, ListenerId, Notification};
pub use miniserver::Miniserver;
pub use store::{RegistrySnapshot, SyncReport};
pub use supervisor::{ConnectionState, retry_delay};
pub use transport::{Transport, TransportError};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Category, CategoryEntry, CategoryKind, ConfigSnapshot, ControlEntry, ControlState, Identity,
    Room, RoomEntry, ServerInfo,
};
