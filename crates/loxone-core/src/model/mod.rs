// ── Domain model ──
//
// Live entities mirrored from the Miniserver (rooms, categories, states)
// and the plain-data snapshot a transport produces from the structure file.
// Controls live in `crate::control` because they carry command behaviour.

pub mod container;
pub mod identity;
pub mod snapshot;
pub mod state;

// ── Re-exports ──────────────────────────────────────────────────────

pub use container::{Category, CategoryKind, Room};
pub use identity::Identity;
pub use snapshot::{CategoryEntry, ConfigSnapshot, ControlEntry, RoomEntry, ServerInfo};
pub use state::ControlState;
